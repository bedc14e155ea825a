//! HTTP transport: JSON-RPC envelopes POSTed to the endpoint URL.

use crate::codec;
use crate::invoker::{Connector, ToolInvoker};
use crate::protocol::{JsonRpcRequest, ToolDescriptor};
use crate::retry::RetryingInvoker;
use async_trait::async_trait;
use mcplink_core::{
    FailureKind, McpLinkError, McpLinkResult, ServerEndpoint, ToolFailure, ToolOutcome,
};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// Longest response excerpt kept in a failure context.
const BODY_EXCERPT_CHARS: usize = 512;

/// Opens [`HttpTransport`] handles, wrapped in a [`RetryingInvoker`] when the
/// endpoint carries a retry policy.
#[derive(Debug, Default, Clone, Copy)]
pub struct HttpConnector;

impl HttpConnector {
    /// The connector; it holds no state.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Connector for HttpConnector {
    async fn open(&self, endpoint: &ServerEndpoint) -> McpLinkResult<Arc<dyn ToolInvoker>> {
        endpoint
            .validate()
            .map_err(|e| McpLinkError::Connection(e.to_string()))?;

        let transport = HttpTransport::new(endpoint)?;
        let invoker: Arc<dyn ToolInvoker> = match &endpoint.retry {
            Some(policy) if policy.max_attempts > 1 => {
                Arc::new(RetryingInvoker::new(transport, policy.clone()))
            }
            _ => Arc::new(transport),
        };
        Ok(invoker)
    }
}

/// A [`ToolInvoker`] over HTTP POST.
pub struct HttpTransport {
    http: reqwest::Client,
    url: String,
    timeout_secs: u64,
    next_id: AtomicU64,
}

impl HttpTransport {
    /// Build the underlying client from the endpoint's timeout, headers and
    /// idle-pool size.
    pub fn new(endpoint: &ServerEndpoint) -> McpLinkResult<Self> {
        let mut headers = HeaderMap::new();
        for (name, value) in endpoint.request_headers() {
            let name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
                McpLinkError::Connection(format!("invalid header name '{name}': {e}"))
            })?;
            let value = HeaderValue::from_str(&value).map_err(|e| {
                McpLinkError::Connection(format!("invalid value for header '{name}': {e}"))
            })?;
            headers.insert(name, value);
        }

        let http = reqwest::Client::builder()
            .timeout(endpoint.timeout())
            .default_headers(headers)
            .pool_max_idle_per_host(endpoint.pool_size)
            .build()
            .map_err(|e| McpLinkError::Connection(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            url: endpoint.url.clone(),
            timeout_secs: endpoint.timeout_secs,
            next_id: AtomicU64::new(1),
        })
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }

    /// Send one envelope and return the raw body of a 2xx response.
    async fn post(&self, request: &JsonRpcRequest) -> Result<String, ToolFailure> {
        debug!(url = %self.url, method = %request.method, id = request.id, "Sending JSON-RPC request");

        let resp = self
            .http
            .post(&self.url)
            .json(request)
            .send()
            .await
            .map_err(|e| self.send_failure(&e))?;

        let status = resp.status();
        let body = resp.text().await.map_err(|e| self.send_failure(&e))?;

        if !status.is_success() {
            let excerpt: String = body.chars().take(BODY_EXCERPT_CHARS).collect();
            return Err(ToolFailure::new(
                FailureKind::Transport,
                format!("server returned HTTP {status}"),
            )
            .with_context("status", status.as_u16())
            .with_context("body", excerpt));
        }

        Ok(body)
    }

    fn send_failure(&self, err: &reqwest::Error) -> ToolFailure {
        let message = if err.is_timeout() {
            format!("request timed out after {}s", self.timeout_secs)
        } else if err.is_connect() {
            format!("connection to {} failed: {err}", self.url)
        } else {
            format!("request failed: {err}")
        };
        ToolFailure::new(FailureKind::Transport, message).with_context("url", self.url.as_str())
    }
}

#[async_trait]
impl ToolInvoker for HttpTransport {
    async fn list_tools(&self) -> Vec<ToolDescriptor> {
        let request = JsonRpcRequest::tools_list(self.next_id());
        let decoded = match self.post(&request).await {
            Ok(body) => codec::decode_tool_list(&body).map_err(ToolFailure::from),
            Err(failure) => Err(failure),
        };

        match decoded {
            Ok(tools) => tools,
            Err(failure) => {
                warn!(url = %self.url, error = %failure.message, "Tool discovery failed");
                Vec::new()
            }
        }
    }

    async fn call_tool(&self, name: &str, arguments: serde_json::Value) -> ToolOutcome {
        let request = JsonRpcRequest::tools_call(self.next_id(), name, arguments);
        match self.post(&request).await {
            Ok(body) => codec::decode_tool_response(&body),
            Err(failure) => ToolOutcome::Failed(failure.with_context("tool", name)),
        }
    }
}
