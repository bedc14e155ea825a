//! Shared integration service: one lazily connected client per endpoint.

use crate::client::{ProtocolClient, ServerInfo};
use crate::invoker::{connector_for, Connector};
use mcplink_core::{McpLinkError, McpLinkResult, ServerEndpoint, ToolOutcome};
use serde::Serialize;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, OnceCell};
use tracing::{info, warn};

/// Name given to the service's single client.
pub const DEFAULT_CLIENT_NAME: &str = "default";

/// Connection report returned by [`IntegrationService::connection_info`].
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionInfo {
    /// `connected`, `error` or `closed`.
    pub status: String,
    /// Client snapshot, when connected.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server: Option<ServerInfo>,
    /// Result of a health check, when one could run.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub health: Option<bool>,
    /// Why the connection could not be made.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// One shared protocol client, created on first use.
///
/// Construct it once, wrap it in an `Arc` and hand it to whoever needs tool
/// access. The client is built and connected lazily; if it later drops its
/// connection the same client is reconnected, so there is never more than
/// one live connection per service. [`shutdown`](Self::shutdown) is final.
pub struct IntegrationService {
    endpoint: ServerEndpoint,
    connector: Arc<dyn Connector>,
    client: OnceCell<Arc<ProtocolClient>>,
    closed: AtomicBool,
    // Serialises connect, reconnect and shutdown.
    lifecycle: Mutex<()>,
}

impl IntegrationService {
    /// Service whose connector is chosen from the endpoint's transport hint.
    pub fn new(endpoint: ServerEndpoint) -> McpLinkResult<Self> {
        let connector = connector_for(&endpoint)?;
        Ok(Self::with_connector(endpoint, connector))
    }

    /// Service configured from the `MCP_*` environment variables.
    pub fn from_env() -> McpLinkResult<Self> {
        Self::new(ServerEndpoint::from_env()?)
    }

    /// Service using an explicit connector.
    pub fn with_connector(endpoint: ServerEndpoint, connector: Arc<dyn Connector>) -> Self {
        Self {
            endpoint,
            connector,
            client: OnceCell::new(),
            closed: AtomicBool::new(false),
            lifecycle: Mutex::new(()),
        }
    }

    /// Endpoint the client connects to.
    pub fn endpoint(&self) -> &ServerEndpoint {
        &self.endpoint
    }

    /// Whether the client has been created.
    pub fn is_initialized(&self) -> bool {
        self.client.initialized()
    }

    /// Whether [`shutdown`](Self::shutdown) has run.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Create and connect the client if needed, and reconnect it if it has
    /// lost its connection.
    pub async fn ensure_connected(&self) -> McpLinkResult<Arc<ProtocolClient>> {
        let _lifecycle = self.lifecycle.lock().await;
        if self.is_closed() {
            return Err(McpLinkError::ServiceClosed(
                "integration service has been shut down".into(),
            ));
        }

        if let Some(client) = self.client.get() {
            if !client.is_connected().await {
                info!(url = %self.endpoint.url, "Reconnecting integration client");
                client.connect().await?;
            }
            return Ok(client.clone());
        }

        let client = self
            .client
            .get_or_try_init(|| self.create_client())
            .await?;
        Ok(client.clone())
    }

    async fn create_client(&self) -> McpLinkResult<Arc<ProtocolClient>> {
        let client = ProtocolClient::with_connector(
            DEFAULT_CLIENT_NAME,
            self.endpoint.clone(),
            self.connector.clone(),
        );
        client.connect().await?;

        if client.health_check().await {
            info!(url = %self.endpoint.url, "Integration service initialized, server healthy");
        } else {
            warn!(url = %self.endpoint.url, "Integration service connected, but health check failed");
        }
        Ok(Arc::new(client))
    }

    /// Connect eagerly. Equivalent to [`ensure_connected`](Self::ensure_connected)
    /// without the client handle.
    pub async fn initialize(&self) -> McpLinkResult<()> {
        self.ensure_connected().await.map(|_| ())
    }

    /// [`ProtocolClient::run_query`] on the shared client.
    pub async fn execute_query(&self, sql: &str) -> McpLinkResult<ToolOutcome> {
        Ok(self.ensure_connected().await?.run_query(sql).await)
    }

    /// [`ProtocolClient::list_entities`] on the shared client.
    pub async fn list_entities(&self) -> McpLinkResult<ToolOutcome> {
        Ok(self.ensure_connected().await?.list_entities().await)
    }

    /// [`ProtocolClient::describe_entity`] on the shared client.
    pub async fn describe(&self, table: &str) -> McpLinkResult<ToolOutcome> {
        Ok(self.ensure_connected().await?.describe_entity(table).await)
    }

    /// Routed call by tool name, as [`ProtocolClient::call_tool`].
    pub async fn call_tool(&self, tool: &str, arguments: Value) -> McpLinkResult<ToolOutcome> {
        Ok(self.ensure_connected().await?.call_tool(tool, arguments).await)
    }

    /// `false` when the service cannot connect or the server is unhealthy.
    pub async fn health_check(&self) -> bool {
        match self.ensure_connected().await {
            Ok(client) => client.health_check().await,
            Err(e) => {
                warn!(error = %e, "Integration health check could not connect");
                false
            }
        }
    }

    /// Status report; connects first unless the service is closed.
    pub async fn connection_info(&self) -> ConnectionInfo {
        if self.is_closed() {
            return ConnectionInfo {
                status: "closed".into(),
                server: None,
                health: None,
                error: None,
            };
        }

        match self.ensure_connected().await {
            Ok(client) => {
                let health = client.health_check().await;
                ConnectionInfo {
                    status: "connected".into(),
                    server: Some(client.server_info().await),
                    health: Some(health),
                    error: None,
                }
            }
            Err(e) => ConnectionInfo {
                status: "error".into(),
                server: None,
                health: Some(false),
                error: Some(e.to_string()),
            },
        }
    }

    /// Close the service and its client. Later calls fail with
    /// `ServiceClosed`, including calls made through client handles obtained
    /// earlier from [`ensure_connected`](Self::ensure_connected). Idempotent.
    pub async fn shutdown(&self) {
        let _lifecycle = self.lifecycle.lock().await;
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(client) = self.client.get() {
            client.close().await;
        }
        info!(url = %self.endpoint.url, "Integration service shut down");
    }
}
