#![allow(dead_code)]

use async_trait::async_trait;
use mcplink_client::{Connector, ToolDescriptor, ToolInvoker};
use mcplink_core::{
    FailureKind, McpLinkError, McpLinkResult, ServerEndpoint, ToolOutcome, TransportKind,
};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

/// Counters shared by a connector and every invoker it opens.
#[derive(Default)]
pub struct SpyState {
    pub opens: AtomicUsize,
    pub closes: AtomicUsize,
    pub list_calls: AtomicUsize,
    pub calls: Mutex<Vec<(String, String, Value)>>,
}

#[derive(Default)]
struct SpyConfig {
    tools: Vec<ToolDescriptor>,
    responses: HashMap<String, Value>,
    fail_open: Vec<String>,
    fail_calls: Vec<String>,
    gates: Vec<(String, Arc<Notify>)>,
    delays: Vec<(String, Duration)>,
}

/// A [`Connector`] that records every interaction and never touches the
/// network. Failures are keyed by substrings of the endpoint URL.
#[derive(Clone, Default)]
pub struct SpyConnector {
    state: Arc<SpyState>,
    config: Arc<SpyConfig>,
}

impl SpyConnector {
    pub fn new() -> Self {
        Self::default()
    }

    fn config_mut(&mut self) -> &mut SpyConfig {
        Arc::get_mut(&mut self.config).expect("configure the spy before sharing it")
    }

    /// Advertise `name` during discovery and answer calls with `response`.
    pub fn with_tool(mut self, name: &str, response: Value) -> Self {
        let config = self.config_mut();
        config.tools.push(ToolDescriptor::new(name, format!("spy {name}")));
        config.responses.insert(name.to_string(), response);
        self
    }

    /// `open` fails for endpoints whose URL contains `fragment`.
    pub fn failing_open(mut self, fragment: &str) -> Self {
        self.config_mut().fail_open.push(fragment.to_string());
        self
    }

    /// Every call fails with a transport error for endpoints whose URL
    /// contains `fragment`.
    pub fn failing_calls(mut self, fragment: &str) -> Self {
        self.config_mut().fail_calls.push(fragment.to_string());
        self
    }

    /// Calls for endpoints whose URL contains `fragment` are recorded, then
    /// park until `gate` is notified.
    pub fn with_gate(mut self, fragment: &str, gate: Arc<Notify>) -> Self {
        self.config_mut().gates.push((fragment.to_string(), gate));
        self
    }

    /// Calls for endpoints whose URL contains `fragment` take `delay`.
    pub fn with_delay(mut self, fragment: &str, delay: Duration) -> Self {
        self.config_mut().delays.push((fragment.to_string(), delay));
        self
    }

    pub fn opens(&self) -> usize {
        self.state.opens.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.state.closes.load(Ordering::SeqCst)
    }

    pub fn list_calls(&self) -> usize {
        self.state.list_calls.load(Ordering::SeqCst)
    }

    /// Number of `call_tool` invocations across every opened handle.
    pub fn call_count(&self) -> usize {
        self.state.calls.lock().unwrap().len()
    }

    /// `(url, tool, arguments)` of every call, in order.
    pub fn calls(&self) -> Vec<(String, String, Value)> {
        self.state.calls.lock().unwrap().clone()
    }

    /// Total network-like interactions: opens, discoveries and calls.
    pub fn io_count(&self) -> usize {
        self.opens() + self.list_calls() + self.call_count()
    }
}

fn matches_any(url: &str, fragments: &[String]) -> bool {
    fragments.iter().any(|f| url.contains(f.as_str()))
}

fn first_match<'a, T>(url: &str, entries: &'a [(String, T)]) -> Option<&'a T> {
    entries
        .iter()
        .find(|(fragment, _)| url.contains(fragment.as_str()))
        .map(|(_, value)| value)
}

/// Polls `condition` until it holds, failing the test after five seconds.
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

#[async_trait]
impl Connector for SpyConnector {
    async fn open(&self, endpoint: &ServerEndpoint) -> McpLinkResult<Arc<dyn ToolInvoker>> {
        self.state.opens.fetch_add(1, Ordering::SeqCst);
        if matches_any(&endpoint.url, &self.config.fail_open) {
            return Err(McpLinkError::Connection(format!(
                "connection refused: {}",
                endpoint.url
            )));
        }
        Ok(Arc::new(SpyInvoker {
            url: endpoint.url.clone(),
            state: self.state.clone(),
            config: self.config.clone(),
        }))
    }
}

struct SpyInvoker {
    url: String,
    state: Arc<SpyState>,
    config: Arc<SpyConfig>,
}

#[async_trait]
impl ToolInvoker for SpyInvoker {
    async fn list_tools(&self) -> Vec<ToolDescriptor> {
        self.state.list_calls.fetch_add(1, Ordering::SeqCst);
        if matches_any(&self.url, &self.config.fail_calls) {
            return Vec::new();
        }
        self.config.tools.clone()
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> ToolOutcome {
        self.state
            .calls
            .lock()
            .unwrap()
            .push((self.url.clone(), name.to_string(), arguments));

        if let Some(gate) = first_match(&self.url, &self.config.gates) {
            gate.notified().await;
        }
        if let Some(delay) = first_match(&self.url, &self.config.delays) {
            tokio::time::sleep(*delay).await;
        }

        if matches_any(&self.url, &self.config.fail_calls) {
            return ToolOutcome::failed(FailureKind::Transport, "connection reset by peer");
        }
        match self.config.responses.get(name) {
            Some(response) => ToolOutcome::from_value(response.clone()),
            None => ToolOutcome::failed(FailureKind::Remote, format!("Unknown tool: {name}")),
        }
    }

    async fn close(&self) {
        self.state.closes.fetch_add(1, Ordering::SeqCst);
    }
}

/// An endpoint whose URL identifies it to the spy.
pub fn spy_endpoint(name: &str) -> ServerEndpoint {
    ServerEndpoint::new(format!("http://{name}.spy/mcp")).with_transport(TransportKind::Http)
}
