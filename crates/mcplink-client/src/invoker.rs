//! Capability traits for talking to a tool server.
//!
//! A [`Connector`] allocates the handle during `connect`; the resulting
//! [`ToolInvoker`] carries every call after that. Swapping the connector is
//! how a client is pointed at HTTP, an in-process server or a test spy.

use crate::protocol::ToolDescriptor;
use crate::transport::HttpConnector;
use async_trait::async_trait;
use mcplink_core::{McpLinkError, McpLinkResult, ServerEndpoint, ToolOutcome, TransportKind};
use std::sync::Arc;

/// An open handle to a tool server.
///
/// Neither call fails: discovery problems yield an empty list, invocation
/// problems yield [`ToolOutcome::Failed`].
#[async_trait]
pub trait ToolInvoker: Send + Sync {
    /// Discover the tools exposed by the server.
    async fn list_tools(&self) -> Vec<ToolDescriptor>;

    /// Invoke a tool with the given arguments.
    async fn call_tool(&self, name: &str, arguments: serde_json::Value) -> ToolOutcome;

    /// Release the handle. The default does nothing.
    async fn close(&self) {}
}

/// Allocates a [`ToolInvoker`] for an endpoint.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Open a handle. Errors here are connection errors and propagate out of
    /// `connect`.
    async fn open(&self, endpoint: &ServerEndpoint) -> McpLinkResult<Arc<dyn ToolInvoker>>;
}

/// Select a connector from the endpoint's transport hint.
///
/// `in_process` endpoints have no connector of their own; pass a
/// [`crate::LocalToolServer`] explicitly instead.
pub fn connector_for(endpoint: &ServerEndpoint) -> McpLinkResult<Arc<dyn Connector>> {
    match endpoint.transport {
        TransportKind::Sse | TransportKind::Http => Ok(Arc::new(HttpConnector::new())),
        TransportKind::InProcess => Err(McpLinkError::Config(format!(
            "transport '{}' needs an explicit in-process server for {}",
            endpoint.transport, endpoint.url
        ))),
    }
}
