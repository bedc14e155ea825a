//! In-process tool server, the alternate transport.

use crate::codec;
use crate::invoker::{Connector, ToolInvoker};
use crate::protocol::ToolDescriptor;
use async_trait::async_trait;
use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use mcplink_core::{
    FailureKind, McpLinkResult, ServerEndpoint, ToolFailure, ToolOutcome,
};
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;

/// JSON-RPC "method not found".
const METHOD_NOT_FOUND: i64 = -32601;

type Handler = Arc<dyn Fn(Value) -> BoxFuture<'static, McpLinkResult<Value>> + Send + Sync>;

struct LocalTool {
    descriptor: ToolDescriptor,
    handler: Handler,
}

/// A set of named async handlers served without a network hop.
///
/// Cloning is cheap and clones share the same tool table, so a server can be
/// handed to a client as its [`Connector`] and still be extended afterwards.
/// Handler results go through the same payload normalisation as remote
/// results.
#[derive(Clone, Default)]
pub struct LocalToolServer {
    tools: Arc<RwLock<BTreeMap<String, LocalTool>>>,
}

impl LocalToolServer {
    /// Server with no tools.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) a tool.
    pub fn register<F, Fut>(&self, descriptor: ToolDescriptor, handler: F)
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = McpLinkResult<Value>> + Send + 'static,
    {
        let handler: Handler = Arc::new(move |args| handler(args).boxed());
        self.tools.write().insert(
            descriptor.name.clone(),
            LocalTool {
                descriptor,
                handler,
            },
        );
    }

    /// Builder form of [`register`](Self::register).
    pub fn with_tool<F, Fut>(self, descriptor: ToolDescriptor, handler: F) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = McpLinkResult<Value>> + Send + 'static,
    {
        self.register(descriptor, handler);
        self
    }

    /// Remove a tool. Returns whether it existed.
    pub fn unregister(&self, name: &str) -> bool {
        self.tools.write().remove(name).is_some()
    }

    /// Number of registered tools.
    pub fn len(&self) -> usize {
        self.tools.read().len()
    }

    /// Whether no tools are registered.
    pub fn is_empty(&self) -> bool {
        self.tools.read().is_empty()
    }
}

#[async_trait]
impl Connector for LocalToolServer {
    async fn open(&self, _endpoint: &ServerEndpoint) -> McpLinkResult<Arc<dyn ToolInvoker>> {
        Ok(Arc::new(self.clone()))
    }
}

#[async_trait]
impl ToolInvoker for LocalToolServer {
    async fn list_tools(&self) -> Vec<ToolDescriptor> {
        self.tools
            .read()
            .values()
            .map(|t| t.descriptor.clone())
            .collect()
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> ToolOutcome {
        // The lock must not be held across the handler's await.
        let handler = self.tools.read().get(name).map(|t| t.handler.clone());
        let Some(handler) = handler else {
            return ToolOutcome::Failed(
                ToolFailure::new(FailureKind::Remote, format!("Unknown tool: {name}"))
                    .with_context("code", METHOD_NOT_FOUND),
            );
        };

        match handler(arguments).await {
            Ok(value) => codec::decode_result(value),
            Err(e) => ToolOutcome::Failed(ToolFailure::from(&e).with_context("tool", name)),
        }
    }
}
