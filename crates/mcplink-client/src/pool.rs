//! Connection pool: named protocol clients managed as a group.

use crate::client::{ProtocolClient, ServerInfo};
use crate::invoker::Connector;
use futures_util::future::join_all;
use mcplink_core::{
    FailureKind, McpLinkError, McpLinkResult, PoolConfig, ServerEndpoint, ToolFailure,
    ToolOutcome,
};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

/// Named protocol clients managed as a group.
///
/// Configured servers are fixed at construction; the live-client map only
/// holds servers whose `connect` succeeded. Partial failure is normal: a pool
/// can end up with any subset of its servers live.
pub struct ConnectionPool {
    config: PoolConfig,
    connector: Option<Arc<dyn Connector>>,
    clients: RwLock<HashMap<String, Arc<ProtocolClient>>>,
}

impl ConnectionPool {
    /// Pool whose clients pick their connector from each endpoint's
    /// transport hint.
    pub fn new(config: PoolConfig) -> Self {
        Self {
            config,
            connector: None,
            clients: RwLock::new(HashMap::new()),
        }
    }

    /// Pool whose clients all share `connector`.
    pub fn with_connector(config: PoolConfig, connector: Arc<dyn Connector>) -> Self {
        Self {
            config,
            connector: Some(connector),
            clients: RwLock::new(HashMap::new()),
        }
    }

    /// Configuration the pool was built from.
    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    fn build_client(&self, name: &str, endpoint: &ServerEndpoint) -> McpLinkResult<ProtocolClient> {
        match &self.connector {
            Some(connector) => Ok(ProtocolClient::with_connector(
                name,
                endpoint.clone(),
                connector.clone(),
            )),
            None => ProtocolClient::new(name, endpoint.clone()),
        }
    }

    /// Connect every configured server that is not live yet, concurrently.
    /// Returns the servers that failed, after logging them.
    pub async fn connect_all(&self) -> Vec<(String, McpLinkError)> {
        let pending: Vec<(&String, &ServerEndpoint)> = {
            let clients = self.clients.read().await;
            self.config
                .servers
                .iter()
                .filter(|(name, _)| !clients.contains_key(*name))
                .collect()
        };

        let attempts = pending.into_iter().map(|(name, endpoint)| async move {
            let result = match self.build_client(name, endpoint) {
                Ok(client) => client.connect().await.map(|()| client),
                Err(e) => Err(e),
            };
            (name.clone(), result)
        });
        let results = join_all(attempts).await;

        let mut errors = Vec::new();
        let mut clients = self.clients.write().await;
        for (name, result) in results {
            match result {
                Ok(client) => {
                    if clients.contains_key(&name) {
                        // Another connect_all got there first.
                        client.close().await;
                        continue;
                    }
                    info!(server = %name, tools = client.get_available_tools().len(), "Pool server connected");
                    clients.insert(name, Arc::new(client));
                }
                Err(e) => {
                    warn!(server = %name, error = %e, "Failed to connect pool server");
                    errors.push((name, e));
                }
            }
        }

        info!(
            connected = clients.len(),
            configured = self.config.servers.len(),
            "Pool connect finished"
        );
        errors
    }

    /// Close every live client and empty the pool. Handles obtained from
    /// [`get_client`](Self::get_client) stay closed; a later
    /// [`connect_all`](Self::connect_all) builds fresh clients. Never fails.
    pub async fn disconnect_all(&self) {
        let drained: Vec<(String, Arc<ProtocolClient>)> =
            self.clients.write().await.drain().collect();
        join_all(drained.iter().map(|(_, client)| client.close())).await;
        info!(disconnected = drained.len(), "Pool disconnected");
    }

    /// The live client for `name`.
    pub async fn get_client(&self, name: &str) -> Option<Arc<ProtocolClient>> {
        self.clients.read().await.get(name).cloned()
    }

    /// Route a call to one server.
    ///
    /// Naming a server with no live client is an `UnknownServer` error; tool
    /// failures come back inside the outcome.
    pub async fn call_on_server(
        &self,
        server: &str,
        tool: &str,
        arguments: Value,
    ) -> McpLinkResult<ToolOutcome> {
        let client = self.get_client(server).await.ok_or_else(|| {
            if self.config.servers.contains_key(server) {
                McpLinkError::UnknownServer(format!("'{server}' is configured but not connected"))
            } else {
                McpLinkError::UnknownServer(format!("'{server}' is not configured"))
            }
        })?;
        Ok(client.call_tool(tool, arguments).await)
    }

    /// Call `tool` on every live client at once, one task per client.
    ///
    /// Each entry is independent: a failed server shows up as its own failed
    /// outcome and never affects the others. Fallback substitutes are
    /// dropped so that a failure reads as a failure.
    pub async fn broadcast(&self, tool: &str, arguments: Value) -> BTreeMap<String, ToolOutcome> {
        let handles: Vec<_> = self
            .live_clients()
            .await
            .into_iter()
            .map(|(name, client)| {
                let tool = tool.to_string();
                let arguments = arguments.clone();
                let handle =
                    tokio::spawn(async move { client.call_tool(&tool, arguments).await.strict() });
                (name, handle)
            })
            .collect();

        let mut results = BTreeMap::new();
        for (name, handle) in handles {
            let outcome = handle.await.unwrap_or_else(|e| {
                warn!(server = %name, error = %e, "Broadcast task failed");
                ToolOutcome::Failed(
                    ToolFailure::new(FailureKind::Internal, format!("task failed: {e}"))
                        .with_context("server", name.as_str()),
                )
            });
            results.insert(name, outcome);
        }
        results
    }

    /// Health of every configured server. Servers without a live client
    /// report `false`.
    pub async fn health_check_all(&self) -> BTreeMap<String, bool> {
        let handles: Vec<_> = self
            .live_clients()
            .await
            .into_iter()
            .map(|(name, client)| (name, tokio::spawn(async move { client.health_check().await })))
            .collect();

        let mut results: BTreeMap<String, bool> = self
            .config
            .servers
            .keys()
            .map(|name| (name.clone(), false))
            .collect();
        for (name, handle) in handles {
            let healthy = handle.await.unwrap_or(false);
            results.insert(name, healthy);
        }
        results
    }

    /// Names of servers with a live client, sorted.
    pub async fn connected_servers(&self) -> Vec<String> {
        let mut names: Vec<String> = self.clients.read().await.keys().cloned().collect();
        names.sort();
        names
    }

    /// Names of every configured server, sorted.
    pub fn configured_servers(&self) -> Vec<String> {
        self.config.servers.keys().cloned().collect()
    }

    /// Connection info for every live client, sorted by name.
    pub async fn status(&self) -> Vec<ServerInfo> {
        let mut status = Vec::new();
        for (_, client) in self.live_clients().await {
            status.push(client.server_info().await);
        }
        status
    }

    async fn live_clients(&self) -> Vec<(String, Arc<ProtocolClient>)> {
        let mut clients: Vec<(String, Arc<ProtocolClient>)> = self
            .clients
            .read()
            .await
            .iter()
            .map(|(name, client)| (name.clone(), client.clone()))
            .collect();
        clients.sort_by(|a, b| a.0.cmp(&b.0));
        clients
    }
}
