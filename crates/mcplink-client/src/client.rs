//! Protocol client: one connection to one tool server.

use crate::guard::{QueryGuard, BLOCKED_MESSAGE};
use crate::invoker::{connector_for, Connector, ToolInvoker};
use crate::protocol::ToolDescriptor;
use crate::registry::{ToolRegistry, DESCRIBE_TABLE, LIST_TABLES, READ_DATA};
use chrono::{DateTime, Utc};
use mcplink_core::{
    FailureKind, McpLinkError, McpLinkResult, ServerEndpoint, ToolFailure, ToolOutcome,
    TransportKind,
};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{RwLock, RwLockReadGuard};
use tracing::{debug, info, warn};

/// Placeholder tables returned when listing fails.
pub const FALLBACK_TABLES: [&str; 4] = ["segmentacion", "ventas", "clientes", "produtos"];

/// Snapshot of a client's connection, for status reporting.
#[derive(Debug, Clone, Serialize)]
pub struct ServerInfo {
    /// Client name (the pool key).
    pub name: String,
    /// Endpoint URL.
    pub url: String,
    /// Transport hint the client was configured with.
    pub transport: TransportKind,
    /// Whether a session is open.
    pub connected: bool,
    /// Tools currently in the registry.
    pub tool_count: usize,
    /// When the current session was opened.
    pub connected_at: Option<DateTime<Utc>>,
}

/// A live handle plus when it was opened.
struct Session {
    invoker: Arc<dyn ToolInvoker>,
    connected_at: DateTime<Utc>,
}

/// Owns the connection to a single server.
///
/// State is `Disconnected` (no session) or `Connected`. Every operation
/// connects on demand. Apart from [`connect`](Self::connect), nothing here
/// returns an error: failures come back as a [`ToolOutcome`], and the three
/// built-in operations substitute a documented fallback shape for transport
/// and tool failures.
///
/// Calls hold a read lock on the session for their whole duration, so a
/// concurrent `disconnect` waits for in-flight calls instead of tearing the
/// handle down under them.
///
/// [`close`](Self::close) is terminal: a closed client never reconnects, and
/// every later operation fails with a `Connection` failure.
pub struct ProtocolClient {
    name: String,
    endpoint: ServerEndpoint,
    connector: Arc<dyn Connector>,
    guard: QueryGuard,
    session: RwLock<Option<Session>>,
    registry: parking_lot::RwLock<ToolRegistry>,
    handshakes: AtomicU64,
    closed: AtomicBool,
}

impl ProtocolClient {
    /// Client whose connector is chosen from the endpoint's transport hint.
    pub fn new(name: impl Into<String>, endpoint: ServerEndpoint) -> McpLinkResult<Self> {
        let connector = connector_for(&endpoint)?;
        Ok(Self::with_connector(name, endpoint, connector))
    }

    /// Client using an explicit connector.
    pub fn with_connector(
        name: impl Into<String>,
        endpoint: ServerEndpoint,
        connector: Arc<dyn Connector>,
    ) -> Self {
        let guard = QueryGuard::with_extra(&endpoint.extra_denied_keywords);
        Self {
            name: name.into(),
            endpoint,
            connector,
            guard,
            session: RwLock::new(None),
            registry: parking_lot::RwLock::new(ToolRegistry::new()),
            handshakes: AtomicU64::new(0),
            closed: AtomicBool::new(false),
        }
    }

    /// Name the client was created with.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Endpoint this client talks to.
    pub fn endpoint(&self) -> &ServerEndpoint {
        &self.endpoint
    }

    /// Guard applied by [`run_query`](Self::run_query).
    pub fn guard(&self) -> &QueryGuard {
        &self.guard
    }

    /// Number of handles opened over the client's lifetime.
    pub fn connect_count(&self) -> u64 {
        self.handshakes.load(Ordering::SeqCst)
    }

    /// Whether a session is currently open.
    pub async fn is_connected(&self) -> bool {
        self.session.read().await.is_some()
    }

    /// Whether [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn closed_error(&self) -> McpLinkError {
        McpLinkError::ServiceClosed(format!("client '{}' has been closed", self.name))
    }

    // -- lifecycle --------------------------------------------------------

    /// Open the handle and discover tools. No-op when already connected.
    ///
    /// A failure to open the handle leaves the client disconnected and is
    /// returned. Discovery never fails the connect: an empty or failed
    /// discovery loads the built-in tool set instead.
    pub async fn connect(&self) -> McpLinkResult<()> {
        let mut session = self.session.write().await;
        if self.is_closed() {
            return Err(self.closed_error());
        }
        if session.is_some() {
            debug!(server = %self.name, "Already connected");
            return Ok(());
        }

        let invoker = self.connector.open(&self.endpoint).await.map_err(|e| {
            warn!(server = %self.name, url = %self.endpoint.url, error = %e, "Failed to open connection");
            e
        })?;
        self.handshakes.fetch_add(1, Ordering::SeqCst);

        let discovered = invoker.list_tools().await;
        let used_fallback = self.registry.write().replace_or_fallback(discovered);
        if used_fallback {
            warn!(server = %self.name, "Tool discovery returned nothing, using built-in tools");
        }

        *session = Some(Session {
            invoker,
            connected_at: Utc::now(),
        });

        info!(
            server = %self.name,
            url = %self.endpoint.url,
            transport = %self.endpoint.transport,
            tools = self.registry.read().len(),
            "Connected to tool server"
        );
        Ok(())
    }

    /// Release the handle and clear the registry. Idempotent.
    pub async fn disconnect(&self) {
        let mut session = self.session.write().await;
        self.registry.write().clear();
        if let Some(old) = session.take() {
            old.invoker.close().await;
            info!(server = %self.name, "Disconnected from tool server");
        }
    }

    /// Disconnect for good. Waits for in-flight calls like
    /// [`disconnect`](Self::disconnect); afterwards `connect` returns
    /// `ServiceClosed` and operations no longer reconnect. Idempotent.
    pub async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.disconnect().await;
    }

    /// Read access to a live session, connecting first if needed.
    async fn live_session(&self) -> McpLinkResult<RwLockReadGuard<'_, Session>> {
        loop {
            if self.is_closed() {
                return Err(self.closed_error());
            }
            let guard = self.session.read().await;
            if let Ok(session) = RwLockReadGuard::try_map(guard, Option::as_ref) {
                return Ok(session);
            }
            self.connect().await?;
        }
    }

    async fn invoke(&self, tool: &str, arguments: Value) -> ToolOutcome {
        match self.live_session().await {
            Ok(session) => {
                debug!(server = %self.name, tool = %tool, "Invoking tool");
                session.invoker.call_tool(tool, arguments).await
            }
            Err(e) => ToolOutcome::Failed(ToolFailure::from(&e)),
        }
    }

    fn fallback_on_failure(&self, tool: &str, outcome: ToolOutcome, fallback: Value) -> ToolOutcome {
        if let Some(failure) = outcome.failure() {
            warn!(
                server = %self.name,
                url = %self.endpoint.url,
                tool = %tool,
                kind = ?failure.kind,
                error = %failure.message,
                "Tool call failed, returning fallback"
            );
        }
        match fallback {
            Value::Object(map) => outcome.or_fallback(map),
            _ => outcome,
        }
    }

    // -- operations -------------------------------------------------------

    /// `ListTables`, or [`FALLBACK_TABLES`] on failure.
    pub async fn list_entities(&self) -> ToolOutcome {
        let outcome = self.invoke(LIST_TABLES, json!({})).await;
        self.fallback_on_failure(LIST_TABLES, outcome, json!({ "tables": FALLBACK_TABLES }))
    }

    /// `DescribeTable` for `table`, or a two-column placeholder schema on
    /// failure. A blank name is rejected without any I/O.
    pub async fn describe_entity(&self, table: &str) -> ToolOutcome {
        let name = table.trim();
        if name.is_empty() {
            return ToolOutcome::Failed(
                ToolFailure::new(FailureKind::Validation, "Table name is required")
                    .with_context("table_name", table),
            );
        }

        let outcome = self.invoke(DESCRIBE_TABLE, json!({ "name": name })).await;
        self.fallback_on_failure(DESCRIBE_TABLE, outcome, fallback_schema(name))
    }

    /// `ReadData` for `sql`, or an empty result set on failure.
    ///
    /// Blank statements and statements the [`QueryGuard`] rejects never
    /// reach the server.
    pub async fn run_query(&self, sql: &str) -> ToolOutcome {
        if sql.trim().is_empty() {
            return ToolOutcome::Failed(
                ToolFailure::new(FailureKind::Validation, "SQL query is required")
                    .with_context("sql", sql),
            );
        }

        if let Some(keyword) = self.guard.find_violation(sql) {
            warn!(server = %self.name, keyword = %keyword, "Blocked query");
            return ToolOutcome::Failed(
                ToolFailure::new(FailureKind::Policy, BLOCKED_MESSAGE)
                    .with_context("sql", sql)
                    .with_context("keyword", keyword),
            );
        }

        let outcome = self.invoke(READ_DATA, json!({ "sql": sql })).await;
        self.fallback_on_failure(
            READ_DATA,
            outcome,
            json!({ "data": [], "columns": [], "row_count": 0, "sql": sql }),
        )
    }

    /// Call any tool with `arguments` passed through untouched. No guard,
    /// no fallback.
    pub async fn invoke_generic(&self, tool: &str, arguments: Value) -> ToolOutcome {
        let outcome = self.invoke(tool, arguments).await;
        if let Some(failure) = outcome.failure() {
            warn!(
                server = %self.name,
                url = %self.endpoint.url,
                tool = %tool,
                error = %failure.message,
                "Tool call failed"
            );
        }
        outcome
    }

    /// Route a call by tool name: the three built-in tools go through their
    /// dedicated operation (validation, guard and fallback included),
    /// anything else through [`invoke_generic`](Self::invoke_generic).
    pub async fn call_tool(&self, tool: &str, arguments: Value) -> ToolOutcome {
        match tool {
            LIST_TABLES => self.list_entities().await,
            DESCRIBE_TABLE => {
                let table = string_arg(&arguments, &["name", "table_name"]);
                self.describe_entity(table).await
            }
            READ_DATA => {
                let sql = string_arg(&arguments, &["sql", "query"]);
                self.run_query(sql).await
            }
            _ => self.invoke_generic(tool, arguments).await,
        }
    }

    /// Healthy iff listing tables comes back without an error marker.
    pub async fn health_check(&self) -> bool {
        !self.list_entities().await.is_error()
    }

    /// Snapshot of the tool registry.
    pub fn get_available_tools(&self) -> Vec<ToolDescriptor> {
        self.registry.read().all()
    }

    /// Current connection snapshot.
    pub async fn server_info(&self) -> ServerInfo {
        let session = self.session.read().await;
        ServerInfo {
            name: self.name.clone(),
            url: self.endpoint.url.clone(),
            transport: self.endpoint.transport,
            connected: session.is_some(),
            tool_count: self.registry.read().len(),
            connected_at: session.as_ref().map(|s| s.connected_at),
        }
    }
}

impl std::fmt::Debug for ProtocolClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProtocolClient")
            .field("name", &self.name)
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

fn fallback_schema(table: &str) -> Value {
    json!({
        "table_name": table,
        "columns": [
            {"name": "id", "type": "int", "nullable": false},
            {"name": "created_at", "type": "datetime", "nullable": false},
        ],
    })
}

/// First string-valued argument among `keys`, or `""`.
fn string_arg<'a>(arguments: &'a Value, keys: &[&str]) -> &'a str {
    keys.iter()
        .find_map(|k| arguments.get(*k).and_then(Value::as_str))
        .unwrap_or("")
}
