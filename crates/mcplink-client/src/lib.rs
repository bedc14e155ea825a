//! Tool client for JSON-RPC tool servers over HTTP, with a connection pool
//! and a shared integration service.

/// Protocol client for a single server.
pub mod client;
/// Response decoding.
pub mod codec;
/// Statement denylist.
pub mod guard;
/// Transport seam traits.
pub mod invoker;
/// In-process tool server.
pub mod local;
/// Connection pool over named servers.
pub mod pool;
/// JSON-RPC types and tool descriptors.
pub mod protocol;
/// Tool registry.
pub mod registry;
/// Retry decorator.
pub mod retry;
/// Shared integration service.
pub mod service;
/// HTTP transport.
pub mod transport;

pub use client::{ProtocolClient, ServerInfo, FALLBACK_TABLES};
pub use codec::{decode_tool_list, decode_tool_response, DECODE_FAILURE, EVENT_STREAM_PREFIX};
pub use guard::{QueryGuard, BLOCKED_MESSAGE, MANDATORY_DENYLIST};
pub use invoker::{connector_for, Connector, ToolInvoker};
pub use local::LocalToolServer;
pub use pool::ConnectionPool;
pub use protocol::{JsonRpcRequest, JsonRpcResponse, ToolDescriptor};
pub use registry::{fallback_descriptors, ToolRegistry, DESCRIBE_TABLE, LIST_TABLES, READ_DATA};
pub use retry::RetryingInvoker;
pub use service::{ConnectionInfo, IntegrationService};
pub use transport::{HttpConnector, HttpTransport};
