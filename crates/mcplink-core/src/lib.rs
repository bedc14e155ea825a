//! Core types and error definitions for mcplink.
//!
//! This crate holds everything the client layer and its consumers share and
//! that does not touch the network: the error taxonomy, the normalised tool
//! result, endpoint configuration and tracing setup.
//!
//! # Main types
//!
//! - [`McpLinkError`]: Unified error enum; one variant per error class.
//! - [`McpLinkResult`]: Convenience alias for `Result<T, McpLinkError>`.
//! - [`ToolOutcome`]: The single result shape of every tool invocation.
//! - [`ServerEndpoint`]: URL, timeout, headers, auth and transport hint for one server.
//! - [`PoolConfig`]: Named endpoints for a connection pool.

/// Error taxonomy.
pub mod error;
/// Endpoint and pool configuration.
pub mod endpoint;
/// Normalised tool results.
pub mod outcome;
/// Tracing subscriber bootstrap.
pub mod telemetry;

pub use endpoint::{
    AuthScheme, PoolConfig, RetryPolicy, ServerEndpoint, TransportKind, DEFAULT_SERVER_URL,
};
pub use error::{FailureKind, McpLinkError, McpLinkResult};
pub use outcome::{Payload, ToolFailure, ToolOutcome};
pub use telemetry::{init_tracing, LogFormat};
