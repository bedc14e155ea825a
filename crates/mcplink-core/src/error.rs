use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A convenience `Result` alias using [`McpLinkError`].
pub type McpLinkResult<T> = Result<T, McpLinkError>;

/// Top-level error type for mcplink.
///
/// Validation and policy errors are raised before any I/O. Transport and
/// remote errors are normally absorbed into a [`crate::ToolOutcome`] at the
/// codec boundary; only connection errors are expected to reach the caller
/// of a lifecycle operation.
#[derive(Error, Debug)]
pub enum McpLinkError {
    /// Required input was empty or blank.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The query guard refused the statement.
    #[error("Policy error: {0}")]
    Policy(String),

    /// Network failure, timeout, non-success status or malformed body.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The server answered with a JSON-RPC error object.
    #[error("Remote error {code}: {message}")]
    Remote {
        /// JSON-RPC error code.
        code: i64,
        /// Message reported by the server.
        message: String,
    },

    /// The network handle could not be allocated during `connect`.
    #[error("Connection error: {0}")]
    Connection(String),

    /// A pool lookup named a server that has no live client.
    #[error("Unknown server: {0}")]
    UnknownServer(String),

    /// The integration service was shut down.
    #[error("Service closed: {0}")]
    ServiceClosed(String),

    /// Invalid or unparsable configuration.
    #[error("Config error: {0}")]
    Config(String),

    /// A JSON serialization or deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A standard I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl McpLinkError {
    /// The failure class this error maps to when carried inside a result.
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Validation(_) => FailureKind::Validation,
            Self::Policy(_) => FailureKind::Policy,
            Self::Transport(_) | Self::Json(_) | Self::Io(_) => FailureKind::Transport,
            Self::Remote { .. } => FailureKind::Remote,
            Self::Connection(_) | Self::ServiceClosed(_) => FailureKind::Connection,
            Self::UnknownServer(_) => FailureKind::UnknownServer,
            Self::Config(_) => FailureKind::Internal,
        }
    }
}

/// Classification of a failure carried inside a [`crate::ToolFailure`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Empty or blank required input.
    Validation,
    /// Rejected by the query guard.
    Policy,
    /// Network, timeout, HTTP status or decode failure.
    Transport,
    /// JSON-RPC `error` object returned by the server.
    Remote,
    /// The connection could not be established.
    Connection,
    /// No live client for the requested server.
    UnknownServer,
    /// A local fault (task panic, bad configuration).
    Internal,
}

impl FailureKind {
    /// Whether a retry could plausibly succeed.
    pub fn is_transient(self) -> bool {
        matches!(self, Self::Transport)
    }
}
