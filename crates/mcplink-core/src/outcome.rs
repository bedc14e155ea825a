use crate::error::{FailureKind, McpLinkError};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;

/// A decoded tool payload: string keys to arbitrary JSON values.
pub type Payload = serde_json::Map<String, Value>;

/// A failure carried inside a [`ToolOutcome`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolFailure {
    /// Which error class produced this failure.
    pub kind: FailureKind,
    /// Human-readable message.
    pub message: String,
    /// Diagnostic fields (the offending SQL, HTTP status, server name...).
    #[serde(default)]
    pub context: Payload,
}

impl ToolFailure {
    /// Creates a failure with an empty context.
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            context: Payload::new(),
        }
    }

    /// Adds a diagnostic field.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }
}

impl From<&McpLinkError> for ToolFailure {
    fn from(err: &McpLinkError) -> Self {
        let failure = ToolFailure::new(err.kind(), err.to_string());
        match err {
            McpLinkError::Remote { code, .. } => failure.with_context("code", *code),
            _ => failure,
        }
    }
}

impl From<McpLinkError> for ToolFailure {
    fn from(err: McpLinkError) -> Self {
        ToolFailure::from(&err)
    }
}

/// The single result shape produced by every tool invocation.
///
/// Normalised once at the codec boundary, so upstream code never has to
/// guess whether it is holding a mapping, a list or an error.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutcome {
    /// Payload decoded from the server.
    Data(Payload),
    /// A documented substitute returned in place of a failed call.
    Fallback {
        /// The substitute shape.
        data: Payload,
        /// The failure that triggered the substitution.
        cause: ToolFailure,
    },
    /// A failure with no substitute.
    Failed(ToolFailure),
}

impl ToolOutcome {
    /// Wraps a decoded JSON value. Objects are kept as-is; any other value
    /// is placed under a `"result"` key.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(map) => Self::Data(map),
            other => {
                let mut map = Payload::new();
                map.insert("result".to_string(), other);
                Self::Data(map)
            }
        }
    }

    /// Shorthand for a context-free failure.
    pub fn failed(kind: FailureKind, message: impl Into<String>) -> Self {
        Self::Failed(ToolFailure::new(kind, message))
    }

    /// Replaces a failure with `fallback`, keeping the failure as the cause.
    /// Successful outcomes and existing fallbacks are returned unchanged.
    pub fn or_fallback(self, fallback: Payload) -> Self {
        match self {
            Self::Failed(cause) => Self::Fallback {
                data: fallback,
                cause,
            },
            other => other,
        }
    }

    /// Drops a substitute payload, leaving the failure that caused it.
    pub fn strict(self) -> Self {
        match self {
            Self::Fallback { cause, .. } => Self::Failed(cause),
            other => other,
        }
    }

    /// The payload, if any (real or substitute).
    pub fn data(&self) -> Option<&Payload> {
        match self {
            Self::Data(data) | Self::Fallback { data, .. } => Some(data),
            Self::Failed(_) => None,
        }
    }

    /// The failure, if any (including the cause of a fallback).
    pub fn failure(&self) -> Option<&ToolFailure> {
        match self {
            Self::Data(_) => None,
            Self::Fallback { cause, .. } => Some(cause),
            Self::Failed(failure) => Some(failure),
        }
    }

    /// `true` only for a real server payload.
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Data(_))
    }

    /// `true` when the outcome carries an error marker.
    pub fn is_error(&self) -> bool {
        !self.is_ok()
    }

    /// `true` when this is a substitute value.
    pub fn is_fallback(&self) -> bool {
        matches!(self, Self::Fallback { .. })
    }

    /// Renders the flat mapping shape consumed by reporting code: the payload
    /// for data, the payload plus an `"error"` field for fallbacks, and the
    /// context plus `"error"` for failures.
    pub fn to_json(&self) -> Value {
        match self {
            Self::Data(data) => Value::Object(data.clone()),
            Self::Fallback { data, cause } => {
                let mut map = data.clone();
                map.insert("error".to_string(), Value::String(cause.message.clone()));
                Value::Object(map)
            }
            Self::Failed(failure) => {
                let mut map = failure.context.clone();
                map.insert("error".to_string(), Value::String(failure.message.clone()));
                Value::Object(map)
            }
        }
    }
}

impl Serialize for ToolOutcome {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}
