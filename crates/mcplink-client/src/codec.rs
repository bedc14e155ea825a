//! Response decoding for the tool-calling dialect.
//!
//! Two wire quirks are tolerated: bodies may carry a single event-stream
//! frame (`event: message\ndata: ...`) even for one-shot calls, and tool
//! payloads are JSON-encoded a second time inside the `text` field of the
//! first content block.

use crate::protocol::{JsonRpcResponse, McpToolDef, ToolDescriptor};
use mcplink_core::{FailureKind, McpLinkError, McpLinkResult, ToolFailure, ToolOutcome};
use serde_json::Value;

/// Literal prefix of an event-stream framed response.
pub const EVENT_STREAM_PREFIX: &str = "event: message\ndata: ";

/// Context key set on failures caused by a body that arrived but could not
/// be decoded. Sending the same request again yields the same body.
pub const DECODE_FAILURE: &str = "decode";

/// Strips the event-stream prefix, if present.
pub fn unframe(body: &str) -> &str {
    match body.strip_prefix(EVENT_STREAM_PREFIX) {
        Some(data) => data.trim(),
        None => body.trim(),
    }
}

/// Parses a raw body (framed or not) into a JSON-RPC envelope.
pub fn parse_envelope(body: &str) -> McpLinkResult<JsonRpcResponse> {
    serde_json::from_str(unframe(body))
        .map_err(|e| McpLinkError::Transport(format!("malformed response body: {e}")))
}

/// Decodes a `tools/call` response body into an outcome. Never fails.
pub fn decode_tool_response(body: &str) -> ToolOutcome {
    let envelope = match parse_envelope(body) {
        Ok(envelope) => envelope,
        Err(e) => {
            return ToolOutcome::Failed(ToolFailure::from(e).with_context(DECODE_FAILURE, true))
        }
    };

    if let Some(result) = envelope.result {
        return decode_result(result);
    }

    if let Some(err) = envelope.error {
        let mut failure = ToolFailure::new(FailureKind::Remote, err.message)
            .with_context("code", err.code);
        if let Some(data) = err.data {
            failure = failure.with_context("data", data);
        }
        return ToolOutcome::Failed(failure);
    }

    ToolOutcome::Failed(
        ToolFailure::new(
            FailureKind::Transport,
            "response missing both result and error",
        )
        .with_context(DECODE_FAILURE, true),
    )
}

/// Decodes the `result` member of a `tools/call` response.
///
/// When the first content block is text, its `text` is parsed as JSON and
/// that inner value becomes the payload. Any other result is returned as-is.
pub fn decode_result(result: Value) -> ToolOutcome {
    let text = first_text_block(&result);

    if is_error_result(&result) {
        let message = text.unwrap_or("tool reported an error").to_string();
        return ToolOutcome::failed(FailureKind::Remote, message);
    }

    match text {
        Some(text) => match serde_json::from_str::<Value>(text) {
            Ok(inner) => ToolOutcome::from_value(inner),
            Err(e) => ToolOutcome::Failed(
                ToolFailure::new(
                    FailureKind::Transport,
                    format!("malformed tool payload: {e}"),
                )
                .with_context("text", text)
                .with_context(DECODE_FAILURE, true),
            ),
        },
        None => ToolOutcome::from_value(result),
    }
}

fn first_text_block(result: &Value) -> Option<&str> {
    let first = result.get("content")?.as_array()?.first()?;
    if first.get("type")?.as_str()? != "text" {
        return None;
    }
    first.get("text")?.as_str()
}

fn is_error_result(result: &Value) -> bool {
    result
        .get("isError")
        .and_then(Value::as_bool)
        .unwrap_or(false)
}

/// Decodes a `tools/list` response body into descriptors.
pub fn decode_tool_list(body: &str) -> McpLinkResult<Vec<ToolDescriptor>> {
    let envelope = parse_envelope(body)?;

    if let Some(err) = envelope.error {
        return Err(McpLinkError::Remote {
            code: err.code,
            message: err.message,
        });
    }

    let tools = envelope
        .result
        .as_ref()
        .and_then(|r| r.get("tools"))
        .cloned()
        .ok_or_else(|| McpLinkError::Transport("tools/list response missing tools".into()))?;

    let defs: Vec<McpToolDef> = serde_json::from_value(tools)?;
    Ok(defs.into_iter().map(ToolDescriptor::from).collect())
}
