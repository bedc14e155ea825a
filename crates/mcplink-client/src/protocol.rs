//! JSON-RPC 2.0 message types and tool descriptors.

use mcplink_core::Payload;
use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};

/// Method used for tool discovery.
pub const METHOD_TOOLS_LIST: &str = "tools/list";
/// Method used for tool invocation.
pub const METHOD_TOOLS_CALL: &str = "tools/call";

/// JSON-RPC 2.0 request.
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcRequest {
    /// Always `"2.0"`.
    pub jsonrpc: &'static str,
    /// Method name, e.g. `tools/call`.
    pub method: String,
    /// Method parameters; omitted from the wire when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
    /// Request id, unique per transport.
    pub id: u64,
}

impl JsonRpcRequest {
    /// Request for `method` with optional `params`.
    pub fn new(id: u64, method: impl Into<String>, params: Option<serde_json::Value>) -> Self {
        Self {
            jsonrpc: "2.0",
            method: method.into(),
            params,
            id,
        }
    }

    /// `tools/list` request.
    pub fn tools_list(id: u64) -> Self {
        Self::new(id, METHOD_TOOLS_LIST, None)
    }

    /// `tools/call` request carrying `{name, arguments}`.
    pub fn tools_call(id: u64, name: &str, arguments: serde_json::Value) -> Self {
        Self::new(
            id,
            METHOD_TOOLS_CALL,
            Some(serde_json::json!({
                "name": name,
                "arguments": arguments,
            })),
        )
    }
}

/// JSON-RPC 2.0 response. Fields are lenient: servers behind the
/// event-stream framing sometimes omit `jsonrpc` or use string ids.
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcResponse {
    /// Protocol version, when sent.
    #[serde(default)]
    pub jsonrpc: Option<String>,
    /// Echoed request id.
    #[serde(default)]
    pub id: Option<serde_json::Value>,
    /// Success payload.
    #[serde(default)]
    pub result: Option<serde_json::Value>,
    /// Failure payload.
    #[serde(default)]
    pub error: Option<JsonRpcError>,
}

/// JSON-RPC 2.0 error object.
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcError {
    /// Numeric error code.
    #[serde(default)]
    pub code: i64,
    /// Human-readable message.
    #[serde(default)]
    pub message: String,
    /// Extra server-supplied detail.
    #[serde(default)]
    pub data: Option<serde_json::Value>,
}

/// Tool definition as it appears in a `tools/list` result.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct McpToolDef {
    /// Tool name.
    pub name: String,
    /// Free-form description.
    #[serde(default)]
    pub description: String,
    /// JSON schema of the arguments.
    #[serde(default = "default_input_schema", rename = "inputSchema")]
    pub input_schema: serde_json::Value,
}

fn default_input_schema() -> serde_json::Value {
    serde_json::json!({"type": "object", "properties": {}})
}

/// A tool exposed by a server.
///
/// Identity is the name alone: two descriptors with the same name are the
/// same tool whatever their description or parameters say.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDescriptor {
    /// Unique tool name.
    pub name: String,
    /// Free-form description.
    #[serde(default)]
    pub description: String,
    /// Parameter properties (the `properties` member of the input schema).
    #[serde(default)]
    pub parameters: Payload,
}

impl ToolDescriptor {
    /// Descriptor without parameters.
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: Payload::new(),
        }
    }

    /// Adds a string parameter.
    pub fn with_string_param(mut self, name: &str, description: &str) -> Self {
        self.parameters.insert(
            name.to_string(),
            serde_json::json!({"type": "string", "description": description}),
        );
        self
    }
}

impl From<McpToolDef> for ToolDescriptor {
    fn from(def: McpToolDef) -> Self {
        let parameters = def
            .input_schema
            .get("properties")
            .and_then(serde_json::Value::as_object)
            .cloned()
            .unwrap_or_default();
        Self {
            name: def.name,
            description: def.description,
            parameters,
        }
    }
}

impl PartialEq for ToolDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for ToolDescriptor {}

impl Hash for ToolDescriptor {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}
