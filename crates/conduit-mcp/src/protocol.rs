//! MCP protocol types.
//!
//! This module defines the JSON-RPC message types used by MCP, plus the
//! result payloads of the built-in methods.

use crate::error::ErrorCode;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The fixed `jsonrpc` marker of every envelope.
pub const JSONRPC_VERSION: &str = "2.0";

/// JSON-RPC request id.
///
/// Kept as the kind the client sent so responses echo it unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    Number(i64),
    /// Integers above `i64::MAX`.
    Unsigned(u64),
    String(String),
}

impl From<i64> for RequestId {
    fn from(value: i64) -> Self {
        RequestId::Number(value)
    }
}

impl From<&str> for RequestId {
    fn from(value: &str) -> Self {
        RequestId::String(value.to_string())
    }
}

impl From<String> for RequestId {
    fn from(value: String) -> Self {
        RequestId::String(value)
    }
}

/// JSON-RPC request (the call envelope).
///
/// A request without an `id` is a notification and never gets a response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    #[serde(default = "default_jsonrpc")]
    pub jsonrpc: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<RequestId>,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Map<String, Value>>,
}

fn default_jsonrpc() -> String {
    JSONRPC_VERSION.to_string()
}

impl JsonRpcRequest {
    /// Create a request that expects a response.
    pub fn new(id: impl Into<RequestId>, method: impl Into<String>, params: Option<Map<String, Value>>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: Some(id.into()),
            method: method.into(),
            params,
        }
    }

    /// Create a notification (no `id`).
    pub fn notification(method: impl Into<String>, params: Option<Map<String, Value>>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: None,
            method: method.into(),
            params,
        }
    }

    /// Whether this envelope is a notification.
    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }

    /// Parameters, or an empty object when absent.
    pub fn params_or_default(&self) -> Map<String, Value> {
        self.params.clone().unwrap_or_default()
    }

    /// Parse a raw HTTP body into a call envelope.
    ///
    /// Invalid JSON yields a parse error response; well-formed JSON that is
    /// not a valid envelope yields an invalid request response.
    pub fn parse(body: &[u8]) -> Result<Self, Box<JsonRpcResponse>> {
        let value: Value = serde_json::from_slice(body).map_err(|e| {
            Box::new(JsonRpcResponse::failure(
                None,
                JsonRpcError::new(ErrorCode::ParseError, format!("Parse error: {}", e)),
            ))
        })?;

        // Echo the id back when it is at least well-typed.
        let id = value
            .get("id")
            .and_then(|v| serde_json::from_value::<RequestId>(v.clone()).ok());

        let request: JsonRpcRequest = serde_json::from_value(value).map_err(|e| {
            Box::new(JsonRpcResponse::failure(
                id.clone(),
                JsonRpcError::new(ErrorCode::InvalidRequest, format!("Invalid request: {}", e)),
            ))
        })?;

        if request.jsonrpc != JSONRPC_VERSION {
            return Err(Box::new(JsonRpcResponse::failure(
                id,
                JsonRpcError::new(
                    ErrorCode::InvalidRequest,
                    format!("Invalid request: unsupported jsonrpc version '{}'", request.jsonrpc),
                ),
            )));
        }

        Ok(request)
    }
}

/// JSON-RPC response (the result envelope).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    pub id: Option<RequestId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

/// JSON-RPC error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code: code.code(),
            message: message.into(),
            data: None,
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }
}

impl JsonRpcResponse {
    /// Create a success response.
    pub fn success(id: Option<RequestId>, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    /// Create an error response.
    pub fn failure(id: Option<RequestId>, error: JsonRpcError) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: None,
            error: Some(error),
        }
    }

    /// Create an error response from a code and message.
    pub fn error(id: Option<RequestId>, code: ErrorCode, message: impl Into<String>) -> Self {
        Self::failure(id, JsonRpcError::new(code, message))
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// MCP server info.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerInfo {
    pub name: String,
    pub version: String,
}

/// Capability flags advertised by `initialize`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ServerCapabilities {
    pub tools: ToolsCapability,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ToolsCapability {
    #[serde(rename = "listChanged")]
    pub list_changed: bool,
}

/// Result of the `initialize` method.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitializeResult {
    #[serde(rename = "protocolVersion")]
    pub protocol_version: String,
    pub capabilities: ServerCapabilities,
    #[serde(rename = "serverInfo")]
    pub server_info: ServerInfo,
}

/// MCP tool definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

/// List tools response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListToolsResult {
    pub tools: Vec<ToolDefinition>,
}

/// Call tool request parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallToolParams {
    pub name: String,
    #[serde(default = "empty_arguments")]
    pub arguments: Value,
}

fn empty_arguments() -> Value {
    Value::Object(Map::new())
}

/// Call tool response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallToolResult {
    pub content: Vec<ToolContent>,
    #[serde(rename = "isError")]
    pub is_error: bool,
}

impl CallToolResult {
    /// Wrap a tool's return value as plain text content.
    ///
    /// String values are used verbatim; anything else is JSON-encoded.
    pub fn from_value(value: Value) -> Self {
        let text = match value {
            Value::String(s) => s,
            other => other.to_string(),
        };
        Self {
            content: vec![ToolContent::Text { text }],
            is_error: false,
        }
    }
}

/// Tool response content.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ToolContent {
    #[serde(rename = "text")]
    Text { text: String },
}
