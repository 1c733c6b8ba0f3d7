//! Error types for the MCP crate.
//!
//! [`ErrorCode`] is the closed set of codes that can appear in a result
//! envelope. [`McpError`] is what method handlers and tool collaborators
//! return; the dispatcher turns it into a [`JsonRpcError`].

use crate::protocol::JsonRpcError;
use serde_json::json;
use thiserror::Error;

/// JSON-RPC error codes used by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// Malformed envelope (invalid JSON).
    ParseError,
    /// Structurally invalid request.
    InvalidRequest,
    /// Unknown method.
    MethodNotFound,
    /// Invalid or missing parameters.
    InvalidParams,
    /// Unexpected internal failure.
    InternalError,
    /// Referenced tool does not exist.
    ToolNotFound,
    /// Tool executed but failed.
    ToolExecutionError,
    /// Underlying storage failure.
    StorageError,
}

impl ErrorCode {
    pub const ALL: [ErrorCode; 8] = [
        ErrorCode::ParseError,
        ErrorCode::InvalidRequest,
        ErrorCode::MethodNotFound,
        ErrorCode::InvalidParams,
        ErrorCode::InternalError,
        ErrorCode::ToolNotFound,
        ErrorCode::ToolExecutionError,
        ErrorCode::StorageError,
    ];

    /// Numeric wire value.
    pub fn code(self) -> i32 {
        match self {
            ErrorCode::ParseError => -32700,
            ErrorCode::InvalidRequest => -32600,
            ErrorCode::MethodNotFound => -32601,
            ErrorCode::InvalidParams => -32602,
            ErrorCode::InternalError => -32603,
            ErrorCode::ToolNotFound => -32001,
            ErrorCode::ToolExecutionError => -32002,
            ErrorCode::StorageError => -32003,
        }
    }

    /// Inverse of [`ErrorCode::code`].
    pub fn from_code(code: i32) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.code() == code)
    }
}

/// Errors that can occur in the MCP server.
#[derive(Debug, Error)]
pub enum McpError {
    /// Failed to start the server.
    #[error("failed to start MCP server: {0}")]
    StartupFailed(String),

    /// Input validation failure; the message is shown to the caller.
    #[error("{0}")]
    InvalidParams(String),

    /// Method not registered with the dispatcher.
    #[error("Method not found: {0}")]
    MethodNotFound(String),

    /// Tool not found.
    #[error("Tool not found: {name}")]
    ToolNotFound { name: String },

    /// Tool ran but failed.
    #[error("tool {tool} failed: {reason}")]
    ToolExecution { tool: String, reason: String },

    /// Storage backend failure.
    #[error("storage error: {0}")]
    Storage(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Internal error.
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl McpError {
    /// Shorthand for an input validation failure.
    pub fn invalid_params(message: impl Into<String>) -> Self {
        McpError::InvalidParams(message.into())
    }

    /// Protocol code this error is reported with.
    pub fn code(&self) -> ErrorCode {
        match self {
            McpError::InvalidParams(_) => ErrorCode::InvalidParams,
            McpError::MethodNotFound(_) => ErrorCode::MethodNotFound,
            McpError::ToolNotFound { .. } => ErrorCode::ToolNotFound,
            _ => ErrorCode::InternalError,
        }
    }

    /// Whether the message may be returned to the caller verbatim.
    ///
    /// Everything else is redacted to a generic message with the detail
    /// moved into `data`.
    pub fn is_caller_facing(&self) -> bool {
        matches!(
            self,
            McpError::InvalidParams(_) | McpError::MethodNotFound(_) | McpError::ToolNotFound { .. }
        )
    }

    /// Convert into the wire error.
    pub fn to_rpc_error(&self) -> JsonRpcError {
        let code = self.code();
        if self.is_caller_facing() {
            return JsonRpcError::new(code, self.to_string());
        }
        JsonRpcError::new(code, "Internal error").with_data(json!({ "details": self.to_string() }))
    }
}
