//! # conduit-mcp
//!
//! MCP (Model Context Protocol) Streamable HTTP transport for Conduit.
//!
//! This crate carries JSON-RPC 2.0 calls between MCP clients and a set of
//! registered methods. It supports:
//!
//! - **Method Dispatch**: a typed table from method name to handler, with a
//!   fixed error classification
//! - **Sessions**: server-issued session ids, self-healing on stale ids
//! - **Server Push**: per-session SSE streams with replay from `Last-Event-Id`
//! - **Expiry**: a background reaper purging idle sessions
//! - **Legacy Endpoints**: session-less JSON-RPC for older clients
//!
//! ## Architecture
//!
//! ```text
//! MCP Client
//!       │
//!       │ POST /mcp (calls)      GET /mcp (SSE push)
//!       ▼
//! ┌──────────────────────┐
//! │    McpTransport      │
//! │ 1. Resolve session   │  ← SessionRegistry
//! │ 2. Dispatch method   │  ← MethodDispatcher
//! │ 3. Shape response    │
//! │ 4. Stream pushes     │  ← Session replay log + push channel
//! └──────────┬───────────┘
//!            │
//!            ▼
//!      ToolProvider            Reaper (sweeps idle sessions)
//! ```
//!
//! ## Example Usage
//!
//! ```ignore
//! use conduit_core::McpConfig;
//! use conduit_mcp::{McpServer, ToolRegistry};
//!
//! let mut tools = ToolRegistry::new();
//! tools.register_fn(definition, |args| async move { Ok(args) });
//!
//! McpServer::new(McpConfig::default())
//!     .with_tools(tools)
//!     .run()
//!     .await?;
//! ```

pub mod dispatcher;
pub mod error;
pub mod http_transport;
pub mod protocol;
pub mod reaper;
pub mod registry;
pub mod server;
pub mod session;
pub mod tools;

pub use dispatcher::{MethodDispatcher, MethodHandler, handler_fn};
pub use error::{ErrorCode, McpError};
pub use http_transport::{McpTransport, create_router};
pub use protocol::{JsonRpcError, JsonRpcRequest, JsonRpcResponse, RequestId, ToolDefinition};
pub use reaper::{Reaper, ReaperHandle};
pub use registry::SessionRegistry;
pub use server::McpServer;
pub use session::{OutboundMessage, PushEvent, PushStream, Session};
pub use tools::{ToolHandler, ToolProvider, ToolRegistry};
