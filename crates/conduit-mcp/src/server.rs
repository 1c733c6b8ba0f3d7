//! MCP server implementation.
//!
//! This module wires the built-in MCP methods into a [`MethodDispatcher`],
//! backs them with a [`ToolProvider`], and runs the HTTP transport together
//! with the session reaper.

use crate::dispatcher::{MethodDispatcher, MethodHandler};
use crate::error::McpError;
use crate::http_transport::{McpTransport, create_router};
use crate::protocol::*;
use crate::reaper::Reaper;
use crate::registry::SessionRegistry;
use crate::tools::{ToolProvider, ToolRegistry};
use async_trait::async_trait;
use axum::Router;
use conduit_core::McpConfig;
use serde_json::{Map, Value, json};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

/// The MCP server.
pub struct McpServer {
    config: McpConfig,
    tools: Arc<dyn ToolProvider>,
    sessions: Arc<SessionRegistry>,
}

impl McpServer {
    /// Create a new MCP server with the given configuration and no tools.
    pub fn new(config: McpConfig) -> Self {
        let sessions = Arc::new(SessionRegistry::new(config.session.clone()));
        Self {
            config,
            tools: Arc::new(ToolRegistry::new()),
            sessions,
        }
    }

    /// Serve tools from the given provider.
    pub fn with_tools(mut self, tools: impl ToolProvider + 'static) -> Self {
        self.tools = Arc::new(tools);
        self
    }

    /// Serve tools from a shared provider.
    pub fn with_tool_provider(mut self, tools: Arc<dyn ToolProvider>) -> Self {
        self.tools = tools;
        self
    }

    pub fn config(&self) -> &McpConfig {
        &self.config
    }

    pub fn sessions(&self) -> &Arc<SessionRegistry> {
        &self.sessions
    }

    /// The `initialize` descriptor.
    pub fn initialize_result(&self) -> InitializeResult {
        InitializeResult {
            protocol_version: self.config.protocol_version.clone(),
            capabilities: ServerCapabilities::default(),
            server_info: ServerInfo {
                name: self.config.server_name.clone(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
        }
    }

    /// Build a dispatcher with the built-in methods registered.
    ///
    /// Callers may register further methods on the returned dispatcher;
    /// registering a built-in name replaces it.
    pub fn dispatcher(&self) -> MethodDispatcher {
        let mut dispatcher = MethodDispatcher::new();
        dispatcher.register(
            "initialize",
            InitializeHandler {
                result: self.initialize_result(),
            },
        );
        dispatcher.register_fn("notifications/initialized", |_| async {
            tracing::debug!("Client initialization complete");
            Ok(json!({}))
        });
        dispatcher.register_fn("ping", |_| async { Ok(json!({})) });
        dispatcher.register(
            "tools/list",
            ListToolsHandler {
                tools: Arc::clone(&self.tools),
            },
        );
        dispatcher.register(
            "tools/call",
            CallToolHandler {
                tools: Arc::clone(&self.tools),
            },
        );
        dispatcher
    }

    /// Build the transport coordinator over this server's session registry.
    pub fn transport(&self) -> Arc<McpTransport> {
        self.transport_with(self.dispatcher())
    }

    /// Build the transport coordinator with a custom dispatcher.
    pub fn transport_with(&self, dispatcher: MethodDispatcher) -> Arc<McpTransport> {
        Arc::new(McpTransport::new(
            dispatcher,
            Arc::clone(&self.sessions),
            &self.config,
        ))
    }

    /// The HTTP router for this server.
    pub fn router(&self) -> Router {
        create_router(self.transport())
    }

    /// Start the MCP server and run until Ctrl-C.
    pub async fn run(&self) -> Result<(), McpError> {
        let shutdown = CancellationToken::new();
        let signal = shutdown.clone();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => tracing::info!("Shutdown signal received"),
                Err(e) => tracing::error!(error = %e, "Failed to listen for shutdown signal"),
            }
            signal.cancel();
        });

        self.run_until(shutdown).await
    }

    /// Start the MCP server and run until `shutdown` is cancelled.
    pub async fn run_until(&self, shutdown: CancellationToken) -> Result<(), McpError> {
        if !self.config.enabled {
            return Err(McpError::StartupFailed(
                "MCP server is disabled in configuration".to_string(),
            ));
        }

        let addr = self.config.bind_addr();
        let listener = TcpListener::bind(&addr).await.map_err(|e| {
            McpError::StartupFailed(format!("Failed to bind to {}: {}", addr, e))
        })?;

        tracing::info!(
            addr = %addr,
            protocol_version = %self.config.protocol_version,
            session_timeout_secs = self.config.session.timeout_secs,
            "Starting MCP server with HTTP transport"
        );

        let reaper = Reaper::new(Arc::clone(&self.sessions)).spawn(shutdown.clone());
        let app = self.router();

        let sessions = Arc::clone(&self.sessions);
        let stop = shutdown.clone();
        let result = axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                stop.cancelled().await;
                // Open push streams would otherwise hold the shutdown open.
                sessions.close_all();
            })
            .await;

        shutdown.cancel();
        reaper.shutdown().await;
        tracing::info!("MCP server stopped");

        result.map_err(McpError::from)
    }
}

struct InitializeHandler {
    result: InitializeResult,
}

#[async_trait]
impl MethodHandler for InitializeHandler {
    async fn call(&self, params: Map<String, Value>) -> Result<Value, McpError> {
        let client_version = params.get("protocolVersion").and_then(Value::as_str);
        let client_name = params
            .get("clientInfo")
            .and_then(|info| info.get("name"))
            .and_then(Value::as_str);
        tracing::info!(
            client = client_name.unwrap_or("unknown"),
            client_protocol_version = client_version.unwrap_or("unspecified"),
            "Client initializing"
        );
        Ok(serde_json::to_value(&self.result)?)
    }
}

struct ListToolsHandler {
    tools: Arc<dyn ToolProvider>,
}

#[async_trait]
impl MethodHandler for ListToolsHandler {
    async fn call(&self, _params: Map<String, Value>) -> Result<Value, McpError> {
        let result = ListToolsResult {
            tools: self.tools.list(),
        };
        Ok(serde_json::to_value(result)?)
    }
}

struct CallToolHandler {
    tools: Arc<dyn ToolProvider>,
}

#[async_trait]
impl MethodHandler for CallToolHandler {
    async fn call(&self, params: Map<String, Value>) -> Result<Value, McpError> {
        let params: CallToolParams = serde_json::from_value(Value::Object(params))
            .map_err(|e| McpError::invalid_params(format!("Invalid params: {}", e)))?;

        tracing::debug!(tool = %params.name, "Calling tool");
        let value = self.tools.call(&params.name, params.arguments).await?;
        Ok(serde_json::to_value(CallToolResult::from_value(value))?)
    }
}
