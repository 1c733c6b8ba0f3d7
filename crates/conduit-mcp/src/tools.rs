//! Tool collaborators.
//!
//! The transport never executes tools itself. `tools/list` and `tools/call`
//! go through a [`ToolProvider`]; [`ToolRegistry`] is the in-memory provider
//! built from individually registered [`ToolHandler`]s.

use crate::error::McpError;
use crate::protocol::ToolDefinition;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;

/// Source of tools for the built-in `tools/*` methods.
#[async_trait]
pub trait ToolProvider: Send + Sync {
    /// Describe every available tool.
    fn list(&self) -> Vec<ToolDefinition>;

    /// Run a tool. Fails with [`McpError::ToolNotFound`] for unknown names.
    async fn call(&self, name: &str, arguments: Value) -> Result<Value, McpError>;
}

/// Implementation of a single tool.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn call(&self, arguments: Value) -> Result<Value, McpError>;
}

/// Adapter turning an async closure into a [`ToolHandler`].
pub struct FnTool<F>(F);

#[async_trait]
impl<F, Fut> ToolHandler for FnTool<F>
where
    F: Fn(Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, McpError>> + Send + 'static,
{
    async fn call(&self, arguments: Value) -> Result<Value, McpError> {
        (self.0)(arguments).await
    }
}

#[derive(Clone)]
struct RegisteredTool {
    definition: ToolDefinition,
    handler: Arc<dyn ToolHandler>,
}

/// Registry of available MCP tools.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, RegisteredTool>,
}

impl ToolRegistry {
    /// Create a new empty tool registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. Replaces any tool with the same name.
    pub fn register(&mut self, definition: ToolDefinition, handler: impl ToolHandler + 'static) {
        tracing::info!(tool = %definition.name, "Registered tool");
        self.tools.insert(
            definition.name.clone(),
            RegisteredTool {
                definition,
                handler: Arc::new(handler),
            },
        );
    }

    /// Register an async closure as a tool.
    pub fn register_fn<F, Fut>(&mut self, definition: ToolDefinition, f: F)
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, McpError>> + Send + 'static,
    {
        self.register(definition, FnTool(f));
    }

    /// Unregister a tool by name.
    pub fn unregister(&mut self, name: &str) -> Option<ToolDefinition> {
        self.tools.remove(name).map(|t| t.definition)
    }

    /// Get a tool definition by name.
    pub fn get(&self, name: &str) -> Option<&ToolDefinition> {
        self.tools.get(name).map(|t| &t.definition)
    }

    /// Check if a tool exists.
    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Get the number of registered tools.
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Check if the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Get tool names.
    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(|s| s.as_str()).collect()
    }
}

#[async_trait]
impl ToolProvider for ToolRegistry {
    fn list(&self) -> Vec<ToolDefinition> {
        self.tools.values().map(|t| t.definition.clone()).collect()
    }

    async fn call(&self, name: &str, arguments: Value) -> Result<Value, McpError> {
        let handler = self
            .tools
            .get(name)
            .map(|t| Arc::clone(&t.handler))
            .ok_or_else(|| McpError::ToolNotFound {
                name: name.to_string(),
            })?;
        handler.call(arguments).await
    }
}
