//! JSON-RPC method dispatch.
//!
//! The dispatcher is a typed table from method name to a boxed
//! [`MethodHandler`]. It is built once at startup and then shared read-only,
//! so dispatching a call never takes a lock.

use crate::error::McpError;
use crate::protocol::{JsonRpcRequest, JsonRpcResponse};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

/// A handler for one JSON-RPC method.
#[async_trait]
pub trait MethodHandler: Send + Sync {
    /// Run the method. `params` is an empty object when the call had none.
    async fn call(&self, params: Map<String, Value>) -> Result<Value, McpError>;
}

/// Adapter turning an async closure into a [`MethodHandler`].
pub struct FnHandler<F>(F);

/// Wrap an async closure as a method handler.
pub fn handler_fn<F, Fut>(f: F) -> FnHandler<F>
where
    F: Fn(Map<String, Value>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, McpError>> + Send + 'static,
{
    FnHandler(f)
}

#[async_trait]
impl<F, Fut> MethodHandler for FnHandler<F>
where
    F: Fn(Map<String, Value>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, McpError>> + Send + 'static,
{
    async fn call(&self, params: Map<String, Value>) -> Result<Value, McpError> {
        (self.0)(params).await
    }
}

/// Routes call envelopes to registered handlers.
#[derive(Clone, Default)]
pub struct MethodDispatcher {
    methods: HashMap<String, Arc<dyn MethodHandler>>,
}

impl MethodDispatcher {
    /// Create a new empty dispatcher.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler. A later registration for the same name replaces
    /// the earlier one, which is returned.
    pub fn register(
        &mut self,
        method: impl Into<String>,
        handler: impl MethodHandler + 'static,
    ) -> Option<Arc<dyn MethodHandler>> {
        let method = method.into();
        tracing::debug!(method = %method, "Registered JSON-RPC method");
        self.methods.insert(method, Arc::new(handler))
    }

    /// Register an async closure.
    pub fn register_fn<F, Fut>(&mut self, method: impl Into<String>, f: F)
    where
        F: Fn(Map<String, Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, McpError>> + Send + 'static,
    {
        self.register(method, handler_fn(f));
    }

    /// Check if a method is registered.
    pub fn contains(&self, method: &str) -> bool {
        self.methods.contains_key(method)
    }

    /// Registered method names, sorted.
    pub fn methods(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.methods.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Execute one call and build its result envelope.
    ///
    /// The request `id` is copied through unchanged in every outcome,
    /// including its absence for notifications.
    pub async fn dispatch(&self, request: &JsonRpcRequest) -> JsonRpcResponse {
        let id = request.id.clone();

        let Some(handler) = self.methods.get(&request.method).cloned() else {
            let err = McpError::MethodNotFound(request.method.clone());
            return JsonRpcResponse::failure(id, err.to_rpc_error());
        };

        match handler.call(request.params_or_default()).await {
            Ok(result) => JsonRpcResponse::success(id, result),
            Err(err) => {
                if err.is_caller_facing() {
                    tracing::debug!(method = %request.method, error = %err, "Method rejected call");
                } else {
                    tracing::error!(method = %request.method, error = ?err, "Method failed");
                }
                JsonRpcResponse::failure(id, err.to_rpc_error())
            }
        }
    }
}
