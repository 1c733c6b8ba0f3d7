//! Shared test infrastructure for the MCP HTTP transport tests.
//!
//! This module provides:
//! - A router backed by a server with a small tool set
//! - Request builders for the session-aware endpoint
//! - An incremental SSE frame reader over a response body

use axum::Router;
use axum::body::{Body, BodyDataStream};
use axum::http::{Request, Response, StatusCode};
use conduit_core::McpConfig;
use conduit_mcp::http_transport::{LAST_EVENT_ID_HEADER, PROTOCOL_VERSION_HEADER, SESSION_ID_HEADER};
use conduit_mcp::protocol::ToolDefinition;
use conduit_mcp::{McpServer, McpTransport, ToolRegistry, create_router};
use futures::StreamExt;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

/// How long a test waits for the next SSE frame before failing.
pub const FRAME_TIMEOUT: Duration = Duration::from_secs(5);

// =============================================================================
// TEST CONTEXT
// =============================================================================

pub struct TestContext {
    pub transport: Arc<McpTransport>,
    pub app: Router,
}

impl TestContext {
    pub fn new() -> Self {
        Self::with_config(McpConfig::default(), None)
    }

    pub fn with_keep_alive(keep_alive: Duration) -> Self {
        Self::with_config(McpConfig::default(), Some(keep_alive))
    }

    pub fn with_config(config: McpConfig, keep_alive: Option<Duration>) -> Self {
        let server = McpServer::new(config).with_tools(test_tools());
        let mut transport = McpTransport::new(
            server.dispatcher(),
            Arc::clone(server.sessions()),
            server.config(),
        );
        if let Some(keep_alive) = keep_alive {
            transport = transport.with_keep_alive(keep_alive);
        }
        let transport = Arc::new(transport);
        let app = create_router(Arc::clone(&transport));
        Self { transport, app }
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.app.clone().oneshot(request).await.unwrap()
    }

    /// POST a JSON-RPC envelope to `/mcp`.
    pub async fn post(&self, session_id: Option<&str>, body: Value) -> Response<Body> {
        self.send(post_request("/mcp", session_id, body.to_string())).await
    }

    /// POST `initialize` without a session and return the issued session id.
    pub async fn initialize(&self) -> String {
        let response = self
            .post(None, json!({"jsonrpc": "2.0", "id": 1, "method": "initialize", "params": {}}))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        session_id(&response).expect("initialize must issue a session id")
    }

    /// Open the SSE stream for a session.
    pub async fn open_stream(&self, session_id: &str, last_event_id: Option<&str>) -> Response<Body> {
        let mut builder = Request::builder()
            .method("GET")
            .uri("/mcp")
            .header(SESSION_ID_HEADER, session_id);
        if let Some(marker) = last_event_id {
            builder = builder.header(LAST_EVENT_ID_HEADER, marker);
        }
        self.send(builder.body(Body::empty()).unwrap()).await
    }

    pub async fn delete(&self, session_id: Option<&str>) -> Response<Body> {
        let mut builder = Request::builder().method("DELETE").uri("/mcp");
        if let Some(id) = session_id {
            builder = builder.header(SESSION_ID_HEADER, id);
        }
        self.send(builder.body(Body::empty()).unwrap()).await
    }
}

fn test_tools() -> ToolRegistry {
    let mut tools = ToolRegistry::new();
    tools.register_fn(
        ToolDefinition {
            name: "echo".to_string(),
            description: "Echo the message back".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {"message": {"type": "string"}},
                "required": ["message"]
            }),
        },
        |args| async move { Ok(args["message"].clone()) },
    );
    tools
}

// =============================================================================
// REQUEST / RESPONSE HELPERS
// =============================================================================

pub fn post_request(path: &str, session_id: Option<&str>, body: impl Into<Body>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(path)
        .header("content-type", "application/json");
    if let Some(id) = session_id {
        builder = builder.header(SESSION_ID_HEADER, id);
    }
    builder.body(body.into()).unwrap()
}

pub fn session_id(response: &Response<Body>) -> Option<String> {
    response
        .headers()
        .get(SESSION_ID_HEADER)
        .map(|v| v.to_str().unwrap().to_string())
}

pub fn protocol_version(response: &Response<Body>) -> Option<String> {
    response
        .headers()
        .get(PROTOCOL_VERSION_HEADER)
        .map(|v| v.to_str().unwrap().to_string())
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

pub async fn body_json(response: Response<Body>) -> Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

// =============================================================================
// SSE READER
// =============================================================================

/// One parsed SSE frame.
#[derive(Debug, Default, Clone)]
pub struct SseFrame {
    pub id: Option<String>,
    pub event: Option<String>,
    pub data: Option<String>,
    pub comment: Option<String>,
}

impl SseFrame {
    pub fn json(&self) -> Value {
        serde_json::from_str(self.data.as_deref().unwrap()).unwrap()
    }
}

pub struct SseReader {
    stream: BodyDataStream,
    buffer: String,
}

impl SseReader {
    pub fn new(response: Response<Body>) -> Self {
        Self {
            stream: response.into_body().into_data_stream(),
            buffer: String::new(),
        }
    }

    /// Next frame, or `None` once the stream has ended.
    pub async fn next_frame(&mut self) -> Option<SseFrame> {
        loop {
            if let Some(end) = self.buffer.find("\n\n") {
                let raw: String = self.buffer.drain(..end + 2).collect();
                return Some(parse_frame(&raw));
            }
            let chunk = tokio::time::timeout(FRAME_TIMEOUT, self.stream.next())
                .await
                .expect("timed out waiting for SSE frame")?;
            self.buffer.push_str(std::str::from_utf8(&chunk.unwrap()).unwrap());
        }
    }

    pub async fn expect_frame(&mut self) -> SseFrame {
        self.next_frame().await.expect("SSE stream ended early")
    }
}

fn parse_frame(raw: &str) -> SseFrame {
    let mut frame = SseFrame::default();
    for line in raw.lines().filter(|l| !l.is_empty()) {
        let (field, value) = line.split_once(':').unwrap_or((line, ""));
        let value = value.strip_prefix(' ').unwrap_or(value).to_string();
        match field {
            "" => frame.comment = Some(value),
            "id" => frame.id = Some(value),
            "event" => frame.event = Some(value),
            "data" => {
                frame.data = Some(match frame.data.take() {
                    Some(existing) => format!("{}\n{}", existing, value),
                    None => value,
                })
            }
            _ => {}
        }
    }
    frame
}
