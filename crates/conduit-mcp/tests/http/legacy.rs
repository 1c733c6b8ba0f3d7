//! Session-less endpoints, health and envelope parse errors.

use crate::common::*;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use conduit_core::McpConfig;
use serde_json::json;

#[tokio::test]
async fn legacy_paths_dispatch_without_sessions() {
    let ctx = TestContext::new();

    for path in ["/", "/rpc", "/jsonrpc"] {
        let response = ctx
            .send(post_request(
                path,
                None,
                json!({"jsonrpc": "2.0", "id": 1, "method": "ping"}).to_string(),
            ))
            .await;
        assert_eq!(response.status(), StatusCode::OK, "path {}", path);
        assert!(session_id(&response).is_none());
        assert_eq!(body_json(response).await["result"], json!({}));
    }
    assert!(ctx.transport.sessions().is_empty());
}

#[tokio::test]
async fn legacy_notification_is_accepted() {
    let ctx = TestContext::new();
    let response = ctx
        .send(post_request(
            "/rpc",
            None,
            json!({"jsonrpc": "2.0", "method": "ping"}).to_string(),
        ))
        .await;

    assert_eq!(response.status(), StatusCode::ACCEPTED);
    assert!(body_bytes(response).await.is_empty());
}

#[tokio::test]
async fn legacy_sse_sends_one_event() {
    let ctx = TestContext::new();
    let response = ctx
        .send(Request::builder().uri("/sse").body(Body::empty()).unwrap())
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let mut reader = SseReader::new(response);
    let frame = reader.expect_frame().await;
    assert_eq!(frame.json()["type"], "notification");
    assert!(reader.next_frame().await.is_none());
}

#[tokio::test]
async fn legacy_paths_can_be_disabled() {
    let config = McpConfig {
        legacy_endpoints: false,
        ..McpConfig::default()
    };
    let ctx = TestContext::with_config(config, None);

    let response = ctx
        .send(post_request(
            "/rpc",
            None,
            json!({"jsonrpc": "2.0", "id": 1, "method": "ping"}).to_string(),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn health_reports_active_sessions() {
    let ctx = TestContext::new();
    ctx.initialize().await;
    ctx.initialize().await;

    let response = ctx
        .send(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["transport"], "MCP Streamable HTTP");
    assert_eq!(body["protocol_version"], "2024-11-05");
    assert_eq!(body["active_sessions"], 2);
}

#[tokio::test]
async fn malformed_json_is_a_parse_error() {
    let ctx = TestContext::new();
    let response = ctx.send(post_request("/mcp", None, "{not json")).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(session_id(&response).is_none());
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], -32700);
    assert!(body["id"].is_null());
    assert!(ctx.transport.sessions().is_empty());
}

#[tokio::test]
async fn invalid_envelope_is_an_invalid_request() {
    let ctx = TestContext::new();

    let response = ctx
        .send(post_request("/mcp", None, json!({"jsonrpc": "2.0", "id": 5}).to_string()))
        .await;
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], -32600);
    assert_eq!(body["id"], 5);

    let response = ctx
        .send(post_request(
            "/rpc",
            None,
            json!({"jsonrpc": "1.0", "id": 6, "method": "ping"}).to_string(),
        ))
        .await;
    assert_eq!(body_json(response).await["error"]["code"], -32600);
}
