//! SSE push streams on `GET /mcp`.

use crate::common::*;
use axum::http::StatusCode;
use serde_json::{Map, json};
use std::time::Duration;

#[tokio::test]
async fn stream_requires_session_header() {
    let ctx = TestContext::new();
    let response = ctx
        .send(
            axum::http::Request::builder()
                .method("GET")
                .uri("/mcp")
                .body(axum::body::Body::empty())
                .unwrap(),
        )
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"], "No session ID provided. Initialize first.");
}

#[tokio::test]
async fn stream_rejects_unknown_session() {
    let ctx = TestContext::new();
    let response = ctx.open_stream("no-such-session", None).await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["error"], "Invalid session ID");
}

#[tokio::test]
async fn stream_opens_with_connection_event() {
    let ctx = TestContext::new();
    let session = ctx.initialize().await;

    let response = ctx.open_stream(&session, None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(session_id(&response).as_deref(), Some(session.as_str()));
    assert!(
        response.headers()["content-type"]
            .to_str()
            .unwrap()
            .starts_with("text/event-stream")
    );

    let mut reader = SseReader::new(response);
    let connected = reader.expect_frame().await;
    assert_eq!(connected.id.as_deref(), Some("1"));
    assert_eq!(connected.event.as_deref(), Some("message"));
    assert_eq!(connected.json()["type"], "connection");
}

#[tokio::test]
async fn pushed_notifications_arrive_in_order() {
    let ctx = TestContext::new();
    let session = ctx.initialize().await;
    let mut reader = SseReader::new(ctx.open_stream(&session, None).await);
    reader.expect_frame().await;

    for step in 0..3 {
        let mut params = Map::new();
        params.insert("step".into(), json!(step));
        ctx.transport
            .send_notification(&session, "notifications/progress", Some(params))
            .unwrap();
    }

    let mut last_id = 1;
    for step in 0..3 {
        let frame = reader.expect_frame().await;
        let id: u64 = frame.id.as_deref().unwrap().parse().unwrap();
        assert!(id > last_id);
        last_id = id;

        let payload = frame.json();
        assert_eq!(payload["method"], "notifications/progress");
        assert_eq!(payload["params"]["step"], step);
        assert!(payload.get("id").is_none());
    }
}

#[tokio::test]
async fn reconnect_replays_after_last_event_id() {
    let ctx = TestContext::new();
    let session_id = ctx.initialize().await;
    let session = ctx.transport.sessions().get(&session_id).unwrap();

    assert_eq!(session.queue_message("A", None), 1);
    assert_eq!(session.queue_message("B", None), 2);

    let mut reader = SseReader::new(ctx.open_stream(&session_id, Some("1")).await);

    let replayed = reader.expect_frame().await;
    assert_eq!(replayed.id.as_deref(), Some("2"));
    assert_eq!(replayed.data.as_deref(), Some("B"));

    let connected = reader.expect_frame().await;
    assert_eq!(connected.id.as_deref(), Some("3"));
    assert_eq!(connected.json()["type"], "connection");

    // A and B were also waiting on the push channel; neither is sent twice.
    session.queue_message("C", Some("custom"));
    let next = reader.expect_frame().await;
    assert_eq!(next.id.as_deref(), Some("4"));
    assert_eq!(next.event.as_deref(), Some("custom"));
    assert_eq!(next.data.as_deref(), Some("C"));
}

#[tokio::test]
async fn unparseable_last_event_id_skips_replay() {
    let ctx = TestContext::new();
    let session_id = ctx.initialize().await;
    let session = ctx.transport.sessions().get(&session_id).unwrap();
    session.queue_message("A", None);

    let mut reader = SseReader::new(ctx.open_stream(&session_id, Some("not-a-number")).await);

    // Only the undelivered message, never a replay of the log.
    let pending = reader.expect_frame().await;
    assert_eq!(pending.id.as_deref(), Some("1"));
    assert_eq!(pending.data.as_deref(), Some("A"));

    let connected = reader.expect_frame().await;
    assert_eq!(connected.id.as_deref(), Some("2"));
    assert_eq!(connected.json()["type"], "connection");
}

#[tokio::test]
async fn messages_queued_before_attach_keep_id_order() {
    let ctx = TestContext::new();
    let session_id = ctx.initialize().await;
    let session = ctx.transport.sessions().get(&session_id).unwrap();
    session.queue_message("A", None);
    session.queue_message("B", None);

    let mut reader = SseReader::new(ctx.open_stream(&session_id, None).await);
    let mut frames = Vec::new();
    for _ in 0..3 {
        frames.push(reader.expect_frame().await);
    }
    session.queue_message("C", None);
    frames.push(reader.expect_frame().await);

    let ids: Vec<u64> = frames
        .iter()
        .map(|f| f.id.as_deref().unwrap().parse().unwrap())
        .collect();
    assert_eq!(ids, vec![1, 2, 3, 4]);
    assert_eq!(frames[0].data.as_deref(), Some("A"));
    assert_eq!(frames[1].data.as_deref(), Some("B"));
    assert_eq!(frames[2].json()["type"], "connection");
    assert_eq!(frames[3].data.as_deref(), Some("C"));
}

#[tokio::test]
async fn idle_stream_sends_keep_alive() {
    let ctx = TestContext::with_keep_alive(Duration::from_millis(50));
    let session = ctx.initialize().await;
    let mut reader = SseReader::new(ctx.open_stream(&session, None).await);
    reader.expect_frame().await;

    let keep_alive = reader.expect_frame().await;
    assert_eq!(keep_alive.comment.as_deref(), Some("keepalive"));
    assert!(keep_alive.id.is_none());
    assert!(keep_alive.data.is_none());

    // Keep-alives are not logged.
    let session = ctx.transport.sessions().get(&session).unwrap();
    assert_eq!(session.replay_len(), 0);
}

#[tokio::test]
async fn new_stream_takes_over() {
    let ctx = TestContext::new();
    let session = ctx.initialize().await;

    let mut first = SseReader::new(ctx.open_stream(&session, None).await);
    first.expect_frame().await;

    // The second stream attaches only once the first has let go of the channel.
    let mut second = SseReader::new(ctx.open_stream(&session, None).await);
    let (ended, connected) = tokio::join!(first.next_frame(), second.expect_frame());
    assert!(ended.is_none());
    assert_eq!(connected.json()["type"], "connection");

    ctx.transport.send_notification(&session, "notifications/ping", None).unwrap();
    let frame = second.expect_frame().await;
    assert_eq!(frame.json()["method"], "notifications/ping");
}

#[tokio::test]
async fn deleting_session_ends_stream() {
    let ctx = TestContext::new();
    let session = ctx.initialize().await;
    let mut reader = SseReader::new(ctx.open_stream(&session, None).await);
    reader.expect_frame().await;

    assert_eq!(ctx.delete(Some(&session)).await.status(), StatusCode::NO_CONTENT);
    assert!(reader.next_frame().await.is_none());
    assert_eq!(ctx.open_stream(&session, None).await.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn dropped_stream_releases_registration() {
    let ctx = TestContext::new();
    let session_id = ctx.initialize().await;
    let session = ctx.transport.sessions().get(&session_id).unwrap();

    let mut reader = SseReader::new(ctx.open_stream(&session_id, None).await);
    reader.expect_frame().await;
    assert!(session.has_active_stream());

    drop(reader);
    assert!(!session.has_active_stream());
}

#[test]
fn notification_to_missing_session_is_a_no_op() {
    let ctx = TestContext::new();
    assert!(ctx.transport.send_notification("gone", "notifications/ping", None).is_none());
}
