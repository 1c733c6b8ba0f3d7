//! HTTP transport for MCP server.
//!
//! This module implements the MCP Streamable HTTP transport:
//!
//! - `POST /mcp` - send a JSON-RPC call. Requests (and `initialize`) get a
//!   JSON body; notifications get `202 Accepted` and no body. Every response
//!   carries `Mcp-Session-Id` and `Mcp-Protocol-Version`.
//! - `GET /mcp` - open an SSE push stream for an existing session, optionally
//!   resuming after `Last-Event-Id`.
//! - `DELETE /mcp` - terminate a session.
//! - `POST /`, `/rpc`, `/jsonrpc` and `GET /sse` - legacy session-less
//!   endpoints for older clients.
//! - `GET /health` - liveness probe.
//!
//! A POST with an unknown session id is recovered by silently creating a new
//! session. A GET with an unknown session id is a 404; the client has to
//! initialize again.

use crate::dispatcher::MethodDispatcher;
use crate::protocol::{JsonRpcRequest, JsonRpcResponse};
use crate::registry::SessionRegistry;
use crate::session::{DEFAULT_EVENT, OutboundMessage, PushEvent, Session};
use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{
        IntoResponse, Response, Sse,
        sse::Event,
    },
    routing::{get, post},
};
use conduit_core::McpConfig;
use futures::Stream;
use serde_json::{Map, Value, json};
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tower_http::trace::TraceLayer;

/// Session id header, set by the server and echoed by the client.
pub const SESSION_ID_HEADER: HeaderName = HeaderName::from_static("mcp-session-id");

/// Protocol version header.
pub const PROTOCOL_VERSION_HEADER: HeaderName = HeaderName::from_static("mcp-protocol-version");

/// SSE resumption marker header.
pub const LAST_EVENT_ID_HEADER: HeaderName = HeaderName::from_static("last-event-id");

/// Transport name reported by `/health`.
pub const TRANSPORT_NAME: &str = "MCP Streamable HTTP";

/// Outcome of one call on the session-aware endpoint.
#[derive(Debug)]
pub struct CallOutcome {
    /// The session the call was attributed to.
    pub session: Arc<Session>,
    /// The result envelope, `None` when the call was a notification.
    pub response: Option<JsonRpcResponse>,
}

/// Coordinates the dispatcher and the session registry.
pub struct McpTransport {
    dispatcher: MethodDispatcher,
    sessions: Arc<SessionRegistry>,
    protocol_version: String,
    server_name: String,
    keep_alive: Duration,
    legacy_endpoints: bool,
}

impl McpTransport {
    /// Create a transport over an existing registry.
    pub fn new(dispatcher: MethodDispatcher, sessions: Arc<SessionRegistry>, config: &McpConfig) -> Self {
        Self {
            dispatcher,
            keep_alive: sessions.config().keep_alive(),
            sessions,
            protocol_version: config.protocol_version.clone(),
            server_name: config.server_name.clone(),
            legacy_endpoints: config.legacy_endpoints,
        }
    }

    /// Override the idle bound of push streams.
    pub fn with_keep_alive(mut self, keep_alive: Duration) -> Self {
        self.keep_alive = keep_alive;
        self
    }

    pub fn sessions(&self) -> &Arc<SessionRegistry> {
        &self.sessions
    }

    pub fn dispatcher(&self) -> &MethodDispatcher {
        &self.dispatcher
    }

    pub fn protocol_version(&self) -> &str {
        &self.protocol_version
    }

    /// Find the caller's session, creating one when none was given or the
    /// given id is unknown.
    pub fn resolve_session(&self, session_id: Option<&str>) -> Arc<Session> {
        match session_id {
            None => self.sessions.create(),
            Some(id) => match self.sessions.get(id) {
                Some(session) => session,
                None => {
                    tracing::warn!(session_id = %id, "Session not found, creating new one");
                    self.sessions.create()
                }
            },
        }
    }

    /// Handle one call envelope on the session-aware endpoint.
    ///
    /// `initialize` and requests with an `id` get a response; other
    /// notifications are dispatched but their envelope is discarded.
    pub async fn handle_call(&self, session_id: Option<&str>, request: JsonRpcRequest) -> CallOutcome {
        let session = self.resolve_session(session_id);
        tracing::debug!(
            session_id = %session.id(),
            method = %request.method,
            notification = request.is_notification(),
            "Handling MCP call"
        );

        let response = self.dispatcher.dispatch(&request).await;
        let wants_body = request.method == "initialize" || !request.is_notification();
        CallOutcome {
            session,
            response: wants_body.then_some(response),
        }
    }

    /// Push a server-initiated notification to a session's stream.
    ///
    /// Returns the event id, or `None` when the session no longer exists.
    pub fn send_notification(
        &self,
        session_id: &str,
        method: &str,
        params: Option<Map<String, Value>>,
    ) -> Option<u64> {
        let Some(session) = self.sessions.get(session_id) else {
            tracing::warn!(session_id = %session_id, method = %method, "Cannot send notification: session not found");
            return None;
        };

        let notification = JsonRpcRequest::notification(method, Some(params.unwrap_or_default()));
        let payload = match serde_json::to_string(&notification) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!(session_id = %session_id, method = %method, error = %e, "Failed to serialize notification");
                return None;
            }
        };

        let event_id = session.queue_message(payload, Some(DEFAULT_EVENT));
        tracing::debug!(session_id = %session_id, method = %method, event_id, "Queued notification");
        Some(event_id)
    }

    /// Explicitly end a session.
    pub fn terminate_session(&self, session_id: &str) -> bool {
        self.sessions.delete(session_id)
    }

    /// Log (but tolerate) a client speaking another protocol version.
    fn check_protocol_version(&self, headers: &HeaderMap) {
        if let Some(version) = header_str(headers, &PROTOCOL_VERSION_HEADER) {
            if version != self.protocol_version {
                tracing::warn!(
                    client_version = %version,
                    server_version = %self.protocol_version,
                    "Client protocol version mismatch"
                );
            }
        }
    }

    fn with_session_headers(&self, mut response: Response, session_id: &str) -> Response {
        let headers = response.headers_mut();
        if let Ok(value) = HeaderValue::from_str(session_id) {
            headers.insert(SESSION_ID_HEADER, value);
        }
        if let Ok(value) = HeaderValue::from_str(&self.protocol_version) {
            headers.insert(PROTOCOL_VERSION_HEADER, value);
        }
        response
    }

    /// SSE events for one push stream.
    ///
    /// Replays the log after `resume_from` (if given), emits the connection
    /// event, then relays queued messages with keep-alive comments while idle.
    /// The stream ends when the session is closed or another stream takes
    /// over; dropping it releases the session's stream registration.
    pub fn push_events(
        &self,
        session: Arc<Session>,
        resume_from: Option<String>,
    ) -> impl Stream<Item = Result<Event, Infallible>> + Send + 'static {
        let keep_alive = self.keep_alive;

        async_stream::stream! {
            let mut push = session.attach_stream().await;
            let mut last_delivered = 0u64;

            if let Some(marker) = resume_from {
                for message in session.messages_after(&marker) {
                    last_delivered = message.event_id;
                    yield Ok(message_event(&message));
                }
            }

            // Messages queued while no stream was attached go out before the
            // connection event; the ones just replayed are skipped.
            let (backlog, connected_id) = push.take_backlog();
            for message in backlog {
                if message.event_id > last_delivered {
                    yield Ok(message_event(&message));
                }
            }

            yield Ok(Event::default()
                .event(DEFAULT_EVENT)
                .id(connected_id.to_string())
                .data(json!({"type": "connection", "message": "SSE stream established"}).to_string()));

            loop {
                match push.next(keep_alive).await {
                    PushEvent::Message(message) => {
                        yield Ok(message_event(&message));
                    }
                    PushEvent::KeepAlive => {
                        yield Ok(Event::default().comment("keepalive"));
                    }
                    PushEvent::Closed => break,
                }
            }
            tracing::debug!(session_id = %session.id(), "SSE stream closed");
        }
    }
}

fn message_event(message: &OutboundMessage) -> Event {
    let name = message.event_name();
    let name = if name.contains(['\n', '\r']) { DEFAULT_EVENT } else { name };
    Event::default()
        .event(name)
        .id(message.id())
        .data(&message.payload)
}

fn header_str<'a>(headers: &'a HeaderMap, name: &HeaderName) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

fn error_body(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

/// Create the HTTP router for MCP.
pub fn create_router(transport: Arc<McpTransport>) -> Router {
    let mut router = Router::new()
        .route(
            "/mcp",
            post(handle_mcp_post)
                .get(handle_mcp_get)
                .delete(handle_mcp_delete),
        )
        .route("/health", get(handle_health));

    if transport.legacy_endpoints {
        router = router
            .route("/", post(handle_legacy_post))
            .route("/rpc", post(handle_legacy_post))
            .route("/jsonrpc", post(handle_legacy_post))
            .route("/sse", get(handle_legacy_sse));
    }

    router
        .layer(TraceLayer::new_for_http())
        .with_state(transport)
}

/// Handle POST requests to /mcp.
async fn handle_mcp_post(
    State(transport): State<Arc<McpTransport>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let request = match JsonRpcRequest::parse(&body) {
        Ok(request) => request,
        Err(response) => return (StatusCode::OK, Json(*response)).into_response(),
    };

    transport.check_protocol_version(&headers);

    let session_id = header_str(&headers, &SESSION_ID_HEADER);
    let outcome = transport.handle_call(session_id, request).await;

    let response = match outcome.response {
        Some(response) => (StatusCode::OK, Json(response)).into_response(),
        None => StatusCode::ACCEPTED.into_response(),
    };
    transport.with_session_headers(response, outcome.session.id())
}

/// Handle GET requests to /mcp (SSE streaming).
async fn handle_mcp_get(State(transport): State<Arc<McpTransport>>, headers: HeaderMap) -> Response {
    transport.check_protocol_version(&headers);

    let Some(session_id) = header_str(&headers, &SESSION_ID_HEADER) else {
        return error_body(
            StatusCode::BAD_REQUEST,
            "No session ID provided. Initialize first.",
        );
    };
    let Some(session) = transport.sessions.get(session_id) else {
        return error_body(StatusCode::NOT_FOUND, "Invalid session ID");
    };

    let resume_from = header_str(&headers, &LAST_EVENT_ID_HEADER).map(String::from);
    tracing::info!(
        session_id = %session.id(),
        resume_from = resume_from.as_deref().unwrap_or("-"),
        "Opening SSE stream"
    );

    let session_id = session.id().to_string();
    let stream = transport.push_events(session, resume_from);
    transport.with_session_headers(Sse::new(stream).into_response(), &session_id)
}

/// Handle DELETE requests to /mcp (session termination).
async fn handle_mcp_delete(State(transport): State<Arc<McpTransport>>, headers: HeaderMap) -> Response {
    let Some(session_id) = header_str(&headers, &SESSION_ID_HEADER) else {
        return error_body(StatusCode::BAD_REQUEST, "No session ID provided.");
    };
    if transport.terminate_session(session_id) {
        StatusCode::NO_CONTENT.into_response()
    } else {
        error_body(StatusCode::NOT_FOUND, "Invalid session ID")
    }
}

/// Handle POST requests to the legacy JSON-RPC paths (no sessions).
async fn handle_legacy_post(State(transport): State<Arc<McpTransport>>, body: Bytes) -> Response {
    let request = match JsonRpcRequest::parse(&body) {
        Ok(request) => request,
        Err(response) => return (StatusCode::OK, Json(*response)).into_response(),
    };

    let response = transport.dispatcher.dispatch(&request).await;
    if request.is_notification() {
        StatusCode::ACCEPTED.into_response()
    } else {
        (StatusCode::OK, Json(response)).into_response()
    }
}

/// Handle GET /sse: a one-shot, session-less stream.
async fn handle_legacy_sse() -> impl IntoResponse {
    let event = Event::default()
        .event(DEFAULT_EVENT)
        .data(json!({"type": "notification", "message": "Connected to MCP server"}).to_string());
    Sse::new(futures::stream::once(async move { Ok::<_, Infallible>(event) }))
}

/// Handle health check requests.
async fn handle_health(State(transport): State<Arc<McpTransport>>) -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "service": transport.server_name,
        "version": env!("CARGO_PKG_VERSION"),
        "transport": TRANSPORT_NAME,
        "protocol_version": transport.protocol_version,
        "active_sessions": transport.sessions.len(),
    }))
}
