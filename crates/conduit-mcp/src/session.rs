//! MCP sessions for the Streamable HTTP transport.
//!
//! A session correlates a client's calls with its push stream. It owns:
//!
//! - a monotonically increasing event counter (first event id is `1`),
//! - an append-only replay log of the messages pushed so far, bounded as a
//!   ring buffer when a capacity is configured,
//! - a bounded hand-off channel drained by the (single) active push stream.
//!
//! Id allocation, log append and channel hand-off happen under one
//! per-session lock, so a stream always sees messages in event-id order.

use chrono::{DateTime, Utc};
use conduit_core::SessionConfig;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::{OwnedMutexGuard, mpsc};
use tokio_util::sync::CancellationToken;

/// SSE event name used when a message carries no tag.
pub const DEFAULT_EVENT: &str = "message";

/// A message pushed to a client, as stored in the replay log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub event_id: u64,
    pub payload: String,
    pub event: Option<String>,
}

impl OutboundMessage {
    /// The event id in its wire (decimal string) form.
    pub fn id(&self) -> String {
        self.event_id.to_string()
    }

    /// The SSE event name, defaulting to [`DEFAULT_EVENT`].
    pub fn event_name(&self) -> &str {
        self.event.as_deref().unwrap_or(DEFAULT_EVENT)
    }
}

struct EventLog {
    last_event_id: u64,
    messages: VecDeque<OutboundMessage>,
    capacity: Option<usize>,
}

impl EventLog {
    fn next_id(&mut self) -> u64 {
        self.last_event_id += 1;
        self.last_event_id
    }

    fn append(&mut self, message: OutboundMessage) {
        self.messages.push_back(message);
        if let Some(capacity) = self.capacity {
            while self.messages.len() > capacity {
                self.messages.pop_front();
            }
        }
    }
}

struct StreamRegistration {
    stream_id: u64,
    cancel: CancellationToken,
}

/// An active MCP session.
pub struct Session {
    id: String,
    created_at: DateTime<Utc>,
    last_activity: Mutex<DateTime<Utc>>,
    log: Mutex<EventLog>,
    push_tx: mpsc::Sender<OutboundMessage>,
    push_rx: Arc<tokio::sync::Mutex<mpsc::Receiver<OutboundMessage>>>,
    stream: Mutex<Option<StreamRegistration>>,
    next_stream_id: AtomicU64,
    closed: CancellationToken,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("created_at", &self.created_at)
            .field("last_activity", &self.last_activity())
            .field("last_event_id", &self.last_event_id())
            .finish()
    }
}

impl Session {
    /// Create a session with zeroed counters.
    pub fn new(id: impl Into<String>, config: &SessionConfig) -> Self {
        let now = Utc::now();
        let (push_tx, push_rx) = mpsc::channel(config.push_channel_capacity.max(1));
        Self {
            id: id.into(),
            created_at: now,
            last_activity: Mutex::new(now),
            log: Mutex::new(EventLog {
                last_event_id: 0,
                messages: VecDeque::new(),
                capacity: config.replay_limit(),
            }),
            push_tx,
            push_rx: Arc::new(tokio::sync::Mutex::new(push_rx)),
            stream: Mutex::new(None),
            next_stream_id: AtomicU64::new(1),
            closed: CancellationToken::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn last_activity(&self) -> DateTime<Utc> {
        *self.last_activity.lock()
    }

    /// Refresh `last_activity`.
    pub fn touch(&self) {
        *self.last_activity.lock() = Utc::now();
    }

    /// Whether the session has seen no activity since `cutoff`.
    pub fn is_idle_since(&self, cutoff: DateTime<Utc>) -> bool {
        self.last_activity() < cutoff
    }

    /// The most recently allocated event id (`0` before the first event).
    pub fn last_event_id(&self) -> u64 {
        self.log.lock().last_event_id
    }

    /// Number of messages currently retained for replay.
    pub fn replay_len(&self) -> usize {
        self.log.lock().messages.len()
    }

    /// Allocate an event id without logging a message.
    ///
    /// Used for stream-local events that are never replayed.
    pub fn next_event_id(&self) -> u64 {
        let id = self.log.lock().next_id();
        self.touch();
        id
    }

    /// Append a message to the replay log and hand it to the push stream.
    ///
    /// Returns the allocated event id. When no stream is draining the push
    /// channel and it is full, the message is only kept in the replay log.
    pub fn queue_message(&self, payload: impl Into<String>, event: Option<&str>) -> u64 {
        let event_id = {
            let mut log = self.log.lock();
            let message = OutboundMessage {
                event_id: log.next_id(),
                payload: payload.into(),
                event: event.map(String::from),
            };
            let event_id = message.event_id;
            log.append(message.clone());

            if let Err(e) = self.push_tx.try_send(message) {
                tracing::debug!(
                    session_id = %self.id,
                    event_id,
                    reason = %e,
                    "Push channel unavailable, message kept for replay only"
                );
            }
            event_id
        };
        self.touch();
        event_id
    }

    /// Messages with an event id strictly greater than `marker`, ascending.
    ///
    /// A marker that is not an integer yields an empty list.
    pub fn messages_after(&self, marker: &str) -> Vec<OutboundMessage> {
        let Ok(marker) = marker.trim().parse::<i64>() else {
            return Vec::new();
        };
        self.touch();

        let log = self.log.lock();
        let start = if marker < 0 {
            0
        } else {
            log.messages.partition_point(|m| m.event_id <= marker as u64)
        };
        log.messages.range(start..).cloned().collect()
    }

    /// Whether a push stream is currently registered.
    pub fn has_active_stream(&self) -> bool {
        self.stream.lock().is_some()
    }

    /// Register a push stream, replacing (and cancelling) any existing one.
    ///
    /// Resolves once the previous stream has released the push channel.
    pub async fn attach_stream(self: &Arc<Self>) -> PushStream {
        let cancel = self.closed.child_token();
        let stream_id = self.next_stream_id.fetch_add(1, Ordering::Relaxed);

        let previous = self.stream.lock().replace(StreamRegistration {
            stream_id,
            cancel: cancel.clone(),
        });
        if let Some(previous) = previous {
            tracing::debug!(
                session_id = %self.id,
                replaced = previous.stream_id,
                stream_id,
                "Replacing active push stream"
            );
            previous.cancel.cancel();
        }

        let receiver = Arc::clone(&self.push_rx).lock_owned().await;
        tracing::debug!(session_id = %self.id, stream_id, "Push stream attached");
        self.touch();

        PushStream {
            session: Arc::clone(self),
            receiver,
            stream_id,
            cancel,
        }
    }

    fn release_stream(&self, stream_id: u64) {
        let mut current = self.stream.lock();
        if current.as_ref().is_some_and(|r| r.stream_id == stream_id) {
            *current = None;
        }
        tracing::debug!(session_id = %self.id, stream_id, "Push stream released");
    }

    /// Mark the session as terminated; any push stream ends.
    pub fn close(&self) {
        self.closed.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    #[cfg(test)]
    pub(crate) fn set_last_activity(&self, at: DateTime<Utc>) {
        *self.last_activity.lock() = at;
    }
}

/// What a push stream should emit next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushEvent {
    /// A queued message.
    Message(OutboundMessage),
    /// The idle bound elapsed without a message.
    KeepAlive,
    /// The stream was replaced or the session closed.
    Closed,
}

/// Exclusive consumer of a session's push channel.
///
/// Dropping it (for example when the HTTP client disconnects) releases the
/// session's stream registration.
pub struct PushStream {
    session: Arc<Session>,
    receiver: OwnedMutexGuard<mpsc::Receiver<OutboundMessage>>,
    stream_id: u64,
    cancel: CancellationToken,
}

impl PushStream {
    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    /// Take the messages already waiting on the channel and allocate an
    /// unlogged event id after them.
    ///
    /// Runs under the log lock, so no message can be queued in between:
    /// everything received later has an id greater than the returned one.
    pub fn take_backlog(&mut self) -> (Vec<OutboundMessage>, u64) {
        let (backlog, event_id) = {
            let mut log = self.session.log.lock();
            let mut backlog = Vec::new();
            while let Ok(message) = self.receiver.try_recv() {
                backlog.push(message);
            }
            (backlog, log.next_id())
        };
        self.session.touch();
        (backlog, event_id)
    }

    /// Wait up to `idle` for the next queued message.
    pub async fn next(&mut self, idle: Duration) -> PushEvent {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => PushEvent::Closed,
            received = tokio::time::timeout(idle, self.receiver.recv()) => match received {
                Ok(Some(message)) => {
                    self.session.touch();
                    PushEvent::Message(message)
                }
                Ok(None) => PushEvent::Closed,
                Err(_) => PushEvent::KeepAlive,
            },
        }
    }
}

impl Drop for PushStream {
    fn drop(&mut self) {
        self.session.release_stream(self.stream_id);
    }
}
