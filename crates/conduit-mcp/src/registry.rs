//! Session registry.
//!
//! The registry is the only shared mutable map in the transport. Structural
//! changes (create, delete, sweep) take the write lock; lookups take the read
//! lock and refresh the session's activity while still holding it, so a sweep
//! can never remove a session between its lookup and its touch. Per-session
//! state has its own locks inside [`Session`].

use crate::session::Session;
use chrono::{DateTime, Utc};
use conduit_core::SessionConfig;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// In-memory store of active sessions.
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, Arc<Session>>>,
    config: SessionConfig,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new(SessionConfig::default())
    }
}

impl SessionRegistry {
    /// Create a new empty registry.
    pub fn new(config: SessionConfig) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            config,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Create a session with a fresh random id.
    pub fn create(&self) -> Arc<Session> {
        let mut sessions = self.sessions.write();
        let id = loop {
            let candidate = Uuid::new_v4().to_string();
            if !sessions.contains_key(&candidate) {
                break candidate;
            }
        };
        let session = Arc::new(Session::new(id.clone(), &self.config));
        sessions.insert(id.clone(), Arc::clone(&session));
        drop(sessions);

        tracing::info!(session_id = %id, "Created MCP session");
        session
    }

    /// Look up a session, refreshing its activity.
    pub fn get(&self, id: &str) -> Option<Arc<Session>> {
        let sessions = self.sessions.read();
        sessions.get(id).map(|session| {
            session.touch();
            Arc::clone(session)
        })
    }

    /// Refresh a session's activity. Returns `false` if it does not exist.
    pub fn touch(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// Check existence without refreshing activity.
    pub fn contains(&self, id: &str) -> bool {
        self.sessions.read().contains_key(id)
    }

    /// Remove a session and end its push stream.
    pub fn delete(&self, id: &str) -> bool {
        let removed = self.sessions.write().remove(id);
        match removed {
            Some(session) => {
                session.close();
                tracing::info!(session_id = %id, "Deleted MCP session");
                true
            }
            None => false,
        }
    }

    /// Remove every session and end their push streams. Used on shutdown.
    pub fn close_all(&self) -> usize {
        let drained: Vec<Arc<Session>> = self.sessions.write().drain().map(|(_, s)| s).collect();
        for session in &drained {
            session.close();
        }
        if !drained.is_empty() {
            tracing::info!(count = drained.len(), "Closed all MCP sessions");
        }
        drained.len()
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }

    /// Remove sessions idle longer than the configured timeout.
    pub fn purge_expired(&self) -> usize {
        // A timeout too large to represent means nothing can be idle that long.
        let cutoff = chrono::Duration::from_std(self.config.timeout())
            .ok()
            .and_then(|timeout| Utc::now().checked_sub_signed(timeout));
        match cutoff {
            Some(cutoff) => self.purge_idle_since(cutoff),
            None => 0,
        }
    }

    /// Remove sessions whose last activity is older than `cutoff`.
    pub fn purge_idle_since(&self, cutoff: DateTime<Utc>) -> usize {
        let mut expired = Vec::new();
        self.sessions.write().retain(|_, session| {
            if session.is_idle_since(cutoff) {
                expired.push(Arc::clone(session));
                false
            } else {
                true
            }
        });

        for session in &expired {
            session.close();
            tracing::debug!(session_id = %session.id(), "Expired MCP session");
        }
        if !expired.is_empty() {
            tracing::info!(count = expired.len(), "Cleaned up expired sessions");
        }
        expired.len()
    }
}
