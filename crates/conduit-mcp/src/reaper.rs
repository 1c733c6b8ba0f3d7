//! Background expiry of idle sessions.

use crate::registry::SessionRegistry;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Periodically purges sessions idle past the registry's timeout.
pub struct Reaper {
    registry: Arc<SessionRegistry>,
    interval: Duration,
}

impl Reaper {
    /// Create a reaper using the registry's configured sweep interval.
    pub fn new(registry: Arc<SessionRegistry>) -> Self {
        let interval = registry.config().sweep_interval();
        Self { registry, interval }
    }

    /// Override the sweep interval.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Run one sweep now. Returns the number of sessions removed.
    pub fn sweep(&self) -> usize {
        self.registry.purge_expired()
    }

    /// Start sweeping in the background until `shutdown` is cancelled.
    pub fn spawn(self, shutdown: CancellationToken) -> ReaperHandle {
        let cancel = shutdown.child_token();
        let token = cancel.clone();

        let task = tokio::spawn(async move {
            tracing::debug!(interval_secs = self.interval.as_secs_f64(), "Session reaper started");
            let mut ticker = tokio::time::interval_at(Instant::now() + self.interval, self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        self.sweep();
                    }
                }
            }
            tracing::debug!("Session reaper stopped");
        });

        ReaperHandle { cancel, task }
    }
}

/// Handle to a running [`Reaper`] task.
pub struct ReaperHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl ReaperHandle {
    /// Stop the reaper and wait for its task to finish.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            tracing::warn!(error = %e, "Session reaper task ended abnormally");
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}
