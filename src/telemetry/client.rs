use std::sync::Arc;

use tokio::sync::mpsc;

use crate::auth::AuthGate;

use super::registry::{LiveSession, SessionRegistry};
use super::session::{
    EventReceiver, MetricsSession, SessionContext, SessionKey, SessionStatus, WorkerLogSession,
};
use super::transport::StreamConnector;

/// Owner of every live feed on a dashboard page.
///
/// Dropping it stops all sessions, so no transport outlives its page.
#[derive(Debug)]
pub struct LiveTelemetry {
    ctx: SessionContext,
    registry: SessionRegistry,
}

impl LiveTelemetry {
    /// Returns the facade and the receiver every session reports to.
    #[must_use]
    pub fn new(
        connector: Arc<dyn StreamConnector>,
        auth: Arc<dyn AuthGate>,
    ) -> (Self, EventReceiver) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let ctx = SessionContext::new(connector, auth, events_tx);
        (
            Self {
                ctx,
                registry: SessionRegistry::new(),
            },
            events_rx,
        )
    }

    /// Opens (or reopens) the metrics feed for `test_id`.
    pub fn start_metrics(&mut self, test_id: &str) -> SessionStatus {
        self.start(SessionKey::metrics(test_id))
    }

    pub fn stop_metrics(&mut self, test_id: &str) -> bool {
        self.registry.stop(&SessionKey::metrics(test_id))
    }

    /// Opens a fresh log tail for `worker_id` with an empty buffer.
    pub fn start_worker_log(&mut self, worker_id: &str) -> SessionStatus {
        self.start(SessionKey::worker_log(worker_id))
    }

    pub fn stop_worker_log(&mut self, worker_id: &str) -> bool {
        self.registry.stop(&SessionKey::worker_log(worker_id))
    }

    /// Expands a collapsed worker (starting its log tail) or collapses an
    /// expanded one. Returns `true` when the worker is now expanded.
    pub fn toggle_worker_log(&mut self, worker_id: &str) -> bool {
        let key = SessionKey::worker_log(worker_id);
        if self.registry.stop(&key) {
            return false;
        }
        self.start(key);
        true
    }

    pub fn stop_all(&mut self) -> usize {
        self.registry.stop_all()
    }

    #[must_use]
    pub fn metrics(&self, test_id: &str) -> Option<&MetricsSession> {
        self.registry
            .get(&SessionKey::metrics(test_id))
            .and_then(LiveSession::as_metrics)
    }

    #[must_use]
    pub fn worker_log(&self, worker_id: &str) -> Option<&WorkerLogSession> {
        self.registry
            .get(&SessionKey::worker_log(worker_id))
            .and_then(LiveSession::as_worker_log)
    }

    #[must_use]
    pub fn status(&self, key: &SessionKey) -> Option<SessionStatus> {
        self.registry.get(key).map(LiveSession::status)
    }

    #[must_use]
    pub const fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    /// `true` once every registered session has failed or closed.
    #[must_use]
    pub fn all_terminal(&self) -> bool {
        self.registry
            .sessions()
            .all(|session| session.status().is_terminal())
    }

    fn start(&mut self, key: SessionKey) -> SessionStatus {
        let ctx = self.ctx.clone();
        self.registry
            .start(key, |key| LiveSession::for_key(key, ctx))
            .status()
    }
}

impl Drop for LiveTelemetry {
    fn drop(&mut self) {
        self.stop_all();
    }
}
