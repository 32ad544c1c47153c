use std::collections::HashMap;

use tracing::{debug, info};

use crate::error::StreamError;

use super::session::{
    MetricsSession, SessionContext, SessionInfo, SessionKey, SessionStatus, WorkerLogSession,
};

/// A registry entry: one metrics feed or one worker log tail.
#[derive(Debug)]
pub enum LiveSession {
    Metrics(MetricsSession),
    WorkerLog(WorkerLogSession),
}

impl LiveSession {
    /// Builds the unstarted session kind that `key` names.
    #[must_use]
    pub fn for_key(key: &SessionKey, ctx: SessionContext) -> Self {
        match key {
            SessionKey::Metrics(test_id) => {
                LiveSession::Metrics(MetricsSession::new(test_id.clone(), ctx))
            }
            SessionKey::WorkerLog(worker_id) => {
                LiveSession::WorkerLog(WorkerLogSession::new(worker_id.clone(), ctx))
            }
        }
    }

    #[must_use]
    pub fn key(&self) -> &SessionKey {
        match self {
            LiveSession::Metrics(session) => session.key(),
            LiveSession::WorkerLog(session) => session.key(),
        }
    }

    pub fn start(&mut self) {
        match self {
            LiveSession::Metrics(session) => session.start(),
            LiveSession::WorkerLog(session) => session.start(),
        }
    }

    pub fn stop(&mut self) {
        match self {
            LiveSession::Metrics(session) => session.stop(),
            LiveSession::WorkerLog(session) => session.stop(),
        }
    }

    #[must_use]
    pub fn status(&self) -> SessionStatus {
        match self {
            LiveSession::Metrics(session) => session.status(),
            LiveSession::WorkerLog(session) => session.status(),
        }
    }

    #[must_use]
    pub fn last_error(&self) -> Option<StreamError> {
        match self {
            LiveSession::Metrics(session) => session.last_error(),
            LiveSession::WorkerLog(session) => session.last_error(),
        }
    }

    #[must_use]
    pub fn run(&self) -> u64 {
        match self {
            LiveSession::Metrics(session) => session.run(),
            LiveSession::WorkerLog(session) => session.run(),
        }
    }

    #[must_use]
    pub fn info(&self) -> SessionInfo {
        match self {
            LiveSession::Metrics(session) => session.info(),
            LiveSession::WorkerLog(session) => session.info(),
        }
    }

    #[must_use]
    pub const fn as_metrics(&self) -> Option<&MetricsSession> {
        match self {
            LiveSession::Metrics(session) => Some(session),
            LiveSession::WorkerLog(_) => None,
        }
    }

    #[must_use]
    pub const fn as_worker_log(&self) -> Option<&WorkerLogSession> {
        match self {
            LiveSession::WorkerLog(session) => Some(session),
            LiveSession::Metrics(_) => None,
        }
    }
}

/// Owned map from key to its live session.
///
/// Each entry exclusively owns its transport task, so removing an entry
/// (by `stop`, replacement or drop of the registry) tears the transport
/// down with it.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: HashMap<SessionKey, LiveSession>,
}

impl SessionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stops any existing entry for `key`, then installs and starts the
    /// session `factory` builds. Only one transport is ever live per key.
    pub fn start<F>(&mut self, key: SessionKey, factory: F) -> &LiveSession
    where
        F: FnOnce(&SessionKey) -> LiveSession,
    {
        if let Some(mut previous) = self.sessions.remove(&key) {
            info!("Replacing live session {}", key);
            previous.stop();
        }
        let mut session = factory(&key);
        session.start();
        self.sessions.entry(key).or_insert(session)
    }

    /// Stops and removes the entry. Returns `false` when there was none.
    pub fn stop(&mut self, key: &SessionKey) -> bool {
        match self.sessions.remove(key) {
            Some(mut session) => {
                session.stop();
                true
            }
            None => {
                debug!("No live session for {}", key);
                false
            }
        }
    }

    /// Stops and removes every entry; returns how many there were.
    pub fn stop_all(&mut self) -> usize {
        let count = self.sessions.len();
        for (_, mut session) in self.sessions.drain() {
            session.stop();
        }
        if count > 0 {
            info!("Stopped {} live session(s)", count);
        }
        count
    }

    #[must_use]
    pub fn get(&self, key: &SessionKey) -> Option<&LiveSession> {
        self.sessions.get(key)
    }

    #[must_use]
    pub fn contains(&self, key: &SessionKey) -> bool {
        self.sessions.contains_key(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Keys in sorted order.
    #[must_use]
    pub fn keys(&self) -> Vec<SessionKey> {
        let mut keys: Vec<SessionKey> = self.sessions.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Entries whose transport is still opening or open.
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.sessions
            .values()
            .filter(|session| session.status().is_live())
            .count()
    }

    pub fn sessions(&self) -> impl Iterator<Item = &LiveSession> {
        self.sessions.values()
    }
}

impl Drop for SessionRegistry {
    fn drop(&mut self) {
        self.stop_all();
    }
}
