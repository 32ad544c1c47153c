//! Live session lifecycle: `Idle → Connecting → Connected → {Failed, Closed}`.
mod metrics;
mod runner;
mod worker_log;

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::mpsc;

use crate::auth::AuthGate;
use crate::error::StreamError;

use super::transport::StreamConnector;
use super::types::MetricsSnapshot;

pub use metrics::MetricsSession;
pub use worker_log::WorkerLogSession;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionKind {
    Metrics,
    Log,
}

impl SessionKind {
    /// Name used in user-facing stream messages.
    #[must_use]
    pub const fn feed_label(self) -> &'static str {
        match self {
            SessionKind::Metrics => "live",
            SessionKind::Log => "log",
        }
    }
}

/// Registry key: `metrics:<testId>` or `log:<workerId>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SessionKey {
    Metrics(String),
    WorkerLog(String),
}

impl SessionKey {
    #[must_use]
    pub fn metrics(test_id: impl Into<String>) -> Self {
        SessionKey::Metrics(test_id.into())
    }

    #[must_use]
    pub fn worker_log(worker_id: impl Into<String>) -> Self {
        SessionKey::WorkerLog(worker_id.into())
    }

    #[must_use]
    pub const fn kind(&self) -> SessionKind {
        match self {
            SessionKey::Metrics(_) => SessionKind::Metrics,
            SessionKey::WorkerLog(_) => SessionKind::Log,
        }
    }

    /// Test id or worker id.
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            SessionKey::Metrics(id) | SessionKey::WorkerLog(id) => id,
        }
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionKey::Metrics(id) => write!(f, "metrics:{}", id),
            SessionKey::WorkerLog(id) => write!(f, "log:{}", id),
        }
    }
}

impl std::str::FromStr for SessionKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (prefix, id) = s
            .split_once(':')
            .ok_or_else(|| format!("Invalid session key '{}'. Expected kind:id", s))?;
        if id.is_empty() {
            return Err(format!("Session key '{}' has an empty id", s));
        }
        match prefix {
            "metrics" => Ok(SessionKey::metrics(id)),
            "log" => Ok(SessionKey::worker_log(id)),
            _ => Err(format!(
                "Unknown session kind '{}'. Use metrics or log",
                prefix
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SessionStatus {
    #[default]
    Idle,
    Connecting,
    Connected,
    Failed,
    Closed,
}

impl SessionStatus {
    /// A transport may be open (or opening).
    #[must_use]
    pub const fn is_live(self) -> bool {
        matches!(self, SessionStatus::Connecting | SessionStatus::Connected)
    }

    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, SessionStatus::Failed | SessionStatus::Closed)
    }

    /// Forward edges a running stream may take on its own. Returning to
    /// `Connecting` is reserved for an explicit `start()`.
    #[must_use]
    pub const fn can_advance_to(self, next: SessionStatus) -> bool {
        matches!(
            (self, next),
            (
                SessionStatus::Connecting,
                SessionStatus::Connected | SessionStatus::Failed | SessionStatus::Closed
            ) | (
                SessionStatus::Connected,
                SessionStatus::Failed | SessionStatus::Closed
            ) | (SessionStatus::Idle, SessionStatus::Closed)
        )
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            SessionStatus::Idle => "idle",
            SessionStatus::Connecting => "connecting",
            SessionStatus::Connected => "connected",
            SessionStatus::Failed => "failed",
            SessionStatus::Closed => "closed",
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Notification for the subscriber, sent in the same critical section as
/// the state change it describes.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionEvent {
    pub key: SessionKey,
    /// Run number of the session that produced the event.
    pub run: u64,
    pub kind: SessionEventKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEventKind {
    Status {
        status: SessionStatus,
        error: Option<String>,
    },
    Snapshot(Arc<MetricsSnapshot>),
    ParseError(String),
    LogAppended {
        line: String,
        evicted: usize,
    },
    CredentialInvalidated,
}

pub type EventSender = mpsc::UnboundedSender<SessionEvent>;
pub type EventReceiver = mpsc::UnboundedReceiver<SessionEvent>;

/// Collaborators every session needs to open and report on a stream.
#[derive(Clone)]
pub struct SessionContext {
    connector: Arc<dyn StreamConnector>,
    auth: Arc<dyn AuthGate>,
    events: EventSender,
    runs: Arc<AtomicU64>,
}

impl SessionContext {
    #[must_use]
    pub fn new(
        connector: Arc<dyn StreamConnector>,
        auth: Arc<dyn AuthGate>,
        events: EventSender,
    ) -> Self {
        Self {
            connector,
            auth,
            events,
            runs: Arc::new(AtomicU64::new(0)),
        }
    }

    #[must_use]
    pub fn auth(&self) -> &Arc<dyn AuthGate> {
        &self.auth
    }

    /// Run numbers are unique across every session sharing this context,
    /// so a replaced session's events never collide with its successor's.
    fn next_run(&self) -> u64 {
        self.runs.fetch_add(1, Ordering::Relaxed).wrapping_add(1)
    }

    fn emit(&self, key: &SessionKey, run: u64, kind: SessionEventKind) {
        let event = SessionEvent {
            key: key.clone(),
            run,
            kind,
        };
        if self.events.send(event).is_err() {
            tracing::trace!("No subscriber for {} events", key);
        }
    }
}

impl fmt::Debug for SessionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionContext")
            .field("subscribed", &!self.events.is_closed())
            .finish_non_exhaustive()
    }
}

/// Snapshot of a session's externally visible lifecycle fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    pub key: SessionKey,
    pub status: SessionStatus,
    pub last_error: Option<StreamError>,
}
