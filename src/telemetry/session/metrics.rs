use std::sync::Arc;

use crate::error::{ParseError, StreamError};
use crate::telemetry::parser::MetricsDecoder;
use crate::telemetry::types::MetricsSnapshot;

use super::runner::{Feed, SessionRunner};
use super::{SessionContext, SessionEventKind, SessionInfo, SessionKey, SessionStatus};

#[derive(Debug, Default)]
pub(super) struct MetricsView {
    snapshot: Option<Arc<MetricsSnapshot>>,
    parse_error: Option<ParseError>,
    frames: u64,
}

pub(super) struct MetricsFeed;

impl Feed for MetricsFeed {
    type Decoder = MetricsDecoder;
    type View = MetricsView;

    // The last snapshot stays visible while a restarted stream connects.
    fn reset(view: &mut Self::View) {
        view.parse_error = None;
    }

    fn apply(view: &mut Self::View, frame: MetricsSnapshot) -> Option<SessionEventKind> {
        let snapshot = Arc::new(frame);
        view.snapshot = Some(Arc::clone(&snapshot));
        view.parse_error = None;
        view.frames = view.frames.saturating_add(1);
        Some(SessionEventKind::Snapshot(snapshot))
    }

    fn reject(view: &mut Self::View, err: ParseError) -> Option<SessionEventKind> {
        let message = err.to_string();
        view.parse_error = Some(err);
        Some(SessionEventKind::ParseError(message))
    }
}

/// Singleton live metrics feed for one test.
///
/// Every decoded frame replaces the held snapshot wholesale. A malformed
/// frame sets a transient parse indicator without touching the status.
pub struct MetricsSession {
    runner: SessionRunner<MetricsFeed>,
}

impl MetricsSession {
    #[must_use]
    pub fn new(test_id: impl Into<String>, ctx: SessionContext) -> Self {
        Self {
            runner: SessionRunner::new(SessionKey::metrics(test_id), ctx, MetricsView::default()),
        }
    }

    /// Opens the stream, replacing any transport already in flight.
    pub fn start(&mut self) {
        self.runner.start();
    }

    pub fn stop(&mut self) {
        self.runner.stop();
    }

    #[must_use]
    pub fn key(&self) -> &SessionKey {
        self.runner.key()
    }

    #[must_use]
    pub fn test_id(&self) -> &str {
        self.runner.key().id()
    }

    #[must_use]
    pub fn status(&self) -> SessionStatus {
        self.runner.status()
    }

    #[must_use]
    pub fn last_error(&self) -> Option<StreamError> {
        self.runner.last_error()
    }

    /// Run number of the current (or last) transport.
    #[must_use]
    pub fn run(&self) -> u64 {
        self.runner.run()
    }

    #[must_use]
    pub fn info(&self) -> SessionInfo {
        SessionInfo {
            key: self.key().clone(),
            status: self.status(),
            last_error: self.last_error(),
        }
    }

    #[must_use]
    pub fn snapshot(&self) -> Option<Arc<MetricsSnapshot>> {
        self.runner.with_view(|view| view.snapshot.clone())
    }

    #[must_use]
    pub fn parse_error(&self) -> Option<ParseError> {
        self.runner.with_view(|view| view.parse_error.clone())
    }

    /// Snapshots applied over the session's lifetime.
    #[must_use]
    pub fn frames_applied(&self) -> u64 {
        self.runner.with_view(|view| view.frames)
    }
}

impl std::fmt::Debug for MetricsSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsSession")
            .field("key", self.key())
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}
