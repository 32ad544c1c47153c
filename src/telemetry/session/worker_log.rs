use tracing::debug;

use crate::error::{ParseError, StreamError};
use crate::telemetry::buffer::LogBuffer;
use crate::telemetry::parser::LogLineDecoder;

use super::runner::{Feed, SessionRunner};
use super::{SessionContext, SessionEventKind, SessionInfo, SessionKey, SessionStatus};

pub(super) struct LogFeed;

impl Feed for LogFeed {
    type Decoder = LogLineDecoder;
    type View = LogBuffer;

    // History is not carried across a stop/start pair.
    fn reset(view: &mut Self::View) {
        view.clear();
    }

    fn apply(view: &mut Self::View, line: String) -> Option<SessionEventKind> {
        let evicted = view.push(line.clone());
        Some(SessionEventKind::LogAppended { line, evicted })
    }

    fn reject(view: &mut Self::View, err: ParseError) -> Option<SessionEventKind> {
        debug!("Skipping log frame for {}: {}", view.worker_id(), err);
        None
    }
}

/// Log tail for one worker, independent of every other session.
pub struct WorkerLogSession {
    runner: SessionRunner<LogFeed>,
}

impl WorkerLogSession {
    #[must_use]
    pub fn new(worker_id: impl Into<String>, ctx: SessionContext) -> Self {
        let worker_id = worker_id.into();
        let buffer = LogBuffer::new(worker_id.clone());
        Self {
            runner: SessionRunner::new(SessionKey::worker_log(worker_id), ctx, buffer),
        }
    }

    /// Opens the stream with an empty buffer, replacing any transport
    /// already in flight.
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
    pub fn worker_id(&self) -> &str {
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
    pub fn lines(&self) -> Vec<String> {
        self.runner.with_view(LogBuffer::to_vec)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.runner.with_view(LogBuffer::len)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.runner.with_view(LogBuffer::is_empty)
    }

    #[must_use]
    pub fn last_line(&self) -> Option<String> {
        self.runner
            .with_view(|buffer| buffer.last().map(str::to_owned))
    }

    /// Lines received since the last start, including evicted ones.
    #[must_use]
    pub fn appended(&self) -> u64 {
        self.runner.with_view(LogBuffer::appended)
    }
}

impl std::fmt::Debug for WorkerLogSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerLogSession")
            .field("key", self.key())
            .field("status", &self.status())
            .field("lines", &self.len())
            .finish_non_exhaustive()
    }
}
