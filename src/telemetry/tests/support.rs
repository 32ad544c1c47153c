use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;

use crate::auth::{AuthGate, TokenStore};
use crate::error::StreamError;
use crate::telemetry::client::LiveTelemetry;
use crate::telemetry::session::{
    EventReceiver, SessionContext, SessionEvent, SessionEventKind, SessionKey,
};
use crate::telemetry::transport::{ByteStream, StreamConnector};

pub(crate) const TEST_TOKEN: &str = "test-token";
pub(crate) const WAIT_TIMEOUT: Duration = Duration::from_secs(2);
const POLL_INTERVAL: Duration = Duration::from_millis(1);

type Chunk = Result<Bytes, StreamError>;

struct Opened {
    key: SessionKey,
    token: String,
    tx: Option<mpsc::UnboundedSender<Chunk>>,
}

#[derive(Default)]
struct ScriptState {
    failures: VecDeque<StreamError>,
    opened: Vec<Opened>,
}

/// In-memory transport. Each `open` either pops a queued failure or hands
/// out a stream the test feeds chunk by chunk.
#[derive(Clone, Default)]
pub(crate) struct ScriptedConnector {
    state: Arc<Mutex<ScriptState>>,
    attempts: Arc<AtomicUsize>,
}

impl ScriptedConnector {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, ScriptState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The next `open` fails with `err` instead of streaming.
    pub(crate) fn fail_next_open(&self, err: StreamError) {
        self.state().failures.push_back(err);
    }

    /// Calls to `open`, including failed ones.
    pub(crate) fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Streams handed out so far.
    pub(crate) fn opened(&self) -> usize {
        self.state().opened.len()
    }

    /// Streams whose reader is still attached.
    pub(crate) fn live_streams(&self) -> usize {
        self.state()
            .opened
            .iter()
            .filter(|opened| opened.tx.as_ref().is_some_and(|tx| !tx.is_closed()))
            .count()
    }

    pub(crate) fn is_live(&self, idx: usize) -> bool {
        self.state()
            .opened
            .get(idx)
            .and_then(|opened| opened.tx.as_ref())
            .is_some_and(|tx| !tx.is_closed())
    }

    pub(crate) fn key(&self, idx: usize) -> Option<SessionKey> {
        self.state().opened.get(idx).map(|opened| opened.key.clone())
    }

    pub(crate) fn token(&self, idx: usize) -> Option<String> {
        self.state().opened.get(idx).map(|opened| opened.token.clone())
    }

    /// Queues raw bytes on stream `idx`. Returns `false` if the reader is gone.
    pub(crate) fn send(&self, idx: usize, chunk: impl Into<Bytes>) -> bool {
        self.push(idx, Ok(chunk.into()))
    }

    pub(crate) fn send_error(&self, idx: usize, err: StreamError) -> bool {
        self.push(idx, Err(err))
    }

    /// Ends stream `idx` gracefully.
    pub(crate) fn close(&self, idx: usize) {
        if let Some(opened) = self.state().opened.get_mut(idx) {
            opened.tx = None;
        }
    }

    fn push(&self, idx: usize, chunk: Chunk) -> bool {
        self.state()
            .opened
            .get(idx)
            .and_then(|opened| opened.tx.as_ref())
            .is_some_and(|tx| tx.send(chunk).is_ok())
    }
}

#[async_trait]
impl StreamConnector for ScriptedConnector {
    async fn open(&self, key: &SessionKey, token: &str) -> Result<ByteStream, StreamError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state();
        if let Some(err) = state.failures.pop_front() {
            return Err(err);
        }
        let (tx, rx) = mpsc::unbounded_channel::<Chunk>();
        state.opened.push(Opened {
            key: key.clone(),
            token: token.to_owned(),
            tx: Some(tx),
        });
        let stream = futures_util::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|chunk| (chunk, rx))
        });
        Ok(Box::pin(stream))
    }
}

pub(crate) fn test_context(
    connector: &ScriptedConnector,
) -> (SessionContext, Arc<TokenStore>, EventReceiver) {
    let auth = Arc::new(TokenStore::new(Some(TEST_TOKEN.to_owned())));
    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let gate: Arc<dyn AuthGate> = auth.clone();
    let ctx = SessionContext::new(Arc::new(connector.clone()), gate, events_tx);
    (ctx, auth, events_rx)
}

pub(crate) fn test_telemetry(
    connector: &ScriptedConnector,
    auth: &Arc<TokenStore>,
) -> (LiveTelemetry, EventReceiver) {
    let gate: Arc<dyn AuthGate> = auth.clone();
    LiveTelemetry::new(Arc::new(connector.clone()), gate)
}

pub(crate) fn signed_in() -> Arc<TokenStore> {
    Arc::new(TokenStore::new(Some(TEST_TOKEN.to_owned())))
}

/// Polls `cond` between scheduler turns until it holds.
pub(crate) async fn wait_until<F>(what: &str, mut cond: F) -> Result<(), String>
where
    F: FnMut() -> bool,
{
    tokio::time::timeout(WAIT_TIMEOUT, async {
        while !cond() {
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    })
    .await
    .map_err(|_| format!("Timed out waiting for {}", what))
}

/// Lets spawned read loops run for a few scheduler turns.
pub(crate) async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
    tokio::time::sleep(POLL_INTERVAL).await;
}

pub(crate) fn drain_events(events: &mut EventReceiver) -> Vec<SessionEvent> {
    let mut drained = Vec::new();
    while let Ok(event) = events.try_recv() {
        drained.push(event);
    }
    drained
}

pub(crate) fn count_invalidated(events: &[SessionEvent]) -> usize {
    events
        .iter()
        .filter(|event| matches!(event.kind, SessionEventKind::CredentialInvalidated))
        .count()
}

pub(crate) fn log_frame(line: &str) -> String {
    format!("data: {}\n\n", line)
}

pub(crate) fn metrics_frame(test_id: &str, total: u64) -> String {
    format!(
        concat!(
            "data: {{\"test_id\":\"{}\",\"timestamp\":\"2026-03-01T12:00:00Z\",",
            "\"workers\":[{{\"worker_id\":\"w1\",\"pod_name\":\"pod-w1\",",
            "\"total_requests\":{},\"successful_requests\":{},\"failed_requests\":0,",
            "\"avg_response_time\":0.02,\"last_update\":\"2026-03-01T12:00:00Z\"}}],",
            "\"summary\":{{\"total_requests\":{},\"successful_requests\":{},",
            "\"failed_requests\":0,\"overall_error_rate\":0.0,\"avg_response_time\":0.02,",
            "\"requests_per_second\":5.0,\"status_code_breakdown\":{{\"200\":{}}},",
            "\"active_workers\":1}}}}\n\n"
        ),
        test_id, total, total, total, total, total
    )
}
