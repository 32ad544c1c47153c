use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures_util::StreamExt;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::error::{ParseError, StreamError};
use crate::telemetry::parser::{DecodedFrame, EventFrameParser, FrameDecoder};

use super::{SessionContext, SessionEventKind, SessionKey, SessionStatus};

/// What a session kind does with decoded frames.
pub(super) trait Feed: Send + 'static {
    type Decoder: FrameDecoder<Frame: Send> + Default + Send + 'static;
    type View: Send + 'static;

    /// Prepares the view for a fresh run.
    fn reset(view: &mut Self::View);

    fn apply(
        view: &mut Self::View,
        frame: <Self::Decoder as FrameDecoder>::Frame,
    ) -> Option<SessionEventKind>;

    fn reject(view: &mut Self::View, err: ParseError) -> Option<SessionEventKind>;
}

pub(super) struct SessionState<V> {
    pub(super) status: SessionStatus,
    pub(super) last_error: Option<StreamError>,
    /// Replaced by every `start()` and `stop()`; a read loop may only touch
    /// state while the run it was spawned for is still current.
    pub(super) run: u64,
    pub(super) view: V,
}

type SharedState<V> = Arc<Mutex<SessionState<V>>>;

fn lock<V>(state: &Mutex<SessionState<V>>) -> MutexGuard<'_, SessionState<V>> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Lifecycle shared by metrics and worker log sessions. Owns its
/// transport task exclusively.
pub(super) struct SessionRunner<F: Feed> {
    key: SessionKey,
    ctx: SessionContext,
    state: SharedState<F::View>,
    task: Option<JoinHandle<()>>,
}

impl<F: Feed> SessionRunner<F> {
    pub(super) fn new(key: SessionKey, ctx: SessionContext, view: F::View) -> Self {
        Self {
            key,
            ctx,
            state: Arc::new(Mutex::new(SessionState {
                status: SessionStatus::Idle,
                last_error: None,
                run: 0,
                view,
            })),
            task: None,
        }
    }

    pub(super) fn key(&self) -> &SessionKey {
        &self.key
    }

    pub(super) fn status(&self) -> SessionStatus {
        lock(&self.state).status
    }

    pub(super) fn last_error(&self) -> Option<StreamError> {
        lock(&self.state).last_error.clone()
    }

    pub(super) fn run(&self) -> u64 {
        lock(&self.state).run
    }

    pub(super) fn with_view<R>(&self, read: impl FnOnce(&F::View) -> R) -> R {
        read(&lock(&self.state).view)
    }

    /// Cancels any current transport, then opens a new one with the
    /// credential the auth gate holds right now.
    pub(super) fn start(&mut self) {
        if self.abort_task() {
            debug!("Replacing in-flight transport for {}", self.key);
        }

        let token = self.ctx.auth.get();
        let runtime = tokio::runtime::Handle::try_current();
        let failure = match (&token, &runtime) {
            (None, _) => Some(StreamError::MissingCredential),
            (Some(_), Err(err)) => Some(StreamError::Transport {
                feed: self.key.kind().feed_label(),
                message: format!("no async runtime: {}", err),
            }),
            (Some(_), Ok(_)) => None,
        };

        let run = {
            let mut state = lock(&self.state);
            state.run = self.ctx.next_run();
            F::reset(&mut state.view);
            state.last_error = failure.clone();
            state.status = if failure.is_some() {
                SessionStatus::Failed
            } else {
                SessionStatus::Connecting
            };
            self.ctx.emit(
                &self.key,
                state.run,
                SessionEventKind::Status {
                    status: state.status,
                    error: failure.as_ref().map(ToString::to_string),
                },
            );
            if failure.as_ref().is_some_and(StreamError::is_auth) {
                self.ctx
                    .emit(&self.key, state.run, SessionEventKind::CredentialInvalidated);
            }
            state.run
        };

        let (Some(token), Ok(runtime)) = (token, runtime) else {
            if failure.as_ref().is_some_and(StreamError::is_auth) {
                warn!("No credential for {}; not opening stream", self.key);
                self.ctx.auth.invalidate();
            } else {
                warn!("Cannot start {} outside an async runtime", self.key);
            }
            return;
        };

        info!("Starting {} (run {})", self.key, run);
        self.task = Some(runtime.spawn(read_stream::<F>(
            self.key.clone(),
            self.ctx.clone(),
            Arc::clone(&self.state),
            run,
            token,
        )));
    }

    /// Idempotent. After this returns, nothing the old transport delivers
    /// is applied.
    pub(super) fn stop(&mut self) {
        {
            let mut state = lock(&self.state);
            state.run = self.ctx.next_run();
            if !state.status.is_terminal() {
                state.status = SessionStatus::Closed;
                self.ctx.emit(
                    &self.key,
                    state.run,
                    SessionEventKind::Status {
                        status: SessionStatus::Closed,
                        error: None,
                    },
                );
                info!("Stopped {}", self.key);
            }
        }
        if self.abort_task() {
            debug!("Cancelled transport for {}", self.key);
        }
    }

    fn abort_task(&mut self) -> bool {
        match self.task.take() {
            Some(task) => {
                task.abort();
                true
            }
            None => false,
        }
    }
}

impl<F: Feed> Drop for SessionRunner<F> {
    fn drop(&mut self) {
        {
            let mut state = lock(&self.state);
            state.run = self.ctx.next_run();
        }
        self.abort_task();
    }
}

async fn read_stream<F: Feed>(
    key: SessionKey,
    ctx: SessionContext,
    state: SharedState<F::View>,
    run: u64,
    token: String,
) {
    let mut body = match ctx.connector.open(&key, &token).await {
        Ok(body) => body,
        Err(err) => {
            settle_failure(&key, &ctx, &state, run, err);
            return;
        }
    };
    if !mark_connected(&key, &ctx, &state, run) {
        return;
    }
    info!("{} stream connected", key);

    let mut parser = EventFrameParser::new(F::Decoder::default());
    while let Some(chunk) = body.next().await {
        let bytes = match chunk {
            Ok(bytes) => bytes,
            Err(err) => {
                settle_failure(&key, &ctx, &state, run, err);
                return;
            }
        };
        let frames = parser.feed(&bytes);
        if !apply_frames::<F>(&key, &ctx, &state, run, frames) {
            trace!("Read loop for {} observed cancellation", key);
            return;
        }
    }

    let dropped = parser.finish();
    if dropped > 0 {
        debug!("{} stream ended with {} unterminated bytes", key, dropped);
    }
    settle_end(&key, &ctx, &state, run);
}

fn mark_connected<V>(
    key: &SessionKey,
    ctx: &SessionContext,
    state: &Mutex<SessionState<V>>,
    run: u64,
) -> bool {
    let mut state = lock(state);
    if state.run != run || !state.status.can_advance_to(SessionStatus::Connected) {
        return false;
    }
    state.status = SessionStatus::Connected;
    ctx.emit(
        key,
        run,
        SessionEventKind::Status {
            status: SessionStatus::Connected,
            error: None,
        },
    );
    true
}

/// Applies a batch of frames under one lock. Returns `false` once the run
/// is no longer current, in which case nothing was applied.
pub(super) fn apply_frames<F: Feed>(
    key: &SessionKey,
    ctx: &SessionContext,
    state: &Mutex<SessionState<F::View>>,
    run: u64,
    frames: Vec<DecodedFrame<F::Decoder>>,
) -> bool {
    let mut state = lock(state);
    if state.run != run || state.status != SessionStatus::Connected {
        return false;
    }
    for frame in frames {
        let event = match frame {
            Ok(frame) => F::apply(&mut state.view, frame),
            Err(err) => {
                warn!("{}: {}", key, err);
                F::reject(&mut state.view, err)
            }
        };
        if let Some(kind) = event {
            ctx.emit(key, run, kind);
        }
    }
    true
}

fn settle_end<V>(key: &SessionKey, ctx: &SessionContext, state: &Mutex<SessionState<V>>, run: u64) {
    let mut state = lock(state);
    if state.run != run || !state.status.can_advance_to(SessionStatus::Closed) {
        return;
    }
    state.status = SessionStatus::Closed;
    ctx.emit(
        key,
        run,
        SessionEventKind::Status {
            status: SessionStatus::Closed,
            error: None,
        },
    );
    info!("{} stream ended", key);
}

fn settle_failure<V>(
    key: &SessionKey,
    ctx: &SessionContext,
    state: &Mutex<SessionState<V>>,
    run: u64,
    err: StreamError,
) {
    let invalidate = {
        let mut guard = lock(state);
        if guard.run != run {
            debug!("Discarding error from cancelled {} run: {}", key, err);
            return;
        }
        if err.is_cancellation() {
            drop(guard);
            debug!("{} transport reported cancellation", key);
            settle_end(key, ctx, state, run);
            return;
        }
        if !guard.status.can_advance_to(SessionStatus::Failed) {
            return;
        }
        guard.status = SessionStatus::Failed;
        guard.last_error = Some(err.clone());
        ctx.emit(
            key,
            run,
            SessionEventKind::Status {
                status: SessionStatus::Failed,
                error: Some(err.to_string()),
            },
        );
        if err.is_auth() {
            ctx.emit(key, run, SessionEventKind::CredentialInvalidated);
        }
        err.is_auth()
    };

    if invalidate {
        warn!("{} rejected the credential; invalidating it", key);
        ctx.auth.invalidate();
    } else {
        warn!("{} failed: {}", key, err);
    }
}
