use std::sync::Arc;

use crate::api::ApiClient;
use crate::args::WatchArgs;
use crate::auth::AuthGate;
use crate::error::{ApiError, AppError, AppResult, ValidationError};
use crate::shutdown::{ShutdownSender, shutdown_channel};
use crate::system::shutdown_handlers::setup_signal_shutdown_handler;
use crate::telemetry::{
    HttpStreamConnector, LiveTelemetry, SessionEventKind, SessionStatus, StreamConnector,
};

use super::AppContext;
use super::output::{self, Palette};

/// Why a watch ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WatchOutcome {
    /// Every session reached a terminal state on its own.
    Finished { failed: usize },
    FrameLimit,
    Interrupted,
    CredentialInvalidated,
}

impl WatchOutcome {
    fn into_result(self) -> AppResult<()> {
        match self {
            WatchOutcome::Finished { failed: 0 }
            | WatchOutcome::FrameLimit
            | WatchOutcome::Interrupted => Ok(()),
            WatchOutcome::Finished { failed } => Err(AppError::validation(
                ValidationError::SessionsFailed { count: failed },
            )),
            WatchOutcome::CredentialInvalidated => {
                Err(AppError::validation(ValidationError::CredentialInvalidated))
            }
        }
    }
}

pub(crate) async fn run_watch(args: &WatchArgs, ctx: &AppContext) -> AppResult<()> {
    let api = ApiClient::new(&ctx.settings, ctx.auth.clone())?;
    print_static_snapshot(&api, &args.test_id).await?;

    let connector = Arc::new(HttpStreamConnector::new(&ctx.settings)?);
    let (shutdown_tx, _) = shutdown_channel();
    let signal_handle = setup_signal_shutdown_handler(&shutdown_tx);

    let mut print = |line: String| println!("{}", line);
    let outcome = watch_sessions(
        args,
        connector,
        ctx.auth.clone(),
        ctx.palette,
        &shutdown_tx,
        &mut print,
    )
    .await;
    tracing::debug!("Watch ended: {:?}", outcome);

    drop(shutdown_tx.send(()));
    signal_handle.await?;
    outcome.into_result()
}

/// Shows the last stored snapshot while the live feed connects. Only a
/// rejected credential is fatal; anything else is logged and the watch
/// goes on to the stream.
async fn print_static_snapshot(api: &ApiClient, test_id: &str) -> AppResult<()> {
    match api.get_metrics_snapshot(test_id).await {
        Ok(snapshot) => {
            println!("{}", output::summary_line(&snapshot));
            Ok(())
        }
        Err(AppError::Api(ApiError::Unauthorized)) => {
            Err(AppError::validation(ValidationError::CredentialInvalidated))
        }
        Err(err) => {
            tracing::warn!("No stored snapshot for {}: {}", test_id, err);
            Ok(())
        }
    }
}

/// Streams until every session is terminal, the frame limit is hit,
/// shutdown is broadcast, or the credential is rejected. All sessions are
/// stopped before this returns.
pub(crate) async fn watch_sessions(
    args: &WatchArgs,
    connector: Arc<dyn StreamConnector>,
    auth: Arc<dyn AuthGate>,
    palette: Palette,
    shutdown_tx: &ShutdownSender,
    print: &mut dyn FnMut(String),
) -> WatchOutcome {
    let mut shutdown_rx = shutdown_tx.subscribe();
    let (mut telemetry, mut events) = LiveTelemetry::new(connector, auth);

    telemetry.start_metrics(&args.test_id);
    for worker_id in &args.workers {
        telemetry.start_worker_log(worker_id);
    }

    let mut frames = 0u64;
    let outcome = loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break WatchOutcome::Interrupted,
            event = events.recv() => {
                let Some(event) = event else {
                    break finished(&telemetry);
                };
                match event.kind {
                    SessionEventKind::Snapshot(snapshot) => {
                        print(output::summary_line(&snapshot));
                        frames = frames.saturating_add(1);
                        if args.max_frames.is_some_and(|max| frames >= max) {
                            break WatchOutcome::FrameLimit;
                        }
                    }
                    SessionEventKind::LogAppended { line, .. } => {
                        print(output::log_line(event.key.id(), &line, palette));
                    }
                    SessionEventKind::ParseError(message) => {
                        tracing::warn!("{}: {}", event.key, message);
                    }
                    SessionEventKind::CredentialInvalidated => {
                        break WatchOutcome::CredentialInvalidated;
                    }
                    SessionEventKind::Status { status, error } => {
                        if status != SessionStatus::Connecting {
                            print(output::status_line(
                                &event.key,
                                status,
                                error.as_deref(),
                                palette,
                            ));
                        }
                        if status.is_terminal() && telemetry.all_terminal() {
                            break finished(&telemetry);
                        }
                    }
                }
            }
        }
    };

    telemetry.stop_all();
    outcome
}

/// Outcome once no session is live. A rejected credential wins over a
/// plain failure count; `last_error` is set before the terminal status is
/// published, so it is already visible here.
fn finished(telemetry: &LiveTelemetry) -> WatchOutcome {
    let mut failed = 0usize;
    for session in telemetry.registry().sessions() {
        if session.status() != SessionStatus::Failed {
            continue;
        }
        if session.last_error().is_some_and(|err| err.is_auth()) {
            return WatchOutcome::CredentialInvalidated;
        }
        failed = failed.saturating_add(1);
    }
    WatchOutcome::Finished { failed }
}
