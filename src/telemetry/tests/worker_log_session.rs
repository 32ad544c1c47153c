use crate::error::StreamError;
use crate::telemetry::buffer::LOG_BUFFER_CAPACITY;
use crate::telemetry::session::{
    SessionContext, SessionEventKind, SessionStatus, WorkerLogSession,
};
use crate::telemetry::tests::support::{
    ScriptedConnector, drain_events, log_frame, settle, test_context, wait_until,
};

async fn connected(
    connector: &ScriptedConnector,
    ctx: SessionContext,
    worker_id: &str,
) -> Result<WorkerLogSession, String> {
    let mut session = WorkerLogSession::new(worker_id, ctx);
    session.start();
    wait_until("log connect", || session.status() == SessionStatus::Connected).await?;
    if connector.opened() == 0 {
        return Err("Expected an open transport".to_owned());
    }
    Ok(session)
}

#[tokio::test(flavor = "current_thread")]
async fn buffer_keeps_last_thousand_lines() -> Result<(), String> {
    let connector = ScriptedConnector::new();
    let (ctx, _auth, _events) = test_context(&connector);
    let session = connected(&connector, ctx, "w1").await?;

    // Several frames per chunk, with a frame split across chunk boundaries.
    let mut body = String::new();
    for idx in 1..=1002 {
        body.push_str(&log_frame(&format!("L{}", idx)));
    }
    for chunk in body.as_bytes().chunks(1500) {
        connector.send(0, chunk.to_vec());
    }
    wait_until("all lines", || session.appended() == 1002).await?;

    let lines = session.lines();
    let expected: Vec<String> = (3..=1002).map(|idx| format!("L{}", idx)).collect();
    if lines.len() != LOG_BUFFER_CAPACITY || lines != expected {
        return Err(format!(
            "Unexpected buffer: len={} first={:?} last={:?}",
            lines.len(),
            lines.first(),
            lines.last()
        ));
    }
    Ok(())
}

#[tokio::test(flavor = "current_thread")]
async fn short_feed_keeps_every_line_in_order() -> Result<(), String> {
    let connector = ScriptedConnector::new();
    let (ctx, _auth, mut events) = test_context(&connector);
    let session = connected(&connector, ctx, "w1").await?;

    connector.send(0, ": keep-alive\n\ndata: GET /a 200\n\ndata: GET /b 500\r\n\r\n");
    wait_until("two lines", || session.len() == 2).await?;

    if session.lines() != vec!["GET /a 200".to_owned(), "GET /b 500".to_owned()] {
        return Err(format!("Unexpected lines: {:?}", session.lines()));
    }
    let appended: Vec<String> = drain_events(&mut events)
        .into_iter()
        .filter_map(|event| match event.kind {
            SessionEventKind::LogAppended { line, evicted: 0 } => Some(line),
            _ => None,
        })
        .collect();
    if appended != session.lines() {
        return Err(format!("Subscriber saw {:?}", appended));
    }
    Ok(())
}

#[tokio::test(flavor = "current_thread")]
async fn frame_after_stop_leaves_buffer_untouched() -> Result<(), String> {
    let connector = ScriptedConnector::new();
    let (ctx, _auth, _events) = test_context(&connector);
    let mut session = connected(&connector, ctx, "w1").await?;
    connector.send(0, log_frame("first"));
    wait_until("first line", || session.len() == 1).await?;

    let before = session.lines();
    session.stop();
    connector.send(0, log_frame("late"));
    settle().await;

    if session.lines() != before {
        return Err(format!("Buffer changed after stop: {:?}", session.lines()));
    }
    if session.status() != SessionStatus::Closed {
        return Err(format!("Expected closed, got {}", session.status()));
    }
    Ok(())
}

#[tokio::test(flavor = "current_thread")]
async fn restart_begins_with_empty_buffer() -> Result<(), String> {
    let connector = ScriptedConnector::new();
    let (ctx, _auth, _events) = test_context(&connector);
    let mut session = connected(&connector, ctx, "w1").await?;
    connector.send(0, log_frame("old"));
    wait_until("old line", || session.len() == 1).await?;

    session.stop();
    session.start();
    if !session.is_empty() || session.appended() != 0 {
        return Err(format!("History survived restart: {:?}", session.lines()));
    }
    wait_until("second transport", || connector.opened() == 2).await?;
    wait_until("connected", || session.status() == SessionStatus::Connected).await?;
    connector.send(1, log_frame("new"));
    wait_until("new line", || session.len() == 1).await?;
    if session.last_line().as_deref() != Some("new") {
        return Err(format!("Unexpected lines: {:?}", session.lines()));
    }
    Ok(())
}

#[tokio::test(flavor = "current_thread")]
async fn one_worker_failing_leaves_siblings_running() -> Result<(), String> {
    let connector = ScriptedConnector::new();
    let (ctx, auth, _events) = test_context(&connector);
    let failing = connected(&connector, ctx.clone(), "w1").await?;
    let healthy = connected(&connector, ctx, "w2").await?;

    connector.send_error(
        0,
        StreamError::Transport {
            feed: "log",
            message: "connection reset".to_owned(),
        },
    );
    wait_until("w1 failure", || failing.status() == SessionStatus::Failed).await?;

    connector.send(1, log_frame("still here"));
    wait_until("w2 line", || healthy.len() == 1).await?;
    if healthy.status() != SessionStatus::Connected || healthy.last_error().is_some() {
        return Err(format!("Sibling affected: {}", healthy.status()));
    }
    if auth.invalidations() != 0 {
        return Err("Transport failure must not touch the credential".to_owned());
    }
    Ok(())
}

#[tokio::test(flavor = "current_thread")]
async fn blank_payloads_are_not_appended() -> Result<(), String> {
    let connector = ScriptedConnector::new();
    let (ctx, _auth, _events) = test_context(&connector);
    let session = connected(&connector, ctx, "w1").await?;

    connector.send(0, "data: \n\ndata:   \n\ndata: real\n\n");
    wait_until("one line", || session.len() == 1).await?;
    settle().await;
    if session.lines() != vec!["real".to_owned()] {
        return Err(format!("Unexpected lines: {:?}", session.lines()));
    }
    Ok(())
}

#[tokio::test(flavor = "current_thread")]
async fn dropping_session_tears_down_transport() -> Result<(), String> {
    let connector = ScriptedConnector::new();
    let (ctx, _auth, _events) = test_context(&connector);
    let session = connected(&connector, ctx, "w1").await?;
    drop(session);
    wait_until("transport teardown", || connector.live_streams() == 0).await?;
    Ok(())
}
