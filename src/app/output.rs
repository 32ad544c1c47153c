use std::io::IsTerminal;

use crossterm::style::{Color, Stylize};

use crate::api::{LoadTest, TestStatus};
use crate::telemetry::{MetricsSnapshot, SessionKey, SessionStatus};

/// Colors only when asked to and stdout is a terminal.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Palette {
    enabled: bool,
}

impl Palette {
    pub(crate) fn new(no_color: bool) -> Self {
        Self {
            enabled: !no_color && std::io::stdout().is_terminal(),
        }
    }

    #[cfg(test)]
    pub(crate) const fn plain() -> Self {
        Self { enabled: false }
    }

    fn paint(self, text: &str, color: Color) -> String {
        if self.enabled {
            text.with(color).to_string()
        } else {
            text.to_owned()
        }
    }

    fn test_status(self, status: TestStatus) -> String {
        let color = match status {
            TestStatus::Pending => Color::Yellow,
            TestStatus::Running => Color::Cyan,
            TestStatus::Completed => Color::Green,
            TestStatus::Failed => Color::Red,
        };
        self.paint(status.as_str(), color)
    }

    fn session_status(self, status: SessionStatus) -> String {
        let color = match status {
            SessionStatus::Idle | SessionStatus::Connecting => Color::Yellow,
            SessionStatus::Connected => Color::Green,
            SessionStatus::Failed => Color::Red,
            SessionStatus::Closed => Color::Grey,
        };
        self.paint(status.as_str(), color)
    }
}

pub(crate) fn test_list_lines(tests: &[LoadTest], palette: Palette) -> Vec<String> {
    if tests.is_empty() {
        return vec!["No load tests found.".to_owned()];
    }
    tests
        .iter()
        .map(|test| {
            format!(
                "{}  {:<9}  {}  {}",
                test.id,
                palette.test_status(test.status),
                test.name,
                test.target_url
            )
        })
        .collect()
}

pub(crate) fn test_detail_lines(test: &LoadTest, palette: Palette) -> Vec<String> {
    let config = &test.config;
    let mut lines = vec![
        format!("id: {}", test.id),
        format!("name: {}", test.name),
        format!("status: {}", palette.test_status(test.status)),
        format!("target_url: {}", test.target_url),
        format!("method: {}", config.http_method),
        format!("duration_s: {}", config.duration),
        format!("requests_per_sec: {}", config.requests_per_sec),
        format!("max_concurrency: {}", config.max_concurrency),
        format!("worker_count: {}", config.worker_count),
        format!("created_at: {}", test.created_at.to_rfc3339()),
        format!(
            "completed_at: {}",
            test.completed_at
                .map_or_else(|| "none".to_owned(), |at| at.to_rfc3339())
        ),
    ];
    if let Some(headers) = config.headers.as_ref() {
        for (name, value) in headers {
            lines.push(format!("header: {}: {}", name, value));
        }
    }
    lines
}

/// One line per snapshot, printed as frames arrive.
pub(crate) fn summary_line(snapshot: &MetricsSnapshot) -> String {
    let summary = &snapshot.summary;
    format!(
        "[{}] total={} ok={} failed={} err={:.2}% avg={}ms rps={:.1} workers={}",
        snapshot.timestamp.format("%H:%M:%S"),
        summary.total_requests,
        summary.successful_requests,
        summary.failed_requests,
        summary.overall_error_rate,
        summary.avg_response_time_ms(),
        summary.requests_per_second,
        summary.active_workers
    )
}

pub(crate) fn snapshot_lines(snapshot: &MetricsSnapshot) -> Vec<String> {
    let summary = &snapshot.summary;
    let codes = &summary.status_code_breakdown;
    let mut lines = vec![
        format!("test_id: {}", snapshot.test_id),
        format!("timestamp: {}", snapshot.timestamp.to_rfc3339()),
        format!("total_requests: {}", summary.total_requests),
        format!("successful_requests: {}", summary.successful_requests),
        format!("failed_requests: {}", summary.failed_requests),
        format!("error_rate: {:.2}%", summary.overall_error_rate),
        format!("avg_response_time_ms: {}", summary.avg_response_time_ms()),
        format!("requests_per_second: {:.1}", summary.requests_per_second),
        format!(
            "status_codes: 200={} 400={} 500={} other={}",
            codes.ok, codes.client_error, codes.server_error, codes.other
        ),
        format!("active_workers: {}", summary.active_workers),
    ];
    for worker in &snapshot.workers {
        lines.push(format!(
            "worker {} ({}): total={} ok={} failed={} avg={}ms",
            worker.worker_id,
            worker.pod_name,
            worker.total_requests,
            worker.successful_requests,
            worker.failed_requests,
            worker.avg_response_time_ms()
        ));
    }
    lines
}

pub(crate) fn log_line(worker_id: &str, line: &str, palette: Palette) -> String {
    format!(
        "{} {}",
        palette.paint(&format!("[{}]", worker_id), Color::Cyan),
        line
    )
}

pub(crate) fn status_line(
    key: &SessionKey,
    status: SessionStatus,
    error: Option<&str>,
    palette: Palette,
) -> String {
    match error {
        Some(error) => format!("{} {}: {}", key, palette.session_status(status), error),
        None => format!("{} {}", key, palette.session_status(status)),
    }
}
