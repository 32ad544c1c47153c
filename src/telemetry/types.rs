use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Full aggregate metrics document pushed on every metrics frame.
///
/// Always replaces the previously held snapshot; never merged.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct MetricsSnapshot {
    pub test_id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub workers: Vec<Worker>,
    pub summary: Summary,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Worker {
    pub worker_id: String,
    pub pod_name: String,
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    /// Seconds.
    #[serde(rename = "avg_response_time")]
    pub avg_response_time_secs: f64,
    pub last_update: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Summary {
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub overall_error_rate: f64,
    /// Seconds.
    #[serde(rename = "avg_response_time")]
    pub avg_response_time_secs: f64,
    pub requests_per_second: f64,
    #[serde(default)]
    pub status_code_breakdown: StatusCodeBreakdown,
    pub active_workers: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct StatusCodeBreakdown {
    #[serde(rename = "200", default)]
    pub ok: u64,
    #[serde(rename = "400", default)]
    pub client_error: u64,
    #[serde(rename = "500", default)]
    pub server_error: u64,
    #[serde(default)]
    pub other: u64,
}

impl StatusCodeBreakdown {
    #[must_use]
    pub const fn total(&self) -> u64 {
        self.ok
            .saturating_add(self.client_error)
            .saturating_add(self.server_error)
            .saturating_add(self.other)
    }
}

impl MetricsSnapshot {
    #[must_use]
    pub fn worker(&self, worker_id: &str) -> Option<&Worker> {
        self.workers
            .iter()
            .find(|worker| worker.worker_id == worker_id)
    }
}

impl Summary {
    /// Average response time in whole milliseconds, as shown on the dashboard.
    #[must_use]
    pub fn avg_response_time_ms(&self) -> u64 {
        secs_to_ms(self.avg_response_time_secs)
    }
}

impl Worker {
    #[must_use]
    pub fn avg_response_time_ms(&self) -> u64 {
        secs_to_ms(self.avg_response_time_secs)
    }
}

const MICROS_PER_MILLI: u128 = 1_000;
const HALF_MILLI_MICROS: u128 = 500;

/// Rounded to the nearest millisecond. Negative and NaN read as zero.
fn secs_to_ms(secs: f64) -> u64 {
    match Duration::try_from_secs_f64(secs) {
        Ok(duration) => {
            let millis = duration
                .as_micros()
                .saturating_add(HALF_MILLI_MICROS)
                .checked_div(MICROS_PER_MILLI)
                .unwrap_or_default();
            u64::try_from(millis).unwrap_or(u64::MAX)
        }
        Err(_) if secs.is_finite() && secs > 0.0 => u64::MAX,
        Err(_) => 0,
    }
}
