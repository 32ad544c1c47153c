use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TestStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl TestStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            TestStatus::Pending => "pending",
            TestStatus::Running => "running",
            TestStatus::Completed => "completed",
            TestStatus::Failed => "failed",
        }
    }

    /// Only running tests publish live telemetry.
    #[must_use]
    pub const fn is_live(self) -> bool {
        matches!(self, TestStatus::Running)
    }
}

impl fmt::Display for TestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct LoadTestConfig {
    /// Seconds.
    pub duration: u64,
    pub requests_per_sec: u32,
    pub max_concurrency: u32,
    pub worker_count: u32,
    pub http_method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct LoadTest {
    pub id: String,
    pub name: String,
    pub user_id: String,
    pub target_url: String,
    pub config: LoadTestConfig,
    pub status: TestStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

/// Body of `POST /api/v1/loadtests`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreateTestRequest {
    pub name: String,
    pub target_url: String,
    pub config: LoadTestConfig,
}

impl CreateTestRequest {
    /// Applies the checks the service enforces, so obvious mistakes fail
    /// before a round trip.
    ///
    /// # Errors
    ///
    /// Returns the first violated rule.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::MissingField { field: "name" });
        }
        if self.target_url.trim().is_empty() {
            return Err(ValidationError::MissingField {
                field: "target_url",
            });
        }
        if self.config.worker_count == 0 {
            return Err(ValidationError::MustBePositive {
                field: "worker_count",
            });
        }
        if self.config.requests_per_sec == 0 {
            return Err(ValidationError::MustBePositive {
                field: "requests_per_sec",
            });
        }
        Ok(())
    }
}
