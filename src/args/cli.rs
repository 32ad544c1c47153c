use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};

use crate::api::{CreateTestRequest, LoadTestConfig};

use super::parsers::{parse_duration_arg, parse_header};
use super::types::HttpMethod;

#[derive(Debug, Parser, Clone)]
#[clap(
    version,
    about = "Live telemetry client for a load-testing service - manage tests, fetch metrics, and stream live metrics and worker logs."
)]
pub struct LoadwatchArgs {
    #[command(subcommand)]
    pub command: Command,

    /// Path to config file (TOML/JSON). Defaults to ./loadwatch.toml or ./loadwatch.json if present.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Base URL of the load-testing service
    #[arg(long = "base-url", env = "LOADWATCH_BASE_URL", global = true)]
    pub base_url: Option<String>,

    /// Bearer credential for the service
    #[arg(long, env = "LOADWATCH_TOKEN", global = true, hide_env_values = true)]
    pub token: Option<String>,

    /// Enable verbose logging (sets log level to debug unless overridden by LOADWATCH_LOG/RUST_LOG)
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    /// Disable colored log output
    #[arg(long = "no-color", global = true)]
    pub no_color: bool,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// List, inspect, create, or stop load tests
    #[command(subcommand)]
    Tests(TestsCommand),
    /// Fetch one static metrics snapshot for a test
    Snapshot(SnapshotArgs),
    /// Stream live metrics (and optionally worker logs) for a running test
    Watch(WatchArgs),
}

#[derive(Debug, Subcommand, Clone)]
pub enum TestsCommand {
    /// List all load tests
    List,
    /// Show one load test
    Show {
        /// Test id
        id: String,
    },
    /// Stop a running load test
    Stop {
        /// Test id
        id: String,
    },
    /// Create and launch a load test
    Create(CreateArgs),
}

#[derive(Debug, Args, Clone)]
pub struct CreateArgs {
    /// Test name
    #[arg(long)]
    pub name: String,

    /// URL the workers send requests to
    #[arg(long = "target-url")]
    pub target_url: String,

    /// Test duration (supports ms/s/m/h)
    #[arg(long, default_value = "60s", value_parser = parse_duration_arg)]
    pub duration: Duration,

    /// Requests per second across all workers
    #[arg(long)]
    pub rps: u32,

    /// Maximum concurrent requests
    #[arg(long, default_value_t = 10)]
    pub concurrency: u32,

    /// Number of worker pods
    #[arg(long)]
    pub workers: u32,

    /// HTTP method used against the target
    #[arg(long, value_enum, default_value_t = HttpMethod::Get)]
    pub method: HttpMethod,

    /// Request header 'Key: Value' (repeatable)
    #[arg(long = "header", short = 'H', value_parser = parse_header)]
    pub headers: Vec<(String, String)>,

    /// Request body
    #[arg(long)]
    pub body: Option<String>,
}

impl CreateArgs {
    /// Builds the service request. Sub-second durations round up to one second.
    #[must_use]
    pub fn to_request(&self) -> CreateTestRequest {
        let headers: BTreeMap<String, String> = self.headers.iter().cloned().collect();
        CreateTestRequest {
            name: self.name.clone(),
            target_url: self.target_url.clone(),
            config: LoadTestConfig {
                duration: self.duration.as_secs().max(1),
                requests_per_sec: self.rps,
                max_concurrency: self.concurrency,
                worker_count: self.workers,
                http_method: self.method.as_str().to_owned(),
                headers: (!headers.is_empty()).then_some(headers),
                body: self.body.clone(),
            },
        }
    }
}

#[derive(Debug, Args, Clone)]
pub struct SnapshotArgs {
    /// Test id
    pub test_id: String,

    /// Print the raw snapshot as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args, Clone)]
pub struct WatchArgs {
    /// Test id
    pub test_id: String,

    /// Also tail this worker's logs (repeatable)
    #[arg(long = "worker", short = 'w')]
    pub workers: Vec<String>,

    /// Exit after this many metrics snapshots (at least 1)
    #[arg(long = "max-frames", value_parser = clap::value_parser!(u64).range(1..))]
    pub max_frames: Option<u64>,
}
