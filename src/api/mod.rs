//! Plain request/response calls to the load-testing service.
mod client;
pub mod types;

pub use client::ApiClient;
pub use types::{CreateTestRequest, LoadTest, LoadTestConfig, TestStatus};
