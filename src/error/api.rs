use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Unauthorized: credential was rejected.")]
    Unauthorized,
    #[error("No credential available; sign in again.")]
    MissingCredential,
    #[error("HTTP {status}: Failed to {context}")]
    Status { context: &'static str, status: u16 },
    #[error("Request to {context} failed: {source}")]
    Request {
        context: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("Failed to decode {context} response: {source}")]
    Decode {
        context: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("Base URL '{url}' cannot carry API paths.")]
    InvalidEndpoint { url: String },
    #[error("Failed to build HTTP client: {source}")]
    BuildClient {
        #[source]
        source: reqwest::Error,
    },
}
