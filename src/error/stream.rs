use thiserror::Error;

/// Coarse classification used by subscribers to decide how to react.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Credential missing or rejected. Terminal; the owner should re-authenticate.
    Auth,
    /// Network failure, non-2xx status, or missing body. Terminal for the session.
    Transport,
    /// Transport torn down on purpose. Never shown to the user.
    Cancellation,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StreamError {
    #[error("Unauthorized: credential was rejected.")]
    Unauthorized,
    #[error("No credential available; sign in again.")]
    MissingCredential,
    #[error("HTTP {status}: Failed to connect to {feed} stream")]
    Status { feed: &'static str, status: u16 },
    #[error("No response body for {feed} stream")]
    MissingBody { feed: &'static str },
    #[error("{feed} stream error: {message}")]
    Transport { feed: &'static str, message: String },
    #[error("Invalid stream endpoint '{url}': {message}")]
    InvalidEndpoint { url: String, message: String },
    /// Returned by a connector whose transport was torn down from outside
    /// the session. The session closes without recording an error.
    #[error("Stream cancelled.")]
    Cancelled,
}

impl StreamError {
    #[must_use]
    pub const fn class(&self) -> ErrorClass {
        match self {
            StreamError::Unauthorized | StreamError::MissingCredential => ErrorClass::Auth,
            StreamError::Cancelled => ErrorClass::Cancellation,
            StreamError::Status { .. }
            | StreamError::MissingBody { .. }
            | StreamError::Transport { .. }
            | StreamError::InvalidEndpoint { .. } => ErrorClass::Transport,
        }
    }

    #[must_use]
    pub const fn is_cancellation(&self) -> bool {
        matches!(self.class(), ErrorClass::Cancellation)
    }

    #[must_use]
    pub const fn is_auth(&self) -> bool {
        matches!(self.class(), ErrorClass::Auth)
    }
}

/// A single metrics frame whose payload failed to decode.
///
/// Transient: recorded on the session and cleared by the next good frame.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Failed to parse live data: {message}")]
pub struct ParseError {
    message: String,
}

impl ParseError {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<serde_json::Error> for ParseError {
    fn from(err: serde_json::Error) -> Self {
        Self::new(err.to_string())
    }
}
