use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use reqwest::header::{ACCEPT, CACHE_CONTROL, CONTENT_LENGTH, HeaderValue};
use reqwest::{Client, Response, StatusCode};
use url::Url;

use crate::config::ClientSettings;
use crate::error::{AppError, AppResult, StreamError};

use super::session::{SessionKey, SessionKind};

/// Raw body chunks of an open event stream.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, StreamError>> + Send>>;

const EVENT_STREAM: &str = "text/event-stream";
const NO_CACHE: &str = "no-cache";

/// Opens the long-lived transport behind a session.
#[async_trait]
pub trait StreamConnector: Send + Sync {
    /// Resolves once response headers arrive and the body is ready to read.
    ///
    /// # Errors
    ///
    /// Returns `Unauthorized` on 401, `Status` for any other non-2xx
    /// response, `MissingBody` when the server sent no body, and
    /// `Transport` when the connection could not be made. Body items may
    /// yield `Cancelled` when the transport is aborted externally; the
    /// session then closes without an error.
    async fn open(&self, key: &SessionKey, token: &str) -> Result<ByteStream, StreamError>;
}

/// Server-sent event transport over reqwest.
#[derive(Debug, Clone)]
pub struct HttpStreamConnector {
    client: Client,
    settings: ClientSettings,
}

impl HttpStreamConnector {
    /// Builds the streaming HTTP client. Only the connect phase is bounded
    /// by a timeout; an open stream may stay quiet indefinitely.
    ///
    /// # Errors
    ///
    /// Returns an error when the HTTP client cannot be constructed.
    pub fn new(settings: &ClientSettings) -> AppResult<Self> {
        let client = Client::builder()
            .connect_timeout(settings.connect_timeout)
            .build()
            .map_err(AppError::from)?;
        Ok(Self {
            client,
            settings: settings.clone(),
        })
    }

    /// Endpoint for `key`, with the credential as the `token` query
    /// parameter.
    ///
    /// # Errors
    ///
    /// Returns `InvalidEndpoint` when the base URL cannot carry a path.
    pub fn stream_url(&self, key: &SessionKey, token: &str) -> Result<Url, StreamError> {
        let id = key.id();
        let segments = match key.kind() {
            SessionKind::Metrics => vec!["loadtests", id, "metrics", "stream"],
            SessionKind::Log => vec!["loadtests", "pod", id, "logs", "stream"],
        };
        let mut url =
            self.settings
                .api_url(&segments)
                .ok_or_else(|| StreamError::InvalidEndpoint {
                    url: self.settings.base_url.to_string(),
                    message: "base URL cannot carry path segments".to_owned(),
                })?;
        url.query_pairs_mut().append_pair("token", token);
        Ok(url)
    }
}

#[async_trait]
impl StreamConnector for HttpStreamConnector {
    async fn open(&self, key: &SessionKey, token: &str) -> Result<ByteStream, StreamError> {
        let feed = key.kind().feed_label();
        let url = self.stream_url(key, token)?;
        tracing::debug!("Opening {} stream for {}", feed, key);

        let response = self
            .client
            .get(url)
            .header(ACCEPT, HeaderValue::from_static(EVENT_STREAM))
            .header(CACHE_CONTROL, HeaderValue::from_static(NO_CACHE))
            .send()
            .await
            .map_err(|err| transport_error(feed, err))?;

        let response = check_response(feed, response)?;
        let body = response
            .bytes_stream()
            .map(move |chunk| chunk.map_err(|err| transport_error(feed, err)));
        Ok(Box::pin(body))
    }
}

/// Maps the response head to the stream error taxonomy.
fn check_response(feed: &'static str, response: Response) -> Result<Response, StreamError> {
    let status = response.status();
    if status == StatusCode::UNAUTHORIZED {
        return Err(StreamError::Unauthorized);
    }
    if !status.is_success() {
        return Err(StreamError::Status {
            feed,
            status: status.as_u16(),
        });
    }
    let empty_length = response
        .headers()
        .get(CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.trim() == "0");
    if status == StatusCode::NO_CONTENT || empty_length {
        return Err(StreamError::MissingBody { feed });
    }
    Ok(response)
}

// The request URL carries the credential, so it never reaches the message.
fn transport_error(feed: &'static str, err: reqwest::Error) -> StreamError {
    StreamError::Transport {
        feed,
        message: err.without_url().to_string(),
    }
}
