use std::time::Duration;

use url::Url;

use crate::error::{AppError, AppResult, ConfigError};

use super::types::{ConfigFile, DurationValue};

pub const DEFAULT_BASE_URL: &str = "http://localhost:8080";
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const API_PREFIX: [&str; 2] = ["api", "v1"];

/// Where the load-testing service lives and how long to wait for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSettings {
    pub base_url: Url,
    pub connect_timeout: Duration,
    /// Applies to plain REST calls only; event streams have no total timeout.
    pub request_timeout: Duration,
}

impl ClientSettings {
    #[must_use]
    pub const fn new(base_url: Url) -> Self {
        Self {
            base_url,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// `{base}/api/v1/<segments..>`, each segment percent-encoded.
    ///
    /// Returns `None` when the base URL cannot carry a path.
    #[must_use]
    pub fn api_url(&self, segments: &[&str]) -> Option<Url> {
        let mut url = self.base_url.clone();
        url.set_query(None);
        url.set_fragment(None);
        url.path_segments_mut()
            .ok()?
            .pop_if_empty()
            .extend(API_PREFIX)
            .extend(segments);
        Some(url)
    }
}

/// Parses and checks a service base URL.
///
/// # Errors
///
/// Returns an error when the text is not a URL or cannot carry API paths.
pub fn parse_base_url(value: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(value.trim()).map_err(|err| ConfigError::InvalidBaseUrl {
        url: value.to_owned(),
        source: err,
    })?;
    if url.cannot_be_a_base() || !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::BaseUrlNotHierarchical {
            url: value.to_owned(),
        });
    }
    Ok(url)
}

/// Combines the command line (which already folded in the environment)
/// with the config file and defaults, in that order of precedence.
///
/// # Errors
///
/// Returns an error when the base URL or a timeout is invalid.
pub fn resolve_settings(
    cli_base_url: Option<&str>,
    config: Option<&ConfigFile>,
) -> AppResult<ClientSettings> {
    let base_url = cli_base_url
        .or_else(|| config.and_then(|config| config.base_url.as_deref()))
        .unwrap_or(DEFAULT_BASE_URL);
    let mut settings = ClientSettings::new(parse_base_url(base_url).map_err(AppError::config)?);

    if let Some(value) = config.and_then(|config| config.connect_timeout.as_ref()) {
        settings.connect_timeout = duration_field("connect_timeout", value)?;
    }
    if let Some(value) = config.and_then(|config| config.request_timeout.as_ref()) {
        settings.request_timeout = duration_field("request_timeout", value)?;
    }
    Ok(settings)
}

/// Command line (or `LOADWATCH_TOKEN`) first, then the config file.
/// Blank values count as absent.
#[must_use]
pub fn resolve_token(cli_token: Option<&str>, config: Option<&ConfigFile>) -> Option<String> {
    cli_token
        .filter(|token| !token.trim().is_empty())
        .or_else(|| {
            config
                .and_then(|config| config.token.as_deref())
                .filter(|token| !token.trim().is_empty())
        })
        .map(|token| token.trim().to_owned())
}

fn duration_field(field: &'static str, value: &DurationValue) -> AppResult<Duration> {
    value
        .to_duration()
        .map_err(|source| AppError::config(ConfigError::InvalidDuration { field, source }))
}
