use std::time::Duration;

use serde::Deserialize;

use crate::error::ValidationError;

/// Contents of `loadwatch.toml` / `loadwatch.json`. Every field is optional.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct ConfigFile {
    pub base_url: Option<String>,
    pub token: Option<String>,
    pub connect_timeout: Option<DurationValue>,
    pub request_timeout: Option<DurationValue>,
    pub no_color: Option<bool>,
    pub verbose: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum DurationValue {
    Seconds(u64),
    Text(String),
}

impl DurationValue {
    pub(crate) fn to_duration(&self) -> Result<Duration, ValidationError> {
        match self {
            DurationValue::Seconds(0) => Err(ValidationError::DurationZero),
            DurationValue::Seconds(secs) => Ok(Duration::from_secs(*secs)),
            DurationValue::Text(text) => super::parse_duration_value(text),
        }
    }
}
