//! Configuration loading and resolution of client settings.
mod loader;
mod parse;
mod settings;
pub mod types;


pub use loader::{DEFAULT_CONFIG_FILES, load_config, load_config_file};
pub use settings::{
    ClientSettings, DEFAULT_BASE_URL, DEFAULT_CONNECT_TIMEOUT, DEFAULT_REQUEST_TIMEOUT,
    parse_base_url, resolve_settings, resolve_token,
};

pub(crate) use parse::parse_duration_value;
