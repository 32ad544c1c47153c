mod api;
mod app;
mod config;
mod stream;
mod validation;

#[cfg(test)]
mod test_support;

pub use api::ApiError;
pub use app::{AppError, AppResult};
pub use config::ConfigError;
pub use stream::{ErrorClass, ParseError, StreamError};
pub use validation::ValidationError;
