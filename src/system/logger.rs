use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Filter sources in order of precedence.
const LOG_ENV_VARS: [&str; 2] = ["LOADWATCH_LOG", "RUST_LOG"];

pub(crate) fn init_logging(verbose: bool, no_color: bool) {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(build_filter(verbose))
        .with_ansi(!no_color)
        .with_writer(std::io::stderr)
        .finish();

    if let Err(err) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set global default subscriber: {}", err);
    }
}

fn build_filter(verbose: bool) -> EnvFilter {
    let default_level = if verbose { "debug" } else { "info" };
    LOG_ENV_VARS
        .iter()
        .find_map(|name| std::env::var(name).ok())
        .map_or_else(
            || EnvFilter::new(default_level),
            |value| EnvFilter::try_new(value).unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_logging_is_idempotent() {
        init_logging(false, true);
        init_logging(true, true);
    }
}
