mod manage;
pub(crate) mod output;
mod snapshot;
mod watch;

use std::sync::Arc;

use crate::auth::TokenStore;
use crate::config::ClientSettings;

pub(crate) use manage::run_tests_command;
pub(crate) use snapshot::run_snapshot;
pub(crate) use watch::run_watch;

/// Resolved settings shared by every command.
#[derive(Debug, Clone)]
pub(crate) struct AppContext {
    pub settings: ClientSettings,
    pub auth: Arc<TokenStore>,
    pub palette: output::Palette,
}

fn print_lines(lines: &[String]) {
    for line in lines {
        println!("{}", line);
    }
}
