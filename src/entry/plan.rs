use std::sync::Arc;

use crate::app::{self, AppContext, output::Palette};
use crate::args::{Command, LoadwatchArgs};
use crate::auth::{AuthGate, TokenStore};
use crate::config::types::ConfigFile;
use crate::config::{resolve_settings, resolve_token};
use crate::error::AppResult;

pub(super) struct RunPlan {
    pub(super) command: Command,
    pub(super) ctx: AppContext,
    pub(super) verbose: bool,
    pub(super) no_color: bool,
}

pub(super) fn build_plan(args: LoadwatchArgs, config: Option<&ConfigFile>) -> AppResult<RunPlan> {
    let settings = resolve_settings(args.base_url.as_deref(), config)?;
    let token = resolve_token(args.token.as_deref(), config);
    let verbose = args.verbose || config.and_then(|config| config.verbose).unwrap_or(false);
    let no_color = args.no_color || config.and_then(|config| config.no_color).unwrap_or(false);

    Ok(RunPlan {
        command: args.command,
        ctx: AppContext {
            settings,
            auth: Arc::new(TokenStore::new(token)),
            palette: Palette::new(no_color),
        },
        verbose,
        no_color,
    })
}

pub(super) async fn execute_plan(plan: RunPlan) -> AppResult<()> {
    let RunPlan { command, ctx, .. } = plan;
    if ctx.auth.get().is_none() {
        tracing::warn!("No credential configured; set --token or LOADWATCH_TOKEN");
    }
    match command {
        Command::Tests(command) => app::run_tests_command(&command, &ctx).await,
        Command::Snapshot(args) => app::run_snapshot(&args, &ctx).await,
        Command::Watch(args) => app::run_watch(&args, &ctx).await,
    }
}
