mod plan;

use std::ffi::OsString;

use clap::{CommandFactory, FromArgMatches};

use crate::args::LoadwatchArgs;
use crate::config::load_config;
use crate::error::{AppError, AppResult, ValidationError};
use plan::{build_plan, execute_plan};

/// Binary entry point: parse, load config, start logging, run the command.
///
/// # Errors
///
/// Returns the first error from argument parsing, configuration, or the
/// selected command.
pub fn run() -> AppResult<()> {
    let Some(args) = parse_args()? else {
        return Ok(());
    };

    let config = load_config(args.config.as_deref())?;
    let plan = build_plan(args, config.as_ref())?;

    crate::system::logger::init_logging(plan.verbose, plan.no_color);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|source| AppError::validation(ValidationError::RuntimeBuildFailed { source }))?;

    runtime.block_on(execute_plan(plan))
}

fn parse_args() -> AppResult<Option<LoadwatchArgs>> {
    let mut cmd = LoadwatchArgs::command();
    let raw_args: Vec<OsString> = std::env::args_os().collect();

    if matches!(raw_args.as_slice(), [] | [_]) {
        cmd.print_help()?;
        println!();
        return Ok(None);
    }

    let matches = cmd.get_matches_from(raw_args);
    Ok(Some(LoadwatchArgs::from_arg_matches(&matches)?))
}
