//! CLI argument types and parsing helpers.
mod cli;
pub(crate) mod parsers;
mod types;


pub use cli::{Command, CreateArgs, LoadwatchArgs, SnapshotArgs, TestsCommand, WatchArgs};
pub use types::HttpMethod;
