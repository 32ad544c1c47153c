//! Core library for the `loadwatch` CLI.
//!
//! The centre of the crate is [`telemetry`]: a streaming client that keeps
//! one live metrics feed per load test and any number of independent
//! per-worker log tails, each over its own server-sent event stream, with
//! explicit cancellation and bounded log buffering. Around it sit a small
//! REST client ([`api`]), credential handling ([`auth`]), and the
//! configuration and CLI layers used by the binary.
pub mod api;
pub mod args;
pub mod auth;
pub mod config;
pub mod error;
pub mod shutdown;
pub mod telemetry;

mod app;
mod entry;
mod system;

pub use entry::run;
