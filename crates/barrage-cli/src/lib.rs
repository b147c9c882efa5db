//! Barrage CLI Library
//!
//! Command-line front end for the Barrage load testing engine: request
//! catalogs, test type selection, progress display, report files and
//! exit codes.

#![warn(missing_docs)]
#![allow(clippy::module_name_repetitions)]

pub mod catalog;
mod commands;
mod config;
mod error;
pub mod handlers;
pub mod logging;
mod output;
pub mod sink;

pub use catalog::{Catalog, CatalogRequest, RunTarget, ThresholdSpec};
pub use commands::{
    Cli, ColorArg, Commands, ListArgs, LogFormatArg, PlanArgs, PlanFormat, RunArgs,
};
pub use config::{CliConfig, ColorChoice, LogFormat, Verbosity};
pub use error::{CliError, CliResult, THRESHOLDS_FAILED_EXIT};
pub use output::ProgressReporter;
pub use sink::DirectorySink;
