//! Tracing subscriber setup.
//!
//! `RUST_LOG` wins when set; otherwise the filter follows `-q`/`-v`.
//! Logs always go to stderr so stdout carries only the summary.

use crate::config::{LogFormat, Verbosity};
use crate::error::{CliError, CliResult};
use tracing_subscriber::EnvFilter;

/// Build the filter for a verbosity level
pub fn env_filter(verbosity: Verbosity) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(verbosity.log_directive()))
}

/// Install the global subscriber
pub fn init(verbosity: Verbosity, format: LogFormat) -> CliResult<()> {
    let filter = env_filter(verbosity);
    let installed = match format {
        LogFormat::Text => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init(),
    };
    installed.map_err(|e| CliError::config(format!("failed to initialize logging: {e}")))
}
