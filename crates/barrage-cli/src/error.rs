//! Error types for the CLI

use std::process::ExitCode;
use thiserror::Error;

/// Exit status when a run completed but a threshold did not hold
pub const THRESHOLDS_FAILED_EXIT: u8 = 99;

/// Exit status after a second interrupt abandoned the drain
pub const INTERRUPTED_EXIT: u8 = 130;

/// Result type for CLI operations
pub type CliResult<T> = Result<T, CliError>;

/// Errors that can occur in the CLI
#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration error
    #[error("Configuration error: {message}")]
    Config {
        /// Error message
        message: String,
    },

    /// A run could not complete normally
    #[error("Run failed: {message}")]
    Run {
        /// Error message
        message: String,
    },

    /// Interrupted again while draining; in-flight requests were abandoned
    #[error("interrupted twice, exiting without waiting for in-flight requests")]
    ForcedExit,

    /// IO error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Barrage library error
    #[error("{0}")]
    Barrage(#[from] barrage::BarrageError),

    /// The run finished but thresholds were crossed
    #[error("{test_type} test crossed thresholds: {}", failed.join(", "))]
    ThresholdsFailed {
        /// Profile that failed
        test_type: String,
        /// `metric: expression` of every failed threshold
        failed: Vec<String>,
    },
}

impl CliError {
    /// Create a configuration error
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a run error
    #[must_use]
    pub fn run(message: impl Into<String>) -> Self {
        Self::Run {
            message: message.into(),
        }
    }

    /// Process exit code for this error
    #[must_use]
    pub fn exit_code(&self) -> ExitCode {
        match self {
            Self::ThresholdsFailed { .. } => ExitCode::from(THRESHOLDS_FAILED_EXIT),
            Self::ForcedExit => ExitCode::from(INTERRUPTED_EXIT),
            _ => ExitCode::FAILURE,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error() {
        let err = CliError::config("bad catalog");
        assert!(err.to_string().contains("Configuration"));
        assert!(err.to_string().contains("bad catalog"));
        assert_eq!(err.exit_code(), ExitCode::FAILURE);
    }

    #[test]
    fn test_thresholds_failed_exit_code() {
        let err = CliError::ThresholdsFailed {
            test_type: "load".to_string(),
            failed: vec![
                "http_req_failed: rate<0.01".to_string(),
                "http_req_duration: p(95)<500".to_string(),
            ],
        };
        assert_eq!(err.exit_code(), ExitCode::from(99));
        let msg = err.to_string();
        assert!(msg.starts_with("load test"));
        assert!(msg.contains("rate<0.01, http_req_duration"));
    }

    #[test]
    fn test_forced_exit_code() {
        let err = CliError::ForcedExit;
        assert_eq!(err.exit_code(), ExitCode::from(130));
        assert!(err.to_string().contains("interrupted twice"));
    }

    #[test]
    fn test_from_barrage_error() {
        let err: CliError = barrage::BarrageError::config("peak must be positive").into();
        assert!(matches!(err, CliError::Barrage(_)));
        assert!(err.to_string().contains("peak must be positive"));
    }

    #[test]
    fn test_from_io_error() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: CliError = io.into();
        assert!(err.to_string().contains("I/O error"));
    }
}
