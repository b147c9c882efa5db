//! Result and error types for Barrage.

use thiserror::Error;

/// Result type for Barrage operations
pub type BarrageResult<T> = Result<T, BarrageError>;

/// Errors that can occur in Barrage
#[derive(Debug, Error)]
pub enum BarrageError {
    /// Invalid or incomplete test configuration. Always raised before any
    /// virtual user starts.
    #[error("Configuration error: {message}")]
    Config {
        /// Error message
        message: String,
    },

    /// Transport could not be constructed
    #[error("Transport error: {0}")]
    Transport(crate::transport::TransportError),

    /// Artifact sink failure
    #[error("Failed to write artifact {artifact}: {message}")]
    Sink {
        /// Artifact name
        artifact: String,
        /// Error message
        message: String,
    },

    /// Invalid state error (operation called in wrong state)
    #[error("Invalid state: {message}")]
    InvalidState {
        /// Error message
        message: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl BarrageError {
    /// Create a configuration error
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create an invalid state error
    #[must_use]
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState {
            message: message.into(),
        }
    }

    /// Returns true for errors raised while validating configuration.
    #[must_use]
    pub const fn is_config(&self) -> bool {
        matches!(self, Self::Config { .. })
    }
}
