//! Artifact sinks.

use crate::report::Artifact;
use crate::result::BarrageError;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// An artifact that could not be written
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("failed to write {artifact}: {message}")]
pub struct SinkError {
    /// Artifact name
    pub artifact: String,
    /// Error message
    pub message: String,
}

impl SinkError {
    /// Create a sink error
    #[must_use]
    pub fn new(artifact: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            artifact: artifact.into(),
            message: message.into(),
        }
    }
}

impl From<SinkError> for BarrageError {
    fn from(err: SinkError) -> Self {
        Self::Sink {
            artifact: err.artifact,
            message: err.message,
        }
    }
}

/// Destination for rendered artifacts
pub trait ArtifactSink: Send + Sync {
    /// Write one artifact
    fn write(&self, name: &str, content: &[u8]) -> Result<(), SinkError>;
}

/// Write every artifact, continuing past failures. Returns the failures.
pub fn write_artifacts(sink: &dyn ArtifactSink, artifacts: &[Artifact]) -> Vec<SinkError> {
    let mut failures = Vec::new();
    for artifact in artifacts {
        match sink.write(&artifact.name, &artifact.content) {
            Ok(()) => debug!(artifact = %artifact.name, bytes = artifact.content.len(), "artifact written"),
            Err(err) => {
                warn!(artifact = %err.artifact, error = %err.message, "artifact write failed");
                failures.push(err);
            }
        }
    }
    failures
}

/// Keeps artifacts in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    artifacts: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl MemorySink {
    /// Create an empty sink
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Names written so far
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.artifacts.lock().keys().cloned().collect()
    }

    /// Content of one artifact
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Vec<u8>> {
        self.artifacts.lock().get(name).cloned()
    }

    /// Number of artifacts written
    #[must_use]
    pub fn len(&self) -> usize {
        self.artifacts.lock().len()
    }

    /// True when nothing was written
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.artifacts.lock().is_empty()
    }
}

impl ArtifactSink for MemorySink {
    fn write(&self, name: &str, content: &[u8]) -> Result<(), SinkError> {
        self.artifacts
            .lock()
            .insert(name.to_string(), content.to_vec());
        Ok(())
    }
}
