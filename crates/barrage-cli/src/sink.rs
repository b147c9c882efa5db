//! Writes artifacts into a results directory.

use barrage::{ArtifactSink, SinkError, STDOUT};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Files go under `dir`; the [`STDOUT`] artifact goes to standard output
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    /// Create the directory if needed
    pub fn create(dir: impl Into<PathBuf>) -> std::io::Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// Target directory
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl ArtifactSink for DirectorySink {
    fn write(&self, name: &str, content: &[u8]) -> Result<(), SinkError> {
        if name == STDOUT {
            let mut out = std::io::stdout().lock();
            return out
                .write_all(content)
                .and_then(|()| out.flush())
                .map_err(|e| SinkError::new(name, e.to_string()));
        }
        std::fs::write(self.dir.join(name), content)
            .map_err(|e| SinkError::new(name, e.to_string()))
    }
}
