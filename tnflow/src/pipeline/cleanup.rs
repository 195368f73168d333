//! Retirement of intermediate artifacts.

use crate::core::StageArtifact;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Deletes intermediates once their consumer is verified complete.
///
/// Only intermediate artifacts inside the working directory are touched, so
/// user-supplied read files survive regardless of how a stage declares them.
#[derive(Debug, Clone)]
pub struct IntermediateCleaner {
    working_dir: PathBuf,
    keep: bool,
}

impl IntermediateCleaner {
    /// Creates a cleaner for `working_dir`; `keep` disables deletion.
    #[must_use]
    pub fn new(working_dir: impl Into<PathBuf>, keep: bool) -> Self {
        Self {
            working_dir: working_dir.into(),
            keep,
        }
    }

    fn is_owned(&self, path: &Path) -> bool {
        path.starts_with(&self.working_dir)
    }

    /// Deletes each retirable artifact and returns the paths removed.
    ///
    /// Missing files are ignored. Other I/O errors are logged and the artifact
    /// is left in place.
    pub fn retire(&self, artifacts: &[StageArtifact]) -> Vec<PathBuf> {
        if self.keep {
            return Vec::new();
        }
        let mut removed = Vec::new();
        for artifact in artifacts {
            if !artifact.is_intermediate() || !self.is_owned(artifact.path()) {
                debug!(path = %artifact.path().display(), "Artifact is not a retirable intermediate");
                continue;
            }
            let result = if artifact.path().is_dir() {
                std::fs::remove_dir_all(artifact.path())
            } else {
                std::fs::remove_file(artifact.path())
            };
            match result {
                Ok(()) => {
                    debug!(path = %artifact.path().display(), "Retired intermediate");
                    removed.push(artifact.path.clone());
                }
                Err(err) if err.kind() == io::ErrorKind::NotFound => {}
                Err(err) => {
                    warn!(path = %artifact.path().display(), error = %err, "Failed to remove intermediate");
                }
            }
        }
        removed
    }
}
