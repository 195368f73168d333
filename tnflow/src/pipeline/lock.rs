//! Exclusive claim on a strain's working directory.

use crate::errors::TnflowError;
use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Held for the duration of a run; the lock file is removed on drop.
#[derive(Debug)]
pub struct RunLock {
    path: PathBuf,
}

impl RunLock {
    /// Creates the lock file at `path`, failing if it already exists.
    pub fn acquire(path: &Path, run_id: &str) -> Result<Self, TnflowError> {
        let mut file = match OpenOptions::new().write(true).create_new(true).open(path) {
            Ok(file) => file,
            Err(err) if err.kind() == ErrorKind::AlreadyExists => {
                return Err(TnflowError::RunInProgress {
                    path: path.to_path_buf(),
                });
            }
            Err(err) => return Err(err.into()),
        };
        // Constructed first so a failed write still removes the file.
        let lock = Self {
            path: path.to_path_buf(),
        };
        writeln!(file, "run_id={run_id}")?;
        writeln!(file, "pid={}", std::process::id())?;
        debug!(path = %path.display(), "Acquired run lock");
        Ok(lock)
    }

    /// The lock file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        if let Err(err) = std::fs::remove_file(&self.path) {
            warn!(path = %self.path.display(), error = %err, "Failed to remove run lock");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_acquire_fails_until_release() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".tnflow.lock");

        let lock = RunLock::acquire(&path, "run-a").unwrap();
        let contents = std::fs::read_to_string(lock.path()).unwrap();
        assert!(contents.starts_with("run_id=run-a\n"));

        let err = RunLock::acquire(&path, "run-b").unwrap_err();
        assert!(matches!(err, TnflowError::RunInProgress { .. }));

        drop(lock);
        assert!(!path.exists());
        assert!(RunLock::acquire(&path, "run-c").is_ok());
    }
}
