//! Filesystem artifacts used as stage completion markers.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Whether an artifact is a single file or a directory of files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    /// A regular file.
    File,
    /// A directory; present only when it holds at least one entry.
    Directory,
}

/// Whether an artifact outlives the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactRole {
    /// Consumed by a later stage, deletable once that stage succeeded.
    Intermediate,
    /// Kept after the run.
    Final,
}

/// A path a stage produces or consumes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StageArtifact {
    /// Location on disk.
    pub path: PathBuf,
    /// File or directory.
    pub kind: ArtifactKind,
    /// Intermediate or final.
    pub role: ArtifactRole,
}

impl StageArtifact {
    /// A final file artifact.
    #[must_use]
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            kind: ArtifactKind::File,
            role: ArtifactRole::Final,
        }
    }

    /// A final directory artifact.
    #[must_use]
    pub fn directory(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            kind: ArtifactKind::Directory,
            role: ArtifactRole::Final,
        }
    }

    /// Marks the artifact as intermediate.
    #[must_use]
    pub fn intermediate(mut self) -> Self {
        self.role = ArtifactRole::Intermediate;
        self
    }

    /// Returns the artifact path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns true if the artifact is on disk.
    ///
    /// Directories count only when non-empty, so a directory created ahead of
    /// a tool that then failed is not mistaken for finished work.
    #[must_use]
    pub fn is_present(&self) -> bool {
        match self.kind {
            ArtifactKind::File => self.path.is_file(),
            ArtifactKind::Directory => std::fs::read_dir(&self.path)
                .map(|mut entries| entries.next().is_some())
                .unwrap_or(false),
        }
    }

    /// Size in bytes for files, `None` for directories or missing files.
    #[must_use]
    pub fn size(&self) -> Option<u64> {
        match self.kind {
            ArtifactKind::File => std::fs::metadata(&self.path).ok().map(|m| m.len()),
            ArtifactKind::Directory => None,
        }
    }

    /// Returns true if this artifact may be deleted by cleanup.
    #[must_use]
    pub fn is_intermediate(&self) -> bool {
        self.role == ArtifactRole::Intermediate
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_artifact_presence() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = StageArtifact::file(dir.path().join("alignment.sam")).intermediate();

        assert!(!artifact.is_present());
        assert_eq!(artifact.size(), None);

        std::fs::write(artifact.path(), b"@HD\n").unwrap();
        assert!(artifact.is_present());
        assert_eq!(artifact.size(), Some(4));
        assert!(artifact.is_intermediate());
    }

    #[test]
    fn test_empty_directory_is_not_present() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = StageArtifact::directory(dir.path().join("indexes"));

        std::fs::create_dir(artifact.path()).unwrap();
        assert!(!artifact.is_present());

        std::fs::write(artifact.path().join("X.1.bt2"), b"idx").unwrap();
        assert!(artifact.is_present());
        assert_eq!(artifact.size(), None);
    }
}
