//! On-disk record of verified stage completions.

use crate::core::{ArtifactKind, StageArtifact};
use crate::errors::TnflowError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Current manifest format version.
pub const MANIFEST_VERSION: u32 = 1;

/// Hashes a stage's parameters into a short hex digest.
///
/// Parts are length-prefixed so that `["ab", "c"]` and `["a", "bc"]` differ.
#[must_use]
pub fn hash_parameters(parts: &[String]) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update((part.len() as u64).to_le_bytes());
        hasher.update(part.as_bytes());
    }
    let digest = hasher.finalize();
    hex::encode(&digest[..16])
}

/// An output as it was when its stage was committed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordedArtifact {
    /// Location on disk.
    pub path: PathBuf,
    /// File or directory.
    pub kind: ArtifactKind,
    /// Size in bytes for files.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    /// Deleted by cleanup after its consumer succeeded.
    #[serde(default)]
    pub retired: bool,
}

impl RecordedArtifact {
    /// Records `artifact` as it is on disk now.
    #[must_use]
    pub fn capture(artifact: &StageArtifact) -> Self {
        Self {
            path: artifact.path.clone(),
            kind: artifact.kind,
            size: artifact.size(),
            retired: false,
        }
    }

    /// Returns true if the artifact is unchanged since it was recorded.
    #[must_use]
    pub fn matches_disk(&self) -> bool {
        if self.retired {
            return true;
        }
        let current = StageArtifact {
            path: self.path.clone(),
            kind: self.kind,
            role: crate::core::ArtifactRole::Final,
        };
        match self.kind {
            ArtifactKind::Directory => current.is_present(),
            ArtifactKind::File => current.is_present() && current.size() == self.size,
        }
    }
}

/// Result of comparing a manifest entry with a stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManifestCheck {
    /// Entry present, parameters unchanged, outputs intact.
    Complete,
    /// No entry: never run, interrupted, or failed.
    Missing,
    /// The stage's parameters changed since it ran.
    Stale {
        /// Hash in the manifest.
        recorded: String,
        /// Hash of the stage now.
        current: String,
    },
    /// An output is missing, resized, or was never recorded.
    OutputChanged(PathBuf),
}

/// A verified completion of one stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// Stage name.
    pub stage: String,
    /// Parameter hash at completion.
    pub params_hash: String,
    /// Run that completed the stage.
    pub run_id: String,
    /// Completion time.
    pub completed_at: DateTime<Utc>,
    /// Outputs as committed.
    pub artifacts: Vec<RecordedArtifact>,
}

impl ManifestEntry {
    /// Compares this entry with a stage's current fingerprint and outputs.
    #[must_use]
    pub fn check(&self, fingerprint: &str, outputs: &[StageArtifact]) -> ManifestCheck {
        if self.params_hash != fingerprint {
            return ManifestCheck::Stale {
                recorded: self.params_hash.clone(),
                current: fingerprint.to_string(),
            };
        }
        for output in outputs {
            let recorded = self.artifacts.iter().find(|a| a.path == output.path);
            match recorded {
                Some(artifact) if artifact.matches_disk() => {}
                _ => return ManifestCheck::OutputChanged(output.path.clone()),
            }
        }
        ManifestCheck::Complete
    }
}

/// All committed stages of one working directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactManifest {
    /// Format version.
    pub version: u32,
    /// Entries keyed by stage name.
    pub entries: BTreeMap<String, ManifestEntry>,
}

impl Default for ArtifactManifest {
    fn default() -> Self {
        Self {
            version: MANIFEST_VERSION,
            entries: BTreeMap::new(),
        }
    }
}

impl ArtifactManifest {
    /// Loads the manifest at `path`; a missing file is an empty manifest.
    pub fn load(path: &Path) -> Result<Self, TnflowError> {
        match std::fs::read_to_string(path) {
            Ok(text) => Ok(serde_json::from_str(&text)?),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(err.into()),
        }
    }

    /// Writes the manifest to `path` through a temporary sibling.
    pub fn save(&self, path: &Path) -> Result<(), TnflowError> {
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_string_pretty(self)?)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }

    /// The entry for `stage`, if committed.
    #[must_use]
    pub fn get(&self, stage: &str) -> Option<&ManifestEntry> {
        self.entries.get(stage)
    }

    /// Inserts or replaces an entry.
    pub fn insert(&mut self, entry: ManifestEntry) {
        self.entries.insert(entry.stage.clone(), entry);
    }

    /// Removes the entry for `stage`; returns true if there was one.
    pub fn remove(&mut self, stage: &str) -> bool {
        self.entries.remove(stage).is_some()
    }

    /// Marks every recorded artifact at `path` as retired.
    ///
    /// Returns the number of records updated.
    pub fn mark_retired(&mut self, path: &Path) -> usize {
        let mut updated = 0;
        for entry in self.entries.values_mut() {
            for artifact in entry.artifacts.iter_mut().filter(|a| a.path == path) {
                artifact.retired = true;
                updated += 1;
            }
        }
        updated
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn entry_for(artifact: &StageArtifact, hash: &str) -> ManifestEntry {
        ManifestEntry {
            stage: "align".into(),
            params_hash: hash.into(),
            run_id: "run-1".into(),
            completed_at: Utc::now(),
            artifacts: vec![RecordedArtifact::capture(artifact)],
        }
    }

    #[test]
    fn test_hash_parameters() {
        let a = hash_parameters(&["ab".into(), "c".into()]);
        let b = hash_parameters(&["a".into(), "bc".into()]);

        assert_eq!(a.len(), 32);
        assert_ne!(a, b);
        assert_eq!(a, hash_parameters(&["ab".into(), "c".into()]));
    }

    #[test]
    fn test_check_complete_then_truncated() {
        let dir = tempfile::tempdir().unwrap();
        let sam = StageArtifact::file(dir.path().join("alignment.sam"));
        std::fs::write(sam.path(), "@HD\tVN:1.0\n").unwrap();
        let entry = entry_for(&sam, "h1");

        assert_eq!(entry.check("h1", std::slice::from_ref(&sam)), ManifestCheck::Complete);

        std::fs::write(sam.path(), "@HD").unwrap();
        assert_eq!(
            entry.check("h1", std::slice::from_ref(&sam)),
            ManifestCheck::OutputChanged(sam.path.clone())
        );
    }

    #[test]
    fn test_check_stale_parameters() {
        let dir = tempfile::tempdir().unwrap();
        let sam = StageArtifact::file(dir.path().join("alignment.sam"));
        std::fs::write(sam.path(), "x").unwrap();
        let entry = entry_for(&sam, "old");

        assert!(matches!(
            entry.check("new", std::slice::from_ref(&sam)),
            ManifestCheck::Stale { .. }
        ));
    }

    #[test]
    fn test_retired_counts_as_present() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("m.json");
        let sam = StageArtifact::file(dir.path().join("alignment.sam"));
        std::fs::write(sam.path(), "x").unwrap();

        let mut manifest = ArtifactManifest::default();
        manifest.insert(entry_for(&sam, "h"));
        std::fs::remove_file(sam.path()).unwrap();
        assert_eq!(manifest.mark_retired(sam.path()), 1);
        manifest.save(&path).unwrap();

        let loaded = ArtifactManifest::load(&path).unwrap();
        assert_eq!(loaded, manifest);
        let entry = loaded.get("align").unwrap();
        assert_eq!(entry.check("h", std::slice::from_ref(&sam)), ManifestCheck::Complete);
    }

    #[test]
    fn test_load_missing_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = ArtifactManifest::load(&dir.path().join("none.json")).unwrap();
        assert!(manifest.entries.is_empty());
        assert_eq!(manifest.version, MANIFEST_VERSION);
    }
}
