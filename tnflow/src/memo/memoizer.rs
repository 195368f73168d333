//! Decides whether a stage's work is already done.

use super::manifest::{ArtifactManifest, ManifestCheck, ManifestEntry, RecordedArtifact};
use crate::errors::{ConfigurationError, TnflowError};
use crate::stages::Stage;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, warn};

/// How completed stages are recognised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoStrategy {
    /// Complete iff every declared output exists.
    ExistenceOnly,
    /// Complete iff a verified manifest entry matches the stage and its outputs.
    #[default]
    Manifest,
}

impl FromStr for MemoStrategy {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "existence" | "existence-only" | "existence_only" => Ok(Self::ExistenceOnly),
            "manifest" => Ok(Self::Manifest),
            other => Err(ConfigurationError::new(
                "CONFIG-BAD-MEMO",
                format!("Unknown memoization strategy '{other}'"),
            )
            .with_field("memo")
            .with_fix_hint("Use 'existence' or 'manifest'")),
        }
    }
}

impl fmt::Display for MemoStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::ExistenceOnly => "existence",
            Self::Manifest => "manifest",
        })
    }
}

/// Outcome of a memoization check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemoDecision {
    /// The stage can be skipped.
    Complete,
    /// The stage must run.
    Run {
        /// Why the stage is not complete.
        reason: String,
    },
}

impl MemoDecision {
    fn run(reason: impl Into<String>) -> Self {
        Self::Run {
            reason: reason.into(),
        }
    }

    /// Returns true if the stage must run.
    #[must_use]
    pub fn must_run(&self) -> bool {
        matches!(self, Self::Run { .. })
    }
}

/// Tracks completed stages for one working directory.
///
/// The manifest is maintained under both strategies, so switching strategy
/// between runs keeps earlier commits usable.
#[derive(Debug)]
pub struct ArtifactMemoizer {
    strategy: MemoStrategy,
    path: PathBuf,
    manifest: ArtifactManifest,
}

impl ArtifactMemoizer {
    /// Opens the manifest at `path`.
    ///
    /// An unreadable or corrupt manifest is discarded with a warning; every
    /// stage is then treated as incomplete.
    pub fn open(strategy: MemoStrategy, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let manifest = match ArtifactManifest::load(&path) {
            Ok(manifest) => manifest,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "Discarding unreadable manifest");
                ArtifactManifest::default()
            }
        };
        Self {
            strategy,
            path,
            manifest,
        }
    }

    /// The active strategy.
    #[must_use]
    pub fn strategy(&self) -> MemoStrategy {
        self.strategy
    }

    /// The manifest as loaded and updated by this run.
    #[must_use]
    pub fn manifest(&self) -> &ArtifactManifest {
        &self.manifest
    }

    /// Returns false iff `stage` is complete.
    #[must_use]
    pub fn should_run(&self, stage: &Stage) -> bool {
        self.check(stage).must_run()
    }

    /// Checks `stage` against the active strategy.
    #[must_use]
    pub fn check(&self, stage: &Stage) -> MemoDecision {
        match self.strategy {
            MemoStrategy::ExistenceOnly => match stage.missing_outputs().first() {
                None => MemoDecision::Complete,
                Some(missing) => {
                    MemoDecision::run(format!("{} does not exist", missing.path.display()))
                }
            },
            MemoStrategy::Manifest => {
                let Some(entry) = self.manifest.get(stage.name()) else {
                    return MemoDecision::run("no verified completion recorded");
                };
                match entry.check(&stage.fingerprint(), &stage.outputs) {
                    ManifestCheck::Complete => MemoDecision::Complete,
                    ManifestCheck::Missing => MemoDecision::run("no verified completion recorded"),
                    ManifestCheck::Stale { recorded, current } => {
                        debug!(stage = stage.name(), %recorded, %current, "Stage parameters changed");
                        MemoDecision::run("parameters changed since the last run; outputs are stale")
                    }
                    ManifestCheck::OutputChanged(path) => MemoDecision::run(format!(
                        "{} is missing or changed since it was recorded",
                        path.display()
                    )),
                }
            }
        }
    }

    /// Drops the stage's entry before it runs, so an interrupted run is never
    /// mistaken for a completed one.
    pub fn invalidate(&mut self, stage: &Stage) -> Result<(), TnflowError> {
        if self.manifest.remove(stage.name()) {
            self.manifest.save(&self.path)?;
        }
        Ok(())
    }

    /// Records a verified-successful run of `stage`.
    pub fn commit(&mut self, stage: &Stage, run_id: &str) -> Result<(), TnflowError> {
        self.manifest.insert(ManifestEntry {
            stage: stage.name().to_string(),
            params_hash: stage.fingerprint(),
            run_id: run_id.to_string(),
            completed_at: Utc::now(),
            artifacts: stage.outputs.iter().map(RecordedArtifact::capture).collect(),
        });
        self.manifest.save(&self.path)?;
        debug!(stage = stage.name(), "Committed stage to manifest");
        Ok(())
    }

    /// Records that cleanup deleted `path`.
    pub fn retire(&mut self, path: &Path) -> Result<(), TnflowError> {
        if self.manifest.mark_retired(path) > 0 {
            self.manifest.save(&self.path)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::StageArtifact;
    use crate::process::ToolInvocation;
    use crate::stages::{StageDelegate, StageId};

    fn parse_stage(dir: &Path, arg: &str) -> Stage {
        let inv = ToolInvocation::new("parse_insertions", "parser").arg(arg);
        Stage::new(StageId::ParseInsertions, StageDelegate::Collaborator(inv))
            .output(StageArtifact::file(dir.join("all_insertions_X.csv")))
    }

    #[test]
    fn test_strategy_parse() {
        assert_eq!("existence".parse::<MemoStrategy>().unwrap(), MemoStrategy::ExistenceOnly);
        assert_eq!("Manifest".parse::<MemoStrategy>().unwrap(), MemoStrategy::Manifest);
        assert!("hash".parse::<MemoStrategy>().is_err());
        assert_eq!(MemoStrategy::default(), MemoStrategy::Manifest);
    }

    #[test]
    fn test_existence_only() {
        let dir = tempfile::tempdir().unwrap();
        let memo = ArtifactMemoizer::open(MemoStrategy::ExistenceOnly, dir.path().join("m.json"));
        let stage = parse_stage(dir.path(), "a");

        assert!(memo.should_run(&stage));
        std::fs::write(dir.path().join("all_insertions_X.csv"), "x").unwrap();
        assert!(!memo.should_run(&stage));
        assert!(stage.missing_outputs().is_empty());
    }

    #[test]
    fn test_manifest_requires_commit() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("m.json");
        let stage = parse_stage(dir.path(), "a");
        std::fs::write(dir.path().join("all_insertions_X.csv"), "x").unwrap();

        let mut memo = ArtifactMemoizer::open(MemoStrategy::Manifest, &path);
        assert!(memo.should_run(&stage));

        memo.commit(&stage, "run-1").unwrap();
        assert!(!memo.should_run(&stage));

        let reopened = ArtifactMemoizer::open(MemoStrategy::Manifest, &path);
        assert_eq!(reopened.check(&stage), MemoDecision::Complete);
        assert!(reopened.should_run(&parse_stage(dir.path(), "b")));
    }

    #[test]
    fn test_invalidate_removes_entry() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("m.json");
        let stage = parse_stage(dir.path(), "a");
        std::fs::write(dir.path().join("all_insertions_X.csv"), "x").unwrap();

        let mut memo = ArtifactMemoizer::open(MemoStrategy::Manifest, &path);
        memo.commit(&stage, "run-1").unwrap();
        memo.invalidate(&stage).unwrap();

        assert!(ArtifactMemoizer::open(MemoStrategy::Manifest, &path).should_run(&stage));
    }

    #[test]
    fn test_corrupt_manifest_is_discarded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("m.json");
        std::fs::write(&path, "{not json").unwrap();

        let memo = ArtifactMemoizer::open(MemoStrategy::Manifest, &path);
        assert!(memo.manifest().entries.is_empty());
    }
}
