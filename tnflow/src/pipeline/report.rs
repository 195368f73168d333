//! Per-run report written to `run_report.json`.

use super::{Branch, FailureMode, FailureSummary};
use crate::core::{StageKind, StageOutput, StageStatus};
use crate::errors::TnflowError;
use crate::memo::MemoStrategy;
use crate::stages::StageId;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// One stage's line in the report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageReport {
    /// Which stage.
    pub stage: StageId,
    /// Delegate kind.
    pub kind: StageKind,
    /// Outcome.
    #[serde(flatten)]
    pub output: StageOutput,
    /// Command that ran, for process delegates.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command_line: Option<String>,
}

/// Everything that happened in one run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    /// Unique run id.
    pub run_id: Uuid,
    /// Strain identifier.
    pub strain: String,
    /// Working directory.
    pub working_dir: PathBuf,
    /// Branch walked.
    pub branch: Branch,
    /// Memoization strategy.
    pub memo: MemoStrategy,
    /// Failure mode.
    pub failure_mode: FailureMode,
    /// Start time.
    pub started_at: DateTime<Utc>,
    /// End time.
    pub finished_at: Option<DateTime<Utc>>,
    /// Stage outcomes, in plan order.
    pub stages: Vec<StageReport>,
    /// Intermediates deleted by cleanup.
    pub retired: Vec<PathBuf>,
    /// Failure summary.
    pub failures: Option<FailureSummary>,
    /// Reason the run stopped early.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aborted: Option<String>,
}

impl RunReport {
    /// Starts a report for a new run.
    #[must_use]
    pub fn start(
        strain: impl Into<String>,
        working_dir: impl Into<PathBuf>,
        branch: Branch,
        memo: MemoStrategy,
        failure_mode: FailureMode,
    ) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            strain: strain.into(),
            working_dir: working_dir.into(),
            branch,
            memo,
            failure_mode,
            started_at: Utc::now(),
            finished_at: None,
            stages: Vec::new(),
            retired: Vec::new(),
            failures: None,
            aborted: None,
        }
    }

    /// Appends a stage outcome.
    pub fn record(&mut self, stage: StageReport) {
        self.stages.push(stage);
    }

    /// Status of `stage`, if it was reached.
    #[must_use]
    pub fn status_of(&self, stage: StageId) -> Option<StageStatus> {
        self.stages
            .iter()
            .find(|s| s.stage == stage)
            .map(|s| s.output.status)
    }

    /// Stages with the given status.
    #[must_use]
    pub fn stages_with(&self, status: StageStatus) -> Vec<StageId> {
        self.stages
            .iter()
            .filter(|s| s.output.status == status)
            .map(|s| s.stage)
            .collect()
    }

    /// Returns true if any stage failed.
    #[must_use]
    pub fn has_failures(&self) -> bool {
        self.stages.iter().any(|s| s.output.is_failure())
    }

    /// Closes the report.
    pub fn finish(&mut self, failures: FailureSummary) {
        self.failures = Some(failures);
        self.finished_at = Some(Utc::now());
    }

    /// Writes the report as pretty JSON.
    pub fn save(&self, path: &Path) -> Result<(), TnflowError> {
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}
