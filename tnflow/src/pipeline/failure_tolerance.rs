//! What a failing tool does to the rest of the run.

use crate::errors::ConfigurationError;
use crate::stages::StageId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

/// How to handle stage failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureMode {
    /// Record the failure, warn, and run every later stage anyway.
    #[default]
    BestEffort,
    /// Record the failure and skip stages that consume its outputs.
    SkipDependents,
    /// Stop the run on the first failure.
    FailFast,
}

impl FromStr for FailureMode {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "best-effort" => Ok(Self::BestEffort),
            "skip-dependents" => Ok(Self::SkipDependents),
            "fail-fast" => Ok(Self::FailFast),
            other => Err(ConfigurationError::new(
                "CONFIG-BAD-FAILURE-MODE",
                format!("Unknown failure mode '{other}'"),
            )
            .with_field("on_tool_failure")
            .with_fix_hint("Use 'best-effort', 'skip-dependents' or 'fail-fast'")),
        }
    }
}

impl fmt::Display for FailureMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::BestEffort => "best-effort",
            Self::SkipDependents => "skip-dependents",
            Self::FailFast => "fail-fast",
        })
    }
}

impl FailureMode {
    /// Whether a failure of `stage` lets the run continue under this mode.
    ///
    /// Without an index nothing downstream can align, so an index failure
    /// only continues under best effort.
    #[must_use]
    pub fn is_recoverable(&self, stage: StageId) -> bool {
        match self {
            Self::BestEffort => true,
            Self::SkipDependents => stage != StageId::BuildIndex,
            Self::FailFast => false,
        }
    }
}

/// Record of a stage failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureRecord {
    /// Failed stage.
    pub stage: StageId,
    /// Captured diagnostic text.
    pub error: String,
    /// Exit code, if the process exited.
    pub exit_code: Option<i32>,
    /// Whether the run continued past the failure.
    pub recoverable: bool,
    /// When the failure was recorded.
    pub timestamp: DateTime<Utc>,
}

impl FailureRecord {
    /// Creates a new failure record.
    #[must_use]
    pub fn new(stage: StageId, error: impl Into<String>) -> Self {
        Self {
            stage,
            error: error.into(),
            exit_code: None,
            recoverable: false,
            timestamp: Utc::now(),
        }
    }

    /// Sets the exit code.
    #[must_use]
    pub fn with_exit_code(mut self, code: Option<i32>) -> Self {
        self.exit_code = code;
        self
    }
}

/// Summary of failures during a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureSummary {
    /// Stages in the plan.
    pub total_stages: usize,
    /// Stages that ran or were skipped as complete.
    pub completed_stages: usize,
    /// Stages that failed.
    pub failed_stages: usize,
    /// Failure records, in order.
    pub failures: Vec<FailureRecord>,
}

/// Collects failures and decides which stages may still run.
#[derive(Debug)]
pub struct FailureCollector {
    /// Failure mode.
    pub mode: FailureMode,
    failures: Vec<FailureRecord>,
    failed_stages: HashSet<StageId>,
    blocked_stages: HashSet<StageId>,
    completed_stages: HashSet<StageId>,
}

impl FailureCollector {
    /// Creates a new failure collector.
    #[must_use]
    pub fn new(mode: FailureMode) -> Self {
        Self {
            mode,
            failures: Vec::new(),
            failed_stages: HashSet::new(),
            blocked_stages: HashSet::new(),
            completed_stages: HashSet::new(),
        }
    }

    /// Records a stage failure, marking it recoverable per the mode.
    pub fn record_failure(&mut self, mut record: FailureRecord) -> &FailureRecord {
        record.recoverable = self.mode.is_recoverable(record.stage);
        self.failed_stages.insert(record.stage);
        self.failures.push(record);
        &self.failures[self.failures.len() - 1]
    }

    /// Records a stage that was skipped because an upstream stage failed.
    pub fn record_blocked(&mut self, stage: StageId) {
        self.blocked_stages.insert(stage);
    }

    /// Records a stage that ran successfully or was already complete.
    pub fn record_completion(&mut self, stage: StageId) {
        self.completed_stages.insert(stage);
    }

    /// Returns true if the run must stop now.
    #[must_use]
    pub fn should_stop(&self) -> bool {
        self.failures.iter().any(|f| !f.recoverable)
    }

    /// The upstream stage that prevents `stage` from running, if any.
    ///
    /// Only [`FailureMode::SkipDependents`] blocks; a stage is blocked when a
    /// dependency failed or was itself blocked.
    #[must_use]
    pub fn blocking_dependency(&self, dependencies: &[StageId]) -> Option<StageId> {
        match self.mode {
            FailureMode::SkipDependents => dependencies.iter().copied().find(|dep| {
                self.failed_stages.contains(dep) || self.blocked_stages.contains(dep)
            }),
            FailureMode::BestEffort | FailureMode::FailFast => None,
        }
    }

    /// Creates a summary of the run.
    #[must_use]
    pub fn summary(&self, total_stages: usize) -> FailureSummary {
        FailureSummary {
            total_stages,
            completed_stages: self.completed_stages.len(),
            failed_stages: self.failed_stages.len(),
            failures: self.failures.clone(),
        }
    }
}

impl Default for FailureCollector {
    fn default() -> Self {
        Self::new(FailureMode::default())
    }
}
