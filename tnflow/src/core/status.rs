//! Stage status and kind enums.

use serde::{Deserialize, Serialize};
use std::fmt;

/// How a stage performs its work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    /// A third-party program on the PATH (bowtie2, bowtie2-build).
    ExternalTool,
    /// A collaborator program with a fixed positional argument contract
    /// (trimmer, insertion parser, essentiality engine, plot renderer).
    Collaborator,
    /// Work done in-process by tnflow itself.
    Builtin,
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ExternalTool => write!(f, "external_tool"),
            Self::Collaborator => write!(f, "collaborator"),
            Self::Builtin => write!(f, "builtin"),
        }
    }
}

/// The execution status of a stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    /// Stage ran and its outputs were verified.
    Ok,
    /// Stage did not run: already complete, or blocked by an upstream failure.
    Skip,
    /// Stage ran and failed.
    Fail,
}

impl fmt::Display for StageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok => write!(f, "ok"),
            Self::Skip => write!(f, "skip"),
            Self::Fail => write!(f, "fail"),
        }
    }
}

impl StageStatus {
    /// Returns true if the status indicates success.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Ok | Self::Skip)
    }

    /// Returns true if the status indicates failure.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Fail)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_kind_display() {
        assert_eq!(StageKind::ExternalTool.to_string(), "external_tool");
        assert_eq!(StageKind::Collaborator.to_string(), "collaborator");
        assert_eq!(StageKind::Builtin.to_string(), "builtin");
    }

    #[test]
    fn test_stage_status_success_and_failure() {
        assert!(StageStatus::Skip.is_success());
        assert!(!StageStatus::Fail.is_success());
        assert!(StageStatus::Fail.is_failure());
        assert_eq!(StageStatus::Fail.to_string(), "fail");
    }

    #[test]
    fn test_stage_status_serialize() {
        let json = serde_json::to_string(&StageStatus::Skip).unwrap();
        assert_eq!(json, r#""skip""#);

        let deserialized: StageStatus = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized, StageStatus::Skip);
    }
}
