//! Test assertions for run reports.

use crate::core::StageStatus;
use crate::pipeline::RunReport;
use crate::stages::StageId;

use super::ScriptedInvoker;

/// Asserts that `stage` was reached with the expected status.
pub fn assert_stage_status(report: &RunReport, stage: StageId, expected: StageStatus) {
    assert_eq!(
        report.status_of(stage),
        Some(expected),
        "Expected {stage} to be {expected:?}; stages: {:?}",
        report
            .stages
            .iter()
            .map(|s| (s.stage, s.output.status))
            .collect::<Vec<_>>()
    );
}

/// Asserts that no stage failed.
pub fn assert_no_failures(report: &RunReport) {
    let failed = report.stages_with(StageStatus::Fail);
    assert!(failed.is_empty(), "Expected no failed stages, got {failed:?}");
}

/// Asserts the exact sequence of process invocations.
pub fn assert_invoked(invoker: &ScriptedInvoker, expected: &[StageId]) {
    let expected: Vec<String> = expected.iter().map(|id| id.as_str().to_string()).collect();
    assert_eq!(invoker.labels(), expected, "Unexpected invocation sequence");
}

/// Asserts that `stage` was never invoked.
pub fn assert_not_invoked(invoker: &ScriptedInvoker, stage: StageId) {
    assert_eq!(
        invoker.call_count(stage.as_str()),
        0,
        "Expected {stage} not to be invoked"
    );
}
