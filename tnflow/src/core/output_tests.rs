//! Tests for StageOutput.

use super::{StageOutput, StageStatus};

#[test]
fn test_ok_output() {
    let output = StageOutput::ok().with_exit_code(Some(0)).with_duration_ms(12.5);

    assert_eq!(output.status, StageStatus::Ok);
    assert!(output.is_success());
    assert!(!output.is_failure());
    assert_eq!(output.exit_code, Some(0));
    assert!((output.duration_ms - 12.5).abs() < f64::EPSILON);
}

#[test]
fn test_skip_output() {
    let output = StageOutput::skip("Found alignment.sam");

    assert!(output.is_skip());
    assert!(output.is_success());
    assert_eq!(output.skip_reason.as_deref(), Some("Found alignment.sam"));
    assert!(output.error.is_none());
}

#[test]
fn test_fail_output() {
    let output = StageOutput::fail("bowtie2 exited with 1").with_exit_code(Some(1));

    assert!(output.is_failure());
    assert!(!output.is_success());
    assert_eq!(output.error.as_deref(), Some("bowtie2 exited with 1"));
    assert_eq!(output.exit_code, Some(1));
}

#[test]
fn test_default_is_ok() {
    assert_eq!(StageOutput::default(), StageOutput::ok());
}

#[test]
fn test_serialization_omits_empty_fields() {
    let json = serde_json::to_value(StageOutput::skip("done")).unwrap();

    assert_eq!(json["status"], "skip");
    assert_eq!(json["skip_reason"], "done");
    assert!(json.get("error").is_none());
    assert!(json.get("exit_code").is_none());
}
