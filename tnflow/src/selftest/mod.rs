//! Deployment self-test.
//!
//! Checks that the external aligner and BLAST tools answer, then runs the
//! binary end to end against a small bundled strain.

mod harness;

pub use harness::{
    default_fixture_dir, PreflightCheck, SelfTestHarness, SelfTestReport, FIXTURE_STRAIN,
    FIXTURE_TRANSPOSON,
};
