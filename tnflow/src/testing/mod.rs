//! Testing utilities for tnflow pipelines.
//!
//! This module provides:
//! - A scripted process invoker that stands in for external tools
//! - On-disk strain fixtures
//! - Assertions over run reports

mod assertions;
mod fixtures;
mod mocks;

pub use assertions::{
    assert_invoked, assert_no_failures, assert_not_invoked, assert_stage_status,
};
pub use fixtures::{StrainFixture, StrainFixtureBuilder};
pub use mocks::{Script, ScriptedInvoker};
