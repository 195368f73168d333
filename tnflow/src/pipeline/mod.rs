//! Pipeline execution.
//!
//! This module provides:
//! - The branch tagged union and its stage plan
//! - The sequential driver
//! - Failure modes and the per-stage recoverability policy
//! - Intermediate cleanup, the working-directory lock and the run report

mod branch;
mod cleanup;
mod driver;
mod failure_tolerance;
mod lock;
mod report;

pub use branch::Branch;
pub use cleanup::IntermediateCleaner;
pub use driver::PipelineDriver;
pub use failure_tolerance::{FailureCollector, FailureMode, FailureRecord, FailureSummary};
pub use lock::RunLock;
pub use report::{RunReport, StageReport};
