//! Core domain model types for tnflow.
//!
//! This module contains the fundamental types used throughout the crate:
//! - Stage status and kind enums
//! - Stage output type with factory methods
//! - Artifacts used as completion markers

mod artifact;
mod output;
#[cfg(test)]
mod output_tests;
mod status;

pub use artifact::{ArtifactKind, ArtifactRole, StageArtifact};
pub use output::StageOutput;
pub use status::{StageKind, StageStatus};
