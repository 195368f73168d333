//! # tnflow
//!
//! Orchestration engine for transposon insertion sequencing (Tn-Seq) runs.
//!
//! A run takes a strain's reads, reference and annotation through a fixed
//! sequence of stages:
//!
//! - **Index**: build the aligner index for the reference
//! - **Read preparation**: trim the transposon border, or concatenate raw reads
//! - **Alignment**: align prepared reads against the index
//! - **Insertions**: parse the alignment into an insertion-site table
//! - **Plots** and optional **essentiality inference**
//!
//! Every stage declares the artifacts it consumes and produces. Completed
//! stages are skipped on re-runs, intermediates are deleted once their
//! consumer succeeds, and tool failures are handled by an explicit policy.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use tnflow::prelude::*;
//! use std::sync::Arc;
//!
//! let params = RunParameters::new("PA14", "reads/", "annotation/", "gb", "SE");
//! let config = ConfigurationResolver::new().resolve(params)?;
//! let report = PipelineDriver::new(&config, Arc::new(SystemInvoker::new()))
//!     .run()
//!     .await?;
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod config;
pub mod core;
pub mod errors;
pub mod memo;
pub mod observability;
pub mod pipeline;
pub mod process;
pub mod selftest;
pub mod stages;
pub mod testing;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::{
        ArtifactLayout, ConfigurationResolver, RunConfiguration, RunParameters, Toolchain,
    };
    pub use crate::core::{StageArtifact, StageKind, StageOutput, StageStatus};
    pub use crate::errors::{ConfigurationError, MalformedInputError, TnflowError};
    pub use crate::memo::{ArtifactMemoizer, MemoStrategy};
    pub use crate::observability::{init_tracing, LogFormat};
    pub use crate::pipeline::{Branch, FailureMode, PipelineDriver, RunReport};
    pub use crate::process::{ProcessInvoker, SystemInvoker, ToolInvocation, ToolInvocationResult};
    pub use crate::selftest::{SelfTestHarness, SelfTestReport};
    pub use crate::stages::{Stage, StageCatalog, StageId};
}
