//! Stage memoization.
//!
//! A stage is skipped when its work is already done. [`MemoStrategy::Manifest`]
//! trusts only completions that were verified and committed to
//! `.tnflow_manifest.json`; [`MemoStrategy::ExistenceOnly`] trusts any output
//! file on disk.

mod manifest;
mod memoizer;

pub use manifest::{
    hash_parameters, ArtifactManifest, ManifestCheck, ManifestEntry, RecordedArtifact,
    MANIFEST_VERSION,
};
pub use memoizer::{ArtifactMemoizer, MemoDecision, MemoStrategy};
