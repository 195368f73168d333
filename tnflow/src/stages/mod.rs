//! Pipeline stages.
//!
//! A [`Stage`] is plain data: the artifacts it reads and writes, the
//! intermediates it retires, and a [`StageDelegate`] describing the work.
//! The driver decides whether and how to run it.

mod catalog;
mod compile;

pub use catalog::StageCatalog;
pub use compile::compile_reads;

use crate::core::{StageArtifact, StageKind};
use crate::memo::hash_parameters;
use crate::process::ToolInvocation;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Identifies one of the pipeline's stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageId {
    /// Bowtie2 index construction.
    BuildIndex,
    /// Transposon border trimming.
    TrimReads,
    /// Concatenation of untrimmed single-end reads.
    CompileRawReads,
    /// Read alignment.
    Align,
    /// Alignment to insertion-site table.
    ParseInsertions,
    /// Insertion plots.
    Plot,
    /// Essential gene inference.
    InferEssentiality,
}

impl StageId {
    /// Every stage, in pipeline order.
    pub const ALL: [Self; 7] = [
        Self::BuildIndex,
        Self::TrimReads,
        Self::CompileRawReads,
        Self::Align,
        Self::ParseInsertions,
        Self::Plot,
        Self::InferEssentiality,
    ];

    /// Stable name used in logs, the manifest and invocation labels.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BuildIndex => "build_index",
            Self::TrimReads => "trim_reads",
            Self::CompileRawReads => "compile_raw_reads",
            Self::Align => "align",
            Self::ParseInsertions => "parse_insertions",
            Self::Plot => "plot",
            Self::InferEssentiality => "infer_essentiality",
        }
    }
}

impl fmt::Display for StageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Work done in-process instead of by a child process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "task", rename_all = "snake_case")]
pub enum BuiltinTask {
    /// Concatenate read files into one FASTQ, decoding gzip members.
    CompileReads {
        /// Files in concatenation order.
        sources: Vec<PathBuf>,
        /// Output file.
        destination: PathBuf,
    },
}

impl BuiltinTask {
    /// Runs the task to completion on the blocking pool.
    pub async fn run(&self) -> std::io::Result<u64> {
        match self.clone() {
            Self::CompileReads {
                sources,
                destination,
            } => tokio::task::spawn_blocking(move || compile_reads(&sources, &destination))
                .await
                .map_err(std::io::Error::other)?,
        }
    }

    fn parameter_parts(&self) -> Vec<String> {
        match self {
            Self::CompileReads {
                sources,
                destination,
            } => std::iter::once("compile_reads".to_string())
                .chain(sources.iter().map(|p| p.display().to_string()))
                .chain(std::iter::once(destination.display().to_string()))
                .collect(),
        }
    }
}

/// What performs a stage's work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "delegate", rename_all = "snake_case")]
pub enum StageDelegate {
    /// A third-party bioinformatics tool.
    External(ToolInvocation),
    /// A companion analysis program with a positional-argument contract.
    Collaborator(ToolInvocation),
    /// In-process work.
    Builtin(BuiltinTask),
}

impl StageDelegate {
    /// The stage kind this delegate implies.
    #[must_use]
    pub fn kind(&self) -> StageKind {
        match self {
            Self::External(_) => StageKind::ExternalTool,
            Self::Collaborator(_) => StageKind::Collaborator,
            Self::Builtin(_) => StageKind::Builtin,
        }
    }

    /// The child-process invocation, if any.
    #[must_use]
    pub fn invocation(&self) -> Option<&ToolInvocation> {
        match self {
            Self::External(inv) | Self::Collaborator(inv) => Some(inv),
            Self::Builtin(_) => None,
        }
    }

    fn parameter_parts(&self) -> Vec<String> {
        match self {
            Self::External(inv) | Self::Collaborator(inv) => {
                let mut parts = vec![inv.program.clone()];
                parts.extend(inv.args.iter().cloned());
                if let Some(log) = &inv.stderr_log {
                    parts.push(format!("2>{}", log.display()));
                }
                parts
            }
            Self::Builtin(task) => task.parameter_parts(),
        }
    }
}

/// One unit of pipeline work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stage {
    /// Which stage this is.
    pub id: StageId,
    /// Artifacts that must exist before the stage can do useful work.
    pub inputs: Vec<StageArtifact>,
    /// Artifacts whose presence marks the stage complete.
    pub outputs: Vec<StageArtifact>,
    /// Intermediates deleted once this stage has consumed them.
    pub retires: Vec<StageArtifact>,
    /// Directories created before the delegate runs.
    pub prepare_dirs: Vec<PathBuf>,
    /// Stages whose outputs this one consumes.
    pub depends_on: Vec<StageId>,
    /// The work itself.
    pub delegate: StageDelegate,
}

impl Stage {
    /// Creates a stage with no declared artifacts.
    #[must_use]
    pub fn new(id: StageId, delegate: StageDelegate) -> Self {
        Self {
            id,
            inputs: Vec::new(),
            outputs: Vec::new(),
            retires: Vec::new(),
            prepare_dirs: Vec::new(),
            depends_on: Vec::new(),
            delegate,
        }
    }

    /// Declares an input artifact.
    #[must_use]
    pub fn input(mut self, artifact: StageArtifact) -> Self {
        self.inputs.push(artifact);
        self
    }

    /// Declares an output artifact.
    #[must_use]
    pub fn output(mut self, artifact: StageArtifact) -> Self {
        self.outputs.push(artifact);
        self
    }

    /// Declares an intermediate this stage retires on success.
    #[must_use]
    pub fn retires(mut self, artifact: StageArtifact) -> Self {
        self.retires.push(artifact);
        self
    }

    /// Declares a directory to create before running.
    #[must_use]
    pub fn prepare_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.prepare_dirs.push(dir.into());
        self
    }

    /// Declares a dependency on another stage.
    #[must_use]
    pub fn depends_on(mut self, id: StageId) -> Self {
        if !self.depends_on.contains(&id) {
            self.depends_on.push(id);
        }
        self
    }

    /// Stable stage name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.id.as_str()
    }

    /// Kind of delegate.
    #[must_use]
    pub fn kind(&self) -> StageKind {
        self.delegate.kind()
    }

    /// Hash of everything that determines the stage's outputs.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        hash_parameters(&self.delegate.parameter_parts())
    }

    /// Declared outputs that are missing.
    #[must_use]
    pub fn missing_outputs(&self) -> Vec<&StageArtifact> {
        self.outputs.iter().filter(|a| !a.is_present()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tool_stage(args: &[&str]) -> Stage {
        let inv = ToolInvocation::new("plot", "plotter").args(args.iter().copied());
        Stage::new(StageId::Plot, StageDelegate::Collaborator(inv))
    }

    #[test]
    fn test_stage_id_names() {
        assert_eq!(StageId::BuildIndex.as_str(), "build_index");
        assert_eq!(StageId::InferEssentiality.to_string(), "infer_essentiality");
        assert_eq!(StageId::ALL.len(), 7);
    }

    #[test]
    fn test_fingerprint_tracks_arguments() {
        let a = tool_stage(&["/wd", "True"]);
        let b = tool_stage(&["/wd", "False"]);

        assert_eq!(a.fingerprint(), tool_stage(&["/wd", "True"]).fingerprint());
        assert_ne!(a.fingerprint(), b.fingerprint());
        assert_eq!(a.kind(), StageKind::Collaborator);
    }

    #[test]
    fn test_missing_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("table.csv");
        let stage = tool_stage(&[]).output(StageArtifact::file(&out));

        assert_eq!(stage.missing_outputs().len(), 1);

        std::fs::write(&out, "pos,count\n").unwrap();
        assert!(stage.missing_outputs().is_empty());
    }

    #[test]
    fn test_depends_on_deduplicates() {
        let stage = tool_stage(&[])
            .depends_on(StageId::ParseInsertions)
            .depends_on(StageId::ParseInsertions);
        assert_eq!(stage.depends_on, vec![StageId::ParseInsertions]);
    }

    #[tokio::test]
    async fn test_builtin_compile_runs() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("a.fastq");
        std::fs::write(&src, "@r1\nACGT\n+\nIIII\n").unwrap();
        let dest = dir.path().join("out.fastq");

        let task = BuiltinTask::CompileReads {
            sources: vec![src],
            destination: dest.clone(),
        };
        let bytes = task.run().await.unwrap();
        assert_eq!(bytes, 16);
        assert_eq!(std::fs::read_to_string(dest).unwrap(), "@r1\nACGT\n+\nIIII\n");
    }
}
