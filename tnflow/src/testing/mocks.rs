//! A scripted process invoker for driving pipelines without external tools.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::PathBuf;

use crate::config::RunConfiguration;
use crate::core::ArtifactKind;
use crate::pipeline::Branch;
use crate::process::{ProcessInvoker, ToolInvocation, ToolInvocationResult};
use crate::stages::StageCatalog;

/// What a scripted invocation does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Script {
    /// Exit code to report.
    pub exit_code: Option<i32>,
    /// Combined output to report.
    pub output: String,
    /// Artifacts to create before returning.
    pub creates: Vec<(PathBuf, ArtifactKind)>,
    /// Fill the directory named by the invocation's last argument.
    pub writes_last_arg: bool,
}

impl Script {
    /// Exits zero, creating nothing.
    #[must_use]
    pub fn succeed() -> Self {
        Self {
            exit_code: Some(0),
            output: String::new(),
            creates: Vec::new(),
            writes_last_arg: false,
        }
    }

    /// Exits with `code` and `output`, creating nothing.
    #[must_use]
    pub fn fail(code: i32, output: impl Into<String>) -> Self {
        Self {
            exit_code: Some(code),
            output: output.into(),
            creates: Vec::new(),
            writes_last_arg: false,
        }
    }

    /// Adds an artifact to create.
    #[must_use]
    pub fn creating(mut self, path: impl Into<PathBuf>, kind: ArtifactKind) -> Self {
        self.creates.push((path.into(), kind));
        self
    }

    /// Writes into the directory passed as the last argument, and nowhere else.
    #[must_use]
    pub fn into_last_arg(mut self) -> Self {
        self.writes_last_arg = true;
        self
    }

    fn materialize(&self, invocation: &ToolInvocation) -> std::io::Result<()> {
        if self.writes_last_arg {
            if let Some(dir) = invocation.args.last() {
                let dir = PathBuf::from(dir);
                std::fs::create_dir_all(&dir)?;
                std::fs::write(dir.join(format!("{}.out", invocation.label)), "scripted\n")?;
            }
        }
        for (path, kind) in &self.creates {
            match kind {
                ArtifactKind::File => {
                    if let Some(parent) = path.parent() {
                        std::fs::create_dir_all(parent)?;
                    }
                    std::fs::write(path, "scripted\n")?;
                }
                ArtifactKind::Directory => {
                    std::fs::create_dir_all(path)?;
                    std::fs::write(path.join("scripted.out"), "scripted\n")?;
                }
            }
        }
        Ok(())
    }
}

/// Invoker that records calls and plays back per-label scripts.
///
/// Labels without a script succeed and create nothing.
#[derive(Debug, Default)]
pub struct ScriptedInvoker {
    scripts: Mutex<HashMap<String, Script>>,
    calls: Mutex<Vec<ToolInvocation>>,
}

impl ScriptedInvoker {
    /// Creates an invoker with no scripts.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an invoker whose every planned stage succeeds and writes its
    /// declared outputs for `config`.
    #[must_use]
    pub fn for_config(config: &RunConfiguration) -> Self {
        let invoker = Self::new();
        let catalog = StageCatalog::new(config);
        for id in Branch::from_config(config).stage_plan() {
            let Ok(stage) = catalog.stage(id) else {
                continue;
            };
            let script = stage.outputs.iter().fold(Script::succeed(), |script, artifact| {
                script.creating(artifact.path.clone(), artifact.kind)
            });
            invoker.set(id.as_str(), script);
        }
        invoker
    }

    /// Sets the script for `label`.
    pub fn set(&self, label: impl Into<String>, script: Script) {
        self.scripts.lock().insert(label.into(), script);
    }

    /// Makes `label` exit with `code` without creating anything.
    pub fn fail(&self, label: impl Into<String>, code: i32, output: impl Into<String>) {
        self.set(label, Script::fail(code, output));
    }

    /// Makes `label` exit zero without creating anything.
    pub fn succeed_without_outputs(&self, label: impl Into<String>) {
        self.set(label, Script::succeed());
    }

    /// Every invocation received, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<ToolInvocation> {
        self.calls.lock().clone()
    }

    /// Labels of every invocation received, in order.
    #[must_use]
    pub fn labels(&self) -> Vec<String> {
        self.calls.lock().iter().map(|c| c.label.clone()).collect()
    }

    /// How often `label` was invoked.
    #[must_use]
    pub fn call_count(&self, label: &str) -> usize {
        self.calls.lock().iter().filter(|c| c.label == label).count()
    }

    /// Forgets recorded calls; scripts are kept.
    pub fn reset(&self) {
        self.calls.lock().clear();
    }
}

#[async_trait]
impl ProcessInvoker for ScriptedInvoker {
    async fn run(&self, invocation: &ToolInvocation) -> ToolInvocationResult {
        self.calls.lock().push(invocation.clone());
        let script = self
            .scripts
            .lock()
            .get(&invocation.label)
            .cloned()
            .unwrap_or_else(Script::succeed);

        if let Err(err) = script.materialize(invocation) {
            return ToolInvocationResult::exited(invocation, Some(1), err.to_string());
        }
        ToolInvocationResult::exited(invocation, script.exit_code, script.output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_outcomes() {
        let dir = tempfile::tempdir().unwrap();
        let invoker = ScriptedInvoker::new();
        invoker.set(
            "plot",
            Script::succeed().creating(dir.path().join("plots"), ArtifactKind::Directory),
        );
        invoker.fail("align", 1, "Error: reads file does not look like a FASTQ file");

        let ok = invoker.run(&ToolInvocation::new("plot", "plotter")).await;
        let bad = invoker.run(&ToolInvocation::new("align", "bowtie2")).await;
        let unknown = invoker.run(&ToolInvocation::new("other", "x")).await;

        assert!(ok.success());
        assert!(dir.path().join("plots/scripted.out").is_file());
        assert_eq!(bad.exit_code, Some(1));
        assert!(bad.failure_summary().contains("FASTQ"));
        assert!(unknown.success());
        assert_eq!(invoker.labels(), vec!["plot", "align", "other"]);
        assert_eq!(invoker.call_count("align"), 1);
    }

    #[tokio::test]
    async fn test_into_last_arg_writes_only_there() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("plots");
        let invoker = ScriptedInvoker::new();
        invoker.set("plot", Script::succeed().into_last_arg());

        let inv = ToolInvocation::new("plot", "plotter")
            .arg(dir.path().display().to_string())
            .arg(target.display().to_string());
        assert!(invoker.run(&inv).await.success());

        assert!(target.join("plot.out").is_file());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }
}
