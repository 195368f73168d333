//! End-to-end deployment check against bundled fixture data.

use crate::config::Toolchain;
use crate::errors::TnflowError;
use crate::process::{ProcessInvoker, ToolInvocation, ToolInvocationResult};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info};

/// Strain name of the bundled fixture.
pub const FIXTURE_STRAIN: &str = "test";

/// Transposon border used for the fixture reads.
pub const FIXTURE_TRANSPOSON: &str = "AGATGTGTATAAGAGACAG";

/// Directory of the fixture shipped with the crate.
#[must_use]
pub fn default_fixture_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("data").join("test")
}

/// Outcome of one preflight tool check.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PreflightCheck {
    /// Program checked.
    pub tool: String,
    /// True if the program answered `-h` with status zero.
    pub passed: bool,
    /// Captured output, kept for failures.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Everything the self-test found.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SelfTestReport {
    /// Preflight checks, in order.
    pub preflight: Vec<PreflightCheck>,
    /// The fixture run; absent when preflight failed.
    pub pipeline: Option<ToolInvocationResult>,
}

impl SelfTestReport {
    /// Returns true if every preflight check passed.
    #[must_use]
    pub fn preflight_passed(&self) -> bool {
        self.preflight.iter().all(|c| c.passed)
    }

    /// Returns true iff preflight passed and the fixture run exited zero.
    #[must_use]
    pub fn passed(&self) -> bool {
        self.preflight_passed() && self.pipeline.as_ref().is_some_and(ToolInvocationResult::success)
    }
}

/// Runs the preflight checks, then the binary itself against the fixture.
pub struct SelfTestHarness {
    invoker: Arc<dyn ProcessInvoker>,
    toolchain: Toolchain,
    executable: PathBuf,
    fixture_dir: PathBuf,
    output_root: Option<PathBuf>,
}

impl std::fmt::Debug for SelfTestHarness {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SelfTestHarness")
            .field("executable", &self.executable)
            .field("fixture_dir", &self.fixture_dir)
            .finish_non_exhaustive()
    }
}

impl SelfTestHarness {
    /// Creates a harness that re-runs `executable`.
    #[must_use]
    pub fn new(
        invoker: Arc<dyn ProcessInvoker>,
        toolchain: Toolchain,
        executable: impl Into<PathBuf>,
    ) -> Self {
        Self {
            invoker,
            toolchain,
            executable: executable.into(),
            fixture_dir: default_fixture_dir(),
            output_root: None,
        }
    }

    /// Uses fixture data from `dir`.
    #[must_use]
    pub fn with_fixture_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.fixture_dir = dir.into();
        self
    }

    /// Writes the fixture run under `dir` instead of a temporary directory.
    #[must_use]
    pub fn with_output_root(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_root = Some(dir.into());
        self
    }

    /// The invocation of the binary against the fixture.
    #[must_use]
    pub fn fixture_invocation(&self, output_root: &Path) -> ToolInvocation {
        let fixture = self.fixture_dir.display().to_string();
        ToolInvocation::new("self_test", self.executable.display().to_string())
            .args(["-s", FIXTURE_STRAIN, "--sd"])
            .arg(fixture.clone())
            .arg("--ad")
            .arg(fixture)
            .args([
                "--at",
                "gb",
                "--st",
                "SE",
                "--tn",
                FIXTURE_TRANSPOSON,
                "--ph",
                "10",
                "--mq",
                "40",
                "--sl5",
                "0.05",
                "--sl3",
                "0.9",
                "--k",
                "--on-tool-failure",
                "fail-fast",
                "--output-root",
            ])
            .arg(output_root.display().to_string())
    }

    async fn check_tool(&self, name: &str, invocation: ToolInvocation) -> PreflightCheck {
        let result = self.invoker.run(&invocation.arg("-h")).await;
        if result.success() {
            info!(tool = name, "Preflight check passed");
            PreflightCheck {
                tool: name.to_string(),
                passed: true,
                detail: None,
            }
        } else {
            error!(tool = name, detail = %result.failure_summary(), "FATAL: required tool is not usable");
            PreflightCheck {
                tool: name.to_string(),
                passed: false,
                detail: Some(result.failure_summary()),
            }
        }
    }

    /// Runs the self-test.
    ///
    /// Every preflight check runs even after one fails; the fixture run is
    /// only attempted when all of them pass.
    pub async fn run(&self) -> Result<SelfTestReport, TnflowError> {
        let preflight = vec![
            self.check_tool("bowtie2", self.toolchain.bowtie2.invocation("preflight"))
                .await,
            self.check_tool("tblastn", self.toolchain.tblastn.invocation("preflight"))
                .await,
        ];
        let mut report = SelfTestReport {
            preflight,
            pipeline: None,
        };
        if !report.preflight_passed() {
            return Ok(report);
        }

        // Held until the fixture run returns.
        let mut _scratch = None;
        let output_root = if let Some(dir) = &self.output_root {
            dir.clone()
        } else {
            let tmp = tempfile::tempdir()?;
            let path = tmp.path().to_path_buf();
            _scratch = Some(tmp);
            path
        };

        info!(fixture = %self.fixture_dir.display(), output_root = %output_root.display(), "Running fixture pipeline");
        let result = self.invoker.run(&self.fixture_invocation(&output_root)).await;
        if result.success() {
            info!(duration_ms = result.duration_ms, "Self-test passed");
        } else {
            error!(detail = %result.failure_summary(), output = %result.output.trim(), "Self-test pipeline failed");
        }
        report.pipeline = Some(result);
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Script, ScriptedInvoker};
    use pretty_assertions::assert_eq;

    fn harness(invoker: &Arc<ScriptedInvoker>) -> SelfTestHarness {
        SelfTestHarness::new(invoker.clone(), Toolchain::default(), "/opt/tnflow/bin/tnflow")
            .with_fixture_dir("/opt/tnflow/fixture")
    }

    #[tokio::test]
    async fn test_passes_when_everything_succeeds() {
        let invoker = Arc::new(ScriptedInvoker::new());
        let out = tempfile::tempdir().unwrap();

        let report = harness(&invoker)
            .with_output_root(out.path())
            .run()
            .await
            .unwrap();

        assert!(report.passed());
        assert_eq!(invoker.labels(), vec!["preflight", "preflight", "self_test"]);
        let calls = invoker.calls();
        assert_eq!(calls[0].program, "bowtie2");
        assert_eq!(calls[1].program, "tblastn");
        assert_eq!(calls[2].program, "/opt/tnflow/bin/tnflow");
        assert!(calls[2].args.windows(2).any(|w| w == ["--sd", "/opt/tnflow/fixture"]));
        assert!(calls[2].args.windows(2).any(|w| w == ["--on-tool-failure", "fail-fast"]));
        assert_eq!(
            calls[2].args.last().map(String::as_str),
            Some(out.path().to_str().unwrap())
        );
    }

    #[tokio::test]
    async fn test_preflight_failure_checks_all_tools_and_skips_run() {
        let invoker = Arc::new(ScriptedInvoker::new());
        invoker.fail("preflight", 127, "bowtie2: command not found");

        let report = harness(&invoker).run().await.unwrap();

        assert!(!report.passed());
        assert_eq!(report.preflight.len(), 2);
        assert!(report.preflight.iter().all(|c| !c.passed));
        assert!(report.preflight[0]
            .detail
            .as_deref()
            .unwrap()
            .contains("command not found"));
        assert!(report.pipeline.is_none());
        assert_eq!(invoker.call_count("self_test"), 0);
    }

    #[tokio::test]
    async fn test_failed_fixture_run_surfaces_output() {
        let invoker = Arc::new(ScriptedInvoker::new());
        invoker.set("self_test", Script::fail(1, "stage 'align' failed"));

        let report = harness(&invoker).run().await.unwrap();

        assert!(report.preflight_passed());
        assert!(!report.passed());
        let pipeline = report.pipeline.unwrap();
        assert_eq!(pipeline.exit_code, Some(1));
        assert!(pipeline.output.contains("align"));
    }

    #[test]
    fn test_bundled_fixture_exists() {
        let dir = default_fixture_dir();
        assert!(dir.join("test.fasta").is_file());
        assert!(dir.join("test.gb").is_file());
    }
}
