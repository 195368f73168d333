//! Process execution.

use super::{ToolInvocation, ToolInvocationResult};
use crate::observability::SpanTimer;
use async_trait::async_trait;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, warn};

/// Runs external commands on behalf of stages.
///
/// Implementations never raise for a failing command: a non-zero exit or a
/// program that cannot be started comes back as a [`ToolInvocationResult`]
/// and the caller decides what it means.
#[async_trait]
pub trait ProcessInvoker: Send + Sync {
    /// Runs the command to completion and captures its output.
    async fn run(&self, invocation: &ToolInvocation) -> ToolInvocationResult;
}

/// Invoker backed by real child processes.
#[derive(Debug, Clone, Default)]
pub struct SystemInvoker;

impl SystemInvoker {
    /// Creates a new system invoker.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ProcessInvoker for SystemInvoker {
    async fn run(&self, invocation: &ToolInvocation) -> ToolInvocationResult {
        debug!(label = %invocation.label, command = %invocation.command_line(), "Spawning process");
        let timer = SpanTimer::start(&invocation.label);

        // Dropping the future (Ctrl-C) must not leave the tool running.
        let spawned = Command::new(&invocation.program)
            .args(&invocation.args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await;

        let output = match spawned {
            Ok(output) => output,
            Err(err) => {
                warn!(label = %invocation.label, program = %invocation.program, error = %err, "Could not start process");
                return ToolInvocationResult::spawn_failed(invocation, &err)
                    .with_duration_ms(timer.finish());
            }
        };

        if let Some(ref log_path) = invocation.stderr_log {
            if let Err(err) = tokio::fs::write(log_path, &output.stderr).await {
                warn!(path = %log_path.display(), error = %err, "Could not write stderr log");
            }
        }

        let combined = combine_streams(&output.stdout, &output.stderr);

        let result = ToolInvocationResult::exited(invocation, output.status.code(), combined)
            .with_duration_ms(timer.finish());

        if result.success() {
            debug!(label = %invocation.label, duration_ms = result.duration_ms, "Process finished");
        } else {
            warn!(
                label = %invocation.label,
                exit_code = ?result.exit_code,
                output = %result.output.trim(),
                "Process reported failure"
            );
        }
        result
    }
}

/// Stdout then stderr, each kept whole. A newline is inserted between them
/// when stdout does not end with one.
fn combine_streams(stdout: &[u8], stderr: &[u8]) -> String {
    let mut combined = String::from_utf8_lossy(stdout).into_owned();
    if !stderr.is_empty() && !combined.is_empty() && !combined.ends_with('\n') {
        combined.push('\n');
    }
    combined.push_str(&String::from_utf8_lossy(stderr));
    combined
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_captures_combined_output_and_status() {
        let inv = ToolInvocation::new("shell", "sh")
            .arg("-c")
            .arg("echo out; echo err 1>&2; exit 3");

        let result = SystemInvoker::new().run(&inv).await;

        assert_eq!(result.exit_code, Some(3));
        assert!(!result.success());
        assert!(result.output.contains("out"));
        assert!(result.output.contains("err"));
    }

    #[tokio::test]
    async fn test_stderr_follows_stdout_regardless_of_timing() {
        let inv = ToolInvocation::new("shell", "sh")
            .arg("-c")
            .arg("printf 'Error: index missing' 1>&2; printf 'progress 50%%'; exit 1");

        let result = SystemInvoker::new().run(&inv).await;

        assert_eq!(result.output, "progress 50%\nError: index missing");
        assert!(result.failure_summary().ends_with(": Error: index missing"));
    }

    #[test]
    fn test_combine_streams() {
        assert_eq!(combine_streams(b"out\n", b"err\n"), "out\nerr\n");
        assert_eq!(combine_streams(b"out", b"err"), "out\nerr");
        assert_eq!(combine_streams(b"", b"err"), "err");
        assert_eq!(combine_streams(b"out", b""), "out");
    }

    #[tokio::test]
    async fn test_success() {
        let inv = ToolInvocation::new("shell", "sh").args(["-c", "exit 0"]);
        let result = SystemInvoker::new().run(&inv).await;
        assert!(result.success());
    }

    #[tokio::test]
    async fn test_missing_program_is_soft_failure() {
        let inv = ToolInvocation::new("missing", "tnflow-definitely-not-installed");
        let result = SystemInvoker::new().run(&inv).await;

        assert_eq!(result.exit_code, None);
        assert!(result.output.contains("failed to start"));
    }

    #[tokio::test]
    async fn test_stderr_log_is_written() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("bowtie_align_log.log");
        let inv = ToolInvocation::new("align", "sh")
            .args(["-c", "echo 'overall alignment rate' 1>&2"])
            .with_stderr_log(&log);

        let result = SystemInvoker::new().run(&inv).await;

        assert!(result.success());
        let logged = std::fs::read_to_string(&log).unwrap();
        assert!(logged.contains("overall alignment rate"));
    }
}
