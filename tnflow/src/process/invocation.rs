//! Command vectors and their captured results.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// One external command to execute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolInvocation {
    /// Short name used in logs and test scripts (usually the stage id).
    pub label: String,
    /// Program to execute.
    pub program: String,
    /// Arguments, passed verbatim (no shell).
    pub args: Vec<String>,
    /// When set, the child's stderr is also written to this file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stderr_log: Option<PathBuf>,
}

impl ToolInvocation {
    /// Creates a new invocation.
    #[must_use]
    pub fn new(label: impl Into<String>, program: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            program: program.into(),
            args: Vec::new(),
            stderr_log: None,
        }
    }

    /// Appends one argument.
    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Appends several arguments.
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Sets the stderr log file.
    #[must_use]
    pub fn with_stderr_log(mut self, path: impl Into<PathBuf>) -> Self {
        self.stderr_log = Some(path.into());
        self
    }

    /// The command line as a single display string.
    #[must_use]
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Captured result of running a [`ToolInvocation`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInvocationResult {
    /// Label of the invocation.
    pub label: String,
    /// The command that ran.
    pub command_line: String,
    /// Exit code; `None` if the process could not be started or was killed
    /// by a signal.
    pub exit_code: Option<i32>,
    /// Captured stdout followed by captured stderr. The two streams are
    /// not interleaved, so the last line usually comes from stderr.
    pub output: String,
    /// Wall time in milliseconds.
    pub duration_ms: f64,
}

impl ToolInvocationResult {
    /// A result for a process that exited with `code`.
    #[must_use]
    pub fn exited(invocation: &ToolInvocation, code: Option<i32>, output: impl Into<String>) -> Self {
        Self {
            label: invocation.label.clone(),
            command_line: invocation.command_line(),
            exit_code: code,
            output: output.into(),
            duration_ms: 0.0,
        }
    }

    /// A result for a process that could not be started.
    #[must_use]
    pub fn spawn_failed(invocation: &ToolInvocation, error: &std::io::Error) -> Self {
        Self::exited(
            invocation,
            None,
            format!("failed to start '{}': {error}", invocation.program),
        )
    }

    /// Sets the duration.
    #[must_use]
    pub fn with_duration_ms(mut self, duration_ms: f64) -> Self {
        self.duration_ms = duration_ms;
        self
    }

    /// Returns true if the process exited with status zero.
    #[must_use]
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// One-line description of a failure, for logs and reports.
    ///
    /// Quotes the last line of [`output`](Self::output), which is the last
    /// stderr line whenever the tool wrote to stderr.
    #[must_use]
    pub fn failure_summary(&self) -> String {
        let status = self
            .exit_code
            .map_or_else(|| "no exit status".to_string(), |c| format!("exit status {c}"));
        let tail = self.output.trim().lines().last().unwrap_or_default();
        if tail.is_empty() {
            format!("`{}` failed with {status}", self.command_line)
        } else {
            format!("`{}` failed with {status}: {tail}", self.command_line)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_line() {
        let inv = ToolInvocation::new("align", "bowtie2")
            .arg("--end-to-end")
            .args(["-x", "idx/X"]);

        assert_eq!(inv.command_line(), "bowtie2 --end-to-end -x idx/X");
        assert!(inv.stderr_log.is_none());
    }

    #[test]
    fn test_result_success() {
        let inv = ToolInvocation::new("check", "bowtie2").arg("-h");
        let ok = ToolInvocationResult::exited(&inv, Some(0), "usage");
        let failed = ToolInvocationResult::exited(&inv, Some(1), "line one\nError: bad index\n");

        assert!(ok.success());
        assert!(!failed.success());
        assert_eq!(
            failed.failure_summary(),
            "`bowtie2 -h` failed with exit status 1: Error: bad index"
        );
    }

    #[test]
    fn test_spawn_failure_is_captured() {
        let inv = ToolInvocation::new("check", "tblastn");
        let err = std::io::Error::new(std::io::ErrorKind::NotFound, "No such file or directory");
        let result = ToolInvocationResult::spawn_failed(&inv, &err);

        assert!(!result.success());
        assert_eq!(result.exit_code, None);
        assert!(result.output.contains("failed to start 'tblastn'"));
        assert!(result.failure_summary().contains("no exit status"));
    }
}
