//! Error types for tnflow.
//!
//! Only conditions that must stop a run live here. A failing external tool is
//! not an error at this level: it is captured as a failed stage output and the
//! run's failure mode decides what happens next.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for tnflow operations.
#[derive(Debug, Error)]
pub enum TnflowError {
    /// The run configuration could not be resolved.
    #[error("{0}")]
    Configuration(#[from] ConfigurationError),

    /// The inputs exist but cannot be interpreted.
    #[error("{0}")]
    MalformedInput(#[from] MalformedInputError),

    /// A stage needs an artifact that no earlier run produced.
    #[error("Stage '{stage}' requires {} which does not exist", path.display())]
    MissingPrerequisite {
        /// The stage that cannot start.
        stage: String,
        /// The artifact it needs.
        path: PathBuf,
    },

    /// A stage failure that the failure policy treats as fatal.
    #[error("Stage '{stage}' aborted the run: {reason}")]
    StageAborted {
        /// The failed stage.
        stage: String,
        /// Captured failure text.
        reason: String,
    },

    /// Another run holds the working directory.
    #[error("Another run is using this strain's working directory (lock file {})", path.display())]
    RunInProgress {
        /// The lock file path.
        path: PathBuf,
    },

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for TnflowError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl TnflowError {
    /// Returns true if the error was raised before any stage ran.
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_) | Self::MalformedInput(_))
    }
}

/// Error raised while resolving the run configuration.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct ConfigurationError {
    /// Stable error code (e.g. "CONFIG-MISSING-FILE").
    pub code: &'static str,
    /// The error message.
    pub message: String,
    /// The parameter responsible, if any.
    pub field: Option<String>,
    /// Hint for fixing the error.
    pub fix_hint: Option<String>,
}

impl ConfigurationError {
    /// Creates a new configuration error.
    #[must_use]
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            field: None,
            fix_hint: None,
        }
    }

    /// A required parameter was not supplied.
    #[must_use]
    pub fn missing_parameter(field: &str) -> Self {
        Self::new("CONFIG-MISSING-PARAM", format!("Missing required parameter '{field}'"))
            .with_field(field)
    }

    /// A numeric parameter is outside its valid domain.
    #[must_use]
    pub fn out_of_domain(field: &str, value: impl std::fmt::Display, domain: &str) -> Self {
        Self::new(
            "CONFIG-OUT-OF-DOMAIN",
            format!("Parameter '{field}' = {value} is outside its valid domain {domain}"),
        )
        .with_field(field)
    }

    /// A required input file could not be found.
    #[must_use]
    pub fn missing_file(what: &str, dir: &std::path::Path) -> Self {
        Self::new(
            "CONFIG-MISSING-FILE",
            format!("No {what} found in {}", dir.display()),
        )
    }

    /// Sets the parameter responsible.
    #[must_use]
    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    /// Sets the fix hint.
    #[must_use]
    pub fn with_fix_hint(mut self, hint: impl Into<String>) -> Self {
        self.fix_hint = Some(hint.into());
        self
    }
}

/// Error raised when the discovered inputs cannot be used as given.
#[derive(Debug, Clone, Error)]
#[error("Malformed input: {message}")]
pub struct MalformedInputError {
    /// The error message.
    pub message: String,
    /// The offending paths.
    pub paths: Vec<PathBuf>,
}

impl MalformedInputError {
    /// Creates a new malformed input error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            paths: Vec::new(),
        }
    }

    /// Sets the offending paths.
    #[must_use]
    pub fn with_paths(mut self, paths: Vec<PathBuf>) -> Self {
        self.paths = paths;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_error_builders() {
        let err = ConfigurationError::out_of_domain("sl5", 1.5, "[0, 1]")
            .with_fix_hint("Use a fraction between 0 and 1");

        assert_eq!(err.code, "CONFIG-OUT-OF-DOMAIN");
        assert_eq!(err.field.as_deref(), Some("sl5"));
        assert!(err.to_string().contains("1.5"));
        assert!(err.fix_hint.is_some());
    }

    #[test]
    fn test_missing_parameter() {
        let err = ConfigurationError::missing_parameter("strain");
        assert_eq!(err.field.as_deref(), Some("strain"));
        assert!(err.to_string().contains("strain"));
    }

    #[test]
    fn test_error_classification() {
        let config: TnflowError = ConfigurationError::missing_parameter("strain").into();
        let malformed: TnflowError = MalformedInputError::new("mates differ").into();
        let aborted = TnflowError::StageAborted {
            stage: "align".to_string(),
            reason: "exit 1".to_string(),
        };

        assert!(config.is_configuration());
        assert!(malformed.is_configuration());
        assert!(!aborted.is_configuration());
        assert!(malformed.to_string().starts_with("Malformed input"));
    }

    #[test]
    fn test_missing_prerequisite_message() {
        let err = TnflowError::MissingPrerequisite {
            stage: "infer_essentiality".to_string(),
            path: PathBuf::from("/w/all_insertions_X.csv"),
        };
        let msg = err.to_string();
        assert!(msg.contains("infer_essentiality"));
        assert!(msg.contains("all_insertions_X.csv"));
    }
}
