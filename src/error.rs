//! Error handling module for the provisioning engine
//!
//! Planning errors (an unknown manifest key) abort the whole operation.
//! Execution errors are collected per instruction and surfaced together as
//! `ProvisionError::ExecutionFailed`.

use std::fmt;

use thiserror::Error;

use crate::provision::InstallInstruction;

/// Main error type for the provisioning engine
#[derive(Error, Debug)]
pub enum ProvisionError {
    /// A requested or depended-upon key is missing from the manifest
    #[error("manifest key not found: {0}")]
    UnknownKey(String),

    /// One or more planned instructions failed
    #[error("{}", render_failures(.0))]
    ExecutionFailed(Vec<InstructionFailure>),

    /// Manifest parsing or shape errors
    #[error("Manifest error: {0}")]
    Manifest(String),

    /// Configuration errors (loading, parsing, validation)
    #[error("Configuration error: {0}")]
    Config(String),

    /// An installer identifier outside the supported set
    #[error("unknown installer: {0}")]
    UnknownInstaller(String),

    /// IO errors (log file, wrapper paths, config files)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML deserialization errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for provisioning operations
pub type Result<T> = std::result::Result<T, ProvisionError>;

impl ProvisionError {
    /// Create a manifest error
    pub fn manifest(msg: impl Into<String>) -> Self {
        Self::Manifest(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Number of failed instructions carried by this error (zero for
    /// anything that is not an execution failure).
    pub fn failure_count(&self) -> usize {
        match self {
            Self::ExecutionFailed(failures) => failures.len(),
            _ => 0,
        }
    }
}

/// A single instruction that failed during plan execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstructionFailure {
    pub instruction: InstallInstruction,
    pub message: String,
}

impl fmt::Display for InstructionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.instruction, self.message)
    }
}

/// Render failures as one numbered, human-readable block.
fn render_failures(failures: &[InstructionFailure]) -> String {
    let noun = if failures.len() == 1 { "error" } else { "errors" };
    let mut out = format!("{} {} occurred:", failures.len(), noun);
    for (i, failure) in failures.iter().enumerate() {
        out.push_str(&format!("\n[{}] {}", i + 1, failure));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::installer::Installer;

    fn failure(pkg: &str, msg: &str) -> InstructionFailure {
        InstructionFailure {
            instruction: InstallInstruction::package(Installer::Apt, pkg),
            message: msg.to_string(),
        }
    }

    #[test]
    fn test_error_display() {
        let err = ProvisionError::UnknownKey("ghost".into());
        assert_eq!(err.to_string(), "manifest key not found: ghost");

        let err = ProvisionError::config("manifest path cannot be empty");
        assert_eq!(
            err.to_string(),
            "Configuration error: manifest path cannot be empty"
        );
    }

    #[test]
    fn test_execution_failed_is_numbered() {
        let err = ProvisionError::ExecutionFailed(vec![
            failure("foo", "exit status 100"),
            failure("bar", "not found"),
        ]);
        let text = err.to_string();
        assert!(text.starts_with("2 errors occurred:"));
        assert!(text.contains("[1] apt foo: exit status 100"));
        assert!(text.contains("[2] apt bar: not found"));
        assert_eq!(err.failure_count(), 2);
    }

    #[test]
    fn test_single_failure_is_singular() {
        let err = ProvisionError::ExecutionFailed(vec![failure("foo", "boom")]);
        assert!(err.to_string().starts_with("1 error occurred:"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: ProvisionError = io_err.into();
        assert!(matches!(err, ProvisionError::Io(_)));
        assert_eq!(err.failure_count(), 0);
    }
}
