//! Error types for the CI harness.

use std::path::PathBuf;

use thiserror::Error;

/// Errors produced by the harness.
///
/// Only `UnitTestFailure` is fatal to a pipeline run. The other conditions are
/// absorbed by the component that raises them and surfaced as warnings.
#[derive(Debug, Error)]
pub enum HarnessError {
    /// The kernel release string does not start with `major.minor`.
    #[error("malformed kernel version string: {input:?}")]
    MalformedVersionString { input: String },

    /// The result log artifact does not exist.
    #[error("result log not found: {}", path.display())]
    MissingArtifact { path: PathBuf },

    /// A log line carries both outcome markers.
    #[error("line {line_no} carries both [PASS] and [FAIL] markers: {line}")]
    MalformedLogLine { line_no: usize, line: String },

    /// The unit-test phase failed. Never tolerated.
    #[error("unit test phase '{phase}' failed with exit code {exit_code}")]
    UnitTestFailure { phase: String, exit_code: i32 },

    /// The integration-test phase failed.
    #[error("integration test phase '{phase}' failed with exit code {exit_code}")]
    IntegrationTestFailure { phase: String, exit_code: i32 },

    /// A phase was configured without a command.
    #[error("phase {phase} has empty command")]
    EmptyCommand { phase: String },

    /// A phase exceeded its timeout.
    #[error("phase {phase} timed out after {timeout_secs} seconds")]
    PhaseTimeout { phase: String, timeout_secs: u64 },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl HarnessError {
    /// Whether this condition fails the pipeline on its own.
    pub fn is_fatal(&self) -> bool {
        matches!(self, HarnessError::UnitTestFailure { .. })
    }
}

/// Convenience result alias.
pub type Result<T> = std::result::Result<T, HarnessError>;
