//! Test phase definitions and configuration.

use serde::{Deserialize, Serialize};

/// The two test phases of a run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PhaseKind {
    /// cargo test --workspace --lib --bins
    Unit,

    /// cargo test --workspace --tests
    Integration,
}

impl PhaseKind {
    /// Get the phase name as a string.
    pub fn name(&self) -> &'static str {
        match self {
            PhaseKind::Unit => "unit",
            PhaseKind::Integration => "integration",
        }
    }

    /// Get the phase's default command.
    pub fn command(&self) -> Vec<String> {
        let args: &[&str] = match self {
            PhaseKind::Unit => &["cargo", "test", "--workspace", "--lib", "--bins"],
            PhaseKind::Integration => &["cargo", "test", "--workspace", "--tests"],
        };
        args.iter().map(|s| s.to_string()).collect()
    }

    /// Whether a failing exit status is tolerated by default.
    ///
    /// Integration tests exercise the kernel sandbox and fail on hosts
    /// without it; unit tests must always pass.
    pub fn tolerates_failure(&self) -> bool {
        matches!(self, PhaseKind::Integration)
    }
}

/// Configuration for a test phase.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PhaseConfig {
    /// Human-readable phase name.
    pub name: String,

    pub kind: PhaseKind,

    /// Command to execute (first element is executable).
    pub command: Vec<String>,

    /// A failing exit status does not fail the pipeline when set.
    pub tolerate_failure: bool,

    /// Timeout in seconds (0 = none).
    pub timeout_secs: u64,

    /// Whether this phase is enabled.
    pub enabled: bool,
}

impl PhaseConfig {
    /// Create a phase configuration with the kind's defaults.
    pub fn from_kind(kind: PhaseKind) -> Self {
        Self {
            name: kind.name().to_string(),
            kind,
            command: kind.command(),
            tolerate_failure: kind.tolerates_failure(),
            timeout_secs: 0,
            enabled: true,
        }
    }

    /// Create a phase with a custom command, keeping the kind's tolerance.
    pub fn custom(kind: PhaseKind, command: Vec<String>) -> Self {
        Self {
            command,
            ..Self::from_kind(kind)
        }
    }

    pub fn tolerating(mut self, tolerate_failure: bool) -> Self {
        self.tolerate_failure = tolerate_failure;
        self
    }

    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    /// Disable this phase.
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}
