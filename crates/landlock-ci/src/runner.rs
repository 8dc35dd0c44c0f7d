//! Test phase execution.

use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use crate::error::{HarnessError, Result};
use crate::phase::{PhaseConfig, PhaseKind};

/// Environment variable through which phases learn the log artifact path.
pub const LOG_PATH_ENV: &str = "LANDLOCK_CI_LOG";

/// Result of a phase execution.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PhaseResult {
    /// Phase name.
    pub phase_name: String,

    pub kind: PhaseKind,

    /// Exit code (0 = success, -1 = killed or never started).
    pub exit_code: i32,

    /// Captured stdout.
    pub stdout: String,

    /// Captured stderr.
    pub stderr: String,

    /// Duration in milliseconds.
    pub duration_ms: u64,

    /// Whether execution succeeded.
    pub success: bool,

    /// Copied from the phase's `tolerate_failure`.
    pub tolerated: bool,
}

impl PhaseResult {
    /// Whether this phase passed (exit code 0).
    pub fn passed(&self) -> bool {
        self.success && self.exit_code == 0
    }

    /// A failure the pipeline does not tolerate.
    pub fn is_fatal(&self) -> bool {
        !self.passed() && !self.tolerated
    }

    /// Result for a phase that could not be run at all.
    pub fn errored(config: &PhaseConfig, error: &HarnessError, duration_ms: u64) -> Self {
        Self {
            phase_name: config.name.clone(),
            kind: config.kind,
            exit_code: -1,
            stdout: String::new(),
            stderr: error.to_string(),
            duration_ms,
            success: false,
            tolerated: config.tolerate_failure,
        }
    }

    /// The error describing this phase's failure, if it failed.
    pub fn failure(&self) -> Option<HarnessError> {
        if self.passed() {
            return None;
        }
        let phase = self.phase_name.clone();
        let exit_code = self.exit_code;
        Some(match self.kind {
            PhaseKind::Unit => HarnessError::UnitTestFailure { phase, exit_code },
            PhaseKind::Integration => HarnessError::IntegrationTestFailure { phase, exit_code },
        })
    }
}

/// Runs a test phase and appends its outcome lines to the shared log.
#[async_trait]
pub trait PhaseExecutor: Send + Sync {
    async fn execute(&self, config: &PhaseConfig, log_path: &Path) -> Result<PhaseResult>;
}

/// Executes phases as child processes.
///
/// The child's stdout and stderr are captured and appended to the log, the
/// way a CI step would `tee -a` test output into the artifact. The log path
/// is also exported as [`LOG_PATH_ENV`] for suites that write records directly.
#[derive(Debug, Default, Clone, Copy)]
pub struct CommandExecutor;

#[async_trait]
impl PhaseExecutor for CommandExecutor {
    async fn execute(&self, config: &PhaseConfig, log_path: &Path) -> Result<PhaseResult> {
        let start = Instant::now();

        let (exe, args) = config
            .command
            .split_first()
            .ok_or_else(|| HarnessError::EmptyCommand {
                phase: config.name.clone(),
            })?;

        let child = Command::new(exe)
            .args(args)
            .env(LOG_PATH_ENV, log_path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let output = if config.timeout_secs > 0 {
            tokio::time::timeout(
                Duration::from_secs(config.timeout_secs),
                child.wait_with_output(),
            )
            .await
            .map_err(|_| HarnessError::PhaseTimeout {
                phase: config.name.clone(),
                timeout_secs: config.timeout_secs,
            })??
        } else {
            child.wait_with_output().await?
        };

        append_to_log(log_path, &output.stdout).await?;
        append_to_log(log_path, &output.stderr).await?;

        let duration_ms = start.elapsed().as_millis() as u64;
        let exit_code = output.status.code().unwrap_or(-1);
        debug!(phase = %config.name, exit_code, duration_ms, "phase process exited");

        Ok(PhaseResult {
            phase_name: config.name.clone(),
            kind: config.kind,
            exit_code,
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            duration_ms,
            success: output.status.success(),
            tolerated: config.tolerate_failure,
        })
    }
}

/// Append raw bytes to the log, creating it on first write.
pub async fn append_to_log(log_path: &Path, bytes: &[u8]) -> Result<()> {
    if bytes.is_empty() {
        return Ok(());
    }
    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)
        .await?;
    file.write_all(bytes).await?;
    if !bytes.ends_with(b"\n") {
        file.write_all(b"\n").await?;
    }
    file.flush().await?;
    Ok(())
}
