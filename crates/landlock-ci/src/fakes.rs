//! Scripted phase executor (testing only)
//!
//! Lets pipeline tests decide what each phase writes to the log and how it
//! exits, without spawning cargo.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::{HarnessError, Result};
use crate::phase::{PhaseConfig, PhaseKind};
use crate::runner::{append_to_log, PhaseExecutor, PhaseResult};

#[derive(Debug, Clone)]
enum Script {
    Exit { lines: Vec<String>, exit_code: i32 },
    SpawnError(String),
}

/// Executor whose phases append canned lines and exit with canned codes.
/// Phases without a script succeed silently.
#[derive(Debug, Default)]
pub struct ScriptedExecutor {
    scripts: HashMap<PhaseKind, Script>,
    calls: Mutex<Vec<PhaseKind>>,
}

impl ScriptedExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(mut self, kind: PhaseKind, lines: &[&str], exit_code: i32) -> Self {
        self.scripts.insert(
            kind,
            Script::Exit {
                lines: lines.iter().map(|l| l.to_string()).collect(),
                exit_code,
            },
        );
        self
    }

    /// Make the phase fail to start at all.
    pub fn spawn_error(mut self, kind: PhaseKind, message: &str) -> Self {
        self.scripts
            .insert(kind, Script::SpawnError(message.to_string()));
        self
    }

    /// Phases executed so far, in order.
    pub fn calls(&self) -> Vec<PhaseKind> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl PhaseExecutor for ScriptedExecutor {
    async fn execute(&self, config: &PhaseConfig, log_path: &Path) -> Result<PhaseResult> {
        self.calls.lock().unwrap().push(config.kind);

        let (lines, exit_code) = match self.scripts.get(&config.kind) {
            None => (Vec::new(), 0),
            Some(Script::Exit { lines, exit_code }) => (lines.clone(), *exit_code),
            Some(Script::SpawnError(message)) => {
                return Err(HarnessError::Io(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    message.clone(),
                )))
            }
        };

        let stdout = lines.iter().map(|l| format!("{l}\n")).collect::<String>();
        append_to_log(log_path, stdout.as_bytes()).await?;

        Ok(PhaseResult {
            phase_name: config.name.clone(),
            kind: config.kind,
            exit_code,
            stdout,
            stderr: String::new(),
            duration_ms: 0,
            success: exit_code == 0,
            tolerated: config.tolerate_failure,
        })
    }
}
