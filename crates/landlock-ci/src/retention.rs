//! Post-run artifact retention.
//!
//! The log is kept even when the run failed so it can be audited later. A
//! missing log is recorded in the summary and is never an error.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{info, warn};

use crate::error::Result;
use crate::gate::GateReport;
use crate::probe::KernelProbe;

pub const SUMMARY_FILE: &str = "summary.json";

/// JSON summary written next to the retained log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub kernel: KernelProbe,
    pub report: GateReport,

    /// Retained copy of the log, `None` when there was no log.
    pub retained_log: Option<PathBuf>,

    /// SHA-256 of the retained log.
    pub log_sha256: Option<String>,

    pub exit_code: i32,
}

/// Where retention put things.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Retained {
    pub summary_path: PathBuf,
    pub log_path: Option<PathBuf>,
}

/// Copy `log` into `dir` and write the summary alongside it.
pub fn retain(dir: &Path, log: &Path, mut summary: RunSummary) -> Result<Retained> {
    std::fs::create_dir_all(dir)?;

    let (retained_log, digest) = if log.is_file() {
        let bytes = std::fs::read(log)?;
        let target = dir.join(retained_name(log, &summary.finished_at));
        std::fs::write(&target, &bytes)?;
        info!(from = %log.display(), to = %target.display(), "retained result log");
        (Some(target), Some(sha256_hex(&bytes)))
    } else {
        warn!(path = %log.display(), "no result log to retain");
        (None, None)
    };

    summary.retained_log = retained_log.clone();
    summary.log_sha256 = digest;

    let summary_path = dir.join(SUMMARY_FILE);
    std::fs::write(&summary_path, serde_json::to_vec_pretty(&summary)?)?;

    Ok(Retained {
        summary_path,
        log_path: retained_log,
    })
}

/// `<stem>-<YYYYmmddTHHMMSSZ>.<ext>`
fn retained_name(log: &Path, at: &DateTime<Utc>) -> String {
    let stem = log
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "test_results".to_string());
    let ext = log
        .extension()
        .map(|e| e.to_string_lossy().into_owned())
        .unwrap_or_else(|| "log".to_string());
    format!("{}-{}.{}", stem, at.format("%Y%m%dT%H%M%SZ"), ext)
}

fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}
