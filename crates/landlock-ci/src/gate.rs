//! Verdict gate: turns a tally into an exit status and diagnostics.
//!
//! | Condition         | Verdict          | Exit |
//! |-------------------|------------------|------|
//! | log missing       | `NoData`         | 0    |
//! | `failed > 0`      | `Failure(failed)`| 1    |
//! | otherwise         | `Success`        | 0    |
//!
//! Every path echoes the full raw log before the summary line.

use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::aggregate::ResultTally;
use crate::log::MalformedLogLine;

/// Terminal verdict of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Success,
    Failure(u64),
    /// The log artifact was absent. A warning, not a failure.
    NoData,
}

impl Verdict {
    pub fn exit_code(&self) -> i32 {
        match self {
            Verdict::Success | Verdict::NoData => 0,
            Verdict::Failure(_) => 1,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Verdict::Success)
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Success => write!(f, "success"),
            Verdict::Failure(n) => write!(f, "failure ({n})"),
            Verdict::NoData => write!(f, "no data"),
        }
    }
}

/// Severity of a diagnostic line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Notice,
    Warning,
    Error,
}

impl Level {
    fn name(&self) -> &'static str {
        match self {
            Level::Notice => "notice",
            Level::Warning => "warning",
            Level::Error => "error",
        }
    }
}

/// How diagnostics are formatted on the output stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnnotationStyle {
    /// `error: message`
    #[default]
    Plain,
    /// GitHub Actions workflow commands, `::error::message`.
    Github,
}

impl std::str::FromStr for AnnotationStyle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "plain" => Ok(AnnotationStyle::Plain),
            "github" => Ok(AnnotationStyle::Github),
            other => Err(format!("unknown annotation style: {other}")),
        }
    }
}

/// Write one diagnostic line.
pub fn annotate(
    out: &mut dyn Write,
    style: AnnotationStyle,
    level: Level,
    message: &str,
) -> std::io::Result<()> {
    match style {
        AnnotationStyle::Plain => writeln!(out, "{}: {}", level.name(), message),
        AnnotationStyle::Github => {
            // Workflow commands are single-line; newlines must be escaped.
            let escaped = message
                .replace('%', "%25")
                .replace('\r', "%0D")
                .replace('\n', "%0A");
            writeln!(out, "::{}::{}", level.name(), escaped)
        }
    }
}

/// Everything the gate decided, ready to render or serialize.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateReport {
    pub log_path: PathBuf,
    pub verdict: Verdict,
    pub summary: String,

    /// `None` when the log was missing.
    pub tally: Option<ResultTally>,

    /// Descriptions of failed records.
    pub failures: Vec<String>,

    pub malformed: Vec<MalformedLogLine>,
    pub exit_code: i32,
}

pub struct VerdictGate;

impl VerdictGate {
    /// Decision table. `None` means the log artifact was missing.
    pub fn decide(tally: Option<&ResultTally>) -> Verdict {
        match tally {
            None => Verdict::NoData,
            Some(t) if t.failed > 0 => Verdict::Failure(t.failed),
            Some(_) => Verdict::Success,
        }
    }

    /// Evaluate a tally into a report. Malformed lines are already counted
    /// in `failed`; they are carried here only for the extra warning.
    pub fn evaluate(log_path: &Path, tally: Option<ResultTally>) -> GateReport {
        let verdict = Self::decide(tally.as_ref());

        let (summary, failures, malformed) = match &tally {
            None => (
                format!("no test results: {} not found", log_path.display()),
                Vec::new(),
                Vec::new(),
            ),
            Some(t) => (
                t.summary_line(),
                t.failures.iter().map(|r| r.description.clone()).collect(),
                t.malformed.clone(),
            ),
        };

        GateReport {
            log_path: log_path.to_path_buf(),
            verdict,
            summary,
            tally,
            failures,
            malformed,
            exit_code: verdict.exit_code(),
        }
    }
}

/// Echo the raw log, then the diagnostics and summary.
pub fn render(
    report: &GateReport,
    raw_log: Option<&str>,
    style: AnnotationStyle,
    out: &mut dyn Write,
) -> std::io::Result<()> {
    let name = report.log_path.display();
    writeln!(out, "===== {name} =====")?;
    match raw_log {
        Some(text) => {
            out.write_all(text.as_bytes())?;
            if !text.is_empty() && !text.ends_with('\n') {
                writeln!(out)?;
            }
        }
        None => writeln!(out, "(no log artifact)")?,
    }
    writeln!(out, "===== end of {name} =====")?;

    for m in &report.malformed {
        annotate(
            out,
            style,
            Level::Warning,
            &format!(
                "line {} carries both [PASS] and [FAIL], counted as a failure: {}",
                m.line_no, m.line
            ),
        )?;
    }

    match report.verdict {
        Verdict::NoData => annotate(out, style, Level::Warning, &report.summary),
        Verdict::Failure(_) => {
            let mut message = report.summary.clone();
            if !report.failures.is_empty() {
                message.push_str("\nFailed tests:");
                for f in &report.failures {
                    message.push_str("\n  - ");
                    message.push_str(f);
                }
            }
            annotate(out, style, Level::Error, &message)
        }
        Verdict::Success => annotate(out, style, Level::Notice, &report.summary),
    }
}
