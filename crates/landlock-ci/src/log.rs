//! Result log parsing.
//!
//! The log artifact is UTF-8 text, one record per line. A record is any line
//! containing an outcome marker (`[PASS]` or `[FAIL]`); the rest of the line
//! is a free-form description. Lines without a marker are ignored.
//!
//! A line carrying both markers is reported as malformed. The aggregator
//! counts it as a single failure so a logged `[FAIL]` is never lost.
//! Repeating the same marker on one line still counts once.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{HarnessError, Result};

pub const PASS_MARKER: &str = "[PASS]";
pub const FAIL_MARKER: &str = "[FAIL]";

/// Default artifact file name.
pub const DEFAULT_LOG_FILE: &str = "test_results.log";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Pass,
    Fail,
}

impl Outcome {
    pub fn marker(&self) -> &'static str {
        match self {
            Outcome::Pass => PASS_MARKER,
            Outcome::Fail => FAIL_MARKER,
        }
    }
}

/// One parsed record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestOutcomeRecord {
    /// 1-based line number in the log.
    pub line_no: usize,
    pub outcome: Outcome,
    pub description: String,
}

/// A line that violates the single-outcome grammar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MalformedLogLine {
    pub line_no: usize,
    pub line: String,
}

impl From<MalformedLogLine> for HarnessError {
    fn from(m: MalformedLogLine) -> Self {
        HarnessError::MalformedLogLine {
            line_no: m.line_no,
            line: m.line,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogEntry {
    Record(TestOutcomeRecord),
    Malformed(MalformedLogLine),
}

/// Classify a single line. `None` for lines without a marker.
pub fn parse_line(line_no: usize, line: &str) -> Option<LogEntry> {
    let pass_at = line.find(PASS_MARKER);
    let fail_at = line.find(FAIL_MARKER);

    let (outcome, at) = match (pass_at, fail_at) {
        (None, None) => return None,
        (Some(_), Some(_)) => {
            return Some(LogEntry::Malformed(MalformedLogLine {
                line_no,
                line: line.to_string(),
            }))
        }
        (Some(at), None) => (Outcome::Pass, at),
        (None, Some(at)) => (Outcome::Fail, at),
    };

    let rest = format!(
        "{} {}",
        line[..at].trim(),
        line[at + outcome.marker().len()..].trim()
    );

    Some(LogEntry::Record(TestOutcomeRecord {
        line_no,
        outcome,
        description: rest.trim().to_string(),
    }))
}

/// Lazily yields entries from a reader, skipping unmarked lines.
pub struct LogEntries<R> {
    reader: R,
    line_no: usize,
    buf: Vec<u8>,
}

impl<R: BufRead> LogEntries<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line_no: 0,
            buf: Vec::new(),
        }
    }
}

impl<R: BufRead> Iterator for LogEntries<R> {
    type Item = Result<LogEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            self.buf.clear();
            match self.reader.read_until(b'\n', &mut self.buf) {
                Ok(0) => return None,
                Ok(_) => {
                    self.line_no += 1;
                    let line = String::from_utf8_lossy(&self.buf);
                    let line = line.trim_end_matches(['\n', '\r']);
                    if let Some(entry) = parse_line(self.line_no, line) {
                        return Some(Ok(entry));
                    }
                }
                Err(e) => return Some(Err(e.into())),
            }
        }
    }
}

/// Handle on an existing log artifact.
#[derive(Debug, Clone)]
pub struct ResultLog {
    path: PathBuf,
}

impl ResultLog {
    /// Open the artifact. A missing file is `MissingArtifact`, which is not
    /// the same thing as an empty log.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if !path.exists() {
            return Err(HarnessError::MissingArtifact { path });
        }
        if path.is_dir() {
            return Err(HarnessError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("result log {:?} is a directory", path),
            )));
        }
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Entries in order of appearance. Each call rereads the file.
    pub fn entries(&self) -> Result<LogEntries<BufReader<File>>> {
        let file = File::open(&self.path).map_err(|e| self.map_open_error(e))?;
        Ok(LogEntries::new(BufReader::new(file)))
    }

    /// Full log text for audit output.
    pub fn raw_content(&self) -> Result<String> {
        let bytes = std::fs::read(&self.path).map_err(|e| self.map_open_error(e))?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    fn map_open_error(&self, e: std::io::Error) -> HarnessError {
        if e.kind() == std::io::ErrorKind::NotFound {
            HarnessError::MissingArtifact {
                path: self.path.clone(),
            }
        } else {
            e.into()
        }
    }
}
