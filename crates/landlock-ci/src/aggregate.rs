//! Outcome tallying.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::log::{LogEntry, MalformedLogLine, Outcome, ResultLog, TestOutcomeRecord};

/// Aggregate over every record in a log.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultTally {
    pub passed: u64,
    pub failed: u64,

    /// Failed records in order of appearance.
    pub failures: Vec<TestOutcomeRecord>,

    /// Lines carrying both markers. Each is also counted in `failed`.
    pub malformed: Vec<MalformedLogLine>,
}

impl ResultTally {
    /// Build from counts that may be unresolved. Missing counts are zero.
    pub fn from_counts(passed: Option<u64>, failed: Option<u64>) -> Self {
        Self {
            passed: passed.unwrap_or(0),
            failed: failed.unwrap_or(0),
            ..Self::default()
        }
    }

    /// Tally a sequence of parsed entries. Stops at the first read error.
    pub fn from_entries<I>(entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = Result<LogEntry>>,
    {
        let mut tally = Self::from_counts(None, None);
        for entry in entries {
            tally.push(entry?);
        }
        Ok(tally)
    }

    /// Parse and tally a log artifact.
    pub fn from_log(log: &ResultLog) -> Result<Self> {
        Self::from_entries(log.entries()?)
    }

    pub fn push(&mut self, entry: LogEntry) {
        match entry {
            LogEntry::Record(record) => match record.outcome {
                Outcome::Pass => self.passed += 1,
                Outcome::Fail => {
                    self.failed += 1;
                    self.failures.push(record);
                }
            },
            LogEntry::Malformed(line) => {
                self.failed += 1;
                self.failures.push(TestOutcomeRecord {
                    line_no: line.line_no,
                    outcome: Outcome::Fail,
                    description: line.line.trim().to_string(),
                });
                self.malformed.push(line);
            }
        }
    }

    pub fn total(&self) -> u64 {
        self.passed + self.failed
    }

    /// e.g. `"2/3 tests passed (1 failures)"`.
    pub fn summary_line(&self) -> String {
        if self.failed == 0 {
            format!("{}/{} tests passed", self.passed, self.total())
        } else {
            format!(
                "{}/{} tests passed ({} failures)",
                self.passed,
                self.total(),
                self.failed
            )
        }
    }
}
