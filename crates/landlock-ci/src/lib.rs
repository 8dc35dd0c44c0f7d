//! Landlock CI - test-result aggregation and kernel compatibility gating
//!
//! Runs the unit and integration test phases of a Landlock sandbox project
//! and reduces their shared result log to a single verdict:
//! - Probes the kernel; Landlock needs Linux 5.13 or newer
//! - Treats unit failures as fatal and integration failures as advisory
//! - Counts `[PASS]` / `[FAIL]` records in the log
//! - Echoes the log, prints a summary and picks the exit status

pub mod aggregate;
pub mod config;
pub mod error;
pub mod fakes;
pub mod gate;
pub mod log;
pub mod obs;
pub mod phase;
pub mod pipeline;
pub mod probe;
pub mod retention;
pub mod runner;
pub mod telemetry;

// Re-export key types
pub use aggregate::ResultTally;
pub use config::HarnessConfig;
pub use error::{HarnessError, Result};
pub use gate::{AnnotationStyle, GateReport, Verdict, VerdictGate};
pub use log::{LogEntry, MalformedLogLine, Outcome, ResultLog, TestOutcomeRecord};
pub use phase::{PhaseConfig, PhaseKind};
pub use pipeline::{Harness, PipelineOutcome};
pub use probe::{CapabilityTier, KernelProbe, KernelVersion};
pub use runner::{CommandExecutor, PhaseExecutor, PhaseResult};
pub use telemetry::init_tracing;
