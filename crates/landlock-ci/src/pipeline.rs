//! Pipeline orchestration.
//!
//! Strictly sequential: probe, unit phase, integration phase, then
//! aggregation over the finished log. The log has one writer at a time and is
//! only read after every phase is done, so no locking is needed.

use std::io::Write;
use std::path::Path;
use std::time::Instant;

use chrono::Utc;
use tracing::{error, info, warn, Instrument};
use uuid::Uuid;

use crate::aggregate::ResultTally;
use crate::config::HarnessConfig;
use crate::error::{HarnessError, Result};
use crate::gate::{annotate, render, AnnotationStyle, GateReport, Level, Verdict, VerdictGate};
use crate::log::ResultLog;
use crate::obs;
use crate::probe::KernelProbe;
use crate::retention::{retain, Retained, RunSummary};
use crate::runner::{PhaseExecutor, PhaseResult};

/// Result of a complete pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    pub run_id: String,
    pub probe: KernelProbe,

    /// Phases that actually ran, in order.
    pub phases: Vec<PhaseResult>,

    pub report: GateReport,

    /// Set when a non-tolerated phase failed.
    pub fatal_failure: Option<String>,

    /// Process exit status for the whole pipeline.
    pub exit_code: i32,

    pub duration_ms: u64,
    pub retained: Option<Retained>,
}

impl PipelineOutcome {
    pub fn verdict(&self) -> Verdict {
        self.report.verdict
    }

    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Pipeline entry points.
pub struct Harness;

impl Harness {
    /// Run both phases, then gate on the resulting log.
    ///
    /// Diagnostics and the audit echo are written to `out`.
    pub async fn run(
        config: &HarnessConfig,
        executor: &dyn PhaseExecutor,
        out: &mut dyn Write,
    ) -> Result<PipelineOutcome> {
        let run_id = Uuid::new_v4().to_string();
        let span = obs::run_span(&run_id);
        Self::run_inner(run_id, config, executor, out)
            .instrument(span)
            .await
    }

    async fn run_inner(
        run_id: String,
        config: &HarnessConfig,
        executor: &dyn PhaseExecutor,
        out: &mut dyn Write,
    ) -> Result<PipelineOutcome> {
        let start = Instant::now();
        let started_at = Utc::now();
        let style = config.annotations;

        info!(log = %config.log_path.display(), "Starting test pipeline");

        let probe = KernelProbe::detect(config.kernel_release.as_deref(), config.min_kernel);
        obs::emit_kernel_probed(&probe);
        if let Some(advisory) = probe.advisory() {
            warn!("{}", advisory);
            annotate(out, style, Level::Warning, &advisory)?;
        }

        reset_log(&config.log_path)?;

        let mut phases = Vec::new();
        let mut fatal_failure: Option<HarnessError> = None;

        for phase in config.phases() {
            if !phase.enabled {
                obs::emit_phase_skipped(&phase.name, "disabled");
                continue;
            }
            if let Some(fatal) = &fatal_failure {
                obs::emit_phase_skipped(&phase.name, &fatal.to_string());
                continue;
            }

            info!(phase = %phase.name, "Executing phase");
            let phase_start = Instant::now();
            let result = match executor.execute(phase, &config.log_path).await {
                Ok(r) => r,
                Err(e) => {
                    warn!(phase = %phase.name, error = %e, "phase could not be executed");
                    PhaseResult::errored(phase, &e, phase_start.elapsed().as_millis() as u64)
                }
            };
            obs::emit_phase_finished(&result);

            if let Some(failure) = result.failure() {
                if result.is_fatal() {
                    error!(error = %failure, "fatal phase failure");
                    fatal_failure = Some(failure);
                } else {
                    warn!(error = %failure, "phase failure tolerated; logged failures still count");
                }
            }
            phases.push(result);
        }

        let report = Self::summarize(&config.log_path, style, out)?;

        if let Some(fatal) = &fatal_failure {
            annotate(out, style, Level::Error, &fatal.to_string())?;
        }
        out.flush()?;

        let exit_code = if fatal_failure.is_some() {
            1
        } else {
            report.exit_code
        };
        let duration_ms = start.elapsed().as_millis() as u64;

        let retained = match &config.retain_dir {
            Some(dir) => {
                let summary = RunSummary {
                    run_id: run_id.clone(),
                    started_at,
                    finished_at: Utc::now(),
                    kernel: probe.clone(),
                    report: report.clone(),
                    retained_log: None,
                    log_sha256: None,
                    exit_code,
                };
                match retain(dir, &config.log_path, summary) {
                    Ok(r) => Some(r),
                    Err(e) => {
                        obs::emit_retention_error(&e);
                        None
                    }
                }
            }
            None => None,
        };

        if exit_code == 0 {
            info!(run_id = %run_id, duration_ms, "Test pipeline passed");
        } else {
            info!(run_id = %run_id, duration_ms, "Test pipeline failed");
        }

        Ok(PipelineOutcome {
            run_id,
            probe,
            phases,
            report,
            fatal_failure: fatal_failure.map(|e| e.to_string()),
            exit_code,
            duration_ms,
            retained,
        })
    }

    /// Parse, tally and gate an existing log, rendering the result to `out`.
    ///
    /// A missing log yields a `NoData` report rather than an error.
    pub fn summarize(
        log_path: &Path,
        style: AnnotationStyle,
        out: &mut dyn Write,
    ) -> Result<GateReport> {
        let (tally, raw) = match ResultLog::open(log_path) {
            Ok(log) => {
                let tally = ResultTally::from_log(&log)?;
                (Some(tally), Some(log.raw_content()?))
            }
            Err(e @ HarnessError::MissingArtifact { .. }) => {
                warn!(error = %e, "no result log; verdict is NoData");
                (None, None)
            }
            Err(e) => return Err(e),
        };

        let report = VerdictGate::evaluate(log_path, tally);
        render(&report, raw.as_deref(), style, out)?;

        let (passed, failed) = report
            .tally
            .as_ref()
            .map(|t| (t.passed, t.failed))
            .unwrap_or((0, 0));
        obs::emit_verdict(
            report.verdict,
            passed,
            failed,
            report.malformed.len(),
            report.exit_code,
        );

        Ok(report)
    }
}

/// Remove a log left over from an earlier run so counts start from zero.
fn reset_log(log_path: &Path) -> Result<()> {
    match std::fs::remove_file(log_path) {
        Ok(()) => {
            info!(path = %log_path.display(), "removed stale result log");
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}
