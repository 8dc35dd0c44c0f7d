//! Structured events for the pipeline lifecycle.

use tracing::{info, warn};

use crate::gate::Verdict;
use crate::probe::KernelProbe;
use crate::runner::PhaseResult;

/// Span for async code, to be attached with `Instrument`.
pub fn run_span(run_id: &str) -> tracing::Span {
    tracing::info_span!("landlock_ci.run", run_id = %run_id)
}

pub fn emit_kernel_probed(probe: &KernelProbe) {
    info!(
        event = "kernel.probed",
        release = %probe.release,
        tier = probe.tier_name(),
        minimum = %probe.minimum,
    );
}

pub fn emit_phase_finished(result: &PhaseResult) {
    if result.passed() {
        info!(
            event = "phase.finished",
            phase = %result.phase_name,
            exit_code = result.exit_code,
            duration_ms = result.duration_ms,
            passed = true,
        );
    } else {
        warn!(
            event = "phase.finished",
            phase = %result.phase_name,
            exit_code = result.exit_code,
            duration_ms = result.duration_ms,
            passed = false,
            tolerated = result.tolerated,
        );
    }
}

pub fn emit_phase_skipped(phase: &str, reason: &str) {
    info!(event = "phase.skipped", phase = %phase, reason = %reason);
}

/// `failed` includes lines that carried both markers; `malformed` counts
/// those lines separately.
pub fn emit_verdict(verdict: Verdict, passed: u64, failed: u64, malformed: usize, exit_code: i32) {
    info!(
        event = "gate.verdict",
        verdict = %verdict,
        passed = passed,
        failed = failed,
        malformed = malformed,
        exit_code = exit_code,
    );
}

/// Retention trouble never fails a run.
pub fn emit_retention_error(error: &dyn std::fmt::Display) {
    warn!(event = "artifact.retention_error", error = %error);
}
