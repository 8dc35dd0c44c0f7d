//! Integration tests for the test pipeline with a scripted executor.

use landlock_ci::fakes::ScriptedExecutor;
use landlock_ci::retention::{RunSummary, SUMMARY_FILE};
use landlock_ci::{
    AnnotationStyle, CapabilityTier, CommandExecutor, Harness, HarnessConfig, PhaseConfig,
    PhaseKind, Verdict,
};
use std::path::Path;

fn config(dir: &Path, release: &str) -> HarnessConfig {
    HarnessConfig::default()
        .with_log_path(dir.join("test_results.log"))
        .with_kernel_release(release)
}

fn text(out: Vec<u8>) -> String {
    String::from_utf8(out).expect("utf-8 output")
}

/// Test: clean run on a full-support kernel
#[tokio::test]
async fn test_all_phases_pass() {
    let dir = tempfile::tempdir().unwrap();
    let executor = ScriptedExecutor::new()
        .phase(PhaseKind::Unit, &["[PASS] parse_rules", "[PASS] abi_version"], 0)
        .phase(PhaseKind::Integration, &["[PASS] fs_read_only"], 0);

    let mut out = Vec::new();
    let outcome = Harness::run(&config(dir.path(), "6.1.0"), &executor, &mut out)
        .await
        .expect("pipeline failed");

    assert_eq!(outcome.verdict(), Verdict::Success);
    assert_eq!(outcome.exit_code, 0);
    assert_eq!(outcome.probe.tier, Some(CapabilityTier::Full));
    assert_eq!(outcome.phases.len(), 2);
    assert!(outcome.fatal_failure.is_none());

    let out = text(out);
    assert!(!out.contains("older than"), "no advisory on a full kernel");
    assert!(out.ends_with("notice: 3/3 tests passed\n"));
}

/// Test: integration phase exit status is ignored, but its [FAIL] lines count
#[tokio::test]
async fn test_tolerated_integration_failure_still_counts_records() {
    let dir = tempfile::tempdir().unwrap();
    let executor = ScriptedExecutor::new()
        .phase(PhaseKind::Unit, &["[PASS] test_a"], 0)
        .phase(
            PhaseKind::Integration,
            &["[FAIL] test_b", "[PASS] test_c"],
            101,
        );

    let mut out = Vec::new();
    let outcome = Harness::run(&config(dir.path(), "5.12.9"), &executor, &mut out)
        .await
        .expect("pipeline failed");

    assert_eq!(outcome.probe.tier, Some(CapabilityTier::Degraded));
    assert!(outcome.fatal_failure.is_none());
    assert_eq!(outcome.verdict(), Verdict::Failure(1));
    assert_eq!(outcome.exit_code, 1);
    assert_eq!(outcome.report.summary, "2/3 tests passed (1 failures)");

    let out = text(out);
    assert!(out.starts_with("warning: Kernel 5.12 is older than 5.13"));
    assert!(out.contains("  - test_b"));
}

/// Test: integration exit failure with only passing records is a success
#[tokio::test]
async fn test_tolerated_integration_failure_without_records() {
    let dir = tempfile::tempdir().unwrap();
    let executor = ScriptedExecutor::new()
        .phase(PhaseKind::Unit, &["[PASS] test_a"], 0)
        .phase(PhaseKind::Integration, &["landlock: ruleset creation unsupported"], 1);

    let mut out = Vec::new();
    let outcome = Harness::run(&config(dir.path(), "5.10.0-28-amd64"), &executor, &mut out)
        .await
        .expect("pipeline failed");

    assert_eq!(outcome.verdict(), Verdict::Success);
    assert_eq!(outcome.exit_code, 0);
    assert!(!outcome.phases[1].passed());
    assert!(text(out).contains("landlock: ruleset creation unsupported"));
}

/// Test: unit failure is fatal and skips the integration phase
#[tokio::test]
async fn test_unit_failure_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let executor = ScriptedExecutor::new()
        .phase(PhaseKind::Unit, &["[PASS] test_a"], 101)
        .phase(PhaseKind::Integration, &["[PASS] never_runs"], 0);

    let mut out = Vec::new();
    let outcome = Harness::run(&config(dir.path(), "6.1.0"), &executor, &mut out)
        .await
        .expect("pipeline failed");

    assert_eq!(executor.calls(), vec![PhaseKind::Unit]);
    assert_eq!(outcome.phases.len(), 1);
    assert!(outcome.fatal_failure.is_some());
    // The log itself is clean, but the pipeline still fails.
    assert_eq!(outcome.verdict(), Verdict::Success);
    assert_eq!(outcome.exit_code, 1);

    let out = text(out);
    let log_at = out.find("[PASS] test_a").unwrap();
    let fatal_at = out.find("error: unit test phase 'unit' failed").unwrap();
    assert!(log_at < fatal_at);
}

/// Test: a unit phase that cannot even start is still fatal
#[tokio::test]
async fn test_unit_spawn_error_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let executor = ScriptedExecutor::new().spawn_error(PhaseKind::Unit, "cargo not found");

    let mut out = Vec::new();
    let outcome = Harness::run(&config(dir.path(), "6.1.0"), &executor, &mut out)
        .await
        .expect("pipeline failed");

    assert_eq!(outcome.phases[0].exit_code, -1);
    assert_eq!(outcome.verdict(), Verdict::NoData);
    assert_eq!(outcome.exit_code, 1);
}

/// Test: integration phase that fails to start is tolerated
#[tokio::test]
async fn test_integration_spawn_error_tolerated() {
    let dir = tempfile::tempdir().unwrap();
    let executor = ScriptedExecutor::new()
        .phase(PhaseKind::Unit, &["[PASS] test_a"], 0)
        .spawn_error(PhaseKind::Integration, "no such file");

    let mut out = Vec::new();
    let outcome = Harness::run(&config(dir.path(), "5.4.0"), &executor, &mut out)
        .await
        .expect("pipeline failed");

    assert_eq!(outcome.verdict(), Verdict::Success);
    assert_eq!(outcome.exit_code, 0);
}

/// Test: strict integration makes its exit status fatal
#[tokio::test]
async fn test_strict_integration_phase() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(dir.path(), "6.1.0").with_phases(
        PhaseConfig::from_kind(PhaseKind::Unit),
        PhaseConfig::from_kind(PhaseKind::Integration).tolerating(false),
    );
    let executor = ScriptedExecutor::new().phase(PhaseKind::Integration, &["[PASS] x"], 2);

    let mut out = Vec::new();
    let outcome = Harness::run(&cfg, &executor, &mut out).await.expect("pipeline failed");

    assert_eq!(outcome.verdict(), Verdict::Success);
    assert!(outcome.fatal_failure.is_some());
    assert_eq!(outcome.exit_code, 1);
}

/// Test: no phase writes anything, so there is no log artifact
#[tokio::test]
async fn test_no_log_is_no_data() {
    let dir = tempfile::tempdir().unwrap();
    let executor = ScriptedExecutor::new();

    let mut out = Vec::new();
    let outcome = Harness::run(&config(dir.path(), "6.1.0"), &executor, &mut out)
        .await
        .expect("missing log must not crash");

    assert_eq!(outcome.verdict(), Verdict::NoData);
    assert_eq!(outcome.exit_code, 0);
    assert!(text(out).contains("warning: no test results"));
}

/// Test: results from a previous run are not counted again
#[tokio::test]
async fn test_stale_log_is_discarded() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(dir.path(), "6.1.0");
    std::fs::write(&cfg.log_path, "[FAIL] from_yesterday\n").unwrap();

    let executor = ScriptedExecutor::new().phase(PhaseKind::Unit, &["[PASS] today"], 0);
    let mut out = Vec::new();
    let outcome = Harness::run(&cfg, &executor, &mut out).await.expect("pipeline failed");

    assert_eq!(outcome.verdict(), Verdict::Success);
    assert!(!text(out).contains("from_yesterday"));
}

/// Test: a line carrying both markers is warned about and counted as a failure
#[tokio::test]
async fn test_malformed_lines() {
    let dir = tempfile::tempdir().unwrap();
    let executor = ScriptedExecutor::new().phase(
        PhaseKind::Unit,
        &["[PASS] a", "[PASS] b [FAIL] c"],
        0,
    );

    let mut out = Vec::new();
    let outcome = Harness::run(&config(dir.path(), "6.1.0"), &executor, &mut out)
        .await
        .unwrap();
    assert_eq!(outcome.verdict(), Verdict::Failure(1));
    assert_eq!(outcome.exit_code, 1);
    assert_eq!(outcome.report.malformed.len(), 1);
    assert_eq!(outcome.report.summary, "1/2 tests passed (1 failures)");

    let out = text(out);
    assert!(out.contains("warning: line 2 carries both [PASS] and [FAIL]"));
    assert!(out.contains("error: 1/2 tests passed (1 failures)\nFailed tests:\n  - [PASS] b [FAIL] c"));
}

/// Test: an integration failure whose message quotes [PASS] still fails the run
#[tokio::test]
async fn test_fail_line_quoting_pass_marker() {
    let dir = tempfile::tempdir().unwrap();
    let executor = ScriptedExecutor::new()
        .phase(PhaseKind::Unit, &["[PASS] test_a"], 0)
        .phase(
            PhaseKind::Integration,
            &["[FAIL] test_b: expected [PASS] got denied"],
            1,
        );

    let mut out = Vec::new();
    let outcome = Harness::run(&config(dir.path(), "6.1.0"), &executor, &mut out)
        .await
        .unwrap();
    assert!(outcome.fatal_failure.is_none());
    assert_eq!(outcome.verdict(), Verdict::Failure(1));
    assert_eq!(outcome.exit_code, 1);
    assert!(!text(out).contains("notice: 1/1 tests passed"));
}

/// Test: unknown kernel release is advisory only
#[tokio::test]
async fn test_unknown_kernel_release() {
    let dir = tempfile::tempdir().unwrap();
    let executor = ScriptedExecutor::new().phase(PhaseKind::Unit, &["[PASS] a"], 0);

    let mut out = Vec::new();
    let outcome = Harness::run(&config(dir.path(), "mystery-kernel"), &executor, &mut out)
        .await
        .unwrap();

    assert_eq!(outcome.probe.tier, None);
    assert_eq!(outcome.exit_code, 0);
    assert!(text(out).contains("Kernel version unknown"));
}

/// Test: GitHub annotations
#[tokio::test]
async fn test_github_annotations() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(dir.path(), "5.12.0").with_annotations(AnnotationStyle::Github);
    let executor = ScriptedExecutor::new().phase(PhaseKind::Integration, &["[FAIL] net"], 1);

    let mut out = Vec::new();
    Harness::run(&cfg, &executor, &mut out).await.unwrap();

    let out = text(out);
    assert!(out.starts_with("::warning::Kernel 5.12"));
    assert!(out.contains("::error::0/1 tests passed (1 failures)"));
}

/// Test: the log and a JSON summary are retained, even on failure
#[tokio::test]
async fn test_retention_on_failure() {
    let dir = tempfile::tempdir().unwrap();
    let retain_dir = dir.path().join("artifacts");
    let cfg = config(dir.path(), "6.1.0").with_retain_dir(&retain_dir);
    let executor = ScriptedExecutor::new().phase(PhaseKind::Unit, &["[FAIL] boom"], 0);

    let outcome = Harness::run(&cfg, &executor, &mut Vec::new()).await.unwrap();
    assert_eq!(outcome.exit_code, 1);

    let retained = outcome.retained.expect("retained");
    assert!(retained.log_path.expect("log copied").exists());

    let summary: RunSummary =
        serde_json::from_slice(&std::fs::read(retain_dir.join(SUMMARY_FILE)).unwrap()).unwrap();
    assert_eq!(summary.run_id, outcome.run_id);
    assert_eq!(summary.report.verdict, Verdict::Failure(1));
    assert_eq!(summary.exit_code, 1);
    assert!(summary.log_sha256.is_some());
}

/// Test: retention with no log
#[tokio::test]
async fn test_retention_without_log() {
    let dir = tempfile::tempdir().unwrap();
    let retain_dir = dir.path().join("artifacts");
    let cfg = config(dir.path(), "6.1.0").with_retain_dir(&retain_dir);

    let outcome = Harness::run(&cfg, &ScriptedExecutor::new(), &mut Vec::new())
        .await
        .unwrap();
    let retained = outcome.retained.expect("summary written");
    assert!(retained.log_path.is_none());
    assert!(retained.summary_path.exists());
}

/// Test: disabled phases are skipped
#[tokio::test]
async fn test_disabled_phase_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(dir.path(), "6.1.0").with_phases(
        PhaseConfig::from_kind(PhaseKind::Unit),
        PhaseConfig::from_kind(PhaseKind::Integration).disabled(),
    );
    let executor = ScriptedExecutor::new().phase(PhaseKind::Unit, &["[PASS] a"], 0);

    let outcome = Harness::run(&cfg, &executor, &mut Vec::new()).await.unwrap();
    assert_eq!(executor.calls(), vec![PhaseKind::Unit]);
    assert_eq!(outcome.phases.len(), 1);
}

/// Test: real child processes append to the shared log
#[tokio::test]
async fn test_command_executor_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let sh = |script: &str| vec!["sh".to_string(), "-c".to_string(), script.to_string()];
    let cfg = config(dir.path(), "5.12.9").with_phases(
        PhaseConfig::custom(PhaseKind::Unit, sh("echo '[PASS] test_a'")),
        PhaseConfig::custom(
            PhaseKind::Integration,
            sh("echo '[FAIL] test_b'; echo '[PASS] test_c'; exit 1"),
        ),
    );

    let mut out = Vec::new();
    let outcome = Harness::run(&cfg, &CommandExecutor, &mut out).await.unwrap();

    assert_eq!(outcome.report.summary, "2/3 tests passed (1 failures)");
    assert_eq!(outcome.verdict(), Verdict::Failure(1));
    assert_eq!(outcome.exit_code, 1);
}

/// Test: summarizing the same log twice gives the same tally
#[test]
fn test_summarize_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("test_results.log");
    std::fs::write(&log, "[PASS] a\n[FAIL] b\nnoise\n[PASS] c\n").unwrap();

    let first = Harness::summarize(&log, AnnotationStyle::Plain, &mut Vec::new()).unwrap();
    let second = Harness::summarize(&log, AnnotationStyle::Plain, &mut Vec::new()).unwrap();
    assert_eq!(first.tally, second.tally);
}

/// Test: an empty log is a success with zero totals
#[test]
fn test_empty_log_is_success() {
    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("test_results.log");
    std::fs::write(&log, "").unwrap();

    let mut out = Vec::new();
    let report = Harness::summarize(&log, AnnotationStyle::Plain, &mut out).unwrap();
    let tally = report.tally.expect("log present");
    assert_eq!((tally.passed, tally.failed, tally.total()), (0, 0, 0));
    assert_eq!(report.verdict, Verdict::Success);
    assert!(text(out).ends_with("notice: 0/0 tests passed\n"));
}
