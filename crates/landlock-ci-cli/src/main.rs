//! Landlock CI - test pipeline gate
//!
//! The `landlock-ci` command runs the test phases of a Landlock sandbox
//! project and turns their result log into a pass/fail exit status.
//!
//! ## Commands
//!
//! - `run`: probe the kernel, run unit and integration tests, gate on the log
//! - `summarize`: gate on an existing log without running anything
//! - `probe`: report the kernel's Landlock capability tier

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{debug, Level};

use landlock_ci::{
    AnnotationStyle, CommandExecutor, Harness, HarnessConfig, KernelProbe, KernelVersion,
    PhaseConfig, PhaseKind,
};

#[derive(Parser)]
#[command(name = "landlock-ci")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Test-result gate for the Landlock sandbox CI pipeline", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run unit and integration tests and gate on the result log
    Run {
        /// Shared result log
        #[arg(short, long, env = "LANDLOCK_CI_LOG", default_value = "test_results.log")]
        log: PathBuf,

        /// Shell command for the unit phase (default: cargo test --workspace --lib --bins)
        #[arg(long)]
        unit_cmd: Option<String>,

        /// Shell command for the integration phase (default: cargo test --workspace --tests)
        #[arg(long)]
        integration_cmd: Option<String>,

        /// Fail the pipeline when the integration phase exits non-zero
        #[arg(long)]
        strict_integration: bool,

        /// Skip the integration phase
        #[arg(long)]
        skip_integration: bool,

        /// Per-phase timeout in seconds (0 = none)
        #[arg(long, default_value = "0")]
        timeout: u64,

        #[command(flatten)]
        kernel: KernelArgs,

        /// Copy the log and a JSON summary into this directory
        #[arg(long, env = "LANDLOCK_CI_RETAIN_DIR")]
        retain_dir: Option<PathBuf>,

        #[command(flatten)]
        gate: GateArgs,
    },

    /// Gate on an existing result log
    Summarize {
        /// Result log to read
        #[arg(short, long, env = "LANDLOCK_CI_LOG", default_value = "test_results.log")]
        log: PathBuf,

        #[command(flatten)]
        gate: GateArgs,
    },

    /// Report the kernel capability tier
    Probe {
        #[command(flatten)]
        kernel: KernelArgs,
    },
}

#[derive(clap::Args)]
struct KernelArgs {
    /// Kernel release to classify instead of the running kernel's
    #[arg(long, env = "LANDLOCK_CI_KERNEL_RELEASE")]
    kernel_release: Option<String>,

    /// Minimum kernel with full Landlock support
    #[arg(long, default_value = "5.13")]
    min_kernel: KernelVersion,
}

#[derive(clap::Args)]
struct GateArgs {
    /// Diagnostic format: plain or github (default: github under GitHub Actions)
    #[arg(long, env = "LANDLOCK_CI_ANNOTATIONS")]
    annotations: Option<AnnotationStyle>,
}

impl GateArgs {
    fn style(&self) -> AnnotationStyle {
        self.annotations.unwrap_or_else(|| {
            if std::env::var("GITHUB_ACTIONS").is_ok_and(|v| v == "true") {
                AnnotationStyle::Github
            } else {
                AnnotationStyle::Plain
            }
        })
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    landlock_ci::init_tracing(cli.json, level);

    let code = match cli.command {
        Commands::Run {
            log,
            unit_cmd,
            integration_cmd,
            strict_integration,
            skip_integration,
            timeout,
            kernel,
            retain_dir,
            gate,
        } => {
            let unit = phase(PhaseKind::Unit, unit_cmd.as_deref()).with_timeout(timeout);
            let mut integration = phase(PhaseKind::Integration, integration_cmd.as_deref())
                .with_timeout(timeout)
                .tolerating(!strict_integration);
            if skip_integration {
                integration = integration.disabled();
            }

            let mut config = HarnessConfig::default()
                .with_log_path(log)
                .with_phases(unit, integration)
                .with_annotations(gate.style());
            config.min_kernel = kernel.min_kernel;
            config.kernel_release = kernel.kernel_release;
            config.retain_dir = retain_dir;

            cmd_run(&config).await?
        }
        Commands::Summarize { log, gate } => cmd_summarize(&log, &gate)?,
        Commands::Probe { kernel } => cmd_probe(&kernel, cli.json)?,
    };

    Ok(ExitCode::from(code))
}

/// Phase config for a kind, optionally overriding its command with a shell line.
fn phase(kind: PhaseKind, shell_cmd: Option<&str>) -> PhaseConfig {
    match shell_cmd {
        Some(cmd) => PhaseConfig::custom(
            kind,
            vec!["sh".to_string(), "-c".to_string(), cmd.to_string()],
        ),
        None => PhaseConfig::from_kind(kind),
    }
}

fn exit_status(code: i32) -> u8 {
    u8::try_from(code).unwrap_or(1)
}

/// Run the full pipeline
async fn cmd_run(config: &HarnessConfig) -> Result<u8> {
    debug!(?config, "pipeline configuration");

    let mut stdout = std::io::stdout();
    let outcome = Harness::run(config, &CommandExecutor, &mut stdout)
        .await
        .context("Test pipeline failed to run")?;

    println!();
    for phase in &outcome.phases {
        let status = if phase.passed() {
            "✓"
        } else if phase.tolerated {
            "~"
        } else {
            "✗"
        };
        println!(
            "  {} {} ({}ms, exit code: {})",
            status, phase.phase_name, phase.duration_ms, phase.exit_code
        );
    }
    println!("Kernel: {} ({})", outcome.probe.release, outcome.probe.tier_name());
    println!("Verdict: {}", outcome.verdict());
    if let Some(retained) = &outcome.retained {
        println!("Summary written to {}", retained.summary_path.display());
    }
    stdout.flush()?;

    Ok(exit_status(outcome.exit_code))
}

/// Gate on an existing log
fn cmd_summarize(log: &PathBuf, gate: &GateArgs) -> Result<u8> {
    let mut stdout = std::io::stdout();
    let report = Harness::summarize(log, gate.style(), &mut stdout)
        .with_context(|| format!("Failed to summarize {:?}", log))?;
    stdout.flush()?;
    Ok(exit_status(report.exit_code))
}

/// Print the capability tier. Never fails on an odd release string.
fn cmd_probe(kernel: &KernelArgs, json: bool) -> Result<u8> {
    let probe = KernelProbe::detect(kernel.kernel_release.as_deref(), kernel.min_kernel);

    if json {
        println!("{}", serde_json::to_string_pretty(&probe)?);
    } else {
        println!("Kernel release: {}", probe.release);
        match probe.version {
            Some(v) => println!("Version: {}", v),
            None => println!("Version: unknown"),
        }
        println!("Minimum for Landlock: {}", probe.minimum);
        println!("Tier: {}", probe.tier_name());
        if let Some(advisory) = probe.advisory() {
            println!();
            println!("{}", advisory);
        }
    }
    Ok(0)
}
