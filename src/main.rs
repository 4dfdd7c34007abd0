#![forbid(unsafe_code)]

//! `runctl`: run control for one DAQ partition.
//!
//! Loads configuration, launches the partition's applications at `boot`
//! and drives them through the given command sequence, stopping at the
//! first illegal or failed command.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use partition_runctl::audit::JsonlHistoryWriter;
use partition_runctl::child::process::{ProcessLauncher, SpawnConfig};
use partition_runctl::child::simulated::SimulatedLauncher;
use partition_runctl::child::ChildLauncher;
use partition_runctl::config::GlobalConfig;
use partition_runctl::logcheck;
use partition_runctl::orchestrator::roster::ConfigDocument;
use partition_runctl::orchestrator::{parse_steps, CommandSequencer, SequenceReport, SessionController};
use partition_runctl::{AppError, Result};

/// Exit code when the sequence succeeded but the log check found problems.
const EXIT_LOG_PROBLEMS: u8 = 2;

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "runctl", about = "DAQ partition run control", version, long_about = None)]
struct Cli {
    /// Path to the TOML configuration file. Defaults apply when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Drive in-process simulated applications instead of child processes.
    #[arg(long)]
    simulate: bool,

    /// Override the program launched for every application.
    #[arg(long)]
    child_cli: Option<String>,

    /// JSON document with per-application configuration sent at `conf`.
    #[arg(long)]
    conf_doc: Option<PathBuf>,

    /// Directory for the JSONL command history.
    #[arg(long)]
    history_dir: Option<PathBuf>,

    /// Write the final sequence report as JSON to this file.
    #[arg(long)]
    report: Option<PathBuf>,

    /// Scan application logs below this directory after a successful run.
    #[arg(long)]
    check_logs: Option<PathBuf>,

    /// Log output format (text or json).
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// Partition name.
    partition: String,

    /// Command tokens, e.g. `boot conf start 101 wait 1 enable-triggers`.
    #[arg(required = true, num_args = 1..)]
    tokens: Vec<String>,
}

fn main() -> ExitCode {
    let args = Cli::parse();
    if let Err(err) = init_tracing(args.log_format) {
        eprintln!("runctl: {err}");
        return ExitCode::FAILURE;
    }

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(err) => {
            error!(%err, "failed to build tokio runtime");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(args)) {
        Ok(code) => ExitCode::from(code),
        Err(err) => {
            error!(%err, "runctl failed");
            eprintln!("runctl: {err}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Cli) -> Result<u8> {
    // ── Load configuration ──────────────────────────────
    let mut config = match &args.config {
        Some(path) => GlobalConfig::load_from_path(path)?,
        None => GlobalConfig::default(),
    };
    if let Some(child_cli) = args.child_cli {
        config.child_cli = child_cli;
    }
    if args.history_dir.is_some() {
        config.history_dir.clone_from(&args.history_dir);
    }
    info!(partition = %args.partition, "configuration loaded");

    // ── Build the controller ────────────────────────────
    let launcher: Arc<dyn ChildLauncher> = if args.simulate {
        info!("using simulated applications");
        Arc::new(SimulatedLauncher::new())
    } else {
        Arc::new(ProcessLauncher::new(SpawnConfig::from_global(
            &config,
            &args.partition,
        )))
    };

    let mut controller = SessionController::from_config(&config, args.partition.clone(), launcher)?;
    if let Some(path) = &args.conf_doc {
        controller = controller.with_config_document(ConfigDocument::load_from_path(path)?)?;
    }
    if let Some(dir) = &config.history_dir {
        let writer = JsonlHistoryWriter::new(dir.clone())?;
        info!(path = %writer.path_for(controller.session().id()).display(), "history enabled");
        controller = controller.with_history_logger(Arc::new(writer));
    }

    // ── Run the sequence ────────────────────────────────
    let ct = CancellationToken::new();
    let signal_ct = ct.clone();
    let signal_handle = tokio::spawn(async move {
        shutdown_signal().await;
        info!("shutdown signal received");
        signal_ct.cancel();
    });

    let steps = parse_steps(&args.tokens);
    let report = CommandSequencer::new(&mut controller, ct).run(&steps).await;
    signal_handle.abort();
    controller.release_children().await;

    print_summary(&report);
    if let Some(path) = &args.report {
        let json = serde_json::to_string_pretty(&report)
            .map_err(|err| AppError::Io(format!("failed to serialize report: {err}")))?;
        std::fs::write(path, json)?;
        info!(path = %path.display(), "report written");
    }

    let mut code = report.exit_code();

    // ── Post-run log check ──────────────────────────────
    if report.success {
        if let Some(dir) = &args.check_logs {
            let rules = config.logcheck_rules()?;
            let logs = logcheck::check_logs(dir, &rules)?;
            for problem in &logs.problems {
                warn!(
                    file = %problem.file.display(),
                    line = problem.line_number,
                    text = %problem.line,
                    "log problem"
                );
            }
            info!(
                files = logs.files_checked,
                problems = logs.problems.len(),
                "log check finished"
            );
            if !logs.is_clean() && config.logcheck.enabled {
                code = EXIT_LOG_PROBLEMS;
            }
        }
    }

    Ok(code)
}

fn print_summary(report: &SequenceReport) {
    for entry in &report.history {
        println!(
            "{:>3}  {:<28} {:<22} {}",
            entry.seq,
            entry.command.to_string(),
            entry.resulting_state.as_str(),
            if entry.is_applied() { "ok" } else { "FAILED" }
        );
    }
    match &report.error {
        None => println!(
            "partition {}: sequence completed in state {}",
            report.partition, report.final_state
        ),
        Some(err) => println!(
            "partition {}: sequence aborted at step {} in state {}: {err}",
            report.partition,
            report.failed_step.unwrap_or_default(),
            report.final_state
        ),
    }
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(err) => {
                tracing::warn!(%err, "failed to register SIGTERM handler, using ctrl-c only");
                let _ = ctrl_c.await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(err) = ctrl_c.await {
            tracing::error!(%err, "ctrl-c signal handler failed");
        }
    }
}

fn init_tracing(log_format: LogFormat) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    // stdout carries the run summary.
    let subscriber = fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr);

    match log_format {
        LogFormat::Text => subscriber
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
        LogFormat::Json => subscriber
            .json()
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
    }

    Ok(())
}
