#![forbid(unsafe_code)]

//! `runctl-child`: stand-in partition application.
//!
//! Speaks the run-control line protocol on stdio: prints a ready line,
//! then answers one reply per request. Acknowledges every command unless
//! told otherwise with `--deny`, `--hang` or `--delay-ms`. Each command is
//! appended to `<log-dir>/log_<name>.txt`. Diagnostics go to stderr.

use std::fs::{self, OpenOptions};
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Utc;
use clap::{Parser, ValueEnum};
use futures_util::StreamExt;
use tokio::io::AsyncWriteExt;
use tokio_util::codec::FramedRead;
use tracing::{debug, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use partition_runctl::child::codec::ChildLineCodec;
use partition_runctl::child::protocol::{encode_line, parse_request, ReadyLine, WireReply};
use partition_runctl::models::app::AppKind;
use partition_runctl::models::command::CommandKind;
use partition_runctl::{AppError, Result};

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "runctl-child", about = "Simulated partition application", version)]
struct Cli {
    /// Application name.
    #[arg(long)]
    name: String,

    /// Application kind.
    #[arg(long, value_enum)]
    kind: AppKind,

    /// Directory for this application's log file.
    #[arg(long, default_value = "logs")]
    log_dir: PathBuf,

    /// Refuse this command (repeatable).
    #[arg(long = "deny", value_name = "COMMAND")]
    deny: Vec<String>,

    /// Never answer this command (repeatable).
    #[arg(long = "hang", value_name = "COMMAND")]
    hang: Vec<String>,

    /// Write an ERROR line to the log when handling this command (repeatable).
    #[arg(long = "log-error", value_name = "COMMAND")]
    log_error: Vec<String>,

    /// Delay before every reply, in milliseconds.
    #[arg(long, default_value_t = 0)]
    delay_ms: u64,

    /// Log output format (text or json).
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

/// How this child reacts to incoming commands.
struct Script {
    deny: Vec<CommandKind>,
    hang: Vec<CommandKind>,
    log_error: Vec<CommandKind>,
    delay: Duration,
}

impl Script {
    fn from_cli(cli: &Cli) -> Self {
        let parse = |tokens: &[String]| -> Vec<CommandKind> {
            tokens.iter().map(|t| CommandKind::from_token(t)).collect()
        };
        Self {
            deny: parse(&cli.deny),
            hang: parse(&cli.hang),
            log_error: parse(&cli.log_error),
            delay: Duration::from_millis(cli.delay_ms),
        }
    }
}

/// Append-only per-application log file.
struct AppLog {
    name: String,
    path: PathBuf,
}

impl AppLog {
    fn open(dir: &Path, name: &str) -> Result<Self> {
        fs::create_dir_all(dir).map_err(|err| {
            AppError::Io(format!("failed to create log dir {}: {err}", dir.display()))
        })?;
        Ok(Self {
            name: name.to_owned(),
            path: dir.join(format!("log_{name}.txt")),
        })
    }

    fn write(&self, level: &str, message: &str) {
        let line = format!("{} {level} {}: {message}\n", Utc::now().to_rfc3339(), self.name);
        let result = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .and_then(|mut file| file.write_all(line.as_bytes()));
        if let Err(err) = result {
            warn!(%err, path = %self.path.display(), "failed to write application log");
        }
    }
}

fn main() -> std::process::ExitCode {
    let args = Cli::parse();
    if let Err(err) = init_tracing(args.log_format) {
        eprintln!("runctl-child: {err}");
        return std::process::ExitCode::FAILURE;
    }

    let result = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|err| AppError::Config(format!("failed to build tokio runtime: {err}")))
        .and_then(|runtime| runtime.block_on(serve(args)));

    match result {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("runctl-child: {err}");
            std::process::ExitCode::FAILURE
        }
    }
}

async fn serve(args: Cli) -> Result<()> {
    let script = Script::from_cli(&args);
    let log = AppLog::open(&args.log_dir, &args.name)?;
    let mut stdout = tokio::io::stdout();
    let mut requests = FramedRead::new(tokio::io::stdin(), ChildLineCodec::new());

    let ready = ReadyLine {
        ready: true,
        name: args.name.clone(),
        pid: Some(std::process::id()),
    };
    write_line(&mut stdout, &encode_line(&ready)?).await?;
    log.write("INFO", &format!("{} application ready", args.kind));
    info!(name = %args.name, kind = %args.kind, "ready");

    while let Some(line) = requests.next().await {
        let line = match line {
            Ok(line) => line,
            Err(AppError::Protocol(reason)) => {
                warn!(%reason, "discarding unreadable request");
                continue;
            }
            Err(err) => return Err(err),
        };
        if line.trim().is_empty() {
            continue;
        }
        let request = match parse_request(&line) {
            Ok(request) => request,
            Err(err) => {
                warn!(%err, "ignoring malformed request");
                continue;
            }
        };

        let label = match request.run_number {
            Some(run) => format!("{} {run}", request.command),
            None => request.command.to_string(),
        };
        log.write("INFO", &format!("received command {label}"));
        debug!(seq = request.seq, command = %label, "request");

        if script.log_error.contains(&request.command) {
            log.write("ERROR", &format!("scripted error while handling {label}"));
        }
        if script.hang.contains(&request.command) {
            info!(command = %label, "not answering");
            continue;
        }
        if !script.delay.is_zero() {
            tokio::time::sleep(script.delay).await;
        }

        let reply = if script.deny.contains(&request.command) {
            log.write("INFO", &format!("refused command {label}"));
            WireReply::denied(request.seq, format!("{} refuses {label}", args.name))
        } else {
            WireReply::acked(request.seq, format!("{label} done"))
        };
        write_line(&mut stdout, &encode_line(&reply)?).await?;

        if request.command == CommandKind::Terminate
            && !script.deny.contains(&CommandKind::Terminate)
        {
            log.write("INFO", "terminated");
            info!("terminated");
            return Ok(());
        }
    }

    log.write("INFO", "controller closed the connection");
    info!("stdin closed, exiting");
    Ok(())
}

async fn write_line(stdout: &mut tokio::io::Stdout, line: &str) -> Result<()> {
    stdout.write_all(line.as_bytes()).await?;
    stdout.write_all(b"\n").await?;
    stdout.flush().await?;
    Ok(())
}

fn init_tracing(log_format: LogFormat) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    // stdout is the protocol channel.
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
