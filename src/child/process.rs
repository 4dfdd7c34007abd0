//! Process-backed child applications.
//!
//! Each roster entry is launched as a separate OS process that speaks the
//! NDJSON protocol in [`crate::child::protocol`] on its stdio:
//! - `kill_on_drop(true)` so a dropped handle never leaks a process.
//! - `env_clear()` plus an allowlist, so the controller's environment is
//!   not inherited wholesale.
//! - A startup window: the child must print its ready line before
//!   `startup_timeout` or it is killed and the launch fails.

use std::collections::BTreeMap;
use std::future::Future;
use std::io;
use std::path::PathBuf;
use std::pin::Pin;
use std::process::Stdio;
use std::time::Duration;

use futures_util::StreamExt;
use tokio::io::AsyncWriteExt;
use tokio::process::{Child, ChildStdin, ChildStdout, Command as ProcessCommand};
use tokio::sync::Mutex;
use tokio_util::codec::FramedRead;
use tracing::{debug, info, warn};

use crate::child::codec::ChildLineCodec;
use crate::child::protocol::{encode_line, parse_ready, parse_reply, WireRequest};
use crate::child::{BoxedChild, ChildHandle, ChildLauncher, ChildRequest};
use crate::config::GlobalConfig;
use crate::models::app::{AppKind, AppSpec};
use crate::models::outcome::ChildReply;
use crate::{AppError, Result};

// ── Environment allowlist ────────────────────────────────────────────────────

/// Environment variables inherited by child processes.
///
/// Everything else is stripped; run-control context is injected explicitly
/// as `RUNCTL_PARTITION`, `RUNCTL_APP_NAME` and `RUNCTL_APP_KIND`.
pub const ALLOWED_ENV_VARS: &[&str] = &[
    "PATH",
    "HOME",
    "RUST_LOG",
    "TMPDIR",
    "LD_LIBRARY_PATH",
    // Windows-specific variables.
    "USERPROFILE",
    "SystemRoot",
    "TEMP",
    "TMP",
];

/// Time a child gets to exit after its stdin is closed before it is killed.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

// ── Configuration ────────────────────────────────────────────────────────────

/// How child processes are launched.
#[derive(Debug, Clone)]
pub struct SpawnConfig {
    /// Program started for every application.
    pub program: String,
    /// Arguments placed before the per-application flags.
    pub args: Vec<String>,
    /// Extra arguments for specific applications, keyed by name.
    pub app_args: BTreeMap<String, Vec<String>>,
    /// Partition name exported to the child.
    pub partition: String,
    /// Directory the child writes its log file into.
    pub log_dir: PathBuf,
    /// Window for the child's ready line.
    pub startup_timeout: Duration,
}

impl SpawnConfig {
    /// Derive the spawn settings from the global configuration.
    #[must_use]
    pub fn from_global(config: &GlobalConfig, partition: &str) -> Self {
        Self {
            program: config.child_cli.clone(),
            args: config.child_cli_args.clone(),
            app_args: config.child_app_args.clone(),
            partition: partition.to_owned(),
            log_dir: config.log_dir.clone(),
            startup_timeout: config.startup_timeout(),
        }
    }
}

// ── Connection ───────────────────────────────────────────────────────────────

struct Connection {
    child: Child,
    stdin: Option<ChildStdin>,
    stdout: FramedRead<ChildStdout, ChildLineCodec>,
    next_seq: u64,
    /// Set once the stream is known to be dead; later sends fail fast.
    closed: Option<String>,
}

impl Connection {
    async fn write_line(&mut self, mut line: String) -> io::Result<()> {
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::BrokenPipe, "stdin closed"))?;
        line.push('\n');
        stdin.write_all(line.as_bytes()).await?;
        stdin.flush().await
    }

    /// Read lines until the reply for `seq` arrives or the stream ends.
    async fn read_reply(&mut self, child: &str, seq: u64) -> ChildReply {
        loop {
            match self.stdout.next().await {
                None => {
                    let reason = "child closed its output".to_owned();
                    self.closed = Some(reason.clone());
                    return ChildReply::Unreachable(reason);
                }
                Some(Err(AppError::Io(err))) => {
                    let reason = format!("read failed: {err}");
                    self.closed = Some(reason.clone());
                    return ChildReply::Unreachable(reason);
                }
                Some(Err(err)) => {
                    warn!(child, %err, "skipping unreadable line from child");
                }
                Some(Ok(line)) => {
                    if line.trim().is_empty() {
                        continue;
                    }
                    match parse_reply(&line) {
                        Ok(reply) if reply.seq == seq => return reply.into_child_reply(),
                        Ok(reply) => {
                            debug!(child, expected = seq, got = reply.seq, "skipping stale reply");
                        }
                        Err(err) => {
                            warn!(child, %err, "skipping malformed line from child");
                        }
                    }
                }
            }
        }
    }
}

// ── Handle ───────────────────────────────────────────────────────────────────

/// Handle over one launched child process.
pub struct ProcessChild {
    name: String,
    kind: AppKind,
    pid: Option<u32>,
    conn: Mutex<Connection>,
}

impl ProcessChild {
    /// OS process id, if known.
    #[must_use]
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    async fn exchange(&self, request: ChildRequest) -> ChildReply {
        let mut conn = self.conn.lock().await;
        if let Some(reason) = &conn.closed {
            return ChildReply::Unreachable(reason.clone());
        }

        conn.next_seq += 1;
        let seq = conn.next_seq;
        let wire = WireRequest::new(seq, &request.command, request.payload);
        let line = match encode_line(&wire) {
            Ok(line) => line,
            Err(err) => return ChildReply::Unreachable(err.to_string()),
        };

        if let Err(err) = conn.write_line(line).await {
            let reason = format!("write failed: {err}");
            warn!(child = %self.name, %err, "failed to deliver command to child");
            conn.closed = Some(reason.clone());
            return ChildReply::Unreachable(reason);
        }

        match tokio::time::timeout(request.timeout, conn.read_reply(&self.name, seq)).await {
            Ok(reply) => reply,
            Err(_elapsed) => {
                warn!(
                    child = %self.name,
                    command = %request.command,
                    timeout = ?request.timeout,
                    "child did not reply in time"
                );
                ChildReply::TimedOut
            }
        }
    }

    async fn close(&self) {
        let mut conn = self.conn.lock().await;
        // Dropping stdin delivers EOF; a well-behaved child exits on it.
        drop(conn.stdin.take());
        if conn.closed.is_none() {
            conn.closed = Some("child shut down".into());
        }

        match tokio::time::timeout(SHUTDOWN_GRACE, conn.child.wait()).await {
            Ok(Ok(status)) => {
                info!(child = %self.name, ?status, "child process exited");
            }
            Ok(Err(err)) => {
                warn!(child = %self.name, %err, "error waiting for child process");
            }
            Err(_) => {
                warn!(
                    child = %self.name,
                    "child did not exit within grace period, forcing kill"
                );
                if let Err(err) = conn.child.kill().await {
                    warn!(child = %self.name, %err, "failed to force-kill child process");
                }
            }
        }
    }
}

impl ChildHandle for ProcessChild {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> AppKind {
        self.kind
    }

    fn send(&self, request: ChildRequest) -> Pin<Box<dyn Future<Output = ChildReply> + Send + '_>> {
        Box::pin(self.exchange(request))
    }

    fn shutdown(&self) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(self.close())
    }
}

// ── Spawner ──────────────────────────────────────────────────────────────────

/// Launch `app` as a child process and wait for its ready line.
///
/// The program receives `--name`, `--kind` and `--log-dir` after the
/// configured arguments, followed by any per-application arguments.
///
/// # Errors
///
/// - `AppError::Child("failed to spawn …")` on OS spawn failure.
/// - `AppError::Child("startup timeout …")` if no ready line arrives in time.
/// - `AppError::Child("… exited before ready signal")` on early EOF.
/// - `AppError::Child("… sent an invalid ready line …")` on a malformed line.
pub async fn spawn_child(config: &SpawnConfig, app: &AppSpec) -> Result<ProcessChild> {
    let mut cmd = ProcessCommand::new(&config.program);
    cmd.args(&config.args)
        .arg("--name")
        .arg(&app.name)
        .arg("--kind")
        .arg(app.kind.as_str())
        .arg("--log-dir")
        .arg(&config.log_dir);
    if let Some(extra) = config.app_args.get(&app.name) {
        cmd.args(extra);
    }

    cmd.env_clear();
    for &key in ALLOWED_ENV_VARS {
        if let Ok(val) = std::env::var(key) {
            cmd.env(key, val);
        }
    }
    cmd.env("RUNCTL_PARTITION", &config.partition)
        .env("RUNCTL_APP_NAME", &app.name)
        .env("RUNCTL_APP_KIND", app.kind.as_str());

    cmd.stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true);

    let mut child = cmd
        .spawn()
        .map_err(|err| AppError::Child(format!("failed to spawn '{}': {err}", app.name)))?;
    let pid = child.id();

    let stdin = child
        .stdin
        .take()
        .ok_or_else(|| AppError::Child(format!("failed to capture stdin of '{}'", app.name)))?;
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| AppError::Child(format!("failed to capture stdout of '{}'", app.name)))?;
    let mut reader = FramedRead::new(stdout, ChildLineCodec::new());

    match tokio::time::timeout(config.startup_timeout, reader.next()).await {
        Ok(Some(Ok(line))) => {
            let ready = parse_ready(&line).map_err(|err| {
                AppError::Child(format!("'{}' sent an invalid ready line: {err}", app.name))
            })?;
            if ready.name != app.name {
                warn!(
                    expected = %app.name,
                    reported = %ready.name,
                    "child reported a different application name"
                );
            }
            info!(child = %app.name, kind = %app.kind, pid = pid.unwrap_or(0), "child ready");
        }
        Ok(Some(Err(err))) => {
            return Err(AppError::Child(format!(
                "failed to read ready line of '{}': {err}",
                app.name
            )));
        }
        Ok(None) => {
            return Err(AppError::Child(format!(
                "'{}' exited before ready signal",
                app.name
            )));
        }
        Err(_elapsed) => {
            child.kill().await.ok();
            return Err(AppError::Child(format!(
                "startup timeout: '{}' did not emit ready signal within {:?}",
                app.name, config.startup_timeout
            )));
        }
    }

    Ok(ProcessChild {
        name: app.name.clone(),
        kind: app.kind,
        pid,
        conn: Mutex::new(Connection {
            child,
            stdin: Some(stdin),
            stdout: reader,
            next_seq: 0,
            closed: None,
        }),
    })
}

/// Launcher that starts every application as a child process.
#[derive(Debug, Clone)]
pub struct ProcessLauncher {
    config: SpawnConfig,
}

impl ProcessLauncher {
    /// Construct a launcher using `config`.
    #[must_use]
    pub fn new(config: SpawnConfig) -> Self {
        Self { config }
    }
}

impl ChildLauncher for ProcessLauncher {
    fn launch<'a>(
        &'a self,
        app: &'a AppSpec,
    ) -> Pin<Box<dyn Future<Output = Result<BoxedChild>> + Send + 'a>> {
        Box::pin(async move {
            let child = spawn_child(&self.config, app).await?;
            Ok(Box::new(child) as BoxedChild)
        })
    }
}
