//! Global configuration parsing and validation.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::logcheck::LogCheckRules;
use crate::models::app::AppSpec;
use crate::models::command::CommandKind;
use crate::orchestrator::roster;
use crate::{AppError, Result};

/// Per-command-class response bounds (seconds).
///
/// Each child must answer within the bound for the command's class. The
/// coordinator waits an extra `deadline_grace_ms` before recording
/// stragglers as timed out.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct TimeoutConfig {
    /// Bound for commands without a dedicated setting.
    #[serde(default = "default_command_seconds")]
    pub default_seconds: u64,
    /// Launching and registering applications.
    #[serde(default = "default_slow_seconds")]
    pub boot_seconds: u64,
    /// Configuring applications.
    #[serde(default = "default_slow_seconds")]
    pub conf_seconds: u64,
    /// `start` / `start_run`.
    #[serde(default = "default_command_seconds")]
    pub start_seconds: u64,
    /// Flushing in-flight data.
    #[serde(default = "default_drain_seconds")]
    pub drain_dataflow_seconds: u64,
    /// Stopping a run.
    #[serde(default = "default_slow_seconds")]
    pub stop_seconds: u64,
    /// Terminating applications.
    #[serde(default = "default_command_seconds")]
    pub terminate_seconds: u64,
    /// Extra coordinator wait on top of the child bound (milliseconds).
    #[serde(default = "default_grace_ms")]
    pub deadline_grace_ms: u64,
}

fn default_command_seconds() -> u64 {
    30
}

fn default_slow_seconds() -> u64 {
    60
}

fn default_drain_seconds() -> u64 {
    120
}

fn default_grace_ms() -> u64 {
    500
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            default_seconds: default_command_seconds(),
            boot_seconds: default_slow_seconds(),
            conf_seconds: default_slow_seconds(),
            start_seconds: default_command_seconds(),
            drain_dataflow_seconds: default_drain_seconds(),
            stop_seconds: default_slow_seconds(),
            terminate_seconds: default_command_seconds(),
            deadline_grace_ms: default_grace_ms(),
        }
    }
}

impl TimeoutConfig {
    /// Bound a single child has to answer `kind`.
    #[must_use]
    pub fn timeout_for(&self, kind: &CommandKind) -> Duration {
        let seconds = match kind {
            CommandKind::Boot => self.boot_seconds,
            CommandKind::Conf => self.conf_seconds,
            CommandKind::Start | CommandKind::StartRun => self.start_seconds,
            CommandKind::DrainDataflow => self.drain_dataflow_seconds,
            CommandKind::Stop => self.stop_seconds,
            CommandKind::Terminate => self.terminate_seconds,
            _ => self.default_seconds,
        };
        Duration::from_secs(seconds)
    }

    /// Coordinator deadline for `kind`: child bound plus grace.
    #[must_use]
    pub fn deadline_for(&self, kind: &CommandKind) -> Duration {
        self.timeout_for(kind) + Duration::from_millis(self.deadline_grace_ms)
    }

    fn validate(&self) -> Result<()> {
        let all = [
            ("default_seconds", self.default_seconds),
            ("boot_seconds", self.boot_seconds),
            ("conf_seconds", self.conf_seconds),
            ("start_seconds", self.start_seconds),
            ("drain_dataflow_seconds", self.drain_dataflow_seconds),
            ("stop_seconds", self.stop_seconds),
            ("terminate_seconds", self.terminate_seconds),
        ];
        if let Some((name, _)) = all.iter().find(|(_, value)| *value == 0) {
            return Err(AppError::Config(format!(
                "timeouts.{name} must be greater than zero"
            )));
        }
        Ok(())
    }
}

/// High-level partition options.
///
/// These feed the roster (how many children are registered at `boot`) and
/// the default per-application configuration sent with `conf`. They never
/// affect command legality.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct PartitionOptions {
    /// Number of data producer streams (links).
    #[serde(default = "default_data_producers")]
    pub number_of_data_producers: u32,
    /// Number of readout unit applications.
    #[serde(default = "default_one")]
    pub readout_apps: u32,
    /// Number of dataflow applications.
    #[serde(default = "default_one")]
    pub dataflow_apps: u32,
    /// Trigger rate in Hz.
    #[serde(default = "default_trigger_rate")]
    pub trigger_rate_hz: f64,
    /// Expected run duration in seconds.
    #[serde(default = "default_run_duration")]
    pub run_duration_seconds: u64,
    /// Slowdown factor applied to emulated data rates.
    #[serde(default = "default_one")]
    pub data_rate_slowdown_factor: u32,
    /// Readout latency buffer size (frames).
    #[serde(default = "default_latency_buffer")]
    pub latency_buffer_size: u64,
    /// Enable trigger primitive generation in readout.
    #[serde(default)]
    pub enable_tpg: bool,
    /// Add one data quality monitor per readout unit.
    #[serde(default)]
    pub enable_dqm: bool,
    /// Add the hardware signal interface application.
    #[serde(default = "default_true")]
    pub enable_hsi: bool,
}

fn default_data_producers() -> u32 {
    2
}

fn default_one() -> u32 {
    1
}

fn default_trigger_rate() -> f64 {
    1.0
}

fn default_run_duration() -> u64 {
    20
}

fn default_latency_buffer() -> u64 {
    200_000
}

fn default_true() -> bool {
    true
}

impl Default for PartitionOptions {
    fn default() -> Self {
        Self {
            number_of_data_producers: default_data_producers(),
            readout_apps: default_one(),
            dataflow_apps: default_one(),
            trigger_rate_hz: default_trigger_rate(),
            run_duration_seconds: default_run_duration(),
            data_rate_slowdown_factor: default_one(),
            latency_buffer_size: default_latency_buffer(),
            enable_tpg: false,
            enable_dqm: false,
            enable_hsi: true,
        }
    }
}

impl PartitionOptions {
    fn validate(&self) -> Result<()> {
        if self.readout_apps == 0 {
            return Err(AppError::Config(
                "options.readout_apps must be greater than zero".into(),
            ));
        }
        if self.dataflow_apps == 0 {
            return Err(AppError::Config(
                "options.dataflow_apps must be greater than zero".into(),
            ));
        }
        if self.number_of_data_producers < self.readout_apps {
            return Err(AppError::Config(format!(
                "options.number_of_data_producers ({}) must be at least readout_apps ({})",
                self.number_of_data_producers, self.readout_apps
            )));
        }
        if !(self.trigger_rate_hz.is_finite() && self.trigger_rate_hz > 0.0) {
            return Err(AppError::Config(
                "options.trigger_rate_hz must be a positive number".into(),
            ));
        }
        if self.data_rate_slowdown_factor == 0 {
            return Err(AppError::Config(
                "options.data_rate_slowdown_factor must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

/// Post-run log check settings.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct LogCheckConfig {
    /// Whether `--check-logs` findings affect the exit code.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Application-name regex → message regexes that are expected noise.
    #[serde(default)]
    pub ignored: BTreeMap<String, Vec<String>>,
}

impl Default for LogCheckConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ignored: BTreeMap::new(),
        }
    }
}

fn default_partition() -> String {
    "integtest-partition".into()
}

fn default_child_cli() -> String {
    "runctl-child".into()
}

fn default_startup_timeout() -> u64 {
    10
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("logs")
}

/// Global configuration parsed from `runctl.toml`.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct GlobalConfig {
    /// Partition name used when none is given on the command line.
    #[serde(default = "default_partition")]
    pub partition: String,
    /// Program launched for every child application.
    #[serde(default = "default_child_cli")]
    pub child_cli: String,
    /// Arguments passed to the child program before the per-app flags.
    #[serde(default)]
    pub child_cli_args: Vec<String>,
    /// Extra arguments for individual applications, keyed by app name.
    #[serde(default)]
    pub child_app_args: BTreeMap<String, Vec<String>>,
    /// Seconds a launched child has to emit its ready line.
    #[serde(default = "default_startup_timeout")]
    pub startup_timeout_seconds: u64,
    /// Directory handed to children for their log files.
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
    /// Directory for JSONL command history; disabled when absent.
    #[serde(default)]
    pub history_dir: Option<PathBuf>,
    /// Per-command response bounds.
    #[serde(default)]
    pub timeouts: TimeoutConfig,
    /// Partition options driving the roster.
    #[serde(default)]
    pub options: PartitionOptions,
    /// Extra applications appended to the generated roster.
    #[serde(default)]
    pub apps: Vec<AppSpec>,
    /// Post-run log check settings.
    #[serde(default)]
    pub logcheck: LogCheckConfig,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            partition: default_partition(),
            child_cli: default_child_cli(),
            child_cli_args: Vec::new(),
            child_app_args: BTreeMap::new(),
            startup_timeout_seconds: default_startup_timeout(),
            log_dir: default_log_dir(),
            history_dir: None,
            timeouts: TimeoutConfig::default(),
            options: PartitionOptions::default(),
            apps: Vec::new(),
            logcheck: LogCheckConfig::default(),
        }
    }
}

impl GlobalConfig {
    /// Load and validate configuration from a TOML file path.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the file cannot be read or contains
    /// invalid TOML, or if validation fails.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|err| AppError::Config(format!("failed to read config: {err}")))?;
        Self::from_toml_str(&raw)
    }

    /// Parse configuration from a TOML string. An empty string yields defaults.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if parsing or validation fails.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Startup window for a launched child.
    #[must_use]
    pub fn startup_timeout(&self) -> Duration {
        Duration::from_secs(self.startup_timeout_seconds)
    }

    /// Compile the log check ignore rules.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if any pattern is not a valid regex.
    pub fn logcheck_rules(&self) -> Result<LogCheckRules> {
        LogCheckRules::compile(&self.logcheck.ignored)
    }

    fn validate(&self) -> Result<()> {
        if self.partition.trim().is_empty() {
            return Err(AppError::Config("partition must not be empty".into()));
        }
        if self.child_cli.trim().is_empty() {
            return Err(AppError::Config("child_cli must not be empty".into()));
        }
        if self.startup_timeout_seconds == 0 {
            return Err(AppError::Config(
                "startup_timeout_seconds must be greater than zero".into(),
            ));
        }
        self.timeouts.validate()?;
        self.options.validate()?;
        // Builds the roster once to reject duplicate application names early.
        roster::build_roster(&self.options, &self.apps)?;
        self.logcheck_rules()?;
        Ok(())
    }
}
