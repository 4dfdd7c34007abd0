//! Run-control command vocabulary.

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

/// Name of a run-control command.
///
/// Tokens outside the vocabulary are kept as [`CommandKind::Other`] rather
/// than rejected at parse time, so that the legality table is the single
/// place where they are denied.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum CommandKind {
    /// Launch and register the partition applications.
    Boot,
    /// Configure every application.
    Conf,
    /// Start a run.
    Start,
    /// Alias of [`CommandKind::Start`].
    StartRun,
    /// Open the trigger gate.
    EnableTriggers,
    /// Close the trigger gate.
    DisableTriggers,
    /// Flush in-flight data.
    DrainDataflow,
    /// Stop the trigger sources.
    StopTriggerSources,
    /// Stop the run.
    Stop,
    /// Composite stop; recognised but never legal.
    StopRun,
    /// Tear down configuration.
    Scrap,
    /// Terminate the applications.
    Terminate,
    /// Any token outside the vocabulary.
    Other(String),
}

impl CommandKind {
    /// Parse a command token. Hyphens and underscores are interchangeable.
    #[must_use]
    pub fn from_token(token: &str) -> Self {
        match token.replace('-', "_").as_str() {
            "boot" => Self::Boot,
            "conf" => Self::Conf,
            "start" => Self::Start,
            "start_run" => Self::StartRun,
            "enable_triggers" => Self::EnableTriggers,
            "disable_triggers" => Self::DisableTriggers,
            "drain_dataflow" => Self::DrainDataflow,
            "stop_trigger_sources" => Self::StopTriggerSources,
            "stop" => Self::Stop,
            "stop_run" => Self::StopRun,
            "scrap" => Self::Scrap,
            "terminate" => Self::Terminate,
            _ => Self::Other(token.to_owned()),
        }
    }

    /// Canonical token for this command.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Boot => "boot",
            Self::Conf => "conf",
            Self::Start => "start",
            Self::StartRun => "start_run",
            Self::EnableTriggers => "enable_triggers",
            Self::DisableTriggers => "disable_triggers",
            Self::DrainDataflow => "drain_dataflow",
            Self::StopTriggerSources => "stop_trigger_sources",
            Self::Stop => "stop",
            Self::StopRun => "stop_run",
            Self::Scrap => "scrap",
            Self::Terminate => "terminate",
            Self::Other(token) => token,
        }
    }

    /// Whether the command carries a run number.
    #[must_use]
    pub fn takes_run_number(&self) -> bool {
        matches!(self, Self::Start | Self::StartRun)
    }
}

impl From<String> for CommandKind {
    fn from(token: String) -> Self {
        Self::from_token(&token)
    }
}

impl From<CommandKind> for String {
    fn from(kind: CommandKind) -> Self {
        kind.as_str().to_owned()
    }
}

impl Display for CommandKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single run-control directive with its optional run number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    /// Command name.
    pub kind: CommandKind,
    /// Run number for `start` / `start_run`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_number: Option<u64>,
}

impl Command {
    /// Construct a command without an argument.
    #[must_use]
    pub fn new(kind: CommandKind) -> Self {
        Self {
            kind,
            run_number: None,
        }
    }

    /// Construct a `start` command for `run_number`.
    #[must_use]
    pub fn start(run_number: u64) -> Self {
        Self {
            kind: CommandKind::Start,
            run_number: Some(run_number),
        }
    }

    /// Attach a run number.
    #[must_use]
    pub fn with_run_number(mut self, run_number: u64) -> Self {
        self.run_number = Some(run_number);
        self
    }
}

impl From<CommandKind> for Command {
    fn from(kind: CommandKind) -> Self {
        Self::new(kind)
    }
}

impl Display for Command {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.run_number {
            Some(run) => write!(f, "{} {run}", self.kind),
            None => write!(f, "{}", self.kind),
        }
    }
}
