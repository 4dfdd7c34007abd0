//! Session model and command history.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::command::Command;
use crate::models::outcome::ChildOutcome;
use crate::models::state::LifecycleState;

/// How a history entry's command ended.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum Verdict {
    /// All children acknowledged; state advanced.
    Applied,
    /// Rejected before dispatch; no child was contacted.
    Denied {
        /// Why the command was illegal.
        reason: String,
    },
    /// Dispatched but not acknowledged by every child.
    Failed {
        /// Summary of the failing children.
        reason: String,
    },
}

/// One immutable record of a command issued to the session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HistoryEntry {
    /// 1-based position in the session history.
    pub seq: u64,
    /// Command as issued.
    pub command: Command,
    /// When the command was accepted for processing.
    pub issued_at: DateTime<Utc>,
    /// Session state after the command (unchanged unless applied).
    pub resulting_state: LifecycleState,
    /// Command result.
    #[serde(flatten)]
    pub verdict: Verdict,
    /// Per-child outcomes; empty for denied commands.
    #[serde(default)]
    pub per_child_outcomes: Vec<ChildOutcome>,
    /// Some children acted on a command that failed overall.
    #[serde(default)]
    pub partial_application: bool,
}

impl HistoryEntry {
    /// Whether the command advanced the session.
    #[must_use]
    pub fn is_applied(&self) -> bool {
        self.verdict == Verdict::Applied
    }
}

/// Run-control session for one partition.
///
/// State and history are only changed through the crate-internal mutators
/// used by [`SessionController`](crate::orchestrator::controller::SessionController).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Session {
    id: String,
    partition: String,
    state: LifecycleState,
    history: Vec<HistoryEntry>,
    run_numbers: BTreeSet<u64>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Session {
    /// Construct a fresh session in [`LifecycleState::None`].
    #[must_use]
    pub fn new(partition: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            partition: partition.into(),
            state: LifecycleState::None,
            history: Vec::new(),
            run_numbers: BTreeSet::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Unique session identifier.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Partition this session controls.
    #[must_use]
    pub fn partition(&self) -> &str {
        &self.partition
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// Full command history, oldest first.
    #[must_use]
    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }

    /// Whether `run_number` was already used by a started run.
    #[must_use]
    pub fn run_number_used(&self, run_number: u64) -> bool {
        self.run_numbers.contains(&run_number)
    }

    /// Run number of the run in progress, if any.
    #[must_use]
    pub fn current_run(&self) -> Option<u64> {
        if !self.state.in_run() {
            return None;
        }
        self.history
            .iter()
            .rev()
            .find(|e| e.is_applied() && e.command.kind.takes_run_number())
            .and_then(|e| e.command.run_number)
    }

    /// Creation timestamp.
    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Timestamp of the last recorded command.
    #[must_use]
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub(crate) fn next_seq(&self) -> u64 {
        self.history.len() as u64 + 1
    }

    /// Append `entry`, applying its resulting state when the command succeeded.
    pub(crate) fn record(&mut self, entry: HistoryEntry) -> &HistoryEntry {
        if entry.is_applied() {
            self.state = entry.resulting_state;
            if let Some(run) = entry.command.run_number {
                if entry.command.kind.takes_run_number() {
                    self.run_numbers.insert(run);
                }
            }
        }
        self.updated_at = Utc::now();
        self.history.push(entry);
        let last = self.history.len() - 1;
        &self.history[last]
    }
}
