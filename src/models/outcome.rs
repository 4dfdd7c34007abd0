//! Per-child and aggregate command outcomes.

use serde::{Deserialize, Serialize};

/// Reply produced by a single child for a single command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChildReply {
    /// Command executed; carries the child's detail text.
    Acked(String),
    /// Child refused the command.
    Denied(String),
    /// No reply within the command's bound.
    TimedOut,
    /// Child could not be reached (exited, pipe closed, never launched).
    Unreachable(String),
}

/// Classification of a [`ChildOutcome`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ChildStatus {
    /// Child executed the command.
    Acked,
    /// Child refused the command.
    Denied,
    /// Child did not answer in time.
    TimedOut,
    /// Child could not be contacted.
    Unreachable,
}

/// Outcome of one command on one child. Created once, never mutated.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChildOutcome {
    /// Application name of the child.
    pub child_name: String,
    /// Outcome classification.
    pub status: ChildStatus,
    /// Free-form detail reported by the child or the coordinator.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ChildOutcome {
    /// Build the outcome record for `reply` from `child_name`.
    #[must_use]
    pub fn from_reply(child_name: &str, reply: ChildReply) -> Self {
        let (status, detail) = match reply {
            ChildReply::Acked(detail) => (ChildStatus::Acked, non_empty(detail)),
            ChildReply::Denied(reason) => (ChildStatus::Denied, non_empty(reason)),
            ChildReply::TimedOut => (ChildStatus::TimedOut, None),
            ChildReply::Unreachable(reason) => (ChildStatus::Unreachable, non_empty(reason)),
        };
        Self {
            child_name: child_name.to_owned(),
            status,
            detail,
        }
    }

    /// Whether the child acknowledged the command.
    #[must_use]
    pub fn is_acked(&self) -> bool {
        self.status == ChildStatus::Acked
    }
}

fn non_empty(text: String) -> Option<String> {
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

/// Reduction of every child's outcome for one command.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AggregateOutcome {
    /// One entry per dispatched child, ordered by child name.
    pub outcomes: Vec<ChildOutcome>,
}

impl AggregateOutcome {
    /// True iff every child acknowledged. Vacuously true with no children.
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.outcomes.iter().all(ChildOutcome::is_acked)
    }

    /// True when the command failed but some children already acted on it.
    #[must_use]
    pub fn partial_application(&self) -> bool {
        !self.succeeded() && self.outcomes.iter().any(ChildOutcome::is_acked)
    }

    /// Outcomes that were not acknowledged.
    pub fn failures(&self) -> impl Iterator<Item = &ChildOutcome> {
        self.outcomes.iter().filter(|o| !o.is_acked())
    }

    /// One-line summary of the failing children, e.g. `ru-00=denied(busy)`.
    #[must_use]
    pub fn failure_summary(&self) -> String {
        self.failures()
            .map(|o| {
                let status = match o.status {
                    ChildStatus::Acked => "acked",
                    ChildStatus::Denied => "denied",
                    ChildStatus::TimedOut => "timed_out",
                    ChildStatus::Unreachable => "unreachable",
                };
                match &o.detail {
                    Some(detail) => format!("{}={status}({detail})", o.child_name),
                    None => format!("{}={status}", o.child_name),
                }
            })
            .collect::<Vec<_>>()
            .join(", ")
    }
}
