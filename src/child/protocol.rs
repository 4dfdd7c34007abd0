//! Wire messages exchanged with process-backed children.
//!
//! One JSON object per line over the child's stdio:
//!
//! ```json
//! {"ready":true,"name":"ru-00","pid":4242}                         // child → controller, once
//! {"seq":3,"command":"start","run_number":101,"payload":null}     // controller → child
//! {"seq":3,"status":"acked","detail":"run 101 started"}            // child → controller
//! ```
//!
//! Replies carry the request `seq`; a reply to an earlier, timed-out
//! request is skipped by the reader.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::command::{Command, CommandKind};
use crate::models::outcome::ChildReply;
use crate::{AppError, Result};

/// First line emitted by a child once it accepts commands.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReadyLine {
    /// Must be `true`.
    pub ready: bool,
    /// Application name the child was started as.
    pub name: String,
    /// Process id, if the child reports it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
}

/// Command request sent to a child.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WireRequest {
    /// Correlation number, unique per child connection.
    pub seq: u64,
    /// Command name.
    pub command: CommandKind,
    /// Run number for `start` / `start_run`.
    #[serde(default)]
    pub run_number: Option<u64>,
    /// Configuration payload (for `conf`).
    #[serde(default)]
    pub payload: Option<Value>,
}

impl WireRequest {
    /// Build the request for `command`.
    #[must_use]
    pub fn new(seq: u64, command: &Command, payload: Option<Value>) -> Self {
        Self {
            seq,
            command: command.kind.clone(),
            run_number: command.run_number,
            payload,
        }
    }
}

/// Reply status reported by a child.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WireStatus {
    /// Command executed.
    Acked,
    /// Command refused.
    Denied,
}

/// Reply sent by a child for one request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WireReply {
    /// `seq` of the request being answered.
    pub seq: u64,
    /// Outcome.
    pub status: WireStatus,
    /// Optional free-form detail.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl WireReply {
    /// Acknowledge request `seq`.
    #[must_use]
    pub fn acked(seq: u64, detail: impl Into<String>) -> Self {
        Self {
            seq,
            status: WireStatus::Acked,
            detail: Some(detail.into()),
        }
    }

    /// Refuse request `seq`.
    #[must_use]
    pub fn denied(seq: u64, reason: impl Into<String>) -> Self {
        Self {
            seq,
            status: WireStatus::Denied,
            detail: Some(reason.into()),
        }
    }

    /// Convert into the coordinator-facing reply.
    #[must_use]
    pub fn into_child_reply(self) -> ChildReply {
        let detail = self.detail.unwrap_or_default();
        match self.status {
            WireStatus::Acked => ChildReply::Acked(detail),
            WireStatus::Denied => ChildReply::Denied(detail),
        }
    }
}

/// Serialize `message` as a single JSON line (without the newline).
///
/// # Errors
///
/// Returns `AppError::Protocol` if serialization fails.
pub fn encode_line<T: Serialize>(message: &T) -> Result<String> {
    serde_json::to_string(message)
        .map_err(|e| AppError::Protocol(format!("failed to serialise message: {e}")))
}

/// Parse a child's ready line.
///
/// # Errors
///
/// Returns `AppError::Protocol` if the line is malformed or `ready` is false.
pub fn parse_ready(line: &str) -> Result<ReadyLine> {
    let ready: ReadyLine = serde_json::from_str(line.trim())
        .map_err(|e| AppError::Protocol(format!("malformed ready line: {e}")))?;
    if !ready.ready {
        return Err(AppError::Protocol(format!(
            "child '{}' reported not ready",
            ready.name
        )));
    }
    Ok(ready)
}

/// Parse a reply line from a child.
///
/// # Errors
///
/// Returns `AppError::Protocol` if the line is not a valid reply.
pub fn parse_reply(line: &str) -> Result<WireReply> {
    serde_json::from_str(line.trim())
        .map_err(|e| AppError::Protocol(format!("malformed reply: {e}")))
}

/// Parse a request line (child side).
///
/// # Errors
///
/// Returns `AppError::Protocol` if the line is not a valid request.
pub fn parse_request(line: &str) -> Result<WireRequest> {
    serde_json::from_str(line.trim())
        .map_err(|e| AppError::Protocol(format!("malformed request: {e}")))
}
