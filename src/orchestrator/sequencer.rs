//! Fail-fast execution of a command sequence.
//!
//! A sequence is an ordered list of [`Step`]s parsed from command tokens.
//! Commands are fed to the [`SessionController`] one at a time; `wait`
//! steps are honoured by the sequencer itself. The first denied or failed
//! command ends the sequence and nothing after it is attempted.

use std::fmt::{Display, Formatter};
use std::time::Duration;

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::models::command::{Command, CommandKind};
use crate::models::session::HistoryEntry;
use crate::models::state::LifecycleState;
use crate::orchestrator::controller::SessionController;
use crate::AppError;

/// One item of a command sequence.
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// Send a command to the session.
    Command(Command),
    /// Pause before the next step.
    Wait(Duration),
}

impl Display for Step {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Command(command) => write!(f, "{command}"),
            Self::Wait(duration) => write!(f, "wait {}", duration.as_secs_f64()),
        }
    }
}

/// Parse command tokens into steps.
///
/// - `start` / `start_run` consume a following integer as the run number.
/// - `wait` consumes a following non-negative number of seconds that fits
///   a [`Duration`]. A `wait` without one becomes an unknown command, which
///   the session denies.
/// - An integer that does not follow a run-number command is kept as an
///   unknown command.
#[must_use]
pub fn parse_steps<S: AsRef<str>>(tokens: &[S]) -> Vec<Step> {
    let mut steps = Vec::with_capacity(tokens.len());
    let mut iter = tokens.iter().map(AsRef::as_ref).peekable();

    while let Some(token) = iter.next() {
        if token == "wait" {
            let duration = iter
                .peek()
                .and_then(|next| next.parse::<f64>().ok())
                .and_then(|s| Duration::try_from_secs_f64(s).ok());
            if let Some(duration) = duration {
                iter.next();
                steps.push(Step::Wait(duration));
            } else {
                steps.push(Step::Command(Command::new(CommandKind::Other(token.to_owned()))));
            }
            continue;
        }

        let kind = CommandKind::from_token(token);
        let mut command = Command::new(kind);
        if command.kind.takes_run_number() {
            if let Some(run) = iter.peek().and_then(|next| next.parse::<u64>().ok()) {
                iter.next();
                command = command.with_run_number(run);
            }
        }
        steps.push(Step::Command(command));
    }
    steps
}

/// Result of running a sequence.
#[derive(Debug, Clone, Serialize)]
pub struct SequenceReport {
    /// Partition the session controls.
    pub partition: String,
    /// Session identifier.
    pub session_id: String,
    /// True when every step completed.
    pub success: bool,
    /// True when the run was cancelled before completing.
    pub cancelled: bool,
    /// Session state when the sequence ended.
    pub final_state: LifecycleState,
    /// Number of steps in the sequence.
    pub steps_total: usize,
    /// Commands handed to the session, including the failing one.
    pub commands_attempted: usize,
    /// 1-based index of the step that ended the sequence early.
    pub failed_step: Option<usize>,
    /// Error that ended the sequence early.
    pub error: Option<String>,
    /// History entries appended during this run.
    pub history: Vec<HistoryEntry>,
}

impl SequenceReport {
    /// Process exit code for this result: 0 on success, 1 otherwise.
    #[must_use]
    pub fn exit_code(&self) -> u8 {
        u8::from(!self.success)
    }
}

/// Feeds steps to a session controller, stopping at the first failure.
pub struct CommandSequencer<'a> {
    controller: &'a mut SessionController,
    cancel: CancellationToken,
}

impl<'a> CommandSequencer<'a> {
    /// Construct a sequencer driving `controller`. Cancelling `cancel`
    /// stops the sequence before the next step or during a wait.
    pub fn new(controller: &'a mut SessionController, cancel: CancellationToken) -> Self {
        Self { controller, cancel }
    }

    /// Run `steps` in order.
    pub async fn run(&mut self, steps: &[Step]) -> SequenceReport {
        let history_start = self.controller.history().len();
        let mut commands_attempted = 0;
        let mut failure: Option<(usize, AppError)> = None;

        for (idx, step) in steps.iter().enumerate() {
            if self.cancel.is_cancelled() {
                failure = Some((idx + 1, AppError::Cancelled(format!("before step '{step}'"))));
                break;
            }
            match step {
                Step::Wait(duration) => {
                    info!(seconds = duration.as_secs_f64(), "waiting");
                    tokio::select! {
                        () = tokio::time::sleep(*duration) => {}
                        () = self.cancel.cancelled() => {
                            failure = Some((idx + 1, AppError::Cancelled(format!("during '{step}'"))));
                            break;
                        }
                    }
                }
                Step::Command(command) => {
                    commands_attempted += 1;
                    if let Err(err) = self.controller.execute(command.clone()).await {
                        failure = Some((idx + 1, err));
                        break;
                    }
                }
            }
        }

        let session = self.controller.session();
        let cancelled = matches!(failure, Some((_, AppError::Cancelled(_))));
        let (failed_step, error) = match failure {
            Some((step, err)) => {
                warn!(step, %err, state = %session.state(), "sequence aborted");
                (Some(step), Some(err.to_string()))
            }
            None => {
                info!(state = %session.state(), "sequence completed");
                (None, None)
            }
        };

        SequenceReport {
            partition: session.partition().to_owned(),
            session_id: session.id().to_owned(),
            success: error.is_none(),
            cancelled,
            final_state: session.state(),
            steps_total: steps.len(),
            commands_attempted,
            failed_step,
            error,
            history: session.history()[history_start..].to_vec(),
        }
    }
}
