//! Command legality table for the partition lifecycle.
//!
//! Maps `(state, command)` to the resulting state. Anything not listed is
//! illegal, including unknown or mistyped commands. The table has no
//! hidden inputs, so every lookup is deterministic.

use crate::models::command::CommandKind;
use crate::models::state::LifecycleState;

use LifecycleState as S;

/// Legal transitions: `(from, command, to)`.
const TRANSITIONS: &[(LifecycleState, CommandKind, LifecycleState)] = &[
    (S::None, CommandKind::Boot, S::Booted),
    (S::Booted, CommandKind::Conf, S::Configured),
    (S::Configured, CommandKind::Start, S::Running),
    (S::Configured, CommandKind::StartRun, S::Running),
    (S::Configured, CommandKind::Scrap, S::Scrapped),
    (S::Running, CommandKind::EnableTriggers, S::TriggersEnabled),
    (S::Running, CommandKind::DrainDataflow, S::Drained),
    (S::TriggersEnabled, CommandKind::DisableTriggers, S::RunningPostTrigger),
    (S::RunningPostTrigger, CommandKind::DrainDataflow, S::Drained),
    (S::Drained, CommandKind::StopTriggerSources, S::SourcesStopped),
    (S::SourcesStopped, CommandKind::Stop, S::Stopped),
    (S::Stopped, CommandKind::Start, S::Running),
    (S::Stopped, CommandKind::StartRun, S::Running),
    (S::Stopped, CommandKind::Scrap, S::Scrapped),
    (S::Scrapped, CommandKind::Terminate, S::Terminated),
];

/// Pure lookup over the lifecycle transition table.
pub struct LegalityTable;

impl LegalityTable {
    /// Whether `command` may be issued in `state`.
    #[must_use]
    pub fn legal(state: LifecycleState, command: &CommandKind) -> bool {
        Self::next_state(state, command).is_some()
    }

    /// State reached by issuing `command` in `state`, or `None` if illegal.
    #[must_use]
    pub fn next_state(state: LifecycleState, command: &CommandKind) -> Option<LifecycleState> {
        TRANSITIONS
            .iter()
            .find(|(from, kind, _)| *from == state && kind == command)
            .map(|(_, _, to)| *to)
    }

    /// Commands accepted in `state`, in table order.
    #[must_use]
    pub fn legal_commands(state: LifecycleState) -> Vec<&'static CommandKind> {
        TRANSITIONS
            .iter()
            .filter(|(from, _, _)| *from == state)
            .map(|(_, kind, _)| kind)
            .collect()
    }

    /// Operator-facing explanation of why `command` is denied in `state`.
    #[must_use]
    pub fn denial_reason(state: LifecycleState, command: &CommandKind) -> String {
        let allowed = Self::legal_commands(state);
        if allowed.is_empty() {
            return format!("'{command}' not allowed in state {state}: no further commands accepted");
        }
        let names = allowed
            .iter()
            .map(|k| k.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        format!("'{command}' not allowed in state {state} (allowed: {names})")
    }
}
