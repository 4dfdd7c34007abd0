//! Unit tests for the command legality table.

use partition_runctl::models::command::CommandKind;
use partition_runctl::models::state::LifecycleState;
use partition_runctl::policy::LegalityTable;

fn vocabulary() -> Vec<CommandKind> {
    vec![
        CommandKind::Boot,
        CommandKind::Conf,
        CommandKind::Start,
        CommandKind::StartRun,
        CommandKind::EnableTriggers,
        CommandKind::DisableTriggers,
        CommandKind::DrainDataflow,
        CommandKind::StopTriggerSources,
        CommandKind::Stop,
        CommandKind::StopRun,
        CommandKind::Scrap,
        CommandKind::Terminate,
        CommandKind::Other("reboot".into()),
    ]
}

fn expected_legal(state: LifecycleState) -> Vec<CommandKind> {
    use CommandKind as C;
    use LifecycleState as S;
    match state {
        S::None => vec![C::Boot],
        S::Booted => vec![C::Conf],
        S::Configured | S::Stopped => vec![C::Start, C::StartRun, C::Scrap],
        S::Running => vec![C::EnableTriggers, C::DrainDataflow],
        S::TriggersEnabled => vec![C::DisableTriggers],
        S::RunningPostTrigger => vec![C::DrainDataflow],
        S::Drained => vec![C::StopTriggerSources],
        S::SourcesStopped => vec![C::Stop],
        S::Scrapped => vec![C::Terminate],
        S::Terminated => vec![],
    }
}

#[test]
fn table_matches_lifecycle_for_every_pair() {
    for state in LifecycleState::ALL {
        let legal = expected_legal(state);
        for command in vocabulary() {
            assert_eq!(
                LegalityTable::legal(state, &command),
                legal.contains(&command),
                "legal({state}, {command})"
            );
        }
    }
}

#[test]
fn lookups_are_deterministic() {
    for state in LifecycleState::ALL {
        for command in vocabulary() {
            let first = LegalityTable::next_state(state, &command);
            for _ in 0..3 {
                assert_eq!(LegalityTable::next_state(state, &command), first);
            }
        }
    }
}

#[test]
fn transitions_lead_to_expected_states() {
    use CommandKind as C;
    use LifecycleState as S;
    let cases = [
        (S::None, C::Boot, S::Booted),
        (S::Booted, C::Conf, S::Configured),
        (S::Configured, C::Start, S::Running),
        (S::Configured, C::StartRun, S::Running),
        (S::Configured, C::Scrap, S::Scrapped),
        (S::Running, C::EnableTriggers, S::TriggersEnabled),
        (S::Running, C::DrainDataflow, S::Drained),
        (S::TriggersEnabled, C::DisableTriggers, S::RunningPostTrigger),
        (S::RunningPostTrigger, C::DrainDataflow, S::Drained),
        (S::Drained, C::StopTriggerSources, S::SourcesStopped),
        (S::SourcesStopped, C::Stop, S::Stopped),
        (S::Stopped, C::Start, S::Running),
        (S::Stopped, C::Scrap, S::Scrapped),
        (S::Scrapped, C::Terminate, S::Terminated),
    ];
    for (from, command, to) in cases {
        assert_eq!(LegalityTable::next_state(from, &command), Some(to));
    }
}

#[test]
fn stop_run_is_never_legal() {
    for state in LifecycleState::ALL {
        assert!(!LegalityTable::legal(state, &CommandKind::StopRun));
    }
}

#[test]
fn denial_reason_lists_allowed_commands() {
    let reason = LegalityTable::denial_reason(LifecycleState::Booted, &CommandKind::Boot);
    assert_eq!(reason, "'boot' not allowed in state BOOTED (allowed: conf)");
}

#[test]
fn denial_reason_in_terminal_state() {
    let reason = LegalityTable::denial_reason(LifecycleState::Terminated, &CommandKind::Boot);
    assert!(reason.contains("no further commands accepted"), "got: {reason}");
}

#[test]
fn unknown_tokens_are_denied_everywhere() {
    let other = CommandKind::from_token("launch_missiles");
    for state in LifecycleState::ALL {
        assert!(!LegalityTable::legal(state, &other));
    }
}
