//! Unit tests for command tokens and sequence parsing.

use std::time::Duration;

use partition_runctl::models::command::{Command, CommandKind};
use partition_runctl::orchestrator::{parse_steps, Step};

#[test]
fn hyphen_and_underscore_spellings_are_equivalent() {
    assert_eq!(
        CommandKind::from_token("enable-triggers"),
        CommandKind::EnableTriggers
    );
    assert_eq!(
        CommandKind::from_token("stop_trigger_sources"),
        CommandKind::from_token("stop-trigger-sources")
    );
}

#[test]
fn unknown_token_is_preserved() {
    let kind = CommandKind::from_token("Boot");
    assert_eq!(kind, CommandKind::Other("Boot".into()));
    assert_eq!(kind.to_string(), "Boot");
}

#[test]
fn command_serializes_as_canonical_token() {
    let json = serde_json::to_string(&CommandKind::DrainDataflow).unwrap();
    assert_eq!(json, "\"drain_dataflow\"");
    let back: CommandKind = serde_json::from_str("\"drain-dataflow\"").unwrap();
    assert_eq!(back, CommandKind::DrainDataflow);
}

#[test]
fn command_display_includes_run_number() {
    assert_eq!(Command::start(101).to_string(), "start 101");
    assert_eq!(Command::new(CommandKind::Scrap).to_string(), "scrap");
}

#[test]
fn start_consumes_run_number() {
    let steps = parse_steps(&["boot", "conf", "start", "101", "start_run", "102"]);
    assert_eq!(
        steps,
        vec![
            Step::Command(Command::new(CommandKind::Boot)),
            Step::Command(Command::new(CommandKind::Conf)),
            Step::Command(Command::start(101)),
            Step::Command(Command::new(CommandKind::StartRun).with_run_number(102)),
        ]
    );
}

#[test]
fn start_without_number_keeps_no_run_number() {
    let steps = parse_steps(&["start", "conf"]);
    assert_eq!(steps[0], Step::Command(Command::new(CommandKind::Start)));
    assert_eq!(steps.len(), 2);
}

#[test]
fn wait_consumes_seconds() {
    let steps = parse_steps(&["wait", "1.5", "wait", "20"]);
    assert_eq!(
        steps,
        vec![
            Step::Wait(Duration::from_millis(1500)),
            Step::Wait(Duration::from_secs(20)),
        ]
    );
}

#[test]
fn bad_wait_becomes_unknown_command() {
    for tokens in [
        &["wait"][..],
        &["wait", "-1"][..],
        &["wait", "soon"][..],
        &["wait", "NaN"][..],
        &["wait", "inf"][..],
        &["wait", "1e20"][..],
    ] {
        let steps = parse_steps(tokens);
        assert_eq!(
            steps[0],
            Step::Command(Command::new(CommandKind::Other("wait".into()))),
            "tokens: {tokens:?}"
        );
    }
}

#[test]
fn stray_integer_becomes_unknown_command() {
    let steps = parse_steps(&["boot", "42"]);
    assert_eq!(
        steps[1],
        Step::Command(Command::new(CommandKind::Other("42".into())))
    );
}

#[test]
fn step_display_round_trips_tokens() {
    let steps = parse_steps(&["start", "7", "wait", "2"]);
    let shown: Vec<String> = steps.iter().map(ToString::to_string).collect();
    assert_eq!(shown, vec!["start 7", "wait 2"]);
}

#[test]
fn oversized_wait_leaves_its_argument_unconsumed() {
    let steps = parse_steps(&["boot", "wait", "1e20"]);
    assert_eq!(
        steps,
        vec![
            Step::Command(Command::new(CommandKind::Boot)),
            Step::Command(Command::new(CommandKind::Other("wait".into()))),
            Step::Command(Command::new(CommandKind::Other("1e20".into()))),
        ]
    );
}
