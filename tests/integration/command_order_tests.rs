//! Out-of-order command sequences.
//!
//! Every sequence below contains a command that is illegal in the state
//! reached by its prefix. Each must fail, leave the session in the state
//! before the illegal command, and never attempt anything after it.

use partition_runctl::models::session::Verdict;
use partition_runctl::policy::LegalityTable;

use super::test_helpers::{acking_controller, run_tokens, PARTITION};

const INVALID_SEQUENCES: &[&str] = &[
    // No commands are valid before boot.
    "integtest-partition conf",
    "integtest-partition start_run 100",
    "integtest-partition start 101",
    "integtest-partition enable_triggers",
    "integtest-partition stop_run",
    "integtest-partition disable_triggers",
    "integtest-partition drain_dataflow",
    "integtest-partition stop_trigger_sources",
    "integtest-partition stop",
    "integtest-partition scrap",
    // Only conf after boot.
    "integtest-partition boot boot",
    "integtest-partition boot start 101",
    "integtest-partition boot stop_run",
    "integtest-partition boot disable_triggers",
    "integtest-partition boot drain_dataflow",
    "integtest-partition boot stop_trigger_sources",
    "integtest-partition boot stop",
    "integtest-partition boot scrap",
    // Only start, start_run and scrap after conf.
    "integtest-partition boot conf boot",
    "integtest-partition boot conf conf",
    "integtest-partition boot conf enable_triggers",
    "integtest-partition boot conf stop_run",
    "integtest-partition boot conf disable_triggers",
    "integtest-partition boot conf drain_dataflow",
    "integtest-partition boot conf stop_trigger_sources",
    "integtest-partition boot conf stop",
    // Only drain_dataflow and enable_triggers after start.
    "integtest-partition boot conf start 100 boot",
    "integtest-partition boot conf start 101 conf",
    "integtest-partition boot conf start 102 start_run 100",
    "integtest-partition boot conf start 103 start 100",
    "integtest-partition boot conf start 104 disable_triggers",
    "integtest-partition boot conf start 105 stop_trigger_sources",
    "integtest-partition boot conf start 106 stop",
    // Only disable_triggers after enable_triggers.
    "integtest-partition boot conf start 200 enable_triggers boot",
    "integtest-partition boot conf start 201 enable_triggers conf",
    "integtest-partition boot conf start 202 enable_triggers start_run",
    "integtest-partition boot conf start 203 enable_triggers start",
    "integtest-partition boot conf start 204 enable_triggers enable_triggers",
    "integtest-partition boot conf start 205 enable_triggers drain_dataflow",
    "integtest-partition boot conf start 206 enable_triggers stop_trigger_sources",
    "integtest-partition boot conf start 207 enable_triggers stop",
    "integtest-partition boot conf start 208 enable_triggers scrap",
    // Only stop_trigger_sources after drain_dataflow.
    "integtest-partition boot conf start 300 drain_dataflow boot",
    "integtest-partition boot conf start 301 drain_dataflow conf",
    "integtest-partition boot conf start 302 drain_dataflow start_run",
    "integtest-partition boot conf start 303 drain_dataflow start",
    "integtest-partition boot conf start 304 drain_dataflow enable_triggers",
    "integtest-partition boot conf start 305 drain_dataflow disable_triggers",
    "integtest-partition boot conf start 306 drain_dataflow drain_dataflow",
    "integtest-partition boot conf start 307 drain_dataflow stop",
    "integtest-partition boot conf start 308 drain_dataflow scrap",
    // Only stop after stop_trigger_sources.
    "integtest-partition boot conf start 400 drain_dataflow stop_trigger_sources boot",
    "integtest-partition boot conf start 401 drain_dataflow stop_trigger_sources conf",
    "integtest-partition boot conf start 402 drain_dataflow stop_trigger_sources start_run",
    "integtest-partition boot conf start 403 drain_dataflow stop_trigger_sources start",
    "integtest-partition boot conf start 404 drain_dataflow stop_trigger_sources enable_triggers",
    "integtest-partition boot conf start 405 drain_dataflow stop_trigger_sources disable_triggers",
    "integtest-partition boot conf start 406 drain_dataflow stop_trigger_sources drain_dataflow",
    "integtest-partition boot conf start 407 drain_dataflow stop_trigger_sources stop_trigger_sources",
    "integtest-partition boot conf start 408 drain_dataflow stop_trigger_sources scrap",
    // Only start and scrap after stop.
    "integtest-partition boot conf start 500 drain_dataflow stop_trigger_sources stop boot",
    "integtest-partition boot conf start 501 drain_dataflow stop_trigger_sources stop conf",
    "integtest-partition boot conf start 502 drain_dataflow stop_trigger_sources stop enable_triggers",
    "integtest-partition boot conf start 503 drain_dataflow stop_trigger_sources stop disable_triggers",
    "integtest-partition boot conf start 504 drain_dataflow stop_trigger_sources stop drain_dataflow",
    "integtest-partition boot conf start 505 drain_dataflow stop_trigger_sources stop stop_trigger_sources",
    "integtest-partition boot conf start 506 drain_dataflow stop_trigger_sources stop scrap",
    "integtest-partition boot conf start 507 drain_dataflow stop_trigger_sources stop stop_run",
    // Only terminate after scrap.
    "integtest-partition boot conf start 600 drain_dataflow stop_trigger_sources stop scrap boot",
    "integtest-partition boot conf start 601 drain_dataflow stop_trigger_sources stop scrap start",
    "integtest-partition boot conf start 602 drain_dataflow stop_trigger_sources stop scrap enable_triggers",
    "integtest-partition boot conf start 603 drain_dataflow stop_trigger_sources stop scrap disable_triggers",
    "integtest-partition boot conf start 604 drain_dataflow stop_trigger_sources stop scrap drain_dataflow",
    "integtest-partition boot conf start 605 drain_dataflow stop_trigger_sources stop scrap stop_trigger_sources",
    "integtest-partition boot conf start 606 drain_dataflow stop_trigger_sources stop scrap stop",
    "integtest-partition boot conf start 607 drain_dataflow stop_trigger_sources stop scrap scrap",
    // A valid command after an invalid one still fails.
    "integtest-partition boot boot conf start 121 stop scrap",
    "integtest-partition boot stop conf start 122 stop scrap",
    "integtest-partition boot conf stop start 123 stop scrap",
    "integtest-partition boot conf start 124 conf stop scrap",
    "integtest-partition boot conf start 125 stop scrap",
    "integtest-partition boot conf start 125 stop scrap boot conf",
    "integtest-partition boot stop start 126 stop scrap boot conf",
];

#[tokio::test]
async fn every_out_of_order_sequence_fails() {
    for line in INVALID_SEQUENCES {
        let mut tokens: Vec<&str> = line.split_whitespace().collect();
        assert_eq!(tokens.remove(0), PARTITION);

        let (mut controller, _journal) = acking_controller();
        let report = run_tokens(&mut controller, &tokens).await;

        assert!(!report.success, "sequence must fail: {line}");
        assert_eq!(report.exit_code(), 1, "non-zero exit expected: {line}");

        let last = report.history.last().expect("history must not be empty");
        assert!(
            matches!(last.verdict, Verdict::Denied { .. }),
            "last entry must be a denial for: {line}; got {:?}",
            last.verdict
        );
        assert!(
            report.history[..report.history.len() - 1]
                .iter()
                .all(|e| e.is_applied()),
            "only the final command may fail: {line}"
        );
        assert!(
            !LegalityTable::legal(report.final_state, &last.command.kind),
            "denied command must be illegal in the final state: {line}"
        );
        assert_eq!(
            last.resulting_state, report.final_state,
            "a denial must not change state: {line}"
        );
    }
}

#[tokio::test]
async fn nothing_after_the_illegal_command_reaches_children() {
    let (mut controller, journal) = acking_controller();
    let tokens = ["boot", "conf", "stop", "start", "123", "stop", "scrap"];

    let report = run_tokens(&mut controller, &tokens).await;

    assert!(!report.success);
    assert_eq!(report.failed_step, Some(3));
    assert_eq!(report.commands_attempted, 3);
    assert_eq!(report.history.len(), 3);
    let delivered: Vec<String> = journal
        .commands_for("ru-00")
        .iter()
        .map(ToString::to_string)
        .collect();
    assert_eq!(delivered, vec!["boot", "conf"]);
}
