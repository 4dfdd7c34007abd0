//! Shared helpers for integration tests.

use std::sync::Arc;

use partition_runctl::child::simulated::{Journal, SimulatedLauncher};
use partition_runctl::config::{PartitionOptions, TimeoutConfig};
use partition_runctl::orchestrator::roster::build_roster;
use partition_runctl::orchestrator::{
    parse_steps, CommandSequencer, SequenceReport, SessionController,
};
use tokio_util::sync::CancellationToken;

/// Partition name used throughout the suite.
pub const PARTITION: &str = "integtest-partition";

/// The complete legal lifecycle.
pub const FULL_SEQUENCE: &[&str] = &[
    "boot",
    "conf",
    "start",
    "101",
    "enable_triggers",
    "disable_triggers",
    "drain_dataflow",
    "stop_trigger_sources",
    "stop",
    "scrap",
    "terminate",
];

/// One-second bounds so timeout scenarios stay fast.
pub fn fast_timeouts() -> TimeoutConfig {
    TimeoutConfig {
        default_seconds: 1,
        boot_seconds: 1,
        conf_seconds: 1,
        start_seconds: 1,
        drain_dataflow_seconds: 1,
        stop_seconds: 1,
        terminate_seconds: 1,
        deadline_grace_ms: 200,
    }
}

/// Controller over the default roster (`ru-00`, `df-00`, `trigger`, `hsi`).
pub fn controller_with(launcher: SimulatedLauncher) -> (SessionController, Journal) {
    let options = PartitionOptions::default();
    let roster = build_roster(&options, &[]).expect("default roster");
    let journal = launcher.journal();
    let controller =
        SessionController::new(PARTITION, roster, options, fast_timeouts(), Arc::new(launcher));
    (controller, journal)
}

/// Controller whose children acknowledge everything.
pub fn acking_controller() -> (SessionController, Journal) {
    controller_with(SimulatedLauncher::new())
}

/// Parse and run `tokens` against `controller`.
pub async fn run_tokens(controller: &mut SessionController, tokens: &[&str]) -> SequenceReport {
    let steps = parse_steps(tokens);
    CommandSequencer::new(controller, CancellationToken::new())
        .run(&steps)
        .await
}
