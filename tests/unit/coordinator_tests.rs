//! Unit tests for `ChildCoordinator` fan-out and `ChildRegistry`.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use partition_runctl::child::simulated::{Behavior, Journal, SimulatedChild};
use partition_runctl::child::ChildHandle;
use partition_runctl::config::TimeoutConfig;
use partition_runctl::models::app::AppKind;
use partition_runctl::models::command::{Command, CommandKind};
use partition_runctl::models::outcome::ChildStatus;
use partition_runctl::orchestrator::coordinator::ChildCoordinator;
use partition_runctl::orchestrator::registry::ChildRegistry;
use partition_runctl::AppError;

fn one_second() -> TimeoutConfig {
    TimeoutConfig {
        default_seconds: 1,
        boot_seconds: 1,
        conf_seconds: 1,
        start_seconds: 1,
        drain_dataflow_seconds: 1,
        stop_seconds: 1,
        terminate_seconds: 1,
        deadline_grace_ms: 100,
    }
}

#[tokio::test]
async fn dispatch_reaches_every_child_and_sorts_outcomes() {
    let journal = Journal::default();
    let trigger = SimulatedChild::new("trigger", AppKind::Trigger, journal.clone());
    let ru = SimulatedChild::new("ru-00", AppKind::Readout, journal.clone());
    let children: Vec<&dyn ChildHandle> = vec![&trigger, &ru];

    let agg = ChildCoordinator::new(one_second())
        .dispatch(&Command::new(CommandKind::Stop), &children, &BTreeMap::new())
        .await;

    assert!(agg.succeeded());
    let names: Vec<&str> = agg.outcomes.iter().map(|o| o.child_name.as_str()).collect();
    assert_eq!(names, vec!["ru-00", "trigger"]);
    assert_eq!(journal.count(&CommandKind::Stop), 2);
}

#[tokio::test]
async fn children_are_contacted_concurrently() {
    let journal = Journal::default();
    let kids: Vec<SimulatedChild> = (0..4)
        .map(|i| {
            SimulatedChild::new(format!("ru-{i:02}"), AppKind::Readout, journal.clone())
                .with_behavior(CommandKind::Conf, Behavior::Delay(Duration::from_millis(300)))
        })
        .collect();
    let children: Vec<&dyn ChildHandle> = kids.iter().map(|k| k as &dyn ChildHandle).collect();

    let started = Instant::now();
    let agg = ChildCoordinator::new(one_second())
        .dispatch(&Command::new(CommandKind::Conf), &children, &BTreeMap::new())
        .await;

    assert!(agg.succeeded());
    assert!(
        started.elapsed() < Duration::from_millis(900),
        "four 300ms children must overlap, took {:?}",
        started.elapsed()
    );
}

#[tokio::test]
async fn stragglers_are_recorded_as_timed_out() {
    let journal = Journal::default();
    let slow = SimulatedChild::new("df-00", AppKind::Dataflow, journal.clone())
        .with_behavior(CommandKind::DrainDataflow, Behavior::Hang);
    let fast = SimulatedChild::new("ru-00", AppKind::Readout, journal);
    let children: Vec<&dyn ChildHandle> = vec![&slow, &fast];

    let agg = ChildCoordinator::new(one_second())
        .dispatch(&Command::new(CommandKind::DrainDataflow), &children, &BTreeMap::new())
        .await;

    assert!(!agg.succeeded());
    assert!(agg.partial_application());
    assert_eq!(agg.outcomes[0].status, ChildStatus::TimedOut);
    assert_eq!(agg.outcomes[1].status, ChildStatus::Acked);
}

#[tokio::test]
async fn payloads_are_delivered_by_name() {
    let journal = Journal::default();
    let ru = SimulatedChild::new("ru-00", AppKind::Readout, journal.clone());
    let hsi = SimulatedChild::new("hsi", AppKind::Hsi, journal.clone());
    let children: Vec<&dyn ChildHandle> = vec![&ru, &hsi];
    let mut payloads = BTreeMap::new();
    payloads.insert("ru-00".to_owned(), serde_json::json!({"links": 2}));

    ChildCoordinator::default()
        .dispatch(&Command::new(CommandKind::Conf), &children, &payloads)
        .await;

    let entries = journal.entries();
    let ru_payload = entries.iter().find(|e| e.child == "ru-00").unwrap();
    let hsi_payload = entries.iter().find(|e| e.child == "hsi").unwrap();
    assert_eq!(ru_payload.payload, Some(serde_json::json!({"links": 2})));
    assert_eq!(hsi_payload.payload, None);
}

#[tokio::test]
async fn registry_rejects_duplicates_and_shuts_down() {
    let journal = Journal::default();
    let mut registry = ChildRegistry::default();
    registry
        .register(Box::new(SimulatedChild::new("ru-00", AppKind::Readout, journal.clone())))
        .unwrap();
    registry
        .register(Box::new(SimulatedChild::new("df-00", AppKind::Dataflow, journal.clone())))
        .unwrap();

    let err = registry
        .register(Box::new(SimulatedChild::new("ru-00", AppKind::Readout, journal)))
        .unwrap_err();
    assert!(matches!(err, AppError::Child(_)));
    assert_eq!(registry.names(), vec!["df-00", "ru-00"]);
    assert_eq!(registry.get("ru-00").map(|c| c.kind()), Some(AppKind::Readout));

    registry.shutdown_all().await;
    assert!(registry.is_empty());
}
