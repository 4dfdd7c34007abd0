//! Session controller: the single entry point for run-control commands.
//!
//! For every command the controller checks legality against the current
//! state, fans the command out to the registered children, and advances
//! the session only when every child acknowledged. Every command, legal or
//! not, is appended to the session history.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use serde_json::Value;
use tracing::{info, info_span, warn, Instrument};

use crate::audit::HistoryLogger;
use crate::child::{BoxedChild, ChildHandle, ChildLauncher};
use crate::config::{GlobalConfig, PartitionOptions, TimeoutConfig};
use crate::models::app::AppSpec;
use crate::models::command::{Command, CommandKind};
use crate::models::outcome::{AggregateOutcome, ChildOutcome, ChildReply};
use crate::models::session::{HistoryEntry, Session, Verdict};
use crate::models::state::LifecycleState;
use crate::orchestrator::coordinator::ChildCoordinator;
use crate::orchestrator::registry::ChildRegistry;
use crate::orchestrator::roster::{self, ConfigDocument};
use crate::policy::LegalityTable;
use crate::{AppError, Result};

/// Owns one partition session and the children it controls.
pub struct SessionController {
    session: Session,
    roster: Vec<AppSpec>,
    options: PartitionOptions,
    config_doc: Option<ConfigDocument>,
    registry: ChildRegistry,
    launcher: Arc<dyn ChildLauncher>,
    coordinator: ChildCoordinator,
    history_logger: Option<Arc<dyn HistoryLogger>>,
}

impl SessionController {
    /// Construct a controller for `partition` with an explicit roster.
    #[must_use]
    pub fn new(
        partition: impl Into<String>,
        roster: Vec<AppSpec>,
        options: PartitionOptions,
        timeouts: TimeoutConfig,
        launcher: Arc<dyn ChildLauncher>,
    ) -> Self {
        let session = Session::new(partition);
        info!(
            session_id = session.id(),
            partition = session.partition(),
            apps = roster.len(),
            "session created"
        );
        Self {
            session,
            roster,
            options,
            config_doc: None,
            registry: ChildRegistry::default(),
            launcher,
            coordinator: ChildCoordinator::new(timeouts),
            history_logger: None,
        }
    }

    /// Construct a controller from the global configuration.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the roster cannot be built.
    pub fn from_config(
        config: &GlobalConfig,
        partition: impl Into<String>,
        launcher: Arc<dyn ChildLauncher>,
    ) -> Result<Self> {
        let roster = roster::build_roster(&config.options, &config.apps)?;
        Ok(Self::new(
            partition,
            roster,
            config.options.clone(),
            config.timeouts.clone(),
            launcher,
        ))
    }

    /// Use `doc` for the per-application `conf` payloads.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the document names an application
    /// outside the roster.
    pub fn with_config_document(mut self, doc: ConfigDocument) -> Result<Self> {
        doc.check_against(&self.roster)?;
        self.config_doc = Some(doc);
        Ok(self)
    }

    /// Persist every history entry through `logger`.
    #[must_use]
    pub fn with_history_logger(mut self, logger: Arc<dyn HistoryLogger>) -> Self {
        self.history_logger = Some(logger);
        self
    }

    /// The controlled session.
    #[must_use]
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> LifecycleState {
        self.session.state()
    }

    /// Command history, oldest first.
    #[must_use]
    pub fn history(&self) -> &[HistoryEntry] {
        self.session.history()
    }

    /// Applications registered at `boot`.
    #[must_use]
    pub fn roster(&self) -> &[AppSpec] {
        &self.roster
    }

    /// Names of the currently registered children.
    #[must_use]
    pub fn child_names(&self) -> Vec<&str> {
        self.registry.names()
    }

    /// Shut down any children still registered, e.g. after an aborted
    /// sequence. The session state is left as it is.
    pub async fn release_children(&mut self) {
        if !self.registry.is_empty() {
            info!(children = self.registry.len(), "releasing registered children");
            self.registry.shutdown_all().await;
        }
    }

    /// Execute one command against the session.
    ///
    /// Returns the new state when every child acknowledged.
    ///
    /// # Errors
    ///
    /// - `AppError::IllegalCommand` if the command is not allowed in the
    ///   current state, or its run number is missing or already used. No
    ///   child is contacted.
    /// - `AppError::CommandFailed` if any child denied, timed out or was
    ///   unreachable. The state is unchanged.
    pub async fn execute(&mut self, command: Command) -> Result<LifecycleState> {
        let span = info_span!(
            "command",
            partition = self.session.partition(),
            command = %command,
            state = %self.session.state(),
        );
        self.execute_inner(command).instrument(span).await
    }

    async fn execute_inner(&mut self, command: Command) -> Result<LifecycleState> {
        let state = self.session.state();
        let issued_at = Utc::now();

        let Some(next) = LegalityTable::next_state(state, &command.kind) else {
            let reason = LegalityTable::denial_reason(state, &command.kind);
            return Err(self.deny(command, issued_at, reason));
        };

        if command.kind.takes_run_number() {
            match command.run_number {
                None => {
                    let reason = format!("'{}' requires a run number", command.kind);
                    return Err(self.deny(command, issued_at, reason));
                }
                Some(run) if self.session.run_number_used(run) => {
                    let reason = format!("run number {run} was already used in this session");
                    return Err(self.deny(command, issued_at, reason));
                }
                Some(_) => {}
            }
        }

        let aggregate = if command.kind == CommandKind::Boot {
            self.boot(&command).await
        } else {
            let payloads = self.payloads_for(&command.kind);
            let handles = self.registry.handles();
            self.coordinator
                .dispatch(&command, &handles, &payloads)
                .await
        };

        if aggregate.succeeded() {
            if command.kind == CommandKind::Terminate {
                self.registry.shutdown_all().await;
            }
            self.record(HistoryEntry {
                seq: self.session.next_seq(),
                command,
                issued_at,
                resulting_state: next,
                verdict: Verdict::Applied,
                per_child_outcomes: aggregate.outcomes,
                partial_application: false,
            });
            info!(state = %next, "command applied");
            return Ok(next);
        }

        let summary = aggregate.failure_summary();
        let partial = aggregate.partial_application();
        warn!(failures = %summary, partial_application = partial, "command failed");
        let error = AppError::CommandFailed(format!(
            "'{command}' failed in state {state}: {summary}"
        ));
        self.record(HistoryEntry {
            seq: self.session.next_seq(),
            command,
            issued_at,
            resulting_state: state,
            verdict: Verdict::Failed { reason: summary },
            per_child_outcomes: aggregate.outcomes,
            partial_application: partial,
        });
        Err(error)
    }

    /// Launch every roster application, then deliver `boot` to the ones
    /// that came up. Children are registered only if the whole partition
    /// acknowledged; otherwise the launched ones are shut down again.
    async fn boot(&mut self, command: &Command) -> AggregateOutcome {
        let launches = join_all(self.roster.iter().map(|app| self.launcher.launch(app))).await;

        let mut launched: Vec<BoxedChild> = Vec::with_capacity(launches.len());
        let mut launch_failures = Vec::new();
        for (app, result) in self.roster.iter().zip(launches) {
            match result {
                Ok(child) => launched.push(child),
                Err(err) => {
                    warn!(child = %app.name, %err, "failed to launch child");
                    launch_failures.push(ChildOutcome::from_reply(
                        &app.name,
                        ChildReply::Unreachable(err.to_string()),
                    ));
                }
            }
        }

        let handles: Vec<&dyn ChildHandle> = launched.iter().map(AsRef::as_ref).collect();
        let mut aggregate = self
            .coordinator
            .dispatch(command, &handles, &BTreeMap::new())
            .await;
        aggregate.outcomes.extend(launch_failures);
        aggregate
            .outcomes
            .sort_by(|a, b| a.child_name.cmp(&b.child_name));

        if aggregate.succeeded() {
            for child in launched {
                let name = child.name().to_owned();
                if let Err(err) = self.registry.register(child) {
                    warn!(child = %name, %err, "child not registered");
                }
            }
            info!(children = self.registry.len(), "partition booted");
        } else {
            join_all(launched.iter().map(|child| child.shutdown())).await;
        }
        aggregate
    }

    fn payloads_for(&self, kind: &CommandKind) -> BTreeMap<String, Value> {
        if *kind != CommandKind::Conf {
            return BTreeMap::new();
        }
        self.roster
            .iter()
            .map(|app| {
                let payload = match &self.config_doc {
                    Some(doc) => doc.payload_for(app, &self.options),
                    None => roster::default_payload(app, &self.options),
                };
                (app.name.clone(), payload)
            })
            .collect()
    }

    fn deny(&mut self, command: Command, issued_at: DateTime<Utc>, reason: String) -> AppError {
        warn!(%reason, "command denied");
        let error = AppError::IllegalCommand(reason.clone());
        let state = self.session.state();
        self.record(HistoryEntry {
            seq: self.session.next_seq(),
            command,
            issued_at,
            resulting_state: state,
            verdict: Verdict::Denied { reason },
            per_child_outcomes: Vec::new(),
            partial_application: false,
        });
        error
    }

    fn record(&mut self, entry: HistoryEntry) {
        self.session.record(entry);
        let (Some(logger), Some(entry)) = (&self.history_logger, self.session.history().last())
        else {
            return;
        };
        if let Err(err) = logger.log_entry(self.session.id(), self.session.partition(), entry) {
            warn!(%err, "failed to persist history entry");
        }
    }
}
