//! In-process scripted children.
//!
//! Used by `runctl --simulate` and by tests. Each child follows a script of
//! per-command [`Behavior`]s (acknowledge by default) and records every
//! command it receives in a shared [`Journal`].

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use serde_json::Value;

use crate::child::{BoxedChild, ChildHandle, ChildLauncher, ChildRequest};
use crate::models::app::{AppKind, AppSpec};
use crate::models::command::{Command, CommandKind};
use crate::models::outcome::ChildReply;
use crate::{AppError, Result};

/// Scripted reaction of a simulated child to one command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Behavior {
    /// Acknowledge immediately.
    Ack,
    /// Refuse with the given reason.
    Deny(String),
    /// Acknowledge after a delay (subject to the request timeout).
    Delay(Duration),
    /// Never answer.
    Hang,
    /// Behave as if the child process were gone.
    Unreachable,
}

/// One command delivery observed by a simulated child.
#[derive(Debug, Clone, PartialEq)]
pub struct JournalEntry {
    /// Receiving child.
    pub child: String,
    /// Command delivered.
    pub command: Command,
    /// Payload delivered with it.
    pub payload: Option<Value>,
}

/// Shared record of deliveries and shutdowns across all simulated children.
#[derive(Debug, Clone, Default)]
pub struct Journal {
    entries: Arc<Mutex<Vec<JournalEntry>>>,
    shutdowns: Arc<AtomicUsize>,
}

impl Journal {
    fn push(&self, entry: JournalEntry) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(entry);
    }

    /// Snapshot of every delivery so far, in arrival order.
    #[must_use]
    pub fn entries(&self) -> Vec<JournalEntry> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Commands delivered to `child`, in arrival order.
    #[must_use]
    pub fn commands_for(&self, child: &str) -> Vec<Command> {
        self.entries()
            .into_iter()
            .filter(|e| e.child == child)
            .map(|e| e.command)
            .collect()
    }

    /// Number of completed child shutdowns.
    #[must_use]
    pub fn shutdowns(&self) -> usize {
        self.shutdowns.load(Ordering::SeqCst)
    }

    /// Number of deliveries of `kind` across all children.
    #[must_use]
    pub fn count(&self, kind: &CommandKind) -> usize {
        self.entries()
            .iter()
            .filter(|e| &e.command.kind == kind)
            .count()
    }
}

/// Scripted in-process child.
pub struct SimulatedChild {
    name: String,
    kind: AppKind,
    script: HashMap<CommandKind, Behavior>,
    shutdown_delay: Duration,
    journal: Journal,
}

impl SimulatedChild {
    /// Construct a child that acknowledges everything.
    #[must_use]
    pub fn new(name: impl Into<String>, kind: AppKind, journal: Journal) -> Self {
        Self {
            name: name.into(),
            kind,
            script: HashMap::new(),
            shutdown_delay: Duration::ZERO,
            journal,
        }
    }

    /// Script the reaction to `command`.
    #[must_use]
    pub fn with_behavior(mut self, command: CommandKind, behavior: Behavior) -> Self {
        self.script.insert(command, behavior);
        self
    }

    async fn react(&self, request: ChildRequest) -> ChildReply {
        let behavior = self
            .script
            .get(&request.command.kind)
            .cloned()
            .unwrap_or(Behavior::Ack);

        if behavior == Behavior::Unreachable {
            return ChildReply::Unreachable(format!("{} is not running", self.name));
        }

        self.journal.push(JournalEntry {
            child: self.name.clone(),
            command: request.command.clone(),
            payload: request.payload,
        });

        let detail = format!("{} {}", self.name, request.command);
        let reaction = async move {
            match behavior {
                Behavior::Ack | Behavior::Unreachable => ChildReply::Acked(detail),
                Behavior::Deny(reason) => ChildReply::Denied(reason),
                Behavior::Delay(delay) => {
                    tokio::time::sleep(delay).await;
                    ChildReply::Acked(detail)
                }
                Behavior::Hang => std::future::pending().await,
            }
        };

        tokio::time::timeout(request.timeout, reaction)
            .await
            .unwrap_or(ChildReply::TimedOut)
    }
}

impl ChildHandle for SimulatedChild {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> AppKind {
        self.kind
    }

    fn send(&self, request: ChildRequest) -> Pin<Box<dyn Future<Output = ChildReply> + Send + '_>> {
        Box::pin(self.react(request))
    }

    fn shutdown(&self) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(async {
            tokio::time::sleep(self.shutdown_delay).await;
            self.journal.shutdowns.fetch_add(1, Ordering::SeqCst);
        })
    }
}

/// Launcher producing [`SimulatedChild`]ren with per-application scripts.
#[derive(Debug, Clone, Default)]
pub struct SimulatedLauncher {
    scripts: HashMap<String, HashMap<CommandKind, Behavior>>,
    launch_failures: HashSet<String>,
    shutdown_delay: Duration,
    journal: Journal,
}

impl SimulatedLauncher {
    /// Launcher whose children acknowledge everything.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Script `app`'s reaction to `command`.
    #[must_use]
    pub fn with_behavior(
        mut self,
        app: impl Into<String>,
        command: CommandKind,
        behavior: Behavior,
    ) -> Self {
        self.scripts
            .entry(app.into())
            .or_default()
            .insert(command, behavior);
        self
    }

    /// Make launching `app` fail.
    #[must_use]
    pub fn failing_launch(mut self, app: impl Into<String>) -> Self {
        self.launch_failures.insert(app.into());
        self
    }

    /// Make every child take `delay` to shut down.
    #[must_use]
    pub fn with_shutdown_delay(mut self, delay: Duration) -> Self {
        self.shutdown_delay = delay;
        self
    }

    /// Journal shared by every child this launcher creates.
    #[must_use]
    pub fn journal(&self) -> Journal {
        self.journal.clone()
    }
}

impl ChildLauncher for SimulatedLauncher {
    fn launch<'a>(
        &'a self,
        app: &'a AppSpec,
    ) -> Pin<Box<dyn Future<Output = Result<BoxedChild>> + Send + 'a>> {
        Box::pin(async move {
            if self.launch_failures.contains(&app.name) {
                return Err(AppError::Child(format!(
                    "failed to spawn '{}': simulated launch failure",
                    app.name
                )));
            }
            let mut child = SimulatedChild::new(app.name.clone(), app.kind, self.journal.clone());
            if let Some(script) = self.scripts.get(&app.name) {
                child.script.clone_from(script);
            }
            child.shutdown_delay = self.shutdown_delay;
            Ok(Box::new(child) as BoxedChild)
        })
    }
}
