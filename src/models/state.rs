//! Partition lifecycle states.

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

/// Lifecycle state of a run-control session.
///
/// States are ordered from `None` (nothing booted) to `Terminated`. The
/// only branch points are the optional trigger gate while running and the
/// choice between a new run and `scrap` once configured or stopped.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    /// No applications booted yet.
    None,
    /// Applications launched and registered.
    Booted,
    /// Applications configured, no run in progress.
    Configured,
    /// Run started, trigger gate never opened in this run.
    Running,
    /// Trigger gate open.
    TriggersEnabled,
    /// Run still active after the trigger gate closed again.
    RunningPostTrigger,
    /// In-flight data flushed.
    Drained,
    /// Trigger sources stopped.
    SourcesStopped,
    /// Run stopped; partition still configured.
    Stopped,
    /// Configuration torn down.
    Scrapped,
    /// Applications terminated. No further commands are accepted.
    Terminated,
}

impl LifecycleState {
    /// Every state, in lifecycle order.
    pub const ALL: [Self; 11] = [
        Self::None,
        Self::Booted,
        Self::Configured,
        Self::Running,
        Self::TriggersEnabled,
        Self::RunningPostTrigger,
        Self::Drained,
        Self::SourcesStopped,
        Self::Stopped,
        Self::Scrapped,
        Self::Terminated,
    ];

    /// Upper-case operator-facing name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "NONE",
            Self::Booted => "BOOTED",
            Self::Configured => "CONFIGURED",
            Self::Running => "RUNNING",
            Self::TriggersEnabled => "TRIGGERS_ENABLED",
            Self::RunningPostTrigger => "RUNNING_POST_TRIGGER",
            Self::Drained => "DRAINED",
            Self::SourcesStopped => "SOURCES_STOPPED",
            Self::Stopped => "STOPPED",
            Self::Scrapped => "SCRAPPED",
            Self::Terminated => "TERMINATED",
        }
    }

    /// Whether a run is in progress (started and not yet stopped).
    #[must_use]
    pub fn in_run(self) -> bool {
        matches!(
            self,
            Self::Running
                | Self::TriggersEnabled
                | Self::RunningPostTrigger
                | Self::Drained
                | Self::SourcesStopped
        )
    }
}

impl Display for LifecycleState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
