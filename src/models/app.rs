//! Partition application descriptors.

use std::fmt::{Display, Formatter};

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Role of a child application in the partition.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppKind {
    /// Readout unit serving one or more data producers.
    Readout,
    /// Dataflow / event-builder application.
    Dataflow,
    /// Trigger candidate maker and decision logic.
    Trigger,
    /// Hardware signal interface.
    Hsi,
    /// Data quality monitor.
    Dqm,
}

impl AppKind {
    /// Lower-case name used on the command line and in the wire protocol.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Readout => "readout",
            Self::Dataflow => "dataflow",
            Self::Trigger => "trigger",
            Self::Hsi => "hsi",
            Self::Dqm => "dqm",
        }
    }
}

impl Display for AppKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One application to launch at `boot`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AppSpec {
    /// Unique application name within the partition.
    pub name: String,
    /// Application role.
    pub kind: AppKind,
    /// Data producer (link) indices served by a readout unit.
    #[serde(default)]
    pub data_producers: Vec<u32>,
}

impl AppSpec {
    /// Construct a spec with no data producers.
    #[must_use]
    pub fn new(name: impl Into<String>, kind: AppKind) -> Self {
        Self {
            name: name.into(),
            kind,
            data_producers: Vec::new(),
        }
    }
}
