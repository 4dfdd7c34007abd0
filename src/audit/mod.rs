//! Persistent command history.
//!
//! Provides the [`HistoryLogger`] trait. The primary implementation,
//! [`JsonlHistoryWriter`], appends one JSON record per history entry to
//! `<history_dir>/history-<session-id>.jsonl`.

pub mod writer;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::session::HistoryEntry;

/// One persisted history line: the entry plus the session it belongs to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HistoryRecord {
    /// When the record was written.
    pub logged_at: DateTime<Utc>,
    /// Owning session.
    pub session_id: String,
    /// Partition the session controls.
    pub partition: String,
    /// The history entry itself.
    #[serde(flatten)]
    pub entry: HistoryEntry,
}

impl HistoryRecord {
    /// Wrap `entry` for persistence.
    #[must_use]
    pub fn new(session_id: &str, partition: &str, entry: &HistoryEntry) -> Self {
        Self {
            logged_at: Utc::now(),
            session_id: session_id.to_owned(),
            partition: partition.to_owned(),
            entry: entry.clone(),
        }
    }
}

/// Writes history entries to a persistent store.
///
/// Implementations must be [`Send`] and [`Sync`] to allow sharing across
/// async task boundaries via [`std::sync::Arc`].
pub trait HistoryLogger: Send + Sync {
    /// Record a single history entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying write operation fails.
    fn log_entry(&self, session_id: &str, partition: &str, entry: &HistoryEntry)
        -> crate::Result<()>;
}

pub use writer::JsonlHistoryWriter;
