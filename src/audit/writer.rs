//! JSONL history writer, one file per session.

use std::{
    collections::HashMap,
    fs::{self, OpenOptions},
    io::{BufWriter, Write},
    path::{Path, PathBuf},
    sync::Mutex,
};

use tracing::warn;

use super::{HistoryLogger, HistoryRecord};
use crate::models::session::HistoryEntry;
use crate::{AppError, Result};

/// Appends one JSON object per line to `<dir>/history-<session-id>.jsonl`.
///
/// Files are opened lazily on the first entry of each session and kept
/// open for the writer's lifetime.
pub struct JsonlHistoryWriter {
    dir: PathBuf,
    files: Mutex<HashMap<String, BufWriter<fs::File>>>,
}

impl JsonlHistoryWriter {
    /// Construct a writer that stores history in `dir`.
    ///
    /// Creates `dir` and all parent directories if they do not exist.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Config`] if the directory cannot be created.
    pub fn new(dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&dir).map_err(|e| {
            AppError::Config(format!(
                "failed to create history directory {}: {e}",
                dir.display()
            ))
        })?;
        Ok(Self {
            dir,
            files: Mutex::new(HashMap::new()),
        })
    }

    /// Path of the history file for `session_id`.
    #[must_use]
    pub fn path_for(&self, session_id: &str) -> PathBuf {
        Self::file_path(&self.dir, session_id)
    }

    fn file_path(dir: &Path, session_id: &str) -> PathBuf {
        dir.join(format!("history-{session_id}.jsonl"))
    }

    fn open(dir: &Path, session_id: &str) -> Result<BufWriter<fs::File>> {
        let path = Self::file_path(dir, session_id);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| AppError::Io(format!("failed to open history {}: {e}", path.display())))?;
        Ok(BufWriter::new(file))
    }
}

impl HistoryLogger for JsonlHistoryWriter {
    fn log_entry(&self, session_id: &str, partition: &str, entry: &HistoryEntry) -> Result<()> {
        let record = HistoryRecord::new(session_id, partition, entry);
        let line = serde_json::to_string(&record)
            .map_err(|e| AppError::Io(format!("failed to serialize history entry: {e}")))?;

        let mut files = self
            .files
            .lock()
            .map_err(|_| AppError::Io("history writer mutex poisoned".to_owned()))?;

        if !files.contains_key(session_id) {
            let writer = Self::open(&self.dir, session_id)?;
            files.insert(session_id.to_owned(), writer);
        }

        if let Some(writer) = files.get_mut(session_id) {
            if let Err(e) = writeln!(writer, "{line}") {
                warn!("failed to write history entry: {e}");
                return Err(AppError::Io(format!("history write failed: {e}")));
            }
            if let Err(e) = writer.flush() {
                warn!("failed to flush history: {e}");
                return Err(AppError::Io(format!("history flush failed: {e}")));
            }
        }

        Ok(())
    }
}
