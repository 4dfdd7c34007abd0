//! Post-run scan of application log files for errors and warnings.
//!
//! Runs after a sequence completes and never touches session state. A line
//! is a problem when it carries an `ERROR`, `WARNING` or `FATAL` marker and
//! no ignore rule for the file's application matches it.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use regex::{Regex, RegexSet};
use serde::Serialize;
use tracing::{debug, warn};

use crate::{AppError, Result};

const MARKER_PATTERN: &str = r"\b(ERROR|WARNING|FATAL)\b";

/// File name patterns scanned below the log directory.
const LOG_GLOBS: &[&str] = &["**/*.txt", "**/*.log"];

/// Compiled ignore rules: application-name regex to message regexes.
#[derive(Debug, Clone)]
pub struct LogCheckRules {
    marker: Regex,
    ignored: Vec<(Regex, RegexSet)>,
}

impl LogCheckRules {
    /// Compile `ignored`, keyed by application-name regex.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` naming the first invalid pattern.
    pub fn compile(ignored: &BTreeMap<String, Vec<String>>) -> Result<Self> {
        let marker = Regex::new(MARKER_PATTERN)
            .map_err(|err| AppError::Config(format!("invalid log marker pattern: {err}")))?;

        let mut rules = Vec::with_capacity(ignored.len());
        for (app, patterns) in ignored {
            let app_re = Regex::new(app).map_err(|err| {
                AppError::Config(format!("invalid logcheck app pattern '{app}': {err}"))
            })?;
            let set = RegexSet::new(patterns).map_err(|err| {
                AppError::Config(format!("invalid logcheck pattern for '{app}': {err}"))
            })?;
            rules.push((app_re, set));
        }

        Ok(Self {
            marker,
            ignored: rules,
        })
    }

    /// Whether `line` from a file named `file_name` is a problem.
    #[must_use]
    pub fn is_problem(&self, file_name: &str, line: &str) -> bool {
        if !self.marker.is_match(line) {
            return false;
        }
        !self
            .ignored
            .iter()
            .any(|(app, set)| app.is_match(file_name) && set.is_match(line))
    }
}

/// One offending log line.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct LogProblem {
    /// File the line was found in.
    pub file: PathBuf,
    /// 1-based line number.
    pub line_number: usize,
    /// The line itself, trimmed.
    pub line: String,
}

/// Result of scanning a log directory.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct LogCheckReport {
    /// Number of files scanned.
    pub files_checked: usize,
    /// Problems found, ordered by file then line.
    pub problems: Vec<LogProblem>,
}

impl LogCheckReport {
    /// True when no problem was found.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.problems.is_empty()
    }

    /// Problem counts per file.
    #[must_use]
    pub fn counts_by_file(&self) -> BTreeMap<&Path, usize> {
        let mut counts = BTreeMap::new();
        for problem in &self.problems {
            *counts.entry(problem.file.as_path()).or_insert(0) += 1;
        }
        counts
    }
}

/// Scan every log file below `dir`.
///
/// # Errors
///
/// Returns `AppError::NotFound` if `dir` does not exist, or `AppError::Io`
/// if a log file cannot be read.
pub fn check_logs(dir: &Path, rules: &LogCheckRules) -> Result<LogCheckReport> {
    if !dir.is_dir() {
        return Err(AppError::NotFound(format!(
            "log directory {} does not exist",
            dir.display()
        )));
    }

    let mut files = Vec::new();
    for pattern in LOG_GLOBS {
        let full = dir.join(pattern);
        let full = full.to_string_lossy();
        let paths = glob::glob(&full)
            .map_err(|err| AppError::Config(format!("invalid log glob '{full}': {err}")))?;
        for entry in paths {
            match entry {
                Ok(path) if path.is_file() => files.push(path),
                Ok(_) => {}
                Err(err) => warn!(%err, "skipping unreadable log path"),
            }
        }
    }
    files.sort();
    files.dedup();

    let mut report = LogCheckReport::default();
    for file in files {
        let problems = check_file(&file, rules)?;
        debug!(file = %file.display(), problems = problems.len(), "log file checked");
        report.files_checked += 1;
        report.problems.extend(problems);
    }
    Ok(report)
}

/// Scan a single log file.
///
/// # Errors
///
/// Returns `AppError::Io` if the file cannot be read.
pub fn check_file(path: &Path, rules: &LogCheckRules) -> Result<Vec<LogProblem>> {
    let bytes = fs::read(path)?;
    let text = String::from_utf8_lossy(&bytes);
    Ok(scan_text(path, &text, rules))
}

/// Scan `text` as if it were the contents of `path`.
#[must_use]
pub fn scan_text(path: &Path, text: &str, rules: &LogCheckRules) -> Vec<LogProblem> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    text.lines()
        .enumerate()
        .filter(|(_, line)| rules.is_problem(&file_name, line))
        .map(|(idx, line)| LogProblem {
            file: path.to_path_buf(),
            line_number: idx + 1,
            line: line.trim().to_owned(),
        })
        .collect()
}
