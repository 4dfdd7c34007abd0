//! Partition roster and per-application configuration payloads.
//!
//! The roster is the list of applications registered at `boot`. It is
//! derived from the partition options: readout units share the data
//! producers round-robin, followed by dataflow, trigger, optional HSI,
//! optional DQM monitors, and any explicitly configured extra apps.

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::Path;

use serde_json::{json, Value};

use crate::config::PartitionOptions;
use crate::models::app::{AppKind, AppSpec};
use crate::{AppError, Result};

/// Build the ordered application roster.
///
/// # Errors
///
/// Returns `AppError::Config` if two applications share a name or an extra
/// app has an empty name.
pub fn build_roster(options: &PartitionOptions, extra: &[AppSpec]) -> Result<Vec<AppSpec>> {
    let mut apps = Vec::new();

    for ru in 0..options.readout_apps {
        let mut spec = AppSpec::new(format!("ru-{ru:02}"), AppKind::Readout);
        spec.data_producers = (0..options.number_of_data_producers)
            .filter(|link| link % options.readout_apps == ru)
            .collect();
        apps.push(spec);
    }
    for df in 0..options.dataflow_apps {
        apps.push(AppSpec::new(format!("df-{df:02}"), AppKind::Dataflow));
    }
    apps.push(AppSpec::new("trigger", AppKind::Trigger));
    if options.enable_hsi {
        apps.push(AppSpec::new("hsi", AppKind::Hsi));
    }
    if options.enable_dqm {
        for ru in 0..options.readout_apps {
            apps.push(AppSpec::new(format!("dqm-{ru:02}"), AppKind::Dqm));
        }
    }
    apps.extend(extra.iter().cloned());

    let mut seen = HashSet::new();
    for app in &apps {
        if app.name.trim().is_empty() {
            return Err(AppError::Config("application name must not be empty".into()));
        }
        if !seen.insert(app.name.as_str()) {
            return Err(AppError::Config(format!(
                "duplicate application name '{}'",
                app.name
            )));
        }
    }

    Ok(apps)
}

/// Minimal configuration payload derived from the partition options.
#[must_use]
pub fn default_payload(app: &AppSpec, options: &PartitionOptions) -> Value {
    match app.kind {
        AppKind::Readout => json!({
            "data_producers": app.data_producers,
            "data_rate_slowdown_factor": options.data_rate_slowdown_factor,
            "latency_buffer_size": options.latency_buffer_size,
            "enable_tpg": options.enable_tpg,
        }),
        AppKind::Dataflow => json!({
            "expected_sources": options.number_of_data_producers,
        }),
        AppKind::Trigger => json!({
            "trigger_rate_hz": options.trigger_rate_hz,
            "enable_tpg": options.enable_tpg,
        }),
        AppKind::Hsi => json!({
            "trigger_rate_hz": options.trigger_rate_hz,
        }),
        AppKind::Dqm => json!({
            "run_duration_seconds": options.run_duration_seconds,
        }),
    }
}

/// Externally generated configuration, keyed by application name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigDocument {
    entries: BTreeMap<String, Value>,
}

impl ConfigDocument {
    /// Load a JSON object keyed by application name.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the file cannot be read or is not a
    /// JSON object.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|err| {
            AppError::Config(format!(
                "failed to read configuration document {}: {err}",
                path.display()
            ))
        })?;
        Self::from_json_str(&raw)
    }

    /// Parse a JSON object keyed by application name.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the text is not a JSON object.
    pub fn from_json_str(raw: &str) -> Result<Self> {
        let entries: BTreeMap<String, Value> = serde_json::from_str(raw)
            .map_err(|err| AppError::Config(format!("invalid configuration document: {err}")))?;
        Ok(Self { entries })
    }

    /// Reject documents naming applications outside the roster.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` naming the first unknown application.
    pub fn check_against(&self, roster: &[AppSpec]) -> Result<()> {
        let known: HashSet<&str> = roster.iter().map(|a| a.name.as_str()).collect();
        match self.entries.keys().find(|name| !known.contains(name.as_str())) {
            Some(unknown) => Err(AppError::Config(format!(
                "configuration document names unknown application '{unknown}'"
            ))),
            None => Ok(()),
        }
    }

    /// Payload sent with `conf` to `app`.
    #[must_use]
    pub fn payload_for(&self, app: &AppSpec, options: &PartitionOptions) -> Value {
        self.entries
            .get(&app.name)
            .cloned()
            .unwrap_or_else(|| default_payload(app, options))
    }
}
