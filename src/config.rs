//! Configuration loaded from a JSON file (spec §6).
//!
//! Loading itself is out of scope for the hard core (spec §1), but the
//! shape of the file is fully specified, so we implement it the way the
//! teacher loads its own config file in `config.rs`: read to a string, then
//! deserialize — JSON here instead of TOML per spec §6.

use serde::Deserialize;
use std::collections::HashSet;

use crate::error::ReconcileError;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub interval_seconds: u64,
    pub batch_size: u32,
    #[serde(default)]
    pub batch_sleep: Option<String>,
    pub topic_generator: String,
    #[serde(default)]
    pub handled_protocols: Vec<String>,
    #[serde(default)]
    pub debug: bool,
    pub assignment_id: String,
    #[serde(default = "default_scaling")]
    pub scaling: i64,
    pub health_port: u16,
    pub health_error_limit: u32,
    pub device_log_topic: String,
    pub hub_log_topic: String,
    #[serde(default)]
    pub zookeeper_url: String,
    pub connection_log_state_url: String,
    pub vernemq_management_url: String,
    pub device_manager_url: String,
    pub perm_search_url: String,
    pub auth_endpoint: String,
    pub auth_client_id: String,
    pub auth_client_secret: String,
}

fn default_scaling() -> i64 {
    1
}

impl Config {
    /// Load and parse the JSON config file at `path` (spec §6).
    pub fn from_file(path: &str) -> Result<Self, ReconcileError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ReconcileError::Config(format!("unable to read '{path}': {e}")))?;
        let config: Config = serde_json::from_str(&contents)
            .map_err(|e| ReconcileError::Config(format!("invalid config JSON in '{path}': {e}")))?;
        Ok(config)
    }

    /// Handled protocol ids, trimmed on load (spec §6).
    pub fn handled_protocols(&self) -> crate::model::HandledProtocols {
        self.handled_protocols
            .iter()
            .map(|p| p.trim().to_string())
            .collect::<HashSet<_>>()
            .into_iter()
            .collect()
    }

    /// The health checker's expected interval is `2x` the sweep interval
    /// (spec §6).
    pub fn expected_health_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.interval_seconds * 2)
    }

    pub fn sweep_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.interval_seconds)
    }

    /// `scaling < 1` is treated as `1` (spec §6); the sign is folded into
    /// `u32` here so downstream code never has to re-check.
    pub fn scaling_count(&self) -> u32 {
        if self.scaling < 1 {
            1
        } else {
            self.scaling as u32
        }
    }

    /// Parse an optional `batch_sleep` duration string. An unparseable
    /// value is recovered to "no sleep" with a warning (spec §7).
    pub fn batch_sleep_duration(&self) -> Option<std::time::Duration> {
        let raw = self.batch_sleep.as_ref()?;
        match parse_duration_string(raw) {
            Ok(d) => Some(d),
            Err(_) => {
                tracing::warn!(value = %raw, "unparseable batch_sleep, using no sleep");
                None
            }
        }
    }
}

/// Parse a Go-style duration string (`"500ms"`, `"2s"`, `"1m"`). Only the
/// units the original config actually uses are supported.
fn parse_duration_string(s: &str) -> Result<std::time::Duration, ReconcileError> {
    let s = s.trim();
    let (num_part, unit) = s
        .find(|c: char| !c.is_ascii_digit() && c != '.')
        .map(|idx| s.split_at(idx))
        .ok_or_else(|| ReconcileError::Config(format!("missing unit in duration '{s}'")))?;
    let value: f64 = num_part
        .parse()
        .map_err(|_| ReconcileError::Config(format!("invalid duration '{s}'")))?;
    let millis = match unit {
        "ms" => value,
        "s" => value * 1000.0,
        "m" => value * 60_000.0,
        "h" => value * 3_600_000.0,
        other => {
            return Err(ReconcileError::Config(format!(
                "unknown duration unit '{other}' in '{s}'"
            )))
        }
    };
    Ok(std::time::Duration::from_millis(millis.round() as u64))
}
