//! Debug-only sweep statistics (spec §3, §4.1). Never persisted; logged as
//! JSON at the end of each sweep when `debug` is enabled. Ported from
//! `original_source/pkg/statistics.go`.

use serde::Serialize;
use std::time::Duration;

#[derive(Debug, Default)]
pub struct Statistics {
    pub checked_devices: u64,
    pub checked_hubs: u64,
    pub connected_devices: u64,
    pub connected_hubs: u64,
    pub update_connected_devices: u64,
    pub update_disconnected_devices: u64,
    pub update_connected_hubs: u64,
    pub update_disconnected_hubs: u64,
    pub time_list: Duration,
    pub time_device_type_fetch: Duration,
    pub time_local_device_fetch: Duration,
    pub time_state_fetch: Duration,
    pub time_broker_probe: Duration,
}

impl Statistics {
    pub fn add_checked_devices(&mut self, n: u64) {
        self.checked_devices += n;
    }
    pub fn add_checked_hubs(&mut self, n: u64) {
        self.checked_hubs += n;
    }
    pub fn add_connected_devices(&mut self, n: u64) {
        self.connected_devices += n;
    }
    pub fn add_connected_hubs(&mut self, n: u64) {
        self.connected_hubs += n;
    }
    pub fn add_update_connected_devices(&mut self, n: u64) {
        self.update_connected_devices += n;
    }
    pub fn add_update_disconnected_devices(&mut self, n: u64) {
        self.update_disconnected_devices += n;
    }
    pub fn add_update_connected_hubs(&mut self, n: u64) {
        self.update_connected_hubs += n;
    }
    pub fn add_update_disconnected_hubs(&mut self, n: u64) {
        self.update_disconnected_hubs += n;
    }
    pub fn add_time_list(&mut self, d: Duration) {
        self.time_list += d;
    }
    pub fn add_time_device_type_fetch(&mut self, d: Duration) {
        self.time_device_type_fetch += d;
    }
    pub fn add_time_local_device_fetch(&mut self, d: Duration) {
        self.time_local_device_fetch += d;
    }
    pub fn add_time_state_fetch(&mut self, d: Duration) {
        self.time_state_fetch += d;
    }
    pub fn add_time_broker_probe(&mut self, d: Duration) {
        self.time_broker_probe += d;
    }

    /// JSON representation logged at finish (spec §4.1). Zero counters are
    /// still included; only the duration fields are rendered as empty
    /// strings when unset, matching the original's `omitempty` on counts
    /// but always-present string durations.
    pub fn as_json(&self) -> serde_json::Value {
        serde_json::to_value(PrintStatistics::from(self)).unwrap_or(serde_json::Value::Null)
    }
}

#[derive(Serialize)]
struct PrintStatistics {
    checked_devices: u64,
    checked_hubs: u64,
    connected_devices: u64,
    connected_hubs: u64,
    update_connected_devices: u64,
    update_disconnected_devices: u64,
    update_connected_hubs: u64,
    update_disconnected_hubs: u64,
    time_list: String,
    time_device_type_fetch: String,
    time_local_device_fetch: String,
    time_state_fetch: String,
    time_broker_probe: String,
}

fn fmt_duration(d: Duration) -> String {
    if d.is_zero() {
        String::new()
    } else {
        format!("{d:?}")
    }
}

impl From<&Statistics> for PrintStatistics {
    fn from(s: &Statistics) -> Self {
        Self {
            checked_devices: s.checked_devices,
            checked_hubs: s.checked_hubs,
            connected_devices: s.connected_devices,
            connected_hubs: s.connected_hubs,
            update_connected_devices: s.update_connected_devices,
            update_disconnected_devices: s.update_disconnected_devices,
            update_connected_hubs: s.update_connected_hubs,
            update_disconnected_hubs: s.update_disconnected_hubs,
            time_list: fmt_duration(s.time_list),
            time_device_type_fetch: fmt_duration(s.time_device_type_fetch),
            time_local_device_fetch: fmt_duration(s.time_local_device_fetch),
            time_state_fetch: fmt_duration(s.time_state_fetch),
            time_broker_probe: fmt_duration(s.time_broker_probe),
        }
    }
}
