//! Core data types shared by every component of the reconciler.
//!
//! These are read-only snapshots fetched per batch (spec §3) — nothing here
//! is mutated after construction, so callers are free to clone cheaply.

use serde::{Deserialize, Serialize};

/// Prefix marking a function id as "controlling" (actuator) rather than
/// "measuring" (sensor). Mirrors `model.CONTROLLING_FUNCTION_PREFIX` in the
/// original Go implementation.
pub const CONTROLLING_FUNCTION_PREFIX: &str = "controlling_";

/// A single device as known by the permission-search / device catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    pub id: String,
    pub local_id: String,
    pub name: String,
    pub device_type_id: String,
}

/// An aggregating gateway hosting some devices by their local-id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hub {
    pub id: String,
    pub name: String,
    pub device_local_ids: Vec<String>,
}

/// One service offered by a device-type: a protocol binding plus the
/// function tags it exposes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    pub local_id: String,
    pub protocol_id: String,
    pub function_ids: Vec<String>,
}

impl Service {
    /// True if any function id carries the controlling-function prefix.
    pub fn uses_controlling_function(&self) -> bool {
        self.function_ids
            .iter()
            .any(|f| f.starts_with(CONTROLLING_FUNCTION_PREFIX))
    }
}

/// A device-type: the catalog entry describing what a device can do.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceType {
    pub id: String,
    pub name: String,
    pub services: Vec<Service>,
}

impl DeviceType {
    /// True iff at least one service's protocol is in `handled_protocols`.
    ///
    /// This is the single, consolidated helper spec.md §9 asks for — the
    /// original Go carried both `DeviceTypeUsesHandledProtocol` (used) and
    /// `deviceTypeMatchesHandledProtocols` (dead code, equivalent). We keep
    /// only this one.
    pub fn uses_handled_protocol(&self, handled_protocols: &HandledProtocols) -> bool {
        self.services
            .iter()
            .any(|s| handled_protocols.contains(&s.protocol_id))
    }

    /// Services whose protocol is handled *and* which expose a controlling
    /// function — the set a topic generator should subscribe on behalf of.
    pub fn handled_services<'a>(
        &'a self,
        handled_protocols: &'a HandledProtocols,
    ) -> impl Iterator<Item = &'a Service> + 'a {
        self.services
            .iter()
            .filter(move |s| handled_protocols.contains(&s.protocol_id) && s.uses_controlling_function())
    }
}

/// The set of protocol identifiers this process is responsible for.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandledProtocols(pub std::collections::HashSet<String>);

impl HandledProtocols {
    pub fn contains(&self, protocol_id: &str) -> bool {
        self.0.contains(protocol_id)
    }
}

impl FromIterator<String> for HandledProtocols {
    fn from_iter<T: IntoIterator<Item = String>>(iter: T) -> Self {
        HandledProtocols(iter.into_iter().collect())
    }
}

/// What kind of entity a transition event describes — selects the
/// destination topic and the `EventLog` method used to emit it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Device,
    Hub,
}

/// A connect/disconnect transition, as written to the event log.
///
/// Wire format per spec §6: `{"connected": bool, "id": string, "time":
/// RFC3339}`. `kind` is not part of the wire payload — it only selects the
/// destination topic and is dropped before serialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionEvent {
    pub id: String,
    pub connected: bool,
    pub time: chrono::DateTime<chrono::Utc>,
    #[serde(skip)]
    pub kind: EntityKind,
}

impl TransitionEvent {
    pub fn new(kind: EntityKind, id: impl Into<String>, connected: bool) -> Self {
        Self {
            id: id.into(),
            connected,
            time: chrono::Utc::now(),
            kind,
        }
    }
}

/// Wire payload actually produced to the event log topic — `kind` dropped.
#[derive(Debug, Clone, Serialize)]
pub struct TransitionEventPayload {
    pub id: String,
    pub connected: bool,
    pub time: chrono::DateTime<chrono::Utc>,
}

impl From<&TransitionEvent> for TransitionEventPayload {
    fn from(e: &TransitionEvent) -> Self {
        Self {
            id: e.id.clone(),
            connected: e.connected,
            time: e.time,
        }
    }
}

/// Mapping `id -> bool` returned by the connectivity-log-state store.
/// Missing keys decode as `false` (spec §3).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LogState(pub std::collections::HashMap<String, bool>);

impl LogState {
    pub fn is_online(&self, id: &str) -> bool {
        self.0.get(id).copied().unwrap_or(false)
    }
}

/// `(assignment_index, scaling)` pair — see spec §4.2.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Assignment {
    pub assignment_index: u32,
    pub scaling: u32,
}
