//! Device -> MQTT subscription pattern set (spec §4.4).
//!
//! Ported from `original_source/pkg/topicgenerator/{senergy,mqtt}/*.go` and
//! `topicgenerator/common/helper.go`. Per spec §9 Design Notes, the original
//! process-wide `init()` self-registration is replaced with explicit
//! construction: `GeneratorFactory::resolve` maps a config name straight to
//! a function pointer, no global mutable registry.

use std::collections::BTreeSet;

use crate::model::{Device, DeviceType, HandledProtocols};

/// Sentinel signalling "this device should have no subscription at all".
/// Not a `ReconcileError` — spec §7 calls it a logic sentinel; the sweep
/// silently skips the device on receiving it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoSubscriptionExpected;

pub type GeneratorResult = Result<Vec<String>, NoSubscriptionExpected>;

/// A pure function `(Device, DeviceType, HandledProtocols) -> topics`.
pub type TopicGenerator = fn(&Device, &DeviceType, &HandledProtocols) -> GeneratorResult;

/// `senergy` generator (spec §4.4).
///
/// Output order is: one `command/{local_id}/{service.local_id}` per handled
/// service, in device-type service order, then the two wildcard forms.
pub fn senergy(device: &Device, device_type: &DeviceType, handled: &HandledProtocols) -> GeneratorResult {
    let services: Vec<_> = device_type.handled_services(handled).collect();
    if services.is_empty() {
        return Err(NoSubscriptionExpected);
    }
    let mut topics = Vec::with_capacity(services.len() + 2);
    for service in services {
        topics.push(format!("command/{}/{}", device.local_id, service.local_id));
    }
    topics.push(format!("command/{}/+", device.local_id));
    topics.push(format!("command/{}/#", device.local_id));
    Ok(topics)
}

const MQTT_ACTUATOR_TEMPLATE_WILDCARD_ONE: &str = "+";
const MQTT_ACTUATOR_TEMPLATE_WILDCARD_MANY: &str = "#";

fn render_mqtt_topic(device_id: &str, local_service_id: &str) -> String {
    format!("{device_id}/cmnd/{local_service_id}")
}

/// `mqtt` generator (spec §4.4). Order of the resulting set is unspecified
/// by the spec; we use a `BTreeSet` for deterministic test output rather
/// than hash-order, which is a strictly stronger guarantee than required.
pub fn mqtt(device: &Device, device_type: &DeviceType, handled: &HandledProtocols) -> GeneratorResult {
    let services: Vec<_> = device_type.handled_services(handled).collect();
    if services.is_empty() {
        return Err(NoSubscriptionExpected);
    }
    let mut set = BTreeSet::new();
    set.insert(render_mqtt_topic(&device.id, MQTT_ACTUATOR_TEMPLATE_WILDCARD_ONE));
    set.insert(render_mqtt_topic(&device.id, MQTT_ACTUATOR_TEMPLATE_WILDCARD_MANY));
    for service in services {
        set.insert(render_mqtt_topic(&device.id, &service.local_id));
    }
    Ok(set.into_iter().collect())
}

/// Resolves a config-file generator name to a generator function. Replaces
/// the original's process-wide registry (spec §9 Design Notes).
pub struct GeneratorFactory;

impl GeneratorFactory {
    pub fn resolve(name: &str) -> Result<TopicGenerator, crate::error::ReconcileError> {
        match name {
            "senergy" => Ok(senergy),
            "mqtt" => Ok(mqtt),
            other => Err(crate::error::ReconcileError::Config(format!(
                "unknown topic generator '{other}'"
            ))),
        }
    }
}
