//! Hub-relevance filter (spec §4.6): decides whether a hub must be examined
//! by the sweep, given it only carries `device_local_ids`, not
//! device-type ids directly.
//!
//! Both strategies give identical answers (spec §4.6); we default to
//! `Local` (see DESIGN.md / SPEC_FULL.md §9 for the rationale) with
//! `Global` available for large hubs / small handled device-type sets.
//! Ported from `hubMatchesHandledProtocols` and
//! `HubContainsAnyGivenDeviceType` in
//! `original_source/pkg/connectioncheck.go` and
//! `original_source/pkg/devices/{localdevices,devicetypes}.go`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use crate::clients::Catalog;
use crate::model::{DeviceType, HandledProtocols, Hub};
use crate::stats::Statistics;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Local,
    Global,
}

pub struct HubRelevanceFilter {
    catalog: Arc<dyn Catalog>,
    handled_protocols: HandledProtocols,
    strategy: Strategy,
}

impl HubRelevanceFilter {
    pub fn new(catalog: Arc<dyn Catalog>, handled_protocols: HandledProtocols, strategy: Strategy) -> Self {
        Self {
            catalog,
            handled_protocols,
            strategy,
        }
    }

    /// Is `hub` in scope for this sweep? Its own errors are logged and
    /// swallowed — a failed relevance query is treated as "not in scope" to
    /// avoid spurious disconnects (spec §7): a stale cache is safer than a
    /// false transition.
    pub async fn is_in_scope(&self, token: &str, hub: &Hub, stats: &mut Statistics) -> bool {
        let result = match self.strategy {
            Strategy::Local => self.is_in_scope_local(token, hub, stats).await,
            Strategy::Global => self.is_in_scope_global(token, hub).await,
        };
        match result {
            Ok(in_scope) => in_scope,
            Err(e) => {
                tracing::warn!(hub = %hub.id, error = %e, "hub-relevance query failed, treating hub as out of scope");
                false
            }
        }
    }

    async fn is_in_scope_local(&self, token: &str, hub: &Hub, stats: &mut Statistics) -> Result<bool, crate::error::ReconcileError> {
        let mut dt_cache: HashMap<String, DeviceType> = HashMap::new();
        for local_id in &hub.device_local_ids {
            let t0 = Instant::now();
            let fetched = self.catalog.get_device_by_local_id(token, local_id).await;
            stats.add_time_local_device_fetch(t0.elapsed());
            let device = match fetched {
                Ok(d) => d,
                Err(e) => {
                    tracing::debug!(local_id = %local_id, error = %e, "unable to load device by local id");
                    continue;
                }
            };
            let dt = if let Some(dt) = dt_cache.get(&device.device_type_id) {
                dt.clone()
            } else {
                match self.catalog.get_device_type(token, &device.device_type_id).await {
                    Ok(dt) => {
                        dt_cache.insert(dt.id.clone(), dt.clone());
                        dt
                    }
                    Err(e) => {
                        tracing::debug!(device_type = %device.device_type_id, error = %e, "unable to load device-type");
                        continue;
                    }
                }
            };
            if dt.uses_handled_protocol(&self.handled_protocols) {
                return Ok(true);
            }
        }
        Ok(false)
    }

    async fn is_in_scope_global(&self, token: &str, hub: &Hub) -> Result<bool, crate::error::ReconcileError> {
        let handled = self.handled_protocols.clone();
        let device_type_ids: Vec<String> = self
            .catalog
            .list_all_device_types_with_filter(token, "dt.list.filtered", &move |dt: &DeviceType| {
                dt.uses_handled_protocol(&handled)
            })
            .await?
            .into_iter()
            .map(|dt| dt.id)
            .collect();

        let cache_key = format!("hub.check.dts.{}", hub.id);
        self.catalog
            .hub_contains_any_given_device_type(token, &cache_key, hub, &device_type_ids)
            .await
    }
}
