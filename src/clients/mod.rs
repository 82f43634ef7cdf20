//! External collaborator clients (spec §4.3, §4.5, §4.6) and the trait
//! seams the sweep engine is written against, mirroring
//! `original_source/pkg/interfaces.go`'s `Logger` / `LoggerState` / `Devices`
//! / `Verne` interfaces.

pub mod broker;
pub mod catalog;
pub mod eventlog;
pub mod state;

use async_trait::async_trait;

use crate::error::ReconcileError;
use crate::model::{Device, DeviceType, Hub};

/// Answers "is any session subscribed to topic T / connected as client C"
/// (spec §4.3).
#[async_trait]
pub trait BrokerProbe: Send + Sync {
    async fn check_online_subscription(&self, topic: &str) -> Result<bool, ReconcileError>;

    /// Short-circuit OR over `check_online_subscription`; first error
    /// aborts (spec §4.3).
    async fn check_online_subscriptions(&self, topics: &[String]) -> Result<bool, ReconcileError> {
        for topic in topics {
            if self.check_online_subscription(topic).await? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    async fn check_online_client(&self, client_id: &str) -> Result<bool, ReconcileError>;
}

/// Paginated device/hub catalog access plus the cached joins the
/// hub-relevance filter needs (spec §4.6).
#[async_trait]
pub trait Catalog: Send + Sync {
    async fn list_devices(&self, token: &str, limit: u32, offset: u32) -> Result<Vec<Device>, ReconcileError>;

    async fn list_devices_after(
        &self,
        token: &str,
        limit: u32,
        after: &Device,
    ) -> Result<Vec<Device>, ReconcileError>;

    async fn list_hubs(&self, token: &str, limit: u32, offset: u32) -> Result<Vec<Hub>, ReconcileError>;

    async fn get_device_type(&self, token: &str, id: &str) -> Result<DeviceType, ReconcileError>;

    async fn get_device_by_local_id(&self, token: &str, local_id: &str) -> Result<Device, ReconcileError>;

    /// Paginated scan of the whole device-type catalog, filtered by
    /// `filter`, cached under `cache_key` (spec §4.6 global strategy).
    async fn list_all_device_types_with_filter(
        &self,
        token: &str,
        cache_key: &str,
        filter: &(dyn Fn(&DeviceType) -> bool + Send + Sync),
    ) -> Result<Vec<DeviceType>, ReconcileError>;

    /// One search-service join: does `hub` host any local-id whose device's
    /// device-type id is in `device_type_ids` (spec §4.6 global strategy)?
    async fn hub_contains_any_given_device_type(
        &self,
        token: &str,
        cache_key: &str,
        hub: &Hub,
        device_type_ids: &[String],
    ) -> Result<bool, ReconcileError>;
}

/// Batch "is this id known-online?" queries (spec §4.5).
#[async_trait]
pub trait ConnectivityState: Send + Sync {
    async fn get_device_log_states(
        &self,
        token: &str,
        device_ids: &[String],
    ) -> Result<crate::model::LogState, ReconcileError>;

    async fn get_hub_log_states(&self, token: &str, hub_ids: &[String]) -> Result<crate::model::LogState, ReconcileError>;
}

/// Keyed append to the disconnect/connect topics (spec §4.5); four methods,
/// matching the original `Logger` interface.
#[async_trait]
pub trait EventLog: Send + Sync {
    async fn log_device_connect(&self, id: &str) -> Result<(), ReconcileError>;
    async fn log_device_disconnect(&self, id: &str) -> Result<(), ReconcileError>;
    async fn log_hub_connect(&self, id: &str) -> Result<(), ReconcileError>;
    async fn log_hub_disconnect(&self, id: &str) -> Result<(), ReconcileError>;
}

/// `TokenGenerator` (spec §4.7 / interfaces.go).
#[async_trait]
pub trait TokenGenerator: Send + Sync {
    async fn access(&self) -> Result<String, ReconcileError>;
}

#[async_trait]
impl TokenGenerator for crate::token::TokenSource {
    async fn access(&self) -> Result<String, ReconcileError> {
        crate::token::TokenSource::access(self).await
    }
}
