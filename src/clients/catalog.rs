//! Device/hub catalog client (spec §4, §6): paginated listings, device-type
//! lookup, filtered device-type scan, hub-contains-device-type join,
//! local-device lookup, and the small keyed cache backing all of the
//! above. Ported from `original_source/pkg/devices/{devicetypes,
//! localdevices,permsearch}.go`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::Catalog;
use crate::cache::TtlCache;
use crate::error::ReconcileError;
use crate::model::{Device, DeviceType, Hub};

/// How long a cached catalog entry stays fresh. The cache is advisory
/// (spec §3) — any value here only trades extra queries for staleness, it
/// never affects correctness.
const CACHE_TTL: Duration = Duration::from_secs(60);

pub struct CatalogClient {
    device_manager_url: String,
    perm_search_url: String,
    http: reqwest::Client,
    cache: TtlCache,
}

impl CatalogClient {
    pub fn new(device_manager_url: impl Into<String>, perm_search_url: impl Into<String>) -> Self {
        Self {
            device_manager_url: device_manager_url.into().trim_end_matches('/').to_string(),
            perm_search_url: perm_search_url.into().trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
            cache: TtlCache::new(CACHE_TTL),
        }
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(&self, token: &str, url: &str) -> Result<T, ReconcileError> {
        let resp = self
            .http
            .get(url)
            .header("Authorization", token)
            .send()
            .await
            .map_err(|e| ReconcileError::Transport(e.to_string()))?;
        let status = resp.status();
        if status.as_u16() >= 300 {
            let body = resp.text().await.unwrap_or_default();
            return Err(ReconcileError::Transport(format!("{status}: {body}")));
        }
        resp.json::<T>().await.map_err(|e| ReconcileError::Encoding(e.to_string()))
    }

    async fn query<T: for<'de> Deserialize<'de>>(&self, token: &str, message: &QueryMessage) -> Result<T, ReconcileError> {
        let url = format!("{}/v3/query", self.perm_search_url);
        let resp = self
            .http
            .post(&url)
            .header("Authorization", token)
            .json(message)
            .send()
            .await
            .map_err(|e| ReconcileError::Transport(e.to_string()))?;
        let status = resp.status();
        if status.as_u16() >= 300 {
            let body = resp.text().await.unwrap_or_default();
            return Err(ReconcileError::Transport(format!("{status}: {body}")));
        }
        resp.json::<T>().await.map_err(|e| ReconcileError::Encoding(e.to_string()))
    }
}

#[async_trait]
impl Catalog for CatalogClient {
    async fn list_devices(&self, token: &str, limit: u32, offset: u32) -> Result<Vec<Device>, ReconcileError> {
        let url = format!(
            "{}/v3/resources/devices?limit={limit}&offset={offset}&sort=name&rights=r",
            self.perm_search_url
        );
        self.get_json(token, &url).await
    }

    async fn list_devices_after(&self, token: &str, limit: u32, after: &Device) -> Result<Vec<Device>, ReconcileError> {
        let url = format!(
            "{}/v3/resources/devices?limit={limit}&after.id={}&after.sort_field_value={}",
            self.perm_search_url,
            urlencoding::encode(&after.id),
            urlencoding::encode(&format!("\"{}\"", after.name)),
        );
        self.get_json(token, &url).await
    }

    async fn list_hubs(&self, token: &str, limit: u32, offset: u32) -> Result<Vec<Hub>, ReconcileError> {
        let url = format!(
            "{}/v3/resources/hubs?limit={limit}&offset={offset}&sort=name&rights=r",
            self.perm_search_url
        );
        self.get_json(token, &url).await
    }

    async fn get_device_type(&self, token: &str, id: &str) -> Result<DeviceType, ReconcileError> {
        let key = format!("device-type.{id}");
        let url = format!("{}/device-types/{}", self.device_manager_url, urlencoding::encode(id));
        self.cache
            .use_or_load(&key, || async { self.get_json::<DeviceType>(token, &url).await })
            .await
    }

    async fn get_device_by_local_id(&self, token: &str, local_id: &str) -> Result<Device, ReconcileError> {
        let key = format!("local-devices.{local_id}");
        let url = format!(
            "{}/local-devices/{}",
            self.device_manager_url,
            urlencoding::encode(local_id)
        );
        self.cache
            .use_or_load(&key, || async { self.get_json::<Device>(token, &url).await })
            .await
    }

    async fn list_all_device_types_with_filter(
        &self,
        token: &str,
        cache_key: &str,
        filter: &(dyn Fn(&DeviceType) -> bool + Send + Sync),
    ) -> Result<Vec<DeviceType>, ReconcileError> {
        self.cache
            .use_or_load(cache_key, || async {
                self.scan_all_device_types(token, filter).await
            })
            .await
    }

    async fn hub_contains_any_given_device_type(
        &self,
        token: &str,
        cache_key: &str,
        hub: &Hub,
        device_type_ids: &[String],
    ) -> Result<bool, ReconcileError> {
        if device_type_ids.is_empty() || hub.device_local_ids.is_empty() {
            return Ok(false);
        }
        let message = QueryMessage {
            resource: "devices".into(),
            find: Some(QueryFind {
                limit: 1,
                offset: 0,
                after: None,
                rights: "r".into(),
                sort_by: "name".into(),
                sort_desc: false,
                search: String::new(),
                filter: Some(Selection::and(vec![
                    Selection::condition("features.device_type_id", device_type_ids),
                    Selection::condition("features.local_id", &hub.device_local_ids),
                ])),
            }),
        };
        self.cache
            .use_or_load(cache_key, || async {
                let matches: Vec<Device> = self.query(token, &message).await?;
                Ok(!matches.is_empty())
            })
            .await
    }
}

impl CatalogClient {
    /// Paginated scan of `device-types`, sorted by name, keyset pagination
    /// `limit=1000` (spec §4.6 global strategy).
    async fn scan_all_device_types(
        &self,
        token: &str,
        filter: &(dyn Fn(&DeviceType) -> bool + Send + Sync),
    ) -> Result<Vec<DeviceType>, ReconcileError> {
        const LIMIT: u32 = 1000;
        let mut result = Vec::new();
        let mut after: Option<ListAfter> = None;
        loop {
            let message = QueryMessage {
                resource: "device-types".into(),
                find: Some(QueryFind {
                    limit: LIMIT,
                    offset: 0,
                    after: after.clone(),
                    rights: "r".into(),
                    sort_by: "name".into(),
                    sort_desc: false,
                    search: String::new(),
                    filter: None,
                }),
            };
            let page: Vec<DeviceType> = self.query(token, &message).await?;
            let page_len = page.len();
            for dt in &page {
                if filter(dt) {
                    result.push(dt.clone());
                }
            }
            if page_len < LIMIT as usize {
                return Ok(result);
            }
            let last = &page[page_len - 1];
            after = Some(ListAfter {
                sort_field_value: serde_json::Value::String(last.name.clone()),
                id: last.id.clone(),
            });
        }
    }
}

#[derive(Debug, Clone, Serialize)]
struct QueryMessage {
    resource: String,
    find: Option<QueryFind>,
}

#[derive(Debug, Clone, Serialize)]
struct QueryFind {
    limit: u32,
    offset: u32,
    after: Option<ListAfter>,
    rights: String,
    sort_by: String,
    sort_desc: bool,
    search: String,
    filter: Option<Selection>,
}

#[derive(Debug, Clone, Serialize)]
struct ListAfter {
    sort_field_value: serde_json::Value,
    id: String,
}

#[derive(Debug, Clone, Serialize)]
struct ConditionConfig {
    feature: String,
    operation: &'static str,
    value: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Default)]
struct Selection {
    #[serde(skip_serializing_if = "Option::is_none")]
    and: Option<Vec<Selection>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    condition: Option<ConditionConfig>,
}

impl Selection {
    fn and(parts: Vec<Selection>) -> Self {
        Selection {
            and: Some(parts),
            condition: None,
        }
    }

    fn condition(feature: &str, values: &[String]) -> Self {
        Selection {
            and: None,
            condition: Some(ConditionConfig {
                feature: feature.to_string(),
                operation: "any_value_in_feature",
                value: serde_json::json!(values),
            }),
        }
    }
}
