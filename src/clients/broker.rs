//! Broker management API client (spec §4.3).
//!
//! Wraps VerneMQ's session-show endpoint the way the teacher's
//! `vyos::client::VyosClient` wraps the VyOS HTTP API: a thin `reqwest`
//! wrapper with a fixed per-request timeout, one URL-builder method per
//! operation. Ported from `original_source/pkg/vernemq/vernemq.go`.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

use super::BrokerProbe;
use crate::error::ReconcileError;

#[derive(Debug, Deserialize)]
struct SubscriptionWrapper {
    table: Vec<serde_json::Value>,
}

/// A client for the VerneMQ management HTTP API.
pub struct BrokerProbeClient {
    base_url: String,
    http: reqwest::Client,
}

impl BrokerProbeClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .expect("failed to build reqwest client for broker probe");
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
        }
    }

    async fn session_show_nonempty(&self, query: &[(&str, String)]) -> Result<bool, ReconcileError> {
        let url = format!("{}/api/v1/session/show", self.base_url);
        let resp = self
            .http
            .get(&url)
            .query(&[("--is_online", "true".to_string())])
            .query(query)
            .query(&[("--limit", "1".to_string())])
            .send()
            .await
            .map_err(|e| ReconcileError::Transport(e.to_string()))?;

        let status = resp.status();
        if status.as_u16() >= 300 {
            let body = resp.text().await.unwrap_or_default();
            return Err(ReconcileError::Transport(format!("{status}: {body}")));
        }

        let parsed: SubscriptionWrapper = resp
            .json()
            .await
            .map_err(|e| ReconcileError::Encoding(e.to_string()))?;
        Ok(!parsed.table.is_empty())
    }
}

#[async_trait]
impl BrokerProbe for BrokerProbeClient {
    /// Returns true iff an online session is subscribed to exactly this
    /// topic *string* — the broker performs wildcard matching server-side
    /// on publish, but this probe asks "does the client-side subscription
    /// string exist", by string equality (spec §4.3).
    async fn check_online_subscription(&self, topic: &str) -> Result<bool, ReconcileError> {
        self.session_show_nonempty(&[("--topic", topic.to_string())]).await
    }

    async fn check_online_client(&self, client_id: &str) -> Result<bool, ReconcileError> {
        self.session_show_nonempty(&[("--client_id", client_id.to_string())]).await
    }
}
