//! Connectivity-log-state client (spec §4.5). Ported from
//! `original_source/pkg/connectionlog/state/state.go`.

use async_trait::async_trait;

use super::ConnectivityState;
use crate::error::ReconcileError;
use crate::model::LogState;

pub struct ConnectivityStateClient {
    base_url: String,
    http: reqwest::Client,
}

impl ConnectivityStateClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
        }
    }

    async fn check(&self, token: &str, path: &str, ids: &[String]) -> Result<LogState, ReconcileError> {
        let url = format!("{}{path}", self.base_url);
        let resp = self
            .http
            .post(&url)
            .header("Authorization", token)
            .json(ids)
            .send()
            .await
            .map_err(|e| ReconcileError::Transport(e.to_string()))?;

        let status = resp.status();
        if status.as_u16() >= 300 {
            let body = resp.text().await.unwrap_or_default();
            return Err(ReconcileError::Transport(format!("{status}: {body}")));
        }

        let map: std::collections::HashMap<String, bool> = resp
            .json()
            .await
            .map_err(|e| ReconcileError::Encoding(e.to_string()))?;
        Ok(LogState(map))
    }
}

#[async_trait]
impl ConnectivityState for ConnectivityStateClient {
    async fn get_device_log_states(&self, token: &str, device_ids: &[String]) -> Result<LogState, ReconcileError> {
        self.check(token, "/intern/state/device/check", device_ids).await
    }

    async fn get_hub_log_states(&self, token: &str, hub_ids: &[String]) -> Result<LogState, ReconcileError> {
        self.check(token, "/intern/state/gateway/check", hub_ids).await
    }
}
