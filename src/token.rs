//! Cached bearer access token over an OAuth2 client-credentials endpoint
//! (spec §4.7). Refresh margin is 2 seconds before expiry; concurrent
//! callers single-flight onto one refresh by holding the lock across the
//! `await` — grounded in the teacher's use of `tokio::sync::Mutex` for
//! shared async state (`api::AppState::last_speedtest` in `api/mod.rs`).

use serde::Deserialize;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

use crate::error::ReconcileError;

const REFRESH_MARGIN: Duration = Duration::from_secs(2);

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: Instant,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

/// `TokenGenerator` (spec §4.7 / interfaces.go): `access()` returns a
/// currently-valid bearer token, refreshing inline when needed.
pub struct TokenSource {
    endpoint: String,
    client_id: String,
    client_secret: String,
    http: reqwest::Client,
    cached: Mutex<Option<CachedToken>>,
}

impl TokenSource {
    pub fn new(endpoint: impl Into<String>, client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            http: reqwest::Client::new(),
            cached: Mutex::new(None),
        }
    }

    /// Returns a currently-valid token. Holding the mutex across the
    /// refresh `await` means a second caller arriving while a refresh is
    /// in flight waits on the same lock instead of launching a parallel
    /// request (spec §4.7's single-flight requirement).
    pub async fn access(&self) -> Result<String, ReconcileError> {
        let mut guard = self.cached.lock().await;
        if let Some(cached) = guard.as_ref() {
            if Instant::now() + REFRESH_MARGIN < cached.expires_at {
                return Ok(cached.access_token.clone());
            }
        }
        let fresh = self.fetch_token().await?;
        let token = fresh.access_token.clone();
        *guard = Some(fresh);
        Ok(token)
    }

    async fn fetch_token(&self) -> Result<CachedToken, ReconcileError> {
        let resp = self
            .http
            .post(&self.endpoint)
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
            ])
            .send()
            .await
            .map_err(|e| ReconcileError::Authentication(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(ReconcileError::Authentication(format!("{status}: {body}")));
        }

        let parsed: TokenResponse = resp
            .json()
            .await
            .map_err(|e| ReconcileError::Authentication(e.to_string()))?;

        Ok(CachedToken {
            access_token: parsed.access_token,
            expires_at: Instant::now() + Duration::from_secs(parsed.expires_in),
        })
    }
}
