//! Interval-freshness + consecutive-error health accounting (spec §4.8),
//! served over one `axum` GET route (spec §6) — the axum surface mirrors
//! the teacher's `axum::serve` bootstrap in `main.rs`, scaled down to a
//! single route.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use axum::{routing::get, Json, Router};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Serialize, Clone)]
pub struct HealthInfo {
    pub hub_err_count: u32,
    pub device_err_count: u32,
    pub last_interval_start_secs_ago: f64,
}

struct Inner {
    hub_err_count: u32,
    device_err_count: u32,
    last_interval_start: Instant,
}

/// Mutex-guarded counter set. All mutators are mutually exclusive;
/// `check()` takes a read-consistent snapshot under the same lock (spec
/// §4.8).
pub struct HealthChecker {
    expected_check_interval: Duration,
    error_limit: u32,
    inner: Mutex<Inner>,
}

impl HealthChecker {
    pub fn new(expected_check_interval: Duration, error_limit: u32) -> Self {
        Self {
            expected_check_interval,
            error_limit,
            inner: Mutex::new(Inner {
                hub_err_count: 0,
                device_err_count: 0,
                last_interval_start: Instant::now(),
            }),
        }
    }

    pub fn log_interval_start(&self) {
        let mut inner = self.inner.lock().expect("health mutex poisoned");
        inner.last_interval_start = Instant::now();
    }

    /// `LogErrorDevices` (spec §4.8): `None` resets the counter to 0, `Some`
    /// increments it.
    pub fn log_error_devices(&self, err: bool) {
        let mut inner = self.inner.lock().expect("health mutex poisoned");
        if err {
            inner.device_err_count += 1;
        } else {
            inner.device_err_count = 0;
        }
    }

    pub fn log_error_hubs(&self, err: bool) {
        let mut inner = self.inner.lock().expect("health mutex poisoned");
        if err {
            inner.hub_err_count += 1;
        } else {
            inner.hub_err_count = 0;
        }
    }

    /// `(ok, info)` per spec §4.8's exact three conditions.
    pub fn check(&self) -> (bool, HealthInfo) {
        let inner = self.inner.lock().expect("health mutex poisoned");
        let age = inner.last_interval_start.elapsed();
        let info = HealthInfo {
            hub_err_count: inner.hub_err_count,
            device_err_count: inner.device_err_count,
            last_interval_start_secs_ago: age.as_secs_f64(),
        };
        let ok = inner.hub_err_count <= self.error_limit
            && inner.device_err_count <= self.error_limit
            && (self.expected_check_interval.is_zero() || age <= self.expected_check_interval);
        (ok, info)
    }
}

/// `GET /` — 200 with the info JSON when healthy, 500 with the same JSON
/// otherwise (spec §6).
async fn handler(
    axum::extract::State(checker): axum::extract::State<std::sync::Arc<HealthChecker>>,
) -> axum::response::Response {
    use axum::response::IntoResponse;
    let (ok, info) = checker.check();
    if ok {
        Json(info).into_response()
    } else {
        (axum::http::StatusCode::INTERNAL_SERVER_ERROR, Json(info)).into_response()
    }
}

/// Starts the health HTTP server as a background task, shutting down on the
/// same cancellation token with a bounded grace window (spec §5).
pub fn start_endpoint(
    port: u16,
    checker: std::sync::Arc<HealthChecker>,
    cancel: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let app = Router::new().route("/", get(handler)).with_state(checker);
        let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
        let listener = match tokio::net::TcpListener::bind(addr).await {
            Ok(l) => l,
            Err(e) => {
                tracing::error!(%port, error = %e, "failed to bind health endpoint");
                return;
            }
        };
        tracing::info!(%port, "health endpoint listening");
        let shutdown = async move { cancel.cancelled().await };
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await
        {
            tracing::error!(error = %e, "health endpoint server error");
        }
    })
}
