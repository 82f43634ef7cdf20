//! The five error kinds of spec §7.
//!
//! `NoSubscriptionExpected` is deliberately *not* a variant here — spec §7
//! calls it a "logic sentinel", not an error, so it lives in its own small
//! enum in `topic_generator.rs` and is never propagated with `?` through
//! sweep code the way the four kinds below are.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReconcileError {
    /// Missing file, invalid JSON, unknown topic generator name,
    /// unparseable assignment id.
    #[error("configuration error: {0}")]
    Config(String),

    /// Token acquisition failure.
    #[error("authentication error: {0}")]
    Authentication(String),

    /// External HTTP call failed or returned status >= 300. The body is
    /// captured verbatim as the message (spec §7).
    #[error("transport error: {0}")]
    Transport(String),

    /// JSON encode/decode failure. Treated as transport-class for health
    /// accounting (spec §7).
    #[error("encoding error: {0}")]
    Encoding(String),
}

impl ReconcileError {
    /// Transport and Encoding errors both count against the same
    /// consecutive-error health budget (spec §7: "treated as
    /// transport-class for health").
    pub fn is_health_relevant(&self) -> bool {
        matches!(
            self,
            ReconcileError::Transport(_) | ReconcileError::Encoding(_) | ReconcileError::Authentication(_)
        )
    }
}

impl From<serde_json::Error> for ReconcileError {
    fn from(e: serde_json::Error) -> Self {
        ReconcileError::Encoding(e.to_string())
    }
}

impl From<reqwest::Error> for ReconcileError {
    fn from(e: reqwest::Error) -> Self {
        ReconcileError::Transport(e.to_string())
    }
}
