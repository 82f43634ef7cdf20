//! Small keyed cache for the device/device-type catalog client (spec §3,
//! §4.6: "advisory ... never a correctness ... optimization"). Grounded on
//! `dashmap`, the same concurrent-map crate the teacher's VyOS/network
//! tables reach for when state needs to be read and written from multiple
//! tasks without a global lock.

use dashmap::DashMap;
use serde::{de::DeserializeOwned, Serialize};
use std::time::{Duration, Instant};

struct Entry {
    value: Vec<u8>,
    expires_at: Instant,
}

/// A TTL-bounded `String -> JSON bytes` cache. Entries surviving their TTL
/// are a performance optimization only — a cache miss always falls through
/// to the caller-supplied loader.
pub struct TtlCache {
    ttl: Duration,
    entries: DashMap<String, Entry>,
}

impl TtlCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: DashMap::new(),
        }
    }

    fn get_raw(&self, key: &str) -> Option<Vec<u8>> {
        let entry = self.entries.get(key)?;
        if entry.expires_at <= Instant::now() {
            return None;
        }
        Some(entry.value.clone())
    }

    pub fn set<T: Serialize>(&self, key: impl Into<String>, value: &T) {
        if let Ok(bytes) = serde_json::to_vec(value) {
            self.entries.insert(
                key.into(),
                Entry {
                    value: bytes,
                    expires_at: Instant::now() + self.ttl,
                },
            );
        }
    }

    /// Cache-through read: return the cached value if present and fresh,
    /// otherwise call `loader`, cache its result on success, and return it.
    pub async fn use_or_load<T, F, Fut, E>(&self, key: &str, loader: F) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<T, E>>,
    {
        if let Some(bytes) = self.get_raw(key) {
            if let Ok(value) = serde_json::from_slice::<T>(&bytes) {
                return Ok(value);
            }
        }
        let value = loader().await?;
        self.set(key, &value);
        Ok(value)
    }
}
