//! Fingerprint-keyed response cache
//!
//! Keys are opaque strings owned by the engine (tenant+scope prefix, sha256
//! fingerprint suffix); values are serialized JSON payloads. Staleness up
//! to the TTL window is an accepted trade-off for load reduction, not a
//! correctness bug: entries expire, they are never invalidated by writes to
//! the underlying log store.

use moka::future::Cache;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

use crate::search::executor::SearchResult;

/// A cached search payload. The same key may hold a precomputed
/// upstream-produced result or a locally computed one; the serde tag is the
/// explicit discriminant, decoded by exhaustive match rather than by
/// probing the payload shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CachedPayload {
    Upstream { result: SearchResult },
    Computed { result: SearchResult },
}

impl CachedPayload {
    pub fn into_result(self) -> SearchResult {
        match self {
            CachedPayload::Upstream { result } => result,
            CachedPayload::Computed { result } => result,
        }
    }
}

/// TTL-expiring cache of serialized responses
#[derive(Clone)]
pub struct ResponseCache {
    cache: Cache<String, String>,
}

impl ResponseCache {
    pub fn new(max_capacity: u64, ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_capacity)
            .time_to_live(ttl)
            .build();

        Self { cache }
    }

    /// Build the cache key for a search fingerprint
    pub fn search_key(tenant_id: &str, job_id: Uuid, fingerprint: &str) -> String {
        format!("search:{}:{}:{}", tenant_id, job_id, fingerprint)
    }

    /// Build the cache key for a trace bundle
    pub fn trace_key(tenant_id: &str, job_id: Uuid, trace_id: &str) -> String {
        format!("trace:{}:{}:{}", tenant_id, job_id, trace_id)
    }

    /// Read and deserialize a cached value. A corrupt payload is treated
    /// identically to a miss, never as an error.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.cache.get(key).await?;
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(err) => {
                tracing::debug!(key = key, error = %err, "corrupt cache payload, treating as miss");
                None
            }
        }
    }

    /// Serialize and store a value. Failures are logged and swallowed.
    pub async fn put<T: Serialize>(&self, key: String, value: &T) {
        match serde_json::to_string(value) {
            Ok(raw) => self.cache.insert(key, raw).await,
            Err(err) => {
                tracing::warn!(key = %key, error = %err, "failed to serialize cache payload");
            }
        }
    }

    /// Store a raw payload string, for collaborators that hand over
    /// pre-serialized upstream sections.
    pub async fn put_raw(&self, key: String, raw: String) {
        self.cache.insert(key, raw).await;
    }

    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }
}
