//! Cache-aside query wrapper.
//!
//! Keys are derived from `(model, operation, canonicalized arguments)` so
//! semantically identical queries collide. Point lookups use the
//! [`POINT_LOOKUP_OP`] operation name so a record-level write can re-derive
//! and drop the exact key.

use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use sha2::{Digest, Sha256};
use tracing::warn;
use uuid::Uuid;

use super::{CacheStore, DEFAULT_CACHE_TTL};

/// Operation name under which single-record reads are cached.
pub const POINT_LOOKUP_OP: &str = "find_by_id";

/// Prefixes of multi-record operations swept on a record-level write.
const SWEEP_OPS: [&str; 3] = ["list", "count", "aggregate"];

/// What a write touched, for invalidation granularity.
#[derive(Debug, Clone, Copy)]
pub enum WriteTarget {
    /// A single identified record: drop its point-lookup key and sweep
    /// list/count/aggregate keys for the model.
    Record(Uuid),
    /// A bulk write with no single key: sweep every key for the model.
    Model,
}

/// Transparent read-through cache + write invalidation for repositories.
///
/// Backend errors never propagate: reads fall back to the store and writes
/// skip invalidation of whatever the backend could not reach, trading a
/// narrow window of staleness for availability.
pub struct QueryCache {
    backend: Arc<dyn CacheStore>,
    ttl: Duration,
    bypass: HashSet<String>,
}

impl QueryCache {
    pub fn new(backend: Arc<dyn CacheStore>, ttl: Duration) -> Self {
        Self {
            backend,
            ttl,
            bypass: HashSet::new(),
        }
    }

    pub fn with_default_ttl(backend: Arc<dyn CacheStore>) -> Self {
        Self::new(backend, DEFAULT_CACHE_TTL)
    }

    /// Mark a model as non-cacheable: its reads and writes pass straight
    /// through to the store (e.g. session tokens, whose reads must be live).
    pub fn bypass_model(mut self, model: &str) -> Self {
        self.bypass.insert(model.to_string());
        self
    }

    /// Derive the cache key for `(model, op, args)`.
    ///
    /// `serde_json` object keys are sorted (BTreeMap-backed), so the
    /// serialization is stable across semantically identical argument maps.
    pub fn key(model: &str, op: &str, args: &serde_json::Value) -> String {
        let mut hasher = Sha256::new();
        hasher.update(args.to_string().as_bytes());
        format!("{model}:{op}:{:x}", hasher.finalize())
    }

    fn is_bypassed(&self, model: &str) -> bool {
        self.bypass.contains(model)
    }

    /// Read path: cache hit returns the deserialized value without touching
    /// the store; miss executes `fetch`, stores the result, and returns it.
    pub async fn read<T, E, F, Fut>(
        &self,
        model: &str,
        op: &str,
        args: serde_json::Value,
        fetch: F,
    ) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if self.is_bypassed(model) {
            return fetch().await;
        }

        let key = Self::key(model, op, &args);
        match self.backend.get(&key).await {
            Ok(Some(raw)) => match serde_json::from_str(&raw) {
                Ok(value) => return Ok(value),
                // Undeserializable entry: resolve in favor of correctness,
                // treat as a miss and overwrite below.
                Err(err) => warn!(%key, %err, "discarding unreadable cache entry"),
            },
            Ok(None) => {}
            Err(err) => warn!(%key, %err, "cache read failed, falling back to store"),
        }

        let value = fetch().await?;
        match serde_json::to_string(&value) {
            Ok(raw) => {
                if let Err(err) = self.backend.set(&key, raw, self.ttl).await {
                    warn!(%key, %err, "cache fill failed");
                }
            }
            Err(err) => warn!(%key, %err, "cache fill skipped, value not serializable"),
        }
        Ok(value)
    }

    /// Write path: execute against the store first (the cache is never warmed
    /// with pre-write data), then invalidate the affected entries.
    pub async fn write<T, E, F, Fut>(
        &self,
        model: &str,
        target: WriteTarget,
        exec: F,
    ) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let value = exec().await?;
        if !self.is_bypassed(model) {
            self.invalidate(model, target).await;
        }
        Ok(value)
    }

    /// Invalidate cache entries for a write. Idempotent; errors are logged
    /// and swallowed.
    pub async fn invalidate(&self, model: &str, target: WriteTarget) {
        match target {
            WriteTarget::Record(id) => {
                let point = Self::key(model, POINT_LOOKUP_OP, &serde_json::json!({ "id": id }));
                if let Err(err) = self.backend.delete(&point).await {
                    warn!(model, %err, "cache point invalidation failed");
                }
                for op in SWEEP_OPS {
                    if let Err(err) = self.backend.delete_prefix(&format!("{model}:{op}:")).await {
                        warn!(model, op, %err, "cache sweep failed");
                    }
                }
            }
            WriteTarget::Model => {
                if let Err(err) = self.backend.delete_prefix(&format!("{model}:")).await {
                    warn!(model, %err, "cache model sweep failed");
                }
            }
        }
    }
}
