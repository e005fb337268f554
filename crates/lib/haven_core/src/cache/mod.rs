//! Cache-aside layer around the data-access path.
//!
//! Reads are served from a keyed cache when possible; writes always hit the
//! backing store first and then invalidate the affected entries. A cache
//! backend failure is never fatal: the wrapper degrades to direct store
//! execution and logs.

mod memory;
mod query;
#[cfg(feature = "redis-cache")]
mod redis;

pub use memory::MemoryCache;
pub use query::{POINT_LOOKUP_OP, QueryCache, WriteTarget};
#[cfg(feature = "redis-cache")]
pub use redis::RedisCache;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

/// Default TTL for cached query results: 5 minutes.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);

/// Cache backend errors. Callers treat these as soft failures.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache backend error: {0}")]
    Backend(String),

    #[error("cache serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// A keyed string cache with TTL and prefix invalidation.
///
/// Implemented by [`MemoryCache`] (in-process) and [`RedisCache`] (external
/// service, behind the `redis-cache` feature).
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Get a value if present and not expired.
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// Insert or replace a value with the given TTL.
    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError>;

    /// Delete a single key. Returns whether a key was removed.
    async fn delete(&self, key: &str) -> Result<bool, CacheError>;

    /// Delete every key starting with `prefix`. Returns the number removed.
    async fn delete_prefix(&self, prefix: &str) -> Result<u64, CacheError>;

    /// Drop all entries.
    async fn clear(&self) -> Result<(), CacheError>;
}
