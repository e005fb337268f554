//! External cache driver backed by a Redis service.
//!
//! Enabled with the `redis-cache` feature. Uses a [`ConnectionManager`],
//! which reconnects on its own; every error here is surfaced as a soft
//! [`CacheError`] for the query wrapper to absorb.

use std::time::Duration;

use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;

use super::{CacheError, CacheStore};

/// Redis-backed [`CacheStore`].
#[derive(Clone)]
pub struct RedisCache {
    manager: ConnectionManager,
}

impl RedisCache {
    /// Connect to the Redis service at `url` (e.g. `redis://localhost:6379`).
    pub async fn connect(url: &str) -> Result<Self, CacheError> {
        let client = redis::Client::open(url).map_err(backend)?;
        let manager = client.get_connection_manager().await.map_err(backend)?;
        Ok(Self { manager })
    }

    /// Collect every key matching `pattern` via SCAN (KEYS blocks the server).
    async fn scan_keys(&self, pattern: &str) -> Result<Vec<String>, CacheError> {
        let mut con = self.manager.clone();
        let mut keys = Vec::new();
        let mut iter: redis::AsyncIter<'_, String> =
            con.scan_match(pattern).await.map_err(backend)?;
        while let Some(key) = iter.next_item().await {
            keys.push(key);
        }
        Ok(keys)
    }

    async fn delete_keys(&self, keys: Vec<String>) -> Result<u64, CacheError> {
        if keys.is_empty() {
            return Ok(0);
        }
        let mut con = self.manager.clone();
        let removed: u64 = con.del(keys).await.map_err(backend)?;
        Ok(removed)
    }
}

fn backend(err: redis::RedisError) -> CacheError {
    CacheError::Backend(err.to_string())
}

#[async_trait]
impl CacheStore for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut con = self.manager.clone();
        con.get(key).await.map_err(backend)
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError> {
        let mut con = self.manager.clone();
        con.set_ex(key, value, ttl.as_secs().max(1))
            .await
            .map_err(backend)
    }

    async fn delete(&self, key: &str) -> Result<bool, CacheError> {
        let mut con = self.manager.clone();
        let removed: u64 = con.del(key).await.map_err(backend)?;
        Ok(removed > 0)
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<u64, CacheError> {
        let keys = self.scan_keys(&format!("{prefix}*")).await?;
        self.delete_keys(keys).await
    }

    async fn clear(&self) -> Result<(), CacheError> {
        let keys = self.scan_keys("*").await?;
        self.delete_keys(keys).await?;
        Ok(())
    }
}
