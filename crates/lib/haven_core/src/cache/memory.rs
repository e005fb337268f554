//! In-process cache driver backed by a concurrent map.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;

use super::{CacheError, CacheStore};

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Instant,
}

/// In-memory [`CacheStore`] with per-entry expiry.
///
/// Expired entries are evicted lazily on read; there is no background
/// sweeper. Suitable for single-process deployments and tests.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: DashMap<String, Entry>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Number of live (possibly expired) entries. Test hook.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl CacheStore for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        if let Some(entry) = self.entries.get(key) {
            if Instant::now() < entry.expires_at {
                return Ok(Some(entry.value.clone()));
            }
        }
        // Evict outside the read guard to avoid deadlocking the shard.
        self.entries
            .remove_if(key, |_, entry| Instant::now() >= entry.expires_at);
        Ok(None)
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError> {
        self.entries.insert(
            key.to_string(),
            Entry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, CacheError> {
        Ok(self.entries.remove(key).is_some())
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<u64, CacheError> {
        let before = self.entries.len();
        self.entries.retain(|key, _| !key.starts_with(prefix));
        Ok((before - self.entries.len()) as u64)
    }

    async fn clear(&self) -> Result<(), CacheError> {
        self.entries.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn get_returns_none_for_missing_key() {
        let cache = MemoryCache::new();
        assert!(cache.get("unknown").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn set_and_get_roundtrip() {
        let cache = MemoryCache::new();
        cache
            .set("k1", "val1".into(), Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(cache.get("k1").await.unwrap(), Some("val1".to_string()));
    }

    #[tokio::test]
    async fn expired_entry_returns_none_and_is_evicted() {
        let cache = MemoryCache::new();
        cache
            .set("k1", "val1".into(), Duration::ZERO)
            .await
            .unwrap();
        assert!(cache.get("k1").await.unwrap().is_none());
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn delete_removes_specific_entry() {
        let cache = MemoryCache::new();
        cache
            .set("k1", "v1".into(), Duration::from_secs(60))
            .await
            .unwrap();
        cache
            .set("k2", "v2".into(), Duration::from_secs(60))
            .await
            .unwrap();
        assert!(cache.delete("k1").await.unwrap());
        assert!(!cache.delete("k1").await.unwrap());
        assert!(cache.get("k1").await.unwrap().is_none());
        assert_eq!(cache.get("k2").await.unwrap(), Some("v2".to_string()));
    }

    #[tokio::test]
    async fn delete_prefix_sweeps_matching_keys() {
        let cache = MemoryCache::new();
        for key in ["users:list:a", "users:list:b", "users:find_by_id:c", "orders:list:d"] {
            cache
                .set(key, "x".into(), Duration::from_secs(60))
                .await
                .unwrap();
        }
        let removed = cache.delete_prefix("users:list:").await.unwrap();
        assert_eq!(removed, 2);
        assert!(cache.get("users:list:a").await.unwrap().is_none());
        assert!(cache.get("users:find_by_id:c").await.unwrap().is_some());
        assert!(cache.get("orders:list:d").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn clear_removes_all_entries() {
        let cache = MemoryCache::new();
        cache
            .set("k1", "v1".into(), Duration::from_secs(60))
            .await
            .unwrap();
        cache.clear().await.unwrap();
        assert!(cache.is_empty());
    }
}
