//! Two-tier cache: a fast in-process store in front of a durable store.
//!
//! Both tiers implement [`CacheStore`], so either can be swapped for a fake
//! in tests. Expiry is decided lazily at read time by comparing `writtenAt`
//! against the entry's TTL; no background sweep is required for correctness,
//! though `prune_expired` offers periodic compaction.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::StoreError;
use crate::models::CacheKey;

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

fn default_ttl_ms() -> u64 {
    crate::config::DEFAULT_POSTS_TTL_MS
}

/// One cached value with its write timestamp and time-to-live.
///
/// This is the persisted shape: `{payload, writtenAt, ttlMs}`. Entries
/// written before `ttlMs` existed decode with a default TTL.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredEntry {
    pub payload: serde_json::Value,
    pub written_at: DateTime<Utc>,
    #[serde(default = "default_ttl_ms")]
    pub ttl_ms: u64,
}

impl StoredEntry {
    pub fn new(payload: serde_json::Value, ttl: Duration) -> Self {
        Self {
            payload,
            written_at: Utc::now(),
            ttl_ms: ttl.as_millis() as u64,
        }
    }

    /// Lazy expiry check: `now - writtenAt >= ttl`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        let age = now.signed_duration_since(self.written_at);
        age.num_milliseconds() >= self.ttl_ms as i64
    }
}

/// A cache backing store. Implementations must complete each operation
/// atomically with respect to concurrent callers.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn load(&self, key: &CacheKey) -> Result<Option<StoredEntry>, StoreError>;
    async fn store(&self, key: &CacheKey, entry: &StoredEntry) -> Result<(), StoreError>;
    async fn remove(&self, key: &CacheKey) -> Result<(), StoreError>;
    /// Remove every entry; returns how many were dropped.
    async fn clear(&self) -> Result<u64, StoreError>;
    /// Remove entries expired as of `now`; returns how many were dropped.
    async fn prune_expired(&self, now: DateTime<Utc>) -> Result<u64, StoreError>;
}

/// Fast tier in front of a durable tier.
///
/// Reads promote valid durable entries into the fast tier. Writes go to both
/// tiers; a durable-write failure is logged and swallowed so the operation
/// that triggered it still succeeds.
pub struct TieredCache {
    fast: Arc<dyn CacheStore>,
    durable: Arc<dyn CacheStore>,
}

impl TieredCache {
    pub fn new(fast: Arc<dyn CacheStore>, durable: Arc<dyn CacheStore>) -> Self {
        Self { fast, durable }
    }

    /// Look up a payload. Expired entries are never returned.
    pub async fn get(&self, key: &CacheKey) -> Option<serde_json::Value> {
        let now = Utc::now();

        match self.fast.load(key).await {
            Ok(Some(entry)) if !entry.is_expired(now) => return Some(entry.payload),
            Ok(_) => {}
            Err(e) => warn!("fast cache tier read failed for {}: {}", key.storage_key(), e),
        }

        match self.durable.load(key).await {
            Ok(Some(entry)) if !entry.is_expired(now) => {
                // Promote into the fast tier. Racing promotions rewrite the
                // same entry, so interleaving cannot corrupt state.
                if let Err(e) = self.fast.store(key, &entry).await {
                    warn!("cache promotion failed for {}: {}", key.storage_key(), e);
                }
                debug!("cache hit from durable tier: {}", key.storage_key());
                Some(entry.payload)
            }
            Ok(_) => None,
            Err(e) => {
                warn!(
                    "durable cache tier read failed for {}: {}",
                    key.storage_key(),
                    e
                );
                None
            }
        }
    }

    /// Write a payload to both tiers.
    pub async fn put(&self, key: &CacheKey, payload: serde_json::Value, ttl: Duration) {
        let entry = StoredEntry::new(payload, ttl);

        if let Err(e) = self.fast.store(key, &entry).await {
            warn!("fast cache tier write failed for {}: {}", key.storage_key(), e);
        }
        // Durable failures (quota, permissions) must not fail the operation.
        if let Err(e) = self.durable.store(key, &entry).await {
            warn!(
                "durable cache tier write failed for {}: {}",
                key.storage_key(),
                e
            );
        }
    }

    pub async fn remove(&self, key: &CacheKey) {
        if let Err(e) = self.fast.remove(key).await {
            warn!("fast cache tier remove failed: {}", e);
        }
        if let Err(e) = self.durable.remove(key).await {
            warn!("durable cache tier remove failed: {}", e);
        }
    }

    /// Drop every entry in both tiers; returns how many the durable tier held.
    pub async fn clear(&self) -> u64 {
        if let Err(e) = self.fast.clear().await {
            warn!("fast cache tier clear failed: {}", e);
        }
        match self.durable.clear().await {
            Ok(count) => count,
            Err(e) => {
                warn!("durable cache tier clear failed: {}", e);
                0
            }
        }
    }

    /// Compact both tiers; returns how many expired entries were dropped.
    pub async fn prune_expired(&self) -> u64 {
        let now = Utc::now();
        let mut pruned = 0;
        match self.fast.prune_expired(now).await {
            Ok(count) => pruned += count,
            Err(e) => warn!("fast cache tier prune failed: {}", e),
        }
        match self.durable.prune_expired(now).await {
            Ok(count) => pruned += count,
            Err(e) => warn!("durable cache tier prune failed: {}", e),
        }
        pruned
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DataKind, Platform};
    use serde_json::json;

    /// Durable tier that always fails writes, for the silent-failure contract.
    struct FailingStore;

    #[async_trait]
    impl CacheStore for FailingStore {
        async fn load(&self, _key: &CacheKey) -> Result<Option<StoredEntry>, StoreError> {
            Ok(None)
        }
        async fn store(&self, _key: &CacheKey, _entry: &StoredEntry) -> Result<(), StoreError> {
            Err(StoreError::Io(std::io::Error::other("quota exceeded")))
        }
        async fn remove(&self, _key: &CacheKey) -> Result<(), StoreError> {
            Ok(())
        }
        async fn clear(&self) -> Result<u64, StoreError> {
            Ok(0)
        }
        async fn prune_expired(&self, _now: DateTime<Utc>) -> Result<u64, StoreError> {
            Ok(0)
        }
    }

    fn key() -> CacheKey {
        CacheKey::new(Platform::Instagram, "user", DataKind::Profile)
    }

    #[tokio::test]
    async fn test_put_then_get_returns_payload() {
        let cache = TieredCache::new(
            Arc::new(MemoryStore::new()),
            Arc::new(MemoryStore::new()),
        );
        cache
            .put(&key(), json!({"followers": 42}), Duration::from_secs(60))
            .await;
        let payload = cache.get(&key()).await.unwrap();
        assert_eq!(payload["followers"], 42);
    }

    #[tokio::test]
    async fn test_expired_entry_is_never_returned() {
        let cache = TieredCache::new(
            Arc::new(MemoryStore::new()),
            Arc::new(MemoryStore::new()),
        );
        cache
            .put(&key(), json!({"followers": 42}), Duration::from_millis(0))
            .await;
        assert!(cache.get(&key()).await.is_none());
    }

    #[tokio::test]
    async fn test_durable_hit_promotes_into_fast_tier() {
        let fast = Arc::new(MemoryStore::new());
        let durable = Arc::new(MemoryStore::new());
        let entry = StoredEntry::new(json!({"followers": 7}), Duration::from_secs(60));
        durable.store(&key(), &entry).await.unwrap();

        let cache = TieredCache::new(fast.clone(), durable);
        assert!(cache.get(&key()).await.is_some());

        let promoted = fast.load(&key()).await.unwrap().unwrap();
        assert_eq!(promoted.payload["followers"], 7);
    }

    #[tokio::test]
    async fn test_durable_write_failure_does_not_fail_the_operation() {
        let fast = Arc::new(MemoryStore::new());
        let cache = TieredCache::new(fast, Arc::new(FailingStore));
        cache
            .put(&key(), json!({"followers": 9}), Duration::from_secs(60))
            .await;
        // Fast tier still serves the value.
        assert_eq!(cache.get(&key()).await.unwrap()["followers"], 9);
    }

    #[tokio::test]
    async fn test_prune_drops_only_expired_entries() {
        let fast = Arc::new(MemoryStore::new());
        let durable = Arc::new(MemoryStore::new());
        let cache = TieredCache::new(fast, durable);

        let live = CacheKey::new(Platform::Instagram, "live", DataKind::Profile);
        let dead = CacheKey::new(Platform::Instagram, "dead", DataKind::Profile);
        cache.put(&live, json!(1), Duration::from_secs(300)).await;
        cache.put(&dead, json!(2), Duration::from_millis(0)).await;

        // Dead entry exists in both tiers.
        assert_eq!(cache.prune_expired().await, 2);
        assert!(cache.get(&live).await.is_some());
        assert!(cache.get(&dead).await.is_none());
    }

    #[test]
    fn test_stored_entry_decodes_without_ttl_field() {
        let entry: StoredEntry = serde_json::from_str(
            r#"{"payload": {"followers": 5}, "writtenAt": "2025-01-01T00:00:00Z"}"#,
        )
        .unwrap();
        assert_eq!(entry.ttl_ms, crate::config::DEFAULT_POSTS_TTL_MS);
    }
}
