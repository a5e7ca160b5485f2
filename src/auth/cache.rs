//! Per-client token cache
//!
//! Entries are evicted lazily: an expired entry is removed by the read that
//! discovers it. There is no background sweep.

use super::types::{TokenCacheEntry, DEFAULT_TOKEN_TTL_SECS};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

/// Resource id → cached credential
#[derive(Debug)]
pub struct TokenCache {
    ttl_secs: i64,
    entries: RwLock<HashMap<String, TokenCacheEntry>>,
}

impl Default for TokenCache {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenCache {
    /// Cache with the default 290 second lifetime
    pub fn new() -> Self {
        Self::with_ttl(DEFAULT_TOKEN_TTL_SECS)
    }

    /// Cache with a custom lifetime in seconds
    pub fn with_ttl(ttl_secs: i64) -> Self {
        Self {
            ttl_secs,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Valid token for `key`, if any
    pub async fn get(&self, key: &str) -> Option<String> {
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                Some(entry) if !entry.is_expired() => return Some(entry.token.clone()),
                Some(_) => {}
                None => return None,
            }
        }

        // Expired: evict, unless another task refreshed it meanwhile
        let mut entries = self.entries.write().await;
        match entries.get(key) {
            Some(entry) if !entry.is_expired() => Some(entry.token.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    /// Store a token with the cache lifetime
    pub async fn set(&self, key: &str, token: impl Into<String>) {
        self.set_with_ttl(key, token, self.ttl_secs).await;
    }

    /// Store a token with an explicit lifetime
    pub async fn set_with_ttl(&self, key: &str, token: impl Into<String>, ttl_secs: i64) {
        let entry = TokenCacheEntry::expires_in(token.into(), ttl_secs);
        self.entries.write().await.insert(key.to_string(), entry);
    }

    /// Drop one entry
    pub async fn remove(&self, key: &str) {
        self.entries.write().await.remove(key);
    }

    /// Drop every entry
    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }

    /// Number of stored entries, expired ones included
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Whether nothing is stored
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

/// Per-key async locks used to collapse concurrent token fetches
#[derive(Debug, Default)]
pub struct KeyedLocks {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl KeyedLocks {
    /// Create an empty lock table
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the lock for `key`; held until the guard drops.
    ///
    /// Entries nobody holds or waits on are pruned on every call, so the
    /// table only keeps keys with a fetch in flight.
    pub async fn lock(&self, key: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            Arc::clone(locks.entry(key.to_string()).or_default())
        };
        lock.lock_owned().await
    }

    /// Number of keys currently tracked
    pub async fn len(&self) -> usize {
        self.locks.lock().await.len()
    }

    /// Whether no key is tracked
    pub async fn is_empty(&self) -> bool {
        self.locks.lock().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_get_missing() {
        let cache = TokenCache::new();
        assert_eq!(cache.get("bq1").await, None);
    }

    #[tokio::test]
    async fn test_set_and_get() {
        let cache = TokenCache::new();
        cache.set("bq1", "token-a").await;
        cache.set("bq2", "token-b").await;
        assert_eq!(cache.get("bq1").await.as_deref(), Some("token-a"));
        assert_eq!(cache.get("bq2").await.as_deref(), Some("token-b"));
    }

    #[tokio::test]
    async fn test_overwrite_on_refresh() {
        let cache = TokenCache::new();
        cache.set("bq1", "old").await;
        cache.set("bq1", "new").await;
        assert_eq!(cache.get("bq1").await.as_deref(), Some("new"));
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn test_expired_entry_evicted_on_read() {
        let cache = TokenCache::new();
        cache.set_with_ttl("bq1", "stale", -1).await;
        assert_eq!(cache.len().await, 1);
        assert_eq!(cache.get("bq1").await, None);
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_zero_ttl_never_served() {
        let cache = TokenCache::with_ttl(0);
        cache.set("bq1", "t").await;
        assert_eq!(cache.get("bq1").await, None);
    }

    #[tokio::test]
    async fn test_remove_and_clear() {
        let cache = TokenCache::new();
        cache.set("bq1", "a").await;
        cache.set("bq2", "b").await;
        cache.remove("bq1").await;
        assert_eq!(cache.get("bq1").await, None);
        assert_eq!(cache.get("bq2").await.as_deref(), Some("b"));
        cache.clear().await;
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_keyed_locks_serialize_same_key() {
        let locks = Arc::new(KeyedLocks::new());
        let guard = locks.lock("bq1").await;

        let other = Arc::clone(&locks);
        let waiter = tokio::spawn(async move {
            let _g = other.lock("bq1").await;
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        // A different key is independent
        let _unrelated = locks.lock("bq2").await;

        drop(guard);
        waiter.await.unwrap();
    }

    #[tokio::test]
    async fn test_keyed_locks_prune_released_keys() {
        let locks = KeyedLocks::new();
        for i in 0..50 {
            let _guard = locks.lock(&format!("bq{i}")).await;
        }
        assert_eq!(locks.len().await, 1);

        let held = locks.lock("held").await;
        let _next = locks.lock("next").await;
        assert_eq!(locks.len().await, 2);
        drop(held);
    }
}
