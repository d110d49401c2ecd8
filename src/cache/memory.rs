use dashmap::DashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use super::CacheStore;
use crate::error::AppResult;

/// Writes between two sweeps of expired entries
const PURGE_EVERY: usize = 256;

/// In-process cache store
///
/// Used when no Redis URL is configured. Expired entries are dropped when
/// read, and every `PURGE_EVERY` writes a sweep removes the ones nobody
/// reads again.
#[derive(Default)]
pub struct MemoryStore {
    entries: DashMap<String, (String, Instant)>,
    writes: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops every expired entry and returns how many were removed
    pub fn purge_expired(&self) -> usize {
        let before = self.entries.len();
        let now = Instant::now();
        self.entries.retain(|_, (_, expires_at)| *expires_at > now);
        let removed = before.saturating_sub(self.entries.len());
        if removed > 0 {
            tracing::debug!(removed, remaining = self.entries.len(), "Expired cache entries purged");
        }
        removed
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.entries.len()
    }

    #[cfg(test)]
    fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait::async_trait]
impl CacheStore for MemoryStore {
    async fn get(&self, key: &str) -> AppResult<Option<String>> {
        let expired = match self.entries.get(key) {
            Some(entry) if Instant::now() < entry.1 => return Ok(Some(entry.0.clone())),
            Some(_) => true,
            None => false,
        };

        if expired {
            self.entries.remove(key);
            tracing::debug!(key = %key, "Expired cache entry evicted");
        }
        Ok(None)
    }

    fn set(&self, key: String, value: String, ttl: u64) {
        if (self.writes.fetch_add(1, Ordering::Relaxed) + 1) % PURGE_EVERY == 0 {
            self.purge_expired();
        }

        let expires_at = Instant::now() + Duration::from_secs(ttl);
        self.entries.insert(key, (value, expires_at));
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_then_get() {
        let store = MemoryStore::new();
        store.set("k".to_string(), "v".to_string(), 60);
        assert_eq!(store.get("k").await.unwrap(), Some("v".to_string()));
    }

    #[tokio::test]
    async fn test_miss() {
        let store = MemoryStore::new();
        assert_eq!(store.get("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_zero_ttl_expires_immediately() {
        let store = MemoryStore::new();
        store.set("k".to_string(), "v".to_string(), 0);
        assert_eq!(store.get("k").await.unwrap(), None);
        assert!(store.is_empty());
    }

    #[test]
    fn test_purge_removes_only_expired() {
        let store = MemoryStore::new();
        store.set("stale".to_string(), "v".to_string(), 0);
        store.set("fresh".to_string(), "v".to_string(), 60);

        assert_eq!(store.purge_expired(), 1);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_unread_entries_swept_by_writes() {
        let store = MemoryStore::new();
        for i in 0..PURGE_EVERY {
            store.set(format!("offers:movie:{}", i), "v".to_string(), 0);
        }

        // The last write triggered a sweep of everything written before it
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_overwrite() {
        let store = MemoryStore::new();
        store.set("k".to_string(), "old".to_string(), 60);
        store.set("k".to_string(), "new".to_string(), 60);
        assert_eq!(store.get("k").await.unwrap(), Some("new".to_string()));
        assert_eq!(store.len(), 1);
    }
}
