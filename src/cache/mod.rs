use std::fmt::Display;
use std::sync::Arc;

use crate::error::AppResult;
use crate::models::{ContentKind, TrendingWindow};

mod macros;
mod memory;
mod redis_store;

pub use memory::MemoryStore;
pub use redis_store::{create_redis_client, CacheWriterHandle, RedisStore};

const DISCOVER_TTL: u64 = 3600; // 1 hour
const POPULAR_TTL: u64 = 3600; // 1 hour
const TRENDING_TTL: u64 = 1800; // 30 minutes
const OFFERS_TTL: u64 = 21600; // 6 hours
const RATING_TTL: u64 = 86400; // 1 day
const GENRES_TTL: u64 = 604800; // 1 week

/// Cache keys, one variant per response category
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    Discover {
        kind: ContentKind,
        provider: u32,
        sort: String,
        page: u32,
    },
    PopularByProvider {
        kind: ContentKind,
        provider: u32,
        page: u32,
    },
    Trending {
        kind: Option<ContentKind>,
        window: TrendingWindow,
    },
    ProviderOffers {
        kind: ContentKind,
        id: u64,
    },
    MaturityRating {
        kind: ContentKind,
        id: u64,
    },
    Genres {
        kind: ContentKind,
    },
}

impl CacheKey {
    /// Time-to-live in seconds for this key's category
    pub fn ttl(&self) -> u64 {
        match self {
            CacheKey::Discover { .. } => DISCOVER_TTL,
            CacheKey::PopularByProvider { .. } => POPULAR_TTL,
            CacheKey::Trending { .. } => TRENDING_TTL,
            CacheKey::ProviderOffers { .. } => OFFERS_TTL,
            CacheKey::MaturityRating { .. } => RATING_TTL,
            CacheKey::Genres { .. } => GENRES_TTL,
        }
    }
}

impl Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheKey::Discover {
                kind,
                provider,
                sort,
                page,
            } => write!(f, "discover:{}:{}:{}:{}", kind, provider, sort, page),
            CacheKey::PopularByProvider {
                kind,
                provider,
                page,
            } => write!(f, "popular:{}:{}:{}", kind, provider, page),
            CacheKey::Trending { kind, window } => match kind {
                Some(kind) => write!(f, "trending:{}:{}", kind, window.as_str()),
                None => write!(f, "trending:all:{}", window.as_str()),
            },
            CacheKey::ProviderOffers { kind, id } => write!(f, "offers:{}:{}", kind, id),
            CacheKey::MaturityRating { kind, id } => write!(f, "rating:{}:{}", kind, id),
            CacheKey::Genres { kind } => write!(f, "genres:{}", kind),
        }
    }
}

/// Backing storage for cached responses
#[async_trait::async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> AppResult<Option<String>>;

    /// Stores a value without waiting for the write to land
    fn set(&self, key: String, value: String, ttl: u64);

    /// Store name for logging
    fn name(&self) -> &'static str;
}

/// Response cache shared by the metadata clients
#[derive(Clone)]
pub struct Cache {
    store: Arc<dyn CacheStore>,
}

impl Cache {
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self { store }
    }

    /// Cache backed by an in-process map
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    /// Retrieves and deserializes a cached value
    ///
    /// Store failures and undecodable entries are logged and reported as a
    /// miss so a broken cache never fails the call it wraps.
    pub async fn get_from_cache<T: serde::de::DeserializeOwned>(
        &self,
        key: &CacheKey,
    ) -> AppResult<Option<T>> {
        let key_str = key.to_string();
        let cached = match self.store.get(&key_str).await {
            Ok(cached) => cached,
            Err(e) => {
                tracing::warn!(error = %e, key = %key_str, store = self.store.name(), "Cache read failed");
                return Ok(None);
            }
        };

        match cached {
            Some(json) => match serde_json::from_str(&json) {
                Ok(data) => {
                    tracing::debug!(key = %key_str, "Cache hit");
                    Ok(Some(data))
                }
                Err(e) => {
                    tracing::warn!(error = %e, key = %key_str, "Cache deserialization error");
                    Ok(None)
                }
            },
            None => {
                tracing::debug!(key = %key_str, "Cache miss");
                Ok(None)
            }
        }
    }

    /// Serializes and stores a value using the key's category TTL
    pub fn set_in_background<T: serde::Serialize>(&self, key: &CacheKey, value: &T) {
        let json = match serde_json::to_string(value) {
            Ok(j) => j,
            Err(e) => {
                tracing::error!(error = %e, "Cache serialization error");
                return;
            }
        };

        self.store.set(key.to_string(), json, key.ttl());
    }
}
