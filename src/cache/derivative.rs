//! Derivative cache: typed get/put of [`CacheEntry`] values over a [`KvStore`].

use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use super::entry::CacheEntry;
use super::key::CacheKey;
use super::kv::KvStore;
use crate::error::CacheError;

/// Default cache TTL: 24 hours.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(86_400);

/// Cache of original and transformed payloads, addressed by [`CacheKey`].
///
/// Reads never fail: an unreachable store or an undecodable entry is logged
/// and reported as a miss. Writes return their error so callers can decide
/// whether to care.
#[derive(Clone)]
pub struct DerivativeCache {
    store: Arc<dyn KvStore>,
    ttl: Duration,
}

impl DerivativeCache {
    /// Create a cache over `store` with the default 24 hour TTL.
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self::with_ttl(store, DEFAULT_CACHE_TTL)
    }

    /// Create a cache over `store` with a custom TTL.
    pub fn with_ttl(store: Arc<dyn KvStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    /// TTL applied by [`DerivativeCache::put`].
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Look up an entry.
    pub async fn get(&self, key: &CacheKey) -> Option<CacheEntry> {
        let value = match self.store.get(key.as_str()).await {
            Ok(Some(value)) => value,
            Ok(None) => return None,
            Err(e) => {
                warn!(cache_key = %key, error = %e, "Cache read failed, treating as miss");
                return None;
            }
        };

        match CacheEntry::from_json(value) {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!(cache_key = %key, error = %e, "Discarding undecodable cache entry");
                None
            }
        }
    }

    /// Store an entry with the configured TTL.
    pub async fn put(&self, key: &CacheKey, entry: &CacheEntry) -> Result<(), CacheError> {
        self.put_with_ttl(key, entry, self.ttl).await
    }

    /// Store an entry with an explicit TTL.
    pub async fn put_with_ttl(
        &self,
        key: &CacheKey,
        entry: &CacheEntry,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        let value = entry.to_json()?;
        self.store.put(key.as_str(), value, ttl).await
    }
}
