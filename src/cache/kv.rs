//! Key-value substrate for the derivative cache.
//!
//! [`KvStore`] is the seam to whatever textual store holds cached entries.
//! [`MemoryKvStore`] is the in-process implementation: an LRU with a byte
//! budget where every entry carries its own expiry deadline.

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use lru::LruCache;
use tokio::sync::Mutex;

use crate::error::CacheError;

/// Default byte budget: 256MB
pub const DEFAULT_KV_CAPACITY: usize = 256 * 1024 * 1024;

/// Default maximum number of entries (to bound LRU overhead)
pub const DEFAULT_KV_MAX_ENTRIES: usize = 10_000;

// =============================================================================
// KvStore Trait
// =============================================================================

/// A key-value store holding JSON documents with a time-to-live.
///
/// Expiry is the store's responsibility: once `ttl` has elapsed, `get` must
/// report the key as absent.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Fetch the document stored under `key`, if any.
    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>, CacheError>;

    /// Store `value` under `key`, replacing any previous document.
    async fn put(&self, key: &str, value: serde_json::Value, ttl: Duration)
        -> Result<(), CacheError>;
}

// =============================================================================
// Memory KV Store
// =============================================================================

struct StoredValue {
    /// Serialized JSON, kept as text so the byte budget reflects stored size
    json: Arc<str>,

    /// `None` when the TTL overflowed `Instant`
    expires_at: Option<Instant>,
}

impl StoredValue {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|deadline| now >= deadline)
    }
}

struct Inner {
    cache: LruCache<String, StoredValue>,
    current_size: usize,
}

impl Inner {
    fn remove(&mut self, key: &str) -> Option<StoredValue> {
        let value = self.cache.pop(key)?;
        self.current_size = self
            .current_size
            .saturating_sub(entry_size(key, &value.json));
        Some(value)
    }
}

fn entry_size(key: &str, json: &str) -> usize {
    key.len() + json.len()
}

/// In-process [`KvStore`] with LRU eviction, a byte budget and per-entry TTL.
///
/// # Thread Safety
///
/// The store is thread-safe and can be shared across async tasks via `Arc`.
///
/// # Example
///
/// ```
/// use image_gateway::cache::{KvStore, MemoryKvStore};
/// use std::time::Duration;
///
/// #[tokio::main]
/// async fn main() {
///     let store = MemoryKvStore::new();
///     let doc = serde_json::json!({ "hello": "world" });
///
///     store.put("greeting", doc.clone(), Duration::from_secs(60)).await.unwrap();
///     assert_eq!(store.get("greeting").await.unwrap(), Some(doc));
/// }
/// ```
pub struct MemoryKvStore {
    inner: Mutex<Inner>,

    /// Maximum total size in bytes (keys plus serialized documents)
    max_size: usize,
}

impl MemoryKvStore {
    /// Create a new store with the default capacity (256MB).
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_KV_CAPACITY)
    }

    /// Create a new store with the specified capacity in bytes.
    pub fn with_capacity(max_size: usize) -> Self {
        Self::with_capacity_and_entries(max_size, DEFAULT_KV_MAX_ENTRIES)
    }

    /// Create a new store with specified capacity and maximum entries.
    ///
    /// A `max_entries` of zero is treated as one.
    pub fn with_capacity_and_entries(max_size: usize, max_entries: usize) -> Self {
        let max_entries = NonZeroUsize::new(max_entries).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Mutex::new(Inner {
                cache: LruCache::new(max_entries),
                current_size: 0,
            }),
            max_size,
        }
    }

    /// Check if a live entry exists without updating LRU order.
    pub async fn contains(&self, key: &str) -> bool {
        let inner = self.inner.lock().await;
        inner
            .cache
            .peek(key)
            .is_some_and(|value| !value.is_expired(Instant::now()))
    }

    /// Remove an entry. Returns `true` if it existed.
    pub async fn remove(&self, key: &str) -> bool {
        self.inner.lock().await.remove(key).is_some()
    }

    /// Clear all entries.
    pub async fn clear(&self) {
        let mut inner = self.inner.lock().await;
        inner.cache.clear();
        inner.current_size = 0;
    }

    /// Drop every expired entry. Returns how many were removed.
    pub async fn purge_expired(&self) -> usize {
        let mut inner = self.inner.lock().await;
        let now = Instant::now();
        let expired: Vec<String> = inner
            .cache
            .iter()
            .filter(|(_, value)| value.is_expired(now))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            inner.remove(key);
        }
        expired.len()
    }

    /// Number of stored entries, including expired ones not yet purged.
    pub async fn len(&self) -> usize {
        self.inner.lock().await.cache.len()
    }

    /// Check if the store is empty.
    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.cache.is_empty()
    }

    /// Current total size in bytes.
    pub async fn size(&self) -> usize {
        self.inner.lock().await.current_size
    }

    /// Maximum capacity in bytes.
    pub fn capacity(&self) -> usize {
        self.max_size
    }
}

impl Default for MemoryKvStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KvStore for MemoryKvStore {
    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>, CacheError> {
        let json = {
            let mut inner = self.inner.lock().await;
            let expired = match inner.cache.get(key) {
                None => return Ok(None),
                Some(value) => value.is_expired(Instant::now()),
            };
            if expired {
                inner.remove(key);
                return Ok(None);
            }
            match inner.cache.peek(key) {
                Some(value) => Arc::clone(&value.json),
                None => return Ok(None),
            }
        };

        // Parse outside the lock
        Ok(Some(serde_json::from_str(&json)?))
    }

    async fn put(
        &self,
        key: &str,
        value: serde_json::Value,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        let json: Arc<str> = serde_json::to_string(&value)?.into();
        let size = entry_size(key, &json);
        if size > self.max_size {
            return Err(CacheError::Backend(format!(
                "entry of {} bytes exceeds cache capacity of {} bytes",
                size, self.max_size
            )));
        }

        let stored = StoredValue {
            json,
            expires_at: Instant::now().checked_add(ttl),
        };

        let mut inner = self.inner.lock().await;
        inner.remove(key);

        // LRU capacity eviction happens inside push when the entry cap is hit
        if let Some((evicted_key, evicted)) = inner.cache.push(key.to_string(), stored) {
            inner.current_size = inner
                .current_size
                .saturating_sub(entry_size(&evicted_key, &evicted.json));
        }
        inner.current_size += size;

        // Evict entries until we're under capacity
        while inner.current_size > self.max_size {
            match inner.cache.pop_lru() {
                Some((evicted_key, evicted)) => {
                    inner.current_size = inner
                        .current_size
                        .saturating_sub(entry_size(&evicted_key, &evicted.json));
                }
                None => break,
            }
        }

        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
