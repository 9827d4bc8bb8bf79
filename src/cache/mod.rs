//! Derivative-aware caching.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │                Gateway                  │
//! └────────────────────┬────────────────────┘
//!                      │ CacheKey + CacheEntry
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │            DerivativeCache              │
//! │   (base64 payload ⇄ JSON document)      │
//! └────────────────────┬────────────────────┘
//!                      │ JSON + TTL
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │           KvStore (trait)               │
//! │        e.g. MemoryKvStore (LRU)         │
//! └─────────────────────────────────────────┘
//! ```
//!
//! # Components
//!
//! - [`build_cache_key`]: derives a stable [`CacheKey`] from an asset and its parameters
//! - [`CacheEntry`]: payload + content type + optional integrity tag
//! - [`DerivativeCache`]: typed get/put with TTL
//! - [`KvStore`]: the textual key-value substrate
//! - [`MemoryKvStore`]: in-process LRU substrate with per-entry expiry

mod derivative;
mod entry;
mod key;
mod kv;

pub use derivative::{DerivativeCache, DEFAULT_CACHE_TTL};
pub use entry::{decode_payload, encode_payload, CacheEntry};
pub use key::{build_cache_key, CacheKey, KEY_SEPARATOR};
pub use kv::{KvStore, MemoryKvStore, DEFAULT_KV_CAPACITY, DEFAULT_KV_MAX_ENTRIES};
