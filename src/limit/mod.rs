//! Per-client admission control.
//!
//! The gateway asks a [`RateLimiter`] once per request, before any cache or
//! origin work is done. Callers without an identifiable address share the
//! [`UNKNOWN_CLIENT`] bucket.

use std::collections::hash_map::RandomState;
use std::hash::BuildHasher;
use std::num::NonZeroU32;

use async_trait::async_trait;
use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter as Governor};
use tracing::debug;

/// Key used when the caller's address cannot be determined.
pub const UNKNOWN_CLIENT: &str = "unknown-client";

/// Decides whether a client may proceed.
#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// Returns `true` if the request identified by `key` is admitted.
    async fn admit(&self, key: &str) -> bool;
}

/// Token-bucket limiter with one bucket per client key.
///
/// Buckets are created lazily and keyed by a randomly seeded hash of the
/// client key. Call [`retain_recent`](Self::retain_recent) periodically so
/// idle clients do not accumulate.
pub struct KeyedRateLimiter {
    limiter: DefaultKeyedRateLimiter<u64>,
    hasher: RandomState,
    per_second: NonZeroU32,
    burst: NonZeroU32,
}

impl KeyedRateLimiter {
    /// Create a limiter replenishing `per_second` tokens per second, holding at
    /// most `burst` tokens per client.
    pub fn new(per_second: NonZeroU32, burst: NonZeroU32) -> Self {
        let quota = Quota::per_second(per_second).allow_burst(burst);
        Self {
            limiter: Governor::keyed(quota),
            hasher: RandomState::new(),
            per_second,
            burst,
        }
    }

    pub fn per_second(&self) -> u32 {
        self.per_second.get()
    }

    pub fn burst(&self) -> u32 {
        self.burst.get()
    }

    /// Drop buckets that have fully replenished.
    pub fn retain_recent(&self) {
        self.limiter.retain_recent();
        self.limiter.shrink_to_fit();
    }

    /// Number of tracked client buckets.
    pub fn len(&self) -> usize {
        self.limiter.len()
    }

    pub fn is_empty(&self) -> bool {
        self.limiter.is_empty()
    }
}

#[async_trait]
impl RateLimiter for KeyedRateLimiter {
    async fn admit(&self, key: &str) -> bool {
        match self.limiter.check_key(&self.hasher.hash_one(key)) {
            Ok(()) => true,
            Err(_) => {
                debug!(client = %key, "Rate limit bucket exhausted");
                false
            }
        }
    }
}

/// Limiter that admits every request.
#[derive(Debug, Default, Clone, Copy)]
pub struct Unlimited;

#[async_trait]
impl RateLimiter for Unlimited {
    async fn admit(&self, _key: &str) -> bool {
        true
    }
}
