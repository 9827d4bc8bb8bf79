//! The gateway request protocol.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                            Gateway                               │
//! │                                                                  │
//! │  1. Parse asset id ──────────────────────────── absent ──▶ 400   │
//! │  2. Admission (RateLimiter) ─────────────────── denied ──▶ 429   │
//! │  3. Params + CacheKey                                            │
//! │  4. DerivativeCache.get ─────────────────────── hit ─────▶ HIT   │
//! │  5. OriginStore.get ─────────────────────────── absent ──▶ 404   │
//! │  6. Transformer (if params) ──┬─ ok ──── cache ──▶ MISS-TRANSFORMED
//! │                               └─ err ─────────▶ MISS-TRANSFORM-FAILED
//! │  7. no params ──────────────────────── cache ──▶ MISS            │
//! └──────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, error, warn};

use super::status::CacheStatus;
use crate::cache::{build_cache_key, CacheEntry, CacheKey, DerivativeCache};
use crate::error::GatewayError;
use crate::limit::{RateLimiter, UNKNOWN_CLIENT};
use crate::params::TransformParameters;
use crate::store::{OriginObject, OriginStore};
use crate::transform::{TransformInput, Transformer};

// =============================================================================
// Asset Request
// =============================================================================

/// One inbound asset request, independent of the transport.
#[derive(Debug, Clone, Default)]
pub struct AssetRequest {
    /// Asset identifier from the path, if one was given
    pub asset_id: Option<String>,

    /// Raw query string (without the leading `?`)
    pub query: String,

    /// Caller key for admission control (usually the client address)
    pub client: Option<String>,

    /// The caller's `Accept` header
    pub accept: Option<String>,
}

impl AssetRequest {
    /// Create a request for `asset_id` with no query.
    pub fn new(asset_id: impl Into<String>) -> Self {
        Self {
            asset_id: Some(asset_id.into()),
            ..Self::default()
        }
    }

    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = query.into();
        self
    }

    pub fn with_client(mut self, client: impl Into<String>) -> Self {
        self.client = Some(client.into());
        self
    }

    pub fn with_accept(mut self, accept: impl Into<String>) -> Self {
        self.accept = Some(accept.into());
        self
    }
}

// =============================================================================
// Asset Response
// =============================================================================

/// A successfully served asset.
#[derive(Debug, Clone)]
pub struct AssetResponse {
    pub body: Bytes,
    pub content_type: String,
    pub cache_status: CacheStatus,

    /// Integrity tag of the served bytes, when known
    pub integrity_tag: Option<String>,

    /// Key the payload is (or would be) cached under
    pub cache_key: CacheKey,
}

// =============================================================================
// Gateway
// =============================================================================

/// Serves assets through the cache, transformer and origin store.
///
/// All collaborators are injected; the gateway itself holds no per-request
/// state and is shared across requests behind an `Arc`.
pub struct Gateway {
    origin: Arc<dyn OriginStore>,
    cache: DerivativeCache,
    limiter: Arc<dyn RateLimiter>,
    transformer: Arc<dyn Transformer>,
}

impl Gateway {
    pub fn new(
        origin: Arc<dyn OriginStore>,
        cache: DerivativeCache,
        limiter: Arc<dyn RateLimiter>,
        transformer: Arc<dyn Transformer>,
    ) -> Self {
        Self {
            origin,
            cache,
            limiter,
            transformer,
        }
    }

    /// The cache this gateway reads and writes.
    pub fn cache(&self) -> &DerivativeCache {
        &self.cache
    }

    /// Handle one request.
    ///
    /// # Errors
    ///
    /// Only request-terminating outcomes are errors: a missing asset id,
    /// admission denial, an absent origin object, or an origin store failure.
    /// Transform and cache-write failures degrade the response instead.
    pub async fn handle(&self, request: AssetRequest) -> Result<AssetResponse, GatewayError> {
        let asset_id = match request.asset_id.as_deref() {
            Some(id) if !id.is_empty() => id,
            _ => return Err(GatewayError::MissingAssetId),
        };

        let client = request.client.as_deref().unwrap_or(UNKNOWN_CLIENT);
        if !self.limiter.admit(client).await {
            warn!(client = %client, asset_id = %asset_id, "Rate limit exceeded");
            return Err(GatewayError::RateLimited {
                client: client.to_string(),
            });
        }

        let params = TransformParameters::from_query(&request.query);
        let cache_key = build_cache_key(asset_id, &params);

        if let Some(entry) = self.cache.get(&cache_key).await {
            debug!(cache_key = %cache_key, "Cache hit");
            return Ok(AssetResponse {
                body: entry.payload,
                content_type: entry.content_type,
                cache_status: CacheStatus::Hit,
                integrity_tag: entry.integrity_tag,
                cache_key,
            });
        }

        debug!(
            cache_key = %cache_key,
            transform = !params.is_empty(),
            "Cache miss"
        );

        let origin = match self.origin.get(asset_id).await {
            Ok(Some(object)) => object,
            Ok(None) => {
                return Err(GatewayError::NotFound {
                    asset_id: asset_id.to_string(),
                })
            }
            Err(e) => {
                error!(asset_id = %asset_id, error = %e, "Origin store failure");
                return Err(GatewayError::Origin {
                    asset_id: asset_id.to_string(),
                    source: e,
                });
            }
        };

        if params.is_empty() {
            let entry = CacheEntry::new(
                origin.bytes.clone(),
                origin.content_type.clone(),
                origin.integrity_tag.clone(),
            );
            self.store(&cache_key, &entry).await;
            return Ok(original_response(origin, CacheStatus::Miss, cache_key));
        }

        let input = TransformInput {
            asset_id: asset_id.to_string(),
            bytes: origin.bytes.clone(),
            content_type: origin.content_type.clone(),
            accept: request.accept,
        };

        match self.transformer.transform(input, &params).await {
            Ok(output) => {
                let content_type = output
                    .content_type
                    .or_else(|| params.format.map(|f| f.content_type().to_string()))
                    .unwrap_or_else(|| origin.content_type.clone());

                let entry = CacheEntry::new(output.bytes.clone(), content_type.clone(), None);
                self.store(&cache_key, &entry).await;

                Ok(AssetResponse {
                    body: output.bytes,
                    content_type,
                    cache_status: CacheStatus::MissTransformed,
                    integrity_tag: None,
                    cache_key,
                })
            }
            Err(e) => {
                warn!(
                    asset_id = %asset_id,
                    cache_key = %cache_key,
                    error = %e,
                    "Transform failed, serving original"
                );
                Ok(original_response(
                    origin,
                    CacheStatus::MissTransformFailed,
                    cache_key,
                ))
            }
        }
    }

    /// Best-effort cache write. The response is already final.
    async fn store(&self, cache_key: &CacheKey, entry: &CacheEntry) {
        match self.cache.put(cache_key, entry).await {
            Ok(()) => debug!(
                cache_key = %cache_key,
                size = entry.payload.len(),
                "Cached payload"
            ),
            Err(e) => warn!(cache_key = %cache_key, error = %e, "Cache write failed"),
        }
    }
}

fn original_response(
    origin: OriginObject,
    cache_status: CacheStatus,
    cache_key: CacheKey,
) -> AssetResponse {
    AssetResponse {
        body: origin.bytes,
        content_type: origin.content_type,
        cache_status,
        integrity_tag: origin.integrity_tag,
        cache_key,
    }
}

// =============================================================================
// Tests
// =============================================================================
