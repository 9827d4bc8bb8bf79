//! # Image Gateway
//!
//! An image delivery gateway for assets stored in S3-compatible object storage.
//!
//! Requests name an asset and optionally a set of transformations (size,
//! format, quality, fit). The gateway admits the caller through a rate limiter,
//! serves from a derivative-aware cache when it can, and otherwise fetches the
//! original, transforms it and caches the result. A failed transform never
//! fails the request: the original bytes are served instead.
//!
//! ## Features
//!
//! - **Permissive parameters**: invalid query values are dropped, never rejected
//! - **Derivative cache**: one entry per asset and parameter set, 24 hour TTL
//! - **Pluggable transformers**: in-process (`image` crate) or a remote endpoint
//! - **Per-client rate limiting**: token buckets keyed by client address
//! - **Cache status on every response**: `X-Cache-Status: HIT|MISS|...`
//!
//! ## Architecture
//!
//! - [`params`] - Query parsing into [`TransformParameters`]
//! - [`cache`] - Cache keys, entry codec, key-value stores, [`DerivativeCache`]
//! - [`store`] - Origin store trait with S3 and in-memory implementations
//! - [`limit`] - Admission control
//! - [`transform`] - Transformer trait and strategies
//! - [`gateway`] - The request protocol tying it all together
//! - [`server`] - Axum handlers and router
//! - [`config`] - CLI and configuration types
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use image_gateway::{
//!     create_router, DerivativeCache, Gateway, ImageTransformer, MemoryKvStore,
//!     MemoryOriginStore, RouterConfig, Unlimited,
//! };
//!
//! #[tokio::main]
//! async fn main() {
//!     let origin = MemoryOriginStore::new().with_object("logo.png", vec![0u8; 16], "image/png");
//!     let cache = DerivativeCache::new(Arc::new(MemoryKvStore::new()));
//!
//!     let gateway = Gateway::new(
//!         Arc::new(origin),
//!         cache,
//!         Arc::new(Unlimited),
//!         Arc::new(ImageTransformer::new()),
//!     );
//!
//!     let router = create_router(gateway, RouterConfig::new());
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await.unwrap();
//!     axum::serve(listener, router).await.unwrap();
//! }
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod gateway;
pub mod limit;
pub mod params;
pub mod server;
pub mod store;
pub mod transform;

// Re-export commonly used types
pub use cache::{
    build_cache_key, CacheEntry, CacheKey, DerivativeCache, KvStore, MemoryKvStore,
    DEFAULT_CACHE_TTL,
};
pub use config::{CheckConfig, Cli, Command, ServeConfig, TransformerKind};
pub use error::{CacheError, GatewayError, StoreError, TransformError};
pub use gateway::{AssetRequest, AssetResponse, CacheStatus, Gateway, CACHE_STATUS_HEADER};
pub use limit::{KeyedRateLimiter, RateLimiter, Unlimited, UNKNOWN_CLIENT};
pub use params::{FitMode, OutputFormat, TransformParameters, DEFAULT_QUALITY};
pub use server::{create_router, AppState, ErrorResponse, HealthResponse, RouterConfig};
pub use store::{create_s3_client, MemoryOriginStore, ObjectHead, OriginObject, OriginStore, S3OriginStore};
pub use transform::{ImageTransformer, RemoteTransformer, TransformInput, TransformOutput, Transformer};
