//! Test utilities for integration tests.
//!
//! This module provides instrumented collaborators for the gateway and helpers
//! for generating test images and driving the router.

use std::io::Cursor;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{Request, Response};
use axum::Router;
use bytes::Bytes;
use http_body_util::BodyExt;
use image::{ImageFormat, Rgb, RgbImage};
use tower::ServiceExt;

use image_gateway::error::{CacheError, StoreError, TransformError};
use image_gateway::params::TransformParameters;
use image_gateway::{
    create_router, DerivativeCache, Gateway, ImageTransformer, KvStore, MemoryKvStore,
    MemoryOriginStore, ObjectHead, OriginObject, OriginStore, RateLimiter, RouterConfig,
    TransformInput, TransformOutput, Transformer, Unlimited,
};

// =============================================================================
// Counting Origin Store
// =============================================================================

/// An origin store that counts `get` calls on top of an in-memory store.
#[derive(Clone)]
pub struct CountingOriginStore {
    inner: Arc<MemoryOriginStore>,
    gets: Arc<AtomicUsize>,
}

impl CountingOriginStore {
    pub fn new(inner: MemoryOriginStore) -> Self {
        Self {
            inner: Arc::new(inner),
            gets: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn get_count(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OriginStore for CountingOriginStore {
    async fn get(&self, key: &str) -> Result<Option<OriginObject>, StoreError> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        self.inner.get(key).await
    }

    async fn put(
        &self,
        key: &str,
        body: Bytes,
        content_type: &str,
    ) -> Result<ObjectHead, StoreError> {
        self.inner.put(key, body, content_type).await
    }

    async fn delete(&self, keys: &[String]) -> Result<(), StoreError> {
        self.inner.delete(keys).await
    }

    async fn head(&self, key: &str) -> Result<Option<ObjectHead>, StoreError> {
        self.inner.head(key).await
    }
}

/// An origin store whose every call fails.
pub struct UnreachableOriginStore;

#[async_trait]
impl OriginStore for UnreachableOriginStore {
    async fn get(&self, _key: &str) -> Result<Option<OriginObject>, StoreError> {
        Err(StoreError::Connection("connection refused".to_string()))
    }

    async fn put(&self, _: &str, _: Bytes, _: &str) -> Result<ObjectHead, StoreError> {
        Err(StoreError::Connection("connection refused".to_string()))
    }

    async fn delete(&self, _: &[String]) -> Result<(), StoreError> {
        Err(StoreError::Connection("connection refused".to_string()))
    }

    async fn head(&self, _: &str) -> Result<Option<ObjectHead>, StoreError> {
        Err(StoreError::Connection("connection refused".to_string()))
    }
}

// =============================================================================
// Recording KV Store
// =============================================================================

/// A key-value store that records reads and writes.
///
/// Writes can be made to fail to simulate an unavailable cache backend.
#[derive(Clone)]
pub struct RecordingKvStore {
    inner: Arc<MemoryKvStore>,
    gets: Arc<AtomicUsize>,
    puts: Arc<AtomicUsize>,
    fail_puts: bool,
}

impl RecordingKvStore {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MemoryKvStore::new()),
            gets: Arc::new(AtomicUsize::new(0)),
            puts: Arc::new(AtomicUsize::new(0)),
            fail_puts: false,
        }
    }

    pub fn failing_writes() -> Self {
        Self {
            fail_puts: true,
            ..Self::new()
        }
    }

    pub fn get_count(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    pub fn put_count(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }

    pub async fn contains(&self, key: &str) -> bool {
        self.inner.contains(key).await
    }

    pub async fn document(&self, key: &str) -> Option<serde_json::Value> {
        self.inner.get(key).await.ok().flatten()
    }
}

#[async_trait]
impl KvStore for RecordingKvStore {
    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>, CacheError> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        self.inner.get(key).await
    }

    async fn put(
        &self,
        key: &str,
        value: serde_json::Value,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        if self.fail_puts {
            return Err(CacheError::Backend("cache unavailable".to_string()));
        }
        self.inner.put(key, value, ttl).await
    }
}

// =============================================================================
// Limiters and Transformers
// =============================================================================

/// A limiter that denies every request and counts how often it was asked.
#[derive(Clone, Default)]
pub struct DenyAll {
    calls: Arc<AtomicUsize>,
}

impl DenyAll {
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RateLimiter for DenyAll {
    async fn admit(&self, _key: &str) -> bool {
        self.calls.fetch_add(1, Ordering::SeqCst);
        false
    }
}

/// A transformer that always fails.
pub struct FailingTransformer;

#[async_trait]
impl Transformer for FailingTransformer {
    async fn transform(
        &self,
        _input: TransformInput,
        _params: &TransformParameters,
    ) -> Result<TransformOutput, TransformError> {
        Err(TransformError::Remote { status: 502 })
    }
}

// =============================================================================
// Gateway Builder
// =============================================================================

/// Wires a gateway for tests. Defaults to no rate limiting and the in-process
/// transformer.
pub struct TestGateway {
    pub origin: CountingOriginStore,
    pub kv: RecordingKvStore,
    limiter: Arc<dyn RateLimiter>,
    transformer: Arc<dyn Transformer>,
    origin_override: Option<Arc<dyn OriginStore>>,
    trust_forwarded_for: bool,
}

impl TestGateway {
    pub fn new(origin: MemoryOriginStore) -> Self {
        Self {
            origin: CountingOriginStore::new(origin),
            kv: RecordingKvStore::new(),
            limiter: Arc::new(Unlimited),
            transformer: Arc::new(ImageTransformer::new()),
            origin_override: None,
            trust_forwarded_for: false,
        }
    }

    pub fn with_kv(mut self, kv: RecordingKvStore) -> Self {
        self.kv = kv;
        self
    }

    pub fn with_limiter(mut self, limiter: Arc<dyn RateLimiter>) -> Self {
        self.limiter = limiter;
        self
    }

    pub fn with_transformer(mut self, transformer: Arc<dyn Transformer>) -> Self {
        self.transformer = transformer;
        self
    }

    pub fn with_origin(mut self, origin: Arc<dyn OriginStore>) -> Self {
        self.origin_override = Some(origin);
        self
    }

    pub fn trusting_forwarded_for(mut self) -> Self {
        self.trust_forwarded_for = true;
        self
    }

    pub fn router(&self) -> Router {
        let origin: Arc<dyn OriginStore> = match &self.origin_override {
            Some(origin) => Arc::clone(origin),
            None => Arc::new(self.origin.clone()),
        };
        let cache = DerivativeCache::new(Arc::new(self.kv.clone()));
        let gateway = Gateway::new(
            origin,
            cache,
            Arc::clone(&self.limiter),
            Arc::clone(&self.transformer),
        );
        let config = RouterConfig::new()
            .with_tracing(false)
            .with_trust_forwarded_for(self.trust_forwarded_for);
        create_router(gateway, config)
    }
}

// =============================================================================
// Request Helpers
// =============================================================================

pub async fn get(router: Router, uri: &str) -> Response<Body> {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    router.oneshot(request).await.unwrap()
}

pub async fn get_from(router: Router, uri: &str, client: &str) -> Response<Body> {
    let request = Request::builder()
        .uri(uri)
        .header("x-forwarded-for", client)
        .body(Body::empty())
        .unwrap();
    router.oneshot(request).await.unwrap()
}

/// Send a request as if it arrived over TCP from `peer`, optionally carrying
/// an `X-Forwarded-For` header.
pub async fn get_via_peer(
    router: Router,
    uri: &str,
    peer: SocketAddr,
    forwarded_for: Option<&str>,
) -> Response<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(value) = forwarded_for {
        builder = builder.header("x-forwarded-for", value);
    }
    let mut request = builder.body(Body::empty()).unwrap();
    request.extensions_mut().insert(ConnectInfo(peer));
    router.oneshot(request).await.unwrap()
}

pub fn cache_status(response: &Response<Body>) -> &str {
    response
        .headers()
        .get("x-cache-status")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
}

pub fn content_type(response: &Response<Body>) -> &str {
    response
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
}

pub async fn body_bytes(response: Response<Body>) -> Bytes {
    response.into_body().collect().await.unwrap().to_bytes()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

// =============================================================================
// Test Images
// =============================================================================

/// Encode a gradient image of the given size.
pub fn create_image(width: u32, height: u32, format: ImageFormat) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
    });

    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, format).unwrap();
    buf.into_inner()
}

pub fn create_png(width: u32, height: u32) -> Vec<u8> {
    create_image(width, height, ImageFormat::Png)
}

pub fn create_jpeg(width: u32, height: u32) -> Vec<u8> {
    create_image(width, height, ImageFormat::Jpeg)
}

/// A store holding `photo.png` (400x300) and `photo.jpg` (400x300).
pub fn photo_store() -> MemoryOriginStore {
    MemoryOriginStore::new()
        .with_object("photo.png", create_png(400, 300), "image/png")
        .with_object("photo.jpg", create_jpeg(400, 300), "image/jpeg")
}

pub fn is_png(data: &[u8]) -> bool {
    data.starts_with(&[0x89, b'P', b'N', b'G'])
}

pub fn is_jpeg(data: &[u8]) -> bool {
    data.starts_with(&[0xFF, 0xD8])
}

pub fn is_webp(data: &[u8]) -> bool {
    data.len() >= 12 && &data[0..4] == b"RIFF" && &data[8..12] == b"WEBP"
}

pub fn dimensions(data: &[u8]) -> (u32, u32) {
    let img = image::load_from_memory(data).unwrap();
    (img.width(), img.height())
}
