//! Origin object storage.
//!
//! The origin store holds the original, untransformed assets. It is addressed
//! by the asset identifier exactly as it appears in the request path.
//!
//! # Implementations
//!
//! - [`S3OriginStore`]: S3 or any S3-compatible service (MinIO, R2, ...)
//! - [`MemoryOriginStore`]: in-process map, for development and tests

mod memory;
mod s3;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::StoreError;

pub use memory::{integrity_tag_for, MemoryOriginStore};
pub use s3::{create_s3_client, S3OriginStore};

/// Content type reported when the store has none on record.
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// An original asset as returned by the origin store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OriginObject {
    /// Object body
    pub bytes: Bytes,

    /// MIME type recorded for the object
    pub content_type: String,

    /// Integrity tag (ETag), when the store provides one
    pub integrity_tag: Option<String>,
}

/// Object metadata without the body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectHead {
    pub content_type: String,
    pub content_length: u64,
    pub integrity_tag: Option<String>,
}

/// Durable storage for original assets.
///
/// Absence is reported as `Ok(None)`; `Err` is reserved for failures of the
/// store itself.
#[async_trait]
pub trait OriginStore: Send + Sync {
    /// Fetch an object with its metadata.
    async fn get(&self, key: &str) -> Result<Option<OriginObject>, StoreError>;

    /// Store an object, replacing any existing one. Returns the new metadata.
    async fn put(
        &self,
        key: &str,
        body: Bytes,
        content_type: &str,
    ) -> Result<ObjectHead, StoreError>;

    /// Delete a batch of objects. Missing keys are ignored.
    async fn delete(&self, keys: &[String]) -> Result<(), StoreError>;

    /// Fetch object metadata without the body.
    async fn head(&self, key: &str) -> Result<Option<ObjectHead>, StoreError>;
}
