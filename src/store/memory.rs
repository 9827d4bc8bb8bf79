//! In-process origin store.

use std::collections::HashMap;

use async_trait::async_trait;
use bytes::Bytes;
use sha2::{Digest, Sha256};
use tokio::sync::RwLock;

use super::{ObjectHead, OriginObject, OriginStore};
use crate::error::StoreError;

/// Quoted hex SHA-256 of `bytes`, in ETag form.
pub fn integrity_tag_for(bytes: &[u8]) -> String {
    format!("\"{}\"", hex::encode(Sha256::digest(bytes)))
}

/// [`OriginStore`] backed by a `HashMap`.
///
/// Integrity tags are content hashes, so identical bodies always carry the
/// same tag.
///
/// # Example
///
/// ```
/// use image_gateway::store::{MemoryOriginStore, OriginStore};
///
/// #[tokio::main]
/// async fn main() {
///     let store = MemoryOriginStore::new().with_object("logo.png", vec![1, 2, 3], "image/png");
///
///     let object = store.get("logo.png").await.unwrap().unwrap();
///     assert_eq!(object.content_type, "image/png");
///     assert!(store.get("missing.png").await.unwrap().is_none());
/// }
/// ```
#[derive(Default)]
pub struct MemoryOriginStore {
    objects: RwLock<HashMap<String, OriginObject>>,
}

impl MemoryOriginStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert, usable before the store is shared.
    pub fn with_object(
        mut self,
        key: impl Into<String>,
        body: impl Into<Bytes>,
        content_type: impl Into<String>,
    ) -> Self {
        let object = make_object(body.into(), content_type.into());
        self.objects.get_mut().insert(key.into(), object);
        self
    }

    /// Number of stored objects.
    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.objects.read().await.is_empty()
    }
}

fn make_object(bytes: Bytes, content_type: String) -> OriginObject {
    let integrity_tag = Some(integrity_tag_for(&bytes));
    OriginObject {
        bytes,
        content_type,
        integrity_tag,
    }
}

fn head_of(object: &OriginObject) -> ObjectHead {
    ObjectHead {
        content_type: object.content_type.clone(),
        content_length: object.bytes.len() as u64,
        integrity_tag: object.integrity_tag.clone(),
    }
}

#[async_trait]
impl OriginStore for MemoryOriginStore {
    async fn get(&self, key: &str) -> Result<Option<OriginObject>, StoreError> {
        Ok(self.objects.read().await.get(key).cloned())
    }

    async fn put(
        &self,
        key: &str,
        body: Bytes,
        content_type: &str,
    ) -> Result<ObjectHead, StoreError> {
        let object = make_object(body, content_type.to_string());
        let head = head_of(&object);
        self.objects.write().await.insert(key.to_string(), object);
        Ok(head)
    }

    async fn delete(&self, keys: &[String]) -> Result<(), StoreError> {
        let mut objects = self.objects.write().await;
        for key in keys {
            objects.remove(key);
        }
        Ok(())
    }

    async fn head(&self, key: &str) -> Result<Option<ObjectHead>, StoreError> {
        Ok(self.objects.read().await.get(key).map(head_of))
    }
}
