//! Cache entries and their textual wire form.
//!
//! The key-value substrate only stores JSON, so payloads are base64 encoded.
//! The JSON field names are shared with entries written by earlier deployments
//! and must not change:
//!
//! ```json
//! { "buffer": "<base64>", "contentType": "image/png", "eTag": "\"abc\"" }
//! ```

use base64::{engine::general_purpose::STANDARD, Engine};
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::CacheError;

/// A cached payload with the metadata needed to replay it as a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    /// Raw payload bytes
    pub payload: Bytes,

    /// MIME type the payload is served with
    pub content_type: String,

    /// Integrity tag (ETag) of the payload, when known
    pub integrity_tag: Option<String>,
}

/// Serialized form of [`CacheEntry`].
#[derive(Debug, Serialize, Deserialize)]
struct StoredEntry {
    buffer: String,
    #[serde(rename = "contentType")]
    content_type: String,
    #[serde(rename = "eTag", default, skip_serializing_if = "Option::is_none")]
    e_tag: Option<String>,
}

impl CacheEntry {
    /// Create a new cache entry.
    pub fn new(
        payload: impl Into<Bytes>,
        content_type: impl Into<String>,
        integrity_tag: Option<String>,
    ) -> Self {
        Self {
            payload: payload.into(),
            content_type: content_type.into(),
            integrity_tag,
        }
    }

    /// Encode the entry as a JSON value for the key-value store.
    pub fn to_json(&self) -> Result<serde_json::Value, CacheError> {
        let stored = StoredEntry {
            buffer: encode_payload(&self.payload),
            content_type: self.content_type.clone(),
            e_tag: self.integrity_tag.clone(),
        };
        Ok(serde_json::to_value(stored)?)
    }

    /// Decode an entry previously produced by [`CacheEntry::to_json`].
    pub fn from_json(value: serde_json::Value) -> Result<Self, CacheError> {
        let stored: StoredEntry = serde_json::from_value(value)?;
        let payload = decode_payload(&stored.buffer)?;
        Ok(Self {
            payload: Bytes::from(payload),
            content_type: stored.content_type,
            // Older entries stored an empty string when no tag was known
            integrity_tag: stored.e_tag.filter(|tag| !tag.is_empty()),
        })
    }
}

/// Encode raw bytes as standard, padded base64.
pub fn encode_payload(payload: &[u8]) -> String {
    STANDARD.encode(payload)
}

/// Decode standard, padded base64 back into raw bytes.
pub fn decode_payload(encoded: &str) -> Result<Vec<u8>, CacheError> {
    Ok(STANDARD.decode(encoded)?)
}
