//! Cache key derivation.
//!
//! The key grammar is persisted alongside cached payloads, so it must stay
//! stable across releases:
//!
//! ```text
//! key    = asset-id                      ; no transformation requested
//!        | asset-id *( "_" field )       ; fields in the fixed order below
//! field  = "w" width | "h" height | "f" format | "q" quality | "fit" fit
//! ```
//!
//! `GET /cdn/photo.png?f=webp&w=200` and `GET /cdn/photo.png?w=200&f=webp`
//! both map to `photo.png_w200_fwebp`.

use std::fmt;

use crate::params::TransformParameters;

/// Separator placed between the asset identifier and each encoded field.
pub const KEY_SEPARATOR: char = '_';

/// Key under which a payload is stored in the derivative cache.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Borrow the key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume the key, returning the owned string.
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Derive the cache key for an asset and its requested transformations.
///
/// An untransformed request is cached under the bare asset identifier.
pub fn build_cache_key(asset_id: &str, params: &TransformParameters) -> CacheKey {
    if params.is_empty() {
        return CacheKey(asset_id.to_string());
    }

    let mut key = String::with_capacity(asset_id.len() + 32);
    key.push_str(asset_id);

    let mut push = |field: String| {
        key.push(KEY_SEPARATOR);
        key.push_str(&field);
    };

    if let Some(width) = params.width {
        push(format!("w{}", width));
    }
    if let Some(height) = params.height {
        push(format!("h{}", height));
    }
    if let Some(format) = params.format {
        push(format!("f{}", format));
    }
    if let Some(quality) = params.quality {
        push(format!("q{}", quality));
    }
    if let Some(fit) = params.fit {
        push(format!("fit{}", fit));
    }

    CacheKey(key)
}
