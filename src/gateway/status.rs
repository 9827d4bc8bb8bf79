use std::fmt;

use crate::error::GatewayError;

/// Name of the response header carrying the [`CacheStatus`].
pub const CACHE_STATUS_HEADER: &str = "x-cache-status";

/// Where a response's bytes came from, or why there are none.
///
/// Every response carries one of these, successful or not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheStatus {
    /// Served from the derivative cache
    Hit,
    /// Original fetched from the origin store
    Miss,
    /// Derivative produced on this request
    MissTransformed,
    /// Transform failed; original bytes served instead
    MissTransformFailed,
    NotFound,
    RateLimited,
    BadRequest,
    Error,
}

impl CacheStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheStatus::Hit => "HIT",
            CacheStatus::Miss => "MISS",
            CacheStatus::MissTransformed => "MISS-TRANSFORMED",
            CacheStatus::MissTransformFailed => "MISS-TRANSFORM-FAILED",
            CacheStatus::NotFound => "NOT-FOUND",
            CacheStatus::RateLimited => "RATE-LIMITED",
            CacheStatus::BadRequest => "BAD-REQUEST",
            CacheStatus::Error => "ERROR",
        }
    }
}

impl fmt::Display for CacheStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl GatewayError {
    /// The status marker reported alongside this error.
    pub fn cache_status(&self) -> CacheStatus {
        match self {
            GatewayError::MissingAssetId => CacheStatus::BadRequest,
            GatewayError::RateLimited { .. } => CacheStatus::RateLimited,
            GatewayError::NotFound { .. } => CacheStatus::NotFound,
            GatewayError::Origin { .. } => CacheStatus::Error,
        }
    }
}
