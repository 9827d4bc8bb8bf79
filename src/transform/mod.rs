//! Derivative production.
//!
//! A [`Transformer`] turns origin bytes plus [`TransformParameters`] into a
//! derivative. Two strategies ship with the crate:
//!
//! - [`ImageTransformer`]: decodes, resizes and re-encodes in-process with the
//!   `image` crate. Work runs on the blocking thread pool.
//! - [`RemoteTransformer`]: POSTs the origin bytes to an external
//!   transformation endpoint and accepts whatever it returns.
//!
//! Failures are reported as [`TransformError`]; the gateway never lets them
//! terminate a request.

mod image;
mod remote;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::TransformError;
use crate::params::TransformParameters;

pub use self::image::{ImageTransformer, MAX_CANVAS_DIMENSION};
pub use remote::{RemoteTransformer, DEFAULT_ACCEPT};

/// Everything a transformer may need about the source asset.
#[derive(Debug, Clone)]
pub struct TransformInput {
    /// Asset identifier, for diagnostics
    pub asset_id: String,

    /// Origin bytes
    pub bytes: Bytes,

    /// Origin content type
    pub content_type: String,

    /// The caller's `Accept` header, if any
    pub accept: Option<String>,
}

/// A produced derivative.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformOutput {
    pub bytes: Bytes,

    /// Content type reported by the transformer. `None` when a remote
    /// endpoint did not say.
    pub content_type: Option<String>,
}

/// Produces derivatives from origin bytes.
#[async_trait]
pub trait Transformer: Send + Sync {
    async fn transform(
        &self,
        input: TransformInput,
        params: &TransformParameters,
    ) -> Result<TransformOutput, TransformError>;
}
