use thiserror::Error;

/// Errors that can occur when talking to the origin object store.
///
/// A missing object is not an error: stores report it as `Ok(None)`.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// Error from S3 or S3-compatible storage
    #[error("S3 error: {0}")]
    S3(String),

    /// Network or connection error
    #[error("Connection error: {0}")]
    Connection(String),
}

/// Errors raised by the key-value cache substrate or the entry codec
#[derive(Debug, Clone, Error)]
pub enum CacheError {
    /// The backing store rejected or failed the operation
    #[error("Cache backend error: {0}")]
    Backend(String),

    /// Entry could not be serialized to or parsed from JSON
    #[error("Cache serialization error: {0}")]
    Serialization(String),

    /// Stored payload is not valid base64
    #[error("Cache payload decode error: {0}")]
    Decode(String),
}

impl From<serde_json::Error> for CacheError {
    fn from(err: serde_json::Error) -> Self {
        CacheError::Serialization(err.to_string())
    }
}

impl From<base64::DecodeError> for CacheError {
    fn from(err: base64::DecodeError) -> Self {
        CacheError::Decode(err.to_string())
    }
}

/// Errors that can occur while producing a derivative.
///
/// These never terminate a request: the gateway falls back to the original
/// bytes whenever a transform fails.
#[derive(Debug, Clone, Error)]
pub enum TransformError {
    /// Source bytes could not be decoded as an image
    #[error("Failed to decode source image: {0}")]
    Decode(String),

    /// The derivative could not be encoded
    #[error("Failed to encode derivative: {0}")]
    Encode(String),

    /// The requested output format cannot be produced
    #[error("Unsupported output format: {0}")]
    UnsupportedFormat(String),

    /// The requested canvas exceeds the supported dimensions
    #[error("Requested canvas {width}x{height} is too large")]
    TooLarge { width: u32, height: u32 },

    /// The remote transformation service answered with a non-success status
    #[error("Transform service returned status {status}")]
    Remote { status: u16 },

    /// The remote transformation service could not be reached
    #[error("Transform service connection error: {0}")]
    Connection(String),

    /// The blocking transform task panicked or was cancelled
    #[error("Transform task failed: {0}")]
    Task(String),
}

/// Outcomes that terminate a gateway request with an error status.
#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    /// The request path did not name an asset (400)
    #[error("Image name parameter is missing")]
    MissingAssetId,

    /// Admission control denied the caller (429)
    #[error("Too many requests from {client}")]
    RateLimited { client: String },

    /// The asset does not exist in the origin store (404)
    #[error("Image not found: {asset_id}")]
    NotFound { asset_id: String },

    /// The origin store failed for a reason other than absence (500)
    #[error("Server error fetching image {asset_id}: {source}")]
    Origin {
        asset_id: String,
        #[source]
        source: StoreError,
    },
}
