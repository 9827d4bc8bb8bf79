//! HTTP request handlers for the image gateway.
//!
//! # Endpoints
//!
//! - `GET /cdn/{*name}` - Serve an asset, optionally transformed
//! - `GET /cdn` - Always `400 Bad Request` (no asset named)
//! - `GET /health` - Health check endpoint

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{FromRef, Path, RawQuery, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::{debug, error, warn};

use super::client::{ClientAddress, ForwardedFor};
use crate::cache::DEFAULT_CACHE_TTL;
use crate::error::GatewayError;
use crate::gateway::{AssetRequest, AssetResponse, Gateway, CACHE_STATUS_HEADER};
use crate::store::DEFAULT_CONTENT_TYPE;

// =============================================================================
// Application State
// =============================================================================

/// Shared application state containing the gateway.
#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<Gateway>,

    /// `Cache-Control` max-age in seconds, matching the cache TTL
    pub cache_max_age: u64,

    /// Whether client addresses come from `X-Forwarded-For`
    pub forwarded_for: ForwardedFor,
}

impl AppState {
    /// Create a new application state advertising the default 24 hour TTL.
    pub fn new(gateway: Gateway) -> Self {
        Self::with_cache_max_age(gateway, DEFAULT_CACHE_TTL.as_secs())
    }

    pub fn with_cache_max_age(gateway: Gateway, cache_max_age: u64) -> Self {
        Self {
            gateway: Arc::new(gateway),
            cache_max_age,
            forwarded_for: ForwardedFor::default(),
        }
    }

    /// Key callers by the first `X-Forwarded-For` entry when `trusted`.
    pub fn with_forwarded_for(mut self, forwarded_for: ForwardedFor) -> Self {
        self.forwarded_for = forwarded_for;
        self
    }
}

impl FromRef<AppState> for ForwardedFor {
    fn from_ref(state: &AppState) -> Self {
        state.forwarded_for
    }
}

// =============================================================================
// Response Types
// =============================================================================

/// JSON error response returned for all error conditions.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error type identifier (e.g., "not_found", "rate_limited")
    pub error: String,

    /// Human-readable error message
    pub message: String,

    /// HTTP status code (included for convenience)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            status: None,
        }
    }

    pub fn with_status(
        error: impl Into<String>,
        message: impl Into<String>,
        status: StatusCode,
    ) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            status: Some(status.as_u16()),
        }
    }
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

// =============================================================================
// Error Mapping
// =============================================================================

/// Convert GatewayError to HTTP response.
///
/// 5xx errors are logged at ERROR, 404 at DEBUG, other 4xx at WARN. Every
/// error response carries the status marker header.
impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match &self {
            GatewayError::MissingAssetId => {
                (StatusCode::BAD_REQUEST, "missing_asset", self.to_string())
            }
            GatewayError::RateLimited { .. } => (
                StatusCode::TOO_MANY_REQUESTS,
                "rate_limited",
                "Too many requests".to_string(),
            ),
            GatewayError::NotFound { .. } => {
                (StatusCode::NOT_FOUND, "not_found", self.to_string())
            }
            // The store's own message stays in the log
            GatewayError::Origin { asset_id, .. } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "storage_error",
                format!("Server error fetching image {}", asset_id),
            ),
        };

        if status.is_server_error() {
            error!(
                error_type = error_type,
                status = status.as_u16(),
                "Server error: {}",
                self
            );
        } else if status == StatusCode::NOT_FOUND {
            debug!(
                error_type = error_type,
                status = status.as_u16(),
                "Resource not found: {}",
                message
            );
        } else {
            warn!(
                error_type = error_type,
                status = status.as_u16(),
                "Client error: {}",
                self
            );
        }

        let body = ErrorResponse::with_status(error_type, message, status);
        let marker = HeaderValue::from_static(self.cache_status().as_str());

        (status, [(CACHE_STATUS_HEADER, marker)], Json(body)).into_response()
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// Handle asset requests.
///
/// # Endpoint
///
/// `GET /cdn/{*name}`
///
/// # Query Parameters
///
/// - `w` / `width`, `h` / `height`: bounding box in pixels
/// - `f` / `format`: `jpeg`, `png`, `webp` or `avif`
/// - `q` / `quality`: 1-100
/// - `fit`: `scale-down`, `contain`, `cover`, `crop` or `pad`
///
/// Unrecognized or invalid values are ignored.
///
/// # Response
///
/// - `200 OK`: asset bytes
/// - `400 Bad Request`: no asset named
/// - `404 Not Found`: asset not in the origin store
/// - `429 Too Many Requests`: caller over its rate limit
/// - `500 Internal Server Error`: origin store failure
///
/// # Headers
///
/// - `Content-Type`
/// - `Cache-Control: public, max-age={cache_max_age}`
/// - `X-Cache-Status: HIT|MISS|MISS-TRANSFORMED|MISS-TRANSFORM-FAILED`
/// - `ETag` when the payload has an integrity tag
pub async fn asset_handler(
    State(state): State<AppState>,
    Path(name): Path<String>,
    RawQuery(query): RawQuery,
    ClientAddress(client): ClientAddress,
    headers: HeaderMap,
) -> Result<Response, GatewayError> {
    let accept = headers
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let request = AssetRequest {
        asset_id: Some(name),
        query: query.unwrap_or_default(),
        client,
        accept,
    };

    let response = state.gateway.handle(request).await?;

    Ok(asset_response(response, state.cache_max_age))
}

/// Handle requests to the asset route with no asset named.
pub async fn missing_asset_handler() -> GatewayError {
    GatewayError::MissingAssetId
}

fn asset_response(response: AssetResponse, cache_max_age: u64) -> Response {
    let mut headers = HeaderMap::new();

    let content_type = HeaderValue::from_str(&response.content_type)
        .unwrap_or_else(|_| HeaderValue::from_static(DEFAULT_CONTENT_TYPE));
    headers.insert(header::CONTENT_TYPE, content_type);
    headers.insert(
        CACHE_STATUS_HEADER,
        HeaderValue::from_static(response.cache_status.as_str()),
    );
    if let Ok(value) = HeaderValue::from_str(&format!("public, max-age={}", cache_max_age)) {
        headers.insert(header::CACHE_CONTROL, value);
    }
    if let Some(etag) = response
        .integrity_tag
        .as_deref()
        .and_then(|tag| HeaderValue::from_str(tag).ok())
    {
        headers.insert(header::ETAG, etag);
    }

    (StatusCode::OK, headers, Body::from(response.body)).into_response()
}

/// Handle health check requests.
///
/// # Endpoint
///
/// `GET /health`
///
/// # Response
///
/// `200 OK` with JSON body:
/// ```json
/// {
///   "status": "healthy",
///   "version": "0.1.0"
/// }
/// ```
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// =============================================================================
// Tests
// =============================================================================
