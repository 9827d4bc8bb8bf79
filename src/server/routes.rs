//! Router configuration for the image gateway.
//!
//! # Route Structure
//!
//! ```text
//! /health                 - Health check
//! {prefix}/{*name}        - Asset endpoint (default prefix: /cdn)
//! {prefix}, {prefix}/     - 400, no asset named
//! ```
//!
//! # Example
//!
//! ```ignore
//! use image_gateway::server::{create_router, RouterConfig};
//!
//! let config = RouterConfig::new()
//!     .with_cors_origins(vec!["https://example.com".to_string()]);
//!
//! let router = create_router(gateway, config);
//!
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
//! axum::serve(
//!     listener,
//!     router.into_make_service_with_connect_info::<std::net::SocketAddr>(),
//! )
//! .await?;
//! ```

use std::time::Duration;

use axum::{routing::get, Router};
use http::header::{ACCEPT, CONTENT_TYPE};
use http::Method;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::client::ForwardedFor;
use super::handlers::{asset_handler, health_handler, missing_asset_handler, AppState};
use crate::cache::DEFAULT_CACHE_TTL;
use crate::gateway::{Gateway, CACHE_STATUS_HEADER};

/// Default mount point of the asset route.
pub const DEFAULT_ROUTE_PREFIX: &str = "/cdn";

// =============================================================================
// Router Configuration
// =============================================================================

/// Configuration for the HTTP router.
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Path prefix of the asset route
    pub route_prefix: String,

    /// Allowed CORS origins (None = allow any origin)
    pub cors_origins: Option<Vec<String>>,

    /// Cache-Control max-age in seconds
    pub cache_max_age: u64,

    /// Whether to enable request tracing
    pub enable_tracing: bool,

    /// Key rate limiting on `X-Forwarded-For` instead of the peer address
    pub trust_forwarded_for: bool,
}

impl RouterConfig {
    /// Create a new router configuration.
    ///
    /// By default:
    /// - Assets are served under `/cdn`
    /// - CORS allows any origin
    /// - Cache max-age is 24 hours, matching the cache TTL
    /// - Tracing is enabled
    /// - `X-Forwarded-For` is ignored
    pub fn new() -> Self {
        Self {
            route_prefix: DEFAULT_ROUTE_PREFIX.to_string(),
            cors_origins: None,
            cache_max_age: DEFAULT_CACHE_TTL.as_secs(),
            enable_tracing: true,
            trust_forwarded_for: false,
        }
    }

    /// Set the path prefix of the asset route.
    pub fn with_route_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.route_prefix = prefix.into();
        self
    }

    /// Set specific allowed CORS origins.
    ///
    /// Pass an empty vec to disallow all cross-origin requests.
    pub fn with_cors_origins(mut self, origins: Vec<String>) -> Self {
        self.cors_origins = Some(origins);
        self
    }

    /// Allow any CORS origin.
    pub fn with_cors_any_origin(mut self) -> Self {
        self.cors_origins = None;
        self
    }

    /// Set the Cache-Control max-age in seconds.
    pub fn with_cache_max_age(mut self, seconds: u64) -> Self {
        self.cache_max_age = seconds;
        self
    }

    /// Enable or disable request tracing.
    pub fn with_tracing(mut self, enabled: bool) -> Self {
        self.enable_tracing = enabled;
        self
    }

    /// Trust the first `X-Forwarded-For` entry as the client address.
    ///
    /// Only for deployments behind a proxy that sets the header itself.
    pub fn with_trust_forwarded_for(mut self, trusted: bool) -> Self {
        self.trust_forwarded_for = trusted;
        self
    }

    /// The prefix with any trailing slash removed; empty means the root.
    fn normalized_prefix(&self) -> String {
        let trimmed = self.route_prefix.trim_matches('/');
        if trimmed.is_empty() {
            String::new()
        } else {
            format!("/{}", trimmed)
        }
    }
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Router Builder
// =============================================================================

/// Create the main application router.
///
/// Serve it with `into_make_service_with_connect_info::<SocketAddr>()` so
/// callers without `X-Forwarded-For` are keyed by their peer address.
pub fn create_router(gateway: Gateway, config: RouterConfig) -> Router {
    let app_state = AppState::with_cache_max_age(gateway, config.cache_max_age).with_forwarded_for(
        ForwardedFor {
            trusted: config.trust_forwarded_for,
        },
    );
    let cors = build_cors_layer(&config);
    let prefix = config.normalized_prefix();

    let mut router = Router::new()
        .route("/health", get(health_handler))
        .route(&format!("{}/{{*name}}", prefix), get(asset_handler))
        .route(&format!("{}/", prefix), get(missing_asset_handler));

    if !prefix.is_empty() {
        router = router.route(&prefix, get(missing_asset_handler));
    }

    let router = router.with_state(app_state).layer(cors);

    if config.enable_tracing {
        router.layer(TraceLayer::new_for_http())
    } else {
        router
    }
}

/// Build the CORS layer based on configuration.
fn build_cors_layer(config: &RouterConfig) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::HEAD, Method::OPTIONS])
        .allow_headers([ACCEPT, CONTENT_TYPE])
        .expose_headers([http::HeaderName::from_static(CACHE_STATUS_HEADER)])
        .max_age(Duration::from_secs(86400));

    match &config.cors_origins {
        None => cors.allow_origin(Any),
        Some(origins) if origins.is_empty() => cors,
        Some(origins) => {
            let parsed_origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();
            cors.allow_origin(parsed_origins)
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
