//! Configuration management for the image gateway.
//!
//! Configuration comes from command-line arguments and `GATEWAY_`-prefixed
//! environment variables, with defaults for everything except the bucket.
//!
//! # Subcommands
//!
//! - `serve`: run the HTTP server
//! - `check`: verify S3 connectivity and print a report
//!
//! # Environment Variables
//!
//! - `GATEWAY_HOST` - Server bind address (default: 0.0.0.0)
//! - `GATEWAY_PORT` - Server port (default: 3000)
//! - `GATEWAY_S3_BUCKET` - S3 bucket holding the original assets (required)
//! - `GATEWAY_S3_ENDPOINT` - Custom S3 endpoint for S3-compatible services
//! - `GATEWAY_S3_REGION` - AWS region (default: us-east-1)
//! - `GATEWAY_CACHE_TTL` - Cache TTL and `Cache-Control` max-age in seconds (default: 86400)
//! - `GATEWAY_CACHE_CAPACITY` - In-process cache size in bytes (default: 256MB)
//! - `GATEWAY_CACHE_ENTRIES` - In-process cache entry limit (default: 10000)
//! - `GATEWAY_RATE_LIMIT` - Requests per second per client, 0 disables (default: 20)
//! - `GATEWAY_RATE_BURST` - Burst allowance per client (default: 40)
//! - `GATEWAY_TRUST_FORWARDED_FOR` - Key clients by `X-Forwarded-For` (default: false)
//! - `GATEWAY_TRANSFORMER` - `image` or `remote` (default: image)
//! - `GATEWAY_TRANSFORM_ENDPOINT` - Remote transformation endpoint URL
//! - `GATEWAY_DEFAULT_QUALITY` - Encoder quality when none is requested (default: 80)
//! - `GATEWAY_ROUTE_PREFIX` - Asset route prefix (default: /cdn)
//! - `GATEWAY_CORS_ORIGINS` - Allowed CORS origins, comma-separated (default: any)

use clap::{Args, Parser, Subcommand, ValueEnum};
use url::Url;

use crate::cache::{DEFAULT_KV_CAPACITY, DEFAULT_KV_MAX_ENTRIES};
use crate::params::{DEFAULT_QUALITY, MAX_QUALITY, MIN_QUALITY};
use crate::server::DEFAULT_ROUTE_PREFIX;

// =============================================================================
// Default Values
// =============================================================================

/// Default server host.
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Default server port.
pub const DEFAULT_PORT: u16 = 3000;

/// Default AWS region.
pub const DEFAULT_REGION: &str = "us-east-1";

/// Default cache TTL in seconds (24 hours).
pub const DEFAULT_CACHE_TTL_SECS: u64 = 86_400;

/// Default sustained requests per second per client.
pub const DEFAULT_RATE_LIMIT: u32 = 20;

/// Default burst allowance per client.
pub const DEFAULT_RATE_BURST: u32 = 40;

// =============================================================================
// CLI Arguments
// =============================================================================

/// Image Gateway - serves images from S3 with on-the-fly transformations.
#[derive(Parser, Debug, Clone)]
#[command(name = "image-gateway")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    pub fn into_command(self) -> Command {
        self.command
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Run the HTTP server.
    Serve(ServeConfig),

    /// Check S3 connectivity and configuration.
    Check(CheckConfig),
}

/// Which transformation strategy to run.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransformerKind {
    /// In-process resizing and re-encoding
    Image,
    /// POST to an external transformation endpoint
    Remote,
}

/// Options for `image-gateway serve`.
#[derive(Args, Debug, Clone)]
pub struct ServeConfig {
    // =========================================================================
    // Server Configuration
    // =========================================================================
    /// Host address to bind the server to.
    #[arg(long, default_value = DEFAULT_HOST, env = "GATEWAY_HOST")]
    pub host: String,

    /// Port to listen on.
    #[arg(short, long, default_value_t = DEFAULT_PORT, env = "GATEWAY_PORT")]
    pub port: u16,

    /// Path prefix the asset route is mounted under.
    #[arg(long, default_value = DEFAULT_ROUTE_PREFIX, env = "GATEWAY_ROUTE_PREFIX")]
    pub route_prefix: String,

    // =========================================================================
    // S3 Configuration
    // =========================================================================
    /// S3 bucket holding the original assets.
    #[arg(long, env = "GATEWAY_S3_BUCKET")]
    pub s3_bucket: String,

    /// Custom S3 endpoint URL for S3-compatible services (MinIO, R2, etc.).
    #[arg(long, env = "GATEWAY_S3_ENDPOINT")]
    pub s3_endpoint: Option<String>,

    /// AWS region for S3.
    #[arg(long, default_value = DEFAULT_REGION, env = "GATEWAY_S3_REGION")]
    pub s3_region: String,

    // =========================================================================
    // Cache Configuration
    // =========================================================================
    /// Cache TTL in seconds. Also advertised as `Cache-Control: max-age`.
    #[arg(long, default_value_t = DEFAULT_CACHE_TTL_SECS, env = "GATEWAY_CACHE_TTL")]
    pub cache_ttl: u64,

    /// In-process cache capacity in bytes.
    #[arg(long, default_value_t = DEFAULT_KV_CAPACITY, env = "GATEWAY_CACHE_CAPACITY")]
    pub cache_capacity: usize,

    /// Maximum number of cached entries.
    #[arg(long, default_value_t = DEFAULT_KV_MAX_ENTRIES, env = "GATEWAY_CACHE_ENTRIES")]
    pub cache_entries: usize,

    // =========================================================================
    // Rate Limiting
    // =========================================================================
    /// Sustained requests per second per client. 0 disables rate limiting.
    #[arg(long, default_value_t = DEFAULT_RATE_LIMIT, env = "GATEWAY_RATE_LIMIT")]
    pub rate_limit: u32,

    /// Requests a client may burst above the sustained rate.
    #[arg(long, default_value_t = DEFAULT_RATE_BURST, env = "GATEWAY_RATE_BURST")]
    pub rate_burst: u32,

    /// Key clients by the first `X-Forwarded-For` entry instead of the peer
    /// address. Only enable behind a proxy that overwrites the header.
    #[arg(long, default_value_t = false, env = "GATEWAY_TRUST_FORWARDED_FOR")]
    pub trust_forwarded_for: bool,

    // =========================================================================
    // Transformation
    // =========================================================================
    /// Transformation strategy.
    #[arg(long, value_enum, default_value_t = TransformerKind::Image, env = "GATEWAY_TRANSFORMER")]
    pub transformer: TransformerKind,

    /// Endpoint for the remote transformer.
    #[arg(long, env = "GATEWAY_TRANSFORM_ENDPOINT")]
    pub transform_endpoint: Option<String>,

    /// Encoder quality used when a request does not specify one (1-100).
    #[arg(long, default_value_t = DEFAULT_QUALITY, env = "GATEWAY_DEFAULT_QUALITY")]
    pub default_quality: u8,

    // =========================================================================
    // CORS Configuration
    // =========================================================================
    /// Allowed CORS origins (comma-separated).
    ///
    /// If not specified, allows any origin.
    #[arg(long, env = "GATEWAY_CORS_ORIGINS", value_delimiter = ',')]
    pub cors_origins: Option<Vec<String>>,

    // =========================================================================
    // Logging Configuration
    // =========================================================================
    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,

    /// Disable request tracing.
    #[arg(long, default_value_t = false)]
    pub no_tracing: bool,
}

impl ServeConfig {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.s3_bucket.trim().is_empty() {
            return Err(
                "S3 bucket name is required. Set --s3-bucket or GATEWAY_S3_BUCKET".to_string(),
            );
        }

        if self.cache_ttl == 0 {
            return Err("cache_ttl must be greater than 0".to_string());
        }
        if self.cache_capacity == 0 {
            return Err("cache_capacity must be greater than 0".to_string());
        }
        if self.cache_entries == 0 {
            return Err("cache_entries must be greater than 0".to_string());
        }

        if self.rate_limit > 0 && self.rate_burst == 0 {
            return Err("rate_burst must be greater than 0 when rate limiting is enabled".to_string());
        }

        if !(MIN_QUALITY..=MAX_QUALITY).contains(&self.default_quality) {
            return Err(format!(
                "default_quality must be between {} and {}, got {}",
                MIN_QUALITY, MAX_QUALITY, self.default_quality
            ));
        }

        if !self.route_prefix.starts_with('/') {
            return Err(format!(
                "route_prefix must start with '/', got {:?}",
                self.route_prefix
            ));
        }

        if self.transformer == TransformerKind::Remote {
            match self.transform_endpoint.as_deref() {
                None => {
                    return Err(
                        "The remote transformer needs --transform-endpoint or GATEWAY_TRANSFORM_ENDPOINT"
                            .to_string(),
                    )
                }
                Some(endpoint) => {
                    Url::parse(endpoint)
                        .map_err(|e| format!("Invalid transform endpoint {:?}: {}", endpoint, e))?;
                }
            }
        }

        Ok(())
    }

    /// Get the bind address as "host:port".
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// The parsed remote transformer endpoint, if one is configured and valid.
    pub fn transform_endpoint_url(&self) -> Option<Url> {
        self.transform_endpoint
            .as_deref()
            .and_then(|e| Url::parse(e).ok())
    }
}

/// Options for `image-gateway check`.
#[derive(Args, Debug, Clone)]
pub struct CheckConfig {
    /// S3 bucket holding the original assets.
    #[arg(long, env = "GATEWAY_S3_BUCKET")]
    pub s3_bucket: String,

    /// Custom S3 endpoint URL for S3-compatible services (MinIO, R2, etc.).
    #[arg(long, env = "GATEWAY_S3_ENDPOINT")]
    pub s3_endpoint: Option<String>,

    /// AWS region for S3.
    #[arg(long, default_value = DEFAULT_REGION, env = "GATEWAY_S3_REGION")]
    pub s3_region: String,

    /// Asset key to look up after connecting.
    #[arg(long)]
    pub test_asset: Option<String>,

    /// Enable verbose logging.
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

// =============================================================================
// Tests
// =============================================================================
