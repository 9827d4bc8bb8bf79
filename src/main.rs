//! Image Gateway - serves images from S3 with on-the-fly transformations.
//!
//! This binary starts the HTTP server and configures all components.

use std::net::SocketAddr;
use std::num::NonZeroU32;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use image_gateway::{
    cache::{DerivativeCache, MemoryKvStore},
    config::{CheckConfig, Cli, Command, ServeConfig, TransformerKind},
    gateway::Gateway,
    limit::{KeyedRateLimiter, RateLimiter, Unlimited},
    server::{create_router, RouterConfig},
    store::{create_s3_client, OriginStore, S3OriginStore},
    transform::{ImageTransformer, RemoteTransformer, Transformer},
};

/// How often idle rate-limit buckets are dropped.
const LIMITER_CLEANUP_INTERVAL: Duration = Duration::from_secs(60);

/// How often expired cache entries are purged.
const CACHE_PURGE_INTERVAL: Duration = Duration::from_secs(300);

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.into_command() {
        Command::Serve(config) => run_serve(config).await,
        Command::Check(config) => run_check(config).await,
    }
}

// =============================================================================
// Serve Command
// =============================================================================

async fn run_serve(config: ServeConfig) -> ExitCode {
    init_logging(config.verbose);

    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    info!("Image Gateway v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration:");
    info!("  S3 bucket: {}", config.s3_bucket);
    if let Some(ref endpoint) = config.s3_endpoint {
        info!("  S3 endpoint: {}", endpoint);
    }
    info!("  S3 region: {}", config.s3_region);
    info!(
        "  Cache: {}MB, {} entries, TTL {}s",
        config.cache_capacity / (1024 * 1024),
        config.cache_entries,
        config.cache_ttl
    );

    let s3_client = create_s3_client(config.s3_endpoint.as_deref(), &config.s3_region).await;
    let origin: Arc<dyn OriginStore> =
        Arc::new(S3OriginStore::new(s3_client, config.s3_bucket.clone()));

    let kv = Arc::new(MemoryKvStore::with_capacity_and_entries(
        config.cache_capacity,
        config.cache_entries,
    ));
    spawn_cache_purge(Arc::clone(&kv));
    let cache = DerivativeCache::with_ttl(kv, Duration::from_secs(config.cache_ttl));

    let limiter = build_limiter(&config);

    let transformer = match build_transformer(&config) {
        Ok(transformer) => transformer,
        Err(e) => {
            error!("Failed to create transformer: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let gateway = Gateway::new(origin, cache, limiter, transformer);
    let router = create_router(gateway, build_router_config(&config));

    let addr = config.bind_address();
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind to {}: {}", addr, e);
            return ExitCode::FAILURE;
        }
    };

    info!("");
    info!("Server listening on: http://{}", addr);
    info!("  curl http://{}/health", addr);
    info!("  curl -I http://{}{}/<asset>?w=200&f=webp", addr, config.route_prefix);
    info!("");

    let service = router.into_make_service_with_connect_info::<SocketAddr>();
    if let Err(e) = axum::serve(listener, service).await {
        error!("Server error: {}", e);
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

/// Initialize the tracing/logging subsystem.
fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "image_gateway=debug,tower_http=debug"
    } else {
        "image_gateway=info,tower_http=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn build_limiter(config: &ServeConfig) -> Arc<dyn RateLimiter> {
    let (Some(per_second), Some(burst)) = (
        NonZeroU32::new(config.rate_limit),
        NonZeroU32::new(config.rate_burst),
    ) else {
        warn!("  Rate limiting: DISABLED");
        return Arc::new(Unlimited);
    };

    info!(
        "  Rate limiting: {} req/s per client, burst {}",
        per_second, burst
    );
    if config.trust_forwarded_for {
        info!("  Client address: X-Forwarded-For");
    }

    let limiter = Arc::new(KeyedRateLimiter::new(per_second, burst));
    let cleanup = Arc::clone(&limiter);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(LIMITER_CLEANUP_INTERVAL);
        loop {
            interval.tick().await;
            cleanup.retain_recent();
        }
    });

    limiter
}

fn build_transformer(config: &ServeConfig) -> Result<Arc<dyn Transformer>, String> {
    match config.transformer {
        TransformerKind::Image => {
            info!(
                "  Transformer: in-process (default quality {})",
                config.default_quality
            );
            Ok(Arc::new(ImageTransformer::with_default_quality(
                config.default_quality,
            )))
        }
        TransformerKind::Remote => {
            let endpoint = config
                .transform_endpoint_url()
                .ok_or_else(|| "missing or invalid transform endpoint".to_string())?;
            info!("  Transformer: remote ({})", endpoint);
            let transformer = RemoteTransformer::new(endpoint).map_err(|e| e.to_string())?;
            Ok(Arc::new(transformer))
        }
    }
}

fn spawn_cache_purge(kv: Arc<MemoryKvStore>) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(CACHE_PURGE_INTERVAL);
        loop {
            interval.tick().await;
            let purged = kv.purge_expired().await;
            if purged > 0 {
                tracing::debug!(purged, "Purged expired cache entries");
            }
        }
    });
}

/// Build RouterConfig from the application ServeConfig.
fn build_router_config(config: &ServeConfig) -> RouterConfig {
    let mut router_config = RouterConfig::new()
        .with_route_prefix(config.route_prefix.clone())
        .with_cache_max_age(config.cache_ttl)
        .with_tracing(!config.no_tracing)
        .with_trust_forwarded_for(config.trust_forwarded_for);

    if let Some(ref origins) = config.cors_origins {
        router_config = router_config.with_cors_origins(origins.clone());
    }

    router_config
}

// =============================================================================
// Check Command
// =============================================================================

async fn run_check(config: CheckConfig) -> ExitCode {
    if config.verbose {
        init_logging(true);
    }

    println!("Image Gateway Configuration Check");
    println!("═════════════════════════════════");
    println!();

    if config.s3_bucket.trim().is_empty() {
        println!("✗ Bucket: not set (use --s3-bucket or GATEWAY_S3_BUCKET)");
        return ExitCode::FAILURE;
    }
    println!("✓ Bucket: {}", config.s3_bucket);
    if let Some(ref endpoint) = config.s3_endpoint {
        println!("✓ Endpoint: {}", endpoint);
    }
    println!("✓ Region: {}", config.s3_region);
    println!();

    print!("Testing S3 connection... ");

    let s3_client = create_s3_client(config.s3_endpoint.as_deref(), &config.s3_region).await;

    match s3_client
        .list_objects_v2()
        .bucket(&config.s3_bucket)
        .max_keys(1)
        .send()
        .await
    {
        Ok(_) => println!("✓ success"),
        Err(e) => {
            println!("✗ failed");
            println!();
            println!("Error: {}", e);
            println!();
            println!("Please check:");
            println!("  - Your AWS credentials are configured correctly");
            println!(
                "  - The bucket '{}' exists and is accessible",
                config.s3_bucket
            );
            if config.s3_endpoint.is_some() {
                println!("  - The S3 endpoint is correct and reachable");
            }
            return ExitCode::FAILURE;
        }
    }

    if let Some(ref asset) = config.test_asset {
        println!();
        print!("Looking up '{}'... ", asset);

        let store = S3OriginStore::new(s3_client, config.s3_bucket.clone());
        match store.head(asset).await {
            Ok(Some(head)) => {
                println!("✓ found");
                println!("  Content-Type: {}", head.content_type);
                println!("  Size: {} bytes", head.content_length);
                if let Some(tag) = head.integrity_tag {
                    println!("  ETag: {}", tag);
                }
            }
            Ok(None) => {
                println!("✗ not found");
                return ExitCode::FAILURE;
            }
            Err(e) => {
                println!("✗ failed");
                println!("Error: {}", e);
                return ExitCode::FAILURE;
            }
        }
    }

    println!();
    println!("All checks passed.");

    ExitCode::SUCCESS
}
