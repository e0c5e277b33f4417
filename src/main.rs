//! tinyimg - an image compression service.
//!
//! This binary starts the HTTP server and wires all components together.

use clap::Parser;
use std::net::SocketAddr;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tinyimg::{
    codec::ImageCodec,
    config::Config,
    convert::{ConversionCache, ConversionOrchestrator, StatsAggregator},
    limit::RateLimiter,
    server::{create_router, RouterConfig},
    storage::{create_s3_client, ArtifactStore, LocalStore, S3Store},
};

#[tokio::main]
async fn main() -> ExitCode {
    let config = Config::parse();

    init_logging(config.verbose);

    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    if let Err(e) = tokio::fs::create_dir_all(&config.output_dir).await {
        error!(
            "Failed to create output directory {}: {}",
            config.output_dir.display(),
            e
        );
        return ExitCode::FAILURE;
    }

    let public_url = config.public_url();

    info!("tinyimg v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration:");
    info!("  Output directory: {}", config.output_dir.display());
    info!("  Public URL: {}", public_url);
    info!(
        "  JPEG quality: {}, PNG compression: {:?}",
        config.jpeg_quality, config.png_compression
    );
    if let Some(timeout) = config.encode_timeout_secs {
        info!("  Encode timeout: {}s", timeout);
    }
    info!(
        "  Rate limit: {}/s, burst {}",
        config.rate_limit_per_sec, config.rate_limit_burst
    );
    info!(
        "  Max upload: {}MB",
        config.max_upload_bytes / (1024 * 1024)
    );

    let store = build_store(&config, &public_url).await;

    // Shared state, built once and injected everywhere
    let cache = Arc::new(ConversionCache::new());
    let stats = Arc::new(StatsAggregator::new());

    let limiter = Arc::new(RateLimiter::new(config.limiter_config()));
    let _sweeper = limiter.spawn_sweeper();

    let mut orchestrator = ConversionOrchestrator::new(
        ImageCodec::new(config.encode_options()),
        config.output_dir.clone(),
        public_url.clone(),
    )
    .with_cache(cache)
    .with_stats(stats)
    .with_store(store);

    if let Some(timeout) = config.encode_timeout() {
        orchestrator = orchestrator.with_encode_timeout(timeout);
    }

    let router = create_router(orchestrator, limiter, build_router_config(&config));

    let addr = config.bind_address();

    info!("");
    info!("  Server listening on: http://{}", addr);
    info!("");
    info!("  Try these endpoints:");
    info!("    curl http://{}/health", addr);
    info!("    curl -F file=@photo.png -F formats=webp,jpg http://{}/upload", addr);
    info!("");

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind to {}: {}", addr, e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    {
        error!("Server error: {}", e);
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

/// Pick the artifact store: S3 when a bucket is configured, local otherwise.
async fn build_store(config: &Config, public_url: &str) -> Arc<dyn ArtifactStore> {
    let Some(bucket) = &config.s3_bucket else {
        info!("  Storage: local");
        return Arc::new(LocalStore::new(public_url));
    };

    info!("  Storage: S3 bucket {}", bucket);
    if let Some(ref endpoint) = config.s3_endpoint {
        info!("  S3 endpoint: {}", endpoint);
    }
    info!("  S3 region: {}", config.s3_region);

    let client = create_s3_client(config.s3_endpoint.as_deref(), &config.s3_region).await;
    let mut store = S3Store::new(client, bucket.clone())
        .with_presign_ttl(Duration::from_secs(config.s3_presign_ttl));
    if let Some(ref prefix) = config.s3_prefix {
        store = store.with_prefix(prefix.as_str());
    }

    Arc::new(store)
}

/// Initialize the tracing/logging subsystem.
fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "tinyimg=debug,tower_http=debug"
    } else {
        "tinyimg=info,tower_http=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Build RouterConfig from the application Config.
fn build_router_config(config: &Config) -> RouterConfig {
    let mut router_config = RouterConfig::new()
        .with_max_upload_bytes(config.max_upload_bytes)
        .with_tracing(!config.no_tracing);

    if let Some(ref origins) = config.cors_origins {
        router_config = router_config.with_cors_origins(origins.clone());
    }

    router_config
}
