//! Router configuration for tinyimg.
//!
//! This module defines the HTTP routes and applies middleware for rate
//! limiting, body limits and CORS.
//!
//! # Route Structure
//!
//! ```text
//! /health            - Health check (public)
//! /stats             - Usage totals (public)
//! /upload            - Convert an upload (rate limited, body limit)
//! /image?f=<name>    - Download a converted file (rate limited)
//! /download-all      - Zip several converted files (rate limited)
//! ```
//!
//! # Example
//!
//! ```ignore
//! use tinyimg::server::{create_router, RouterConfig};
//!
//! let orchestrator = ConversionOrchestrator::new(ImageCodec::default(), "output", base_url);
//! let limiter = Arc::new(RateLimiter::new(RateLimiterConfig::default()));
//!
//! let config = RouterConfig::new()
//!     .with_cors_origins(vec!["https://example.com".to_string()]);
//!
//! let router = create_router(orchestrator, limiter, config);
//!
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
//! axum::serve(
//!     listener,
//!     router.into_make_service_with_connect_info::<SocketAddr>(),
//! )
//! .await?;
//! ```

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Router,
};
use http::header::CONTENT_TYPE;
use http::Method;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::handlers::{
    download_all_handler, health_handler, image_handler, stats_handler, upload_handler, AppState,
};
use super::throttle::rate_limit_middleware;
use crate::codec::Codec;
use crate::config::DEFAULT_MAX_UPLOAD_BYTES;
use crate::convert::ConversionOrchestrator;
use crate::limit::RateLimiter;

// =============================================================================
// Router Configuration
// =============================================================================

/// Configuration for the HTTP router.
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Allowed CORS origins (None = allow any origin)
    pub cors_origins: Option<Vec<String>>,

    /// Maximum accepted upload body in bytes
    pub max_upload_bytes: usize,

    /// Whether to enable request tracing
    pub enable_tracing: bool,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl RouterConfig {
    /// Create a new router configuration.
    ///
    /// By default:
    /// - CORS allows any origin
    /// - Uploads are limited to 10 MB
    /// - Tracing is enabled
    pub fn new() -> Self {
        Self {
            cors_origins: None,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            enable_tracing: true,
        }
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

    /// Set the upload body limit.
    pub fn with_max_upload_bytes(mut self, bytes: usize) -> Self {
        self.max_upload_bytes = bytes;
        self
    }

    /// Enable or disable request tracing.
    pub fn with_tracing(mut self, enabled: bool) -> Self {
        self.enable_tracing = enabled;
        self
    }
}

// =============================================================================
// Router Builder
// =============================================================================

/// Create the main application router.
///
/// Upload, download and archive routes share the given rate limiter; health and stats
/// are never limited.
pub fn create_router<C: Codec>(
    orchestrator: ConversionOrchestrator<C>,
    limiter: Arc<RateLimiter>,
    config: RouterConfig,
) -> Router {
    let app_state = AppState::new(orchestrator);
    let cors = build_cors_layer(&config);

    let limited_routes = Router::new()
        .route(
            "/upload",
            post(upload_handler::<C>).layer(DefaultBodyLimit::max(config.max_upload_bytes)),
        )
        .route("/image", get(image_handler::<C>))
        .route("/download-all", post(download_all_handler::<C>))
        .route_layer(middleware::from_fn_with_state(limiter, rate_limit_middleware));

    let public_routes = Router::new()
        .route("/health", get(health_handler))
        .route("/stats", get(stats_handler::<C>));

    let router = Router::new()
        .merge(limited_routes)
        .merge(public_routes)
        .with_state(app_state)
        .layer(cors);

    if config.enable_tracing {
        router.layer(TraceLayer::new_for_http())
    } else {
        router
    }
}

/// Build the CORS layer based on configuration.
fn build_cors_layer(config: &RouterConfig) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE])
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
