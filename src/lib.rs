//! # tinyimg
//!
//! An image compression service. Upload an image once and get optimized
//! JPEG, PNG and WebP variants back, each with the number of bytes saved.
//!
//! ## Features
//!
//! - **Parallel fan-out**: the upload is decoded once and every requested
//!   format is encoded concurrently
//! - **Partial success**: a failing format never takes its siblings down
//! - **Content-addressed results**: identical uploads share cached results
//! - **Per-client rate limiting**: `governor` token buckets with idle eviction
//! - **Local or S3 storage**: converted files are served directly or handed
//!   out as presigned S3 links
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`codec`] - Decode/encode trait and the `image` crate implementation
//! - [`convert`] - Conversion orchestrator, result cache and usage stats
//! - [`limit`] - Per-client token bucket rate limiter
//! - [`storage`] - Local and S3 artifact stores, zip bundles
//! - [`server`] - Axum-based HTTP server and routes
//! - [`config`] - CLI and configuration types
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tinyimg::{create_router, ConversionOrchestrator, ImageCodec, RateLimiter, RouterConfig};
//! use tinyimg::limit::RateLimiterConfig;
//!
//! #[tokio::main]
//! async fn main() {
//!     let orchestrator = ConversionOrchestrator::new(
//!         ImageCodec::default(),
//!         "./output",
//!         "http://localhost:8080",
//!     );
//!     let limiter = Arc::new(RateLimiter::new(RateLimiterConfig::default()));
//!
//!     let router = create_router(orchestrator, limiter, RouterConfig::new());
//!
//!     // Serve the router...
//! }
//! ```

pub mod codec;
pub mod config;
pub mod convert;
pub mod error;
pub mod limit;
pub mod server;
pub mod storage;

// Re-export commonly used types
pub use codec::{Codec, DecodedImage, EncodeOptions, EncodedArtifact, ImageCodec, OutputFormat};
pub use config::Config;
pub use convert::{
    ConversionCache, ConversionOrchestrator, ConversionOutcome, ConversionRequest,
    ConversionResult, ImageAsset, ResultCache, StatsAggregator, UsageStats,
};
pub use error::{ConvertError, LimitError, RequestError, StoreError};
pub use limit::{RateLimiter, RateLimiterConfig};
pub use server::{create_router, AppState, RouterConfig, UploadResponse};
pub use storage::{ArtifactStore, LocalStore, S3Store};
