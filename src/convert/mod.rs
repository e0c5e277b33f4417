//! Conversion pipeline.
//!
//! This module turns one uploaded image into several output formats at once,
//! remembers what it already produced, and keeps usage totals.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │              HTTP Handlers              │
//! └────────────────────┬────────────────────┘
//!                      │ ConversionRequest
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │         ConversionOrchestrator          │
//! │  ┌──────────────┐  ┌─────────────────┐  │
//! │  │ ResultCache  │  │ StatsAggregator │  │
//! │  │ (identity →  │  │ (bytes, images, │  │
//! │  │   result)    │  │   time)         │  │
//! │  └──────────────┘  └─────────────────┘  │
//! └──────────┬─────────────────────┬────────┘
//!            │                     │
//!            ▼                     ▼
//! ┌────────────────────┐ ┌───────────────────┐
//! │       Codec        │ │   ArtifactStore   │
//! └────────────────────┘ └───────────────────┘
//! ```
//!
//! # Components
//!
//! - [`ConversionOrchestrator`]: decodes once, encodes every format in parallel
//! - [`ResultCache`]: concurrent map from output identity to finished result
//! - [`StatsAggregator`]: lock-free running totals exposed by `GET /stats`
//! - [`ImageAsset`], [`ConversionRequest`]: what the client uploaded and asked for
//! - [`ConversionResult`], [`ConversionOutcome`]: what came back
//!
//! # Example
//!
//! ```
//! use tinyimg::convert::ResultCache;
//!
//! #[tokio::main]
//! async fn main() {
//!     let cache: ResultCache<String, u64> = ResultCache::new();
//!
//!     if cache.get(&"abc.webp".to_string()).await.is_none() {
//!         cache.set("abc.webp".to_string(), 1024).await;
//!     }
//!
//!     assert_eq!(cache.get(&"abc.webp".to_string()).await, Some(1024));
//! }
//! ```

mod cache;
mod orchestrator;
mod request;
mod stats;

pub use cache::ResultCache;
pub use orchestrator::{ConversionCache, ConversionOrchestrator};
pub use request::{
    content_hash, output_identity, ConversionOutcome, ConversionRequest, ConversionResult,
    FormatFailure, ImageAsset, MAX_REQUESTED_FORMATS,
};
pub use stats::{StatsAggregator, UsageStats};
