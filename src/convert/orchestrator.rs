//! Conversion orchestrator.
//!
//! Takes one uploaded image and the list of formats the client asked for, and
//! produces one result slot per requested format.
//!
//! # Pipeline
//!
//! ```text
//!                       ┌─────────────┐
//!   ConversionRequest ─▶│   decode    │── error ──▶ Err(Decode)  (no jobs run)
//!                       └──────┬──────┘
//!             ┌────────────────┼────────────────┐
//!             ▼                ▼                ▼
//!        ┌─────────┐      ┌─────────┐      ┌─────────┐
//!        │ job[0]  │      │ job[1]  │ ...  │ job[k]  │   one tokio task per
//!        │         │      │         │      │         │   distinct format
//!        │ cache?  │      │ cache?  │      │ cache?  │
//!        │ encode  │      │ encode  │      │ encode  │
//!        │ store   │      │ store   │      │ store   │
//!        └────┬────┘      └────┬────┘      └────┬────┘
//!             └────────────────┼────────────────┘
//!                              ▼
//!                join all, fill slot[i] from its job
//!                              │
//!                              ▼
//!                 ConversionOutcome + StatsAggregator
//! ```
//!
//! Slots are written by index after the join, so the output order always
//! matches the request order no matter which job finishes first. Tags that
//! name the same output (`png,png` or `jpg,jpeg`) share one job and every
//! such slot gets a copy of its result. A failing or panicking job only fails
//! the slots that asked for its format.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::codec::{Codec, DecodedImage, EncodedArtifact, OutputFormat};
use crate::error::ConvertError;
use crate::storage::{local_image_url, ArtifactStore, LocalStore};

use super::cache::ResultCache;
use super::request::{
    output_identity, ConversionOutcome, ConversionRequest, ConversionResult, FormatFailure,
};
use super::stats::StatsAggregator;

/// Cache of finished conversions, keyed by output identity.
pub type ConversionCache = ResultCache<String, ConversionResult>;

/// What one format job produced: the output identity and its result.
type JobResult = Result<(String, ConversionResult), ConvertError>;

/// Fans one decoded image out to every requested format and back.
///
/// The cache, stats, and store are shared with the rest of the process and
/// injected at construction.
///
/// # Example
///
/// ```ignore
/// use tinyimg::codec::ImageCodec;
/// use tinyimg::convert::{ConversionOrchestrator, ConversionRequest, ImageAsset};
///
/// let orchestrator =
///     ConversionOrchestrator::new(ImageCodec::default(), "output", "http://localhost:8080");
///
/// let asset = ImageAsset::detect(upload_bytes).unwrap();
/// let request = ConversionRequest::from_format_list(asset, "webp,png")?;
/// let outcome = orchestrator.convert(request).await?;
///
/// for result in outcome.successes() {
///     println!("{}: saved {} bytes", result.format, result.saved_bytes);
/// }
/// ```
pub struct ConversionOrchestrator<C: Codec> {
    codec: Arc<C>,
    cache: Arc<ConversionCache>,
    stats: Arc<StatsAggregator>,
    store: Arc<dyn ArtifactStore>,
    output_dir: PathBuf,
    base_url: String,
    encode_timeout: Option<Duration>,
}

impl<C: Codec> ConversionOrchestrator<C> {
    /// Create an orchestrator with its own cache and stats, storing artifacts
    /// locally in `output_dir`.
    pub fn new(codec: C, output_dir: impl Into<PathBuf>, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self {
            codec: Arc::new(codec),
            cache: Arc::new(ResultCache::new()),
            stats: Arc::new(StatsAggregator::new()),
            store: Arc::new(LocalStore::new(base_url.clone())),
            output_dir: output_dir.into(),
            base_url,
            encode_timeout: None,
        }
    }

    /// Use a shared result cache.
    pub fn with_cache(mut self, cache: Arc<ConversionCache>) -> Self {
        self.cache = cache;
        self
    }

    /// Use shared usage counters.
    pub fn with_stats(mut self, stats: Arc<StatsAggregator>) -> Self {
        self.stats = stats;
        self
    }

    /// Use a different artifact store.
    pub fn with_store(mut self, store: Arc<dyn ArtifactStore>) -> Self {
        self.store = store;
        self
    }

    /// Bound every encode call. A format that misses the deadline fails on
    /// its own; sibling formats are unaffected.
    pub fn with_encode_timeout(mut self, timeout: Duration) -> Self {
        self.encode_timeout = Some(timeout);
        self
    }

    /// The result cache.
    pub fn cache(&self) -> &Arc<ConversionCache> {
        &self.cache
    }

    /// The usage counters.
    pub fn stats(&self) -> &Arc<StatsAggregator> {
        &self.stats
    }

    /// Directory converted files are written to.
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Convert an asset into every requested format.
    ///
    /// # Errors
    ///
    /// Returns `ConvertError::Decode` if the upload cannot be decoded; no
    /// format is attempted in that case. Per-format failures are reported in
    /// [`ConversionOutcome::errors`] instead.
    pub async fn convert(
        &self,
        request: ConversionRequest,
    ) -> Result<ConversionOutcome, ConvertError> {
        let started = Instant::now();
        let (asset, formats) = request.into_parts();

        let image = self
            .codec
            .decode(asset.data.clone(), &asset.mime_type)
            .await
            .map_err(|e| {
                warn!(name = %asset.name, "Decode failed: {}", e);
                e
            })?;

        debug!(
            name = %asset.name,
            width = image.width(),
            height = image.height(),
            formats = ?formats,
            "Decoded upload"
        );

        let name = asset.name.clone();
        let stem: Arc<str> = Arc::from(asset.stem());
        let original_size = asset.size;
        drop(asset);

        // Repeated tags and aliases share one job per output format
        let mut jobs: Vec<OutputFormat> = Vec::new();
        let targets: Vec<Option<usize>> = formats
            .iter()
            .map(|tag| {
                let format = OutputFormat::from_tag(tag)?;
                let job = match jobs.iter().position(|f| *f == format) {
                    Some(job) => job,
                    None => {
                        jobs.push(format);
                        jobs.len() - 1
                    }
                };
                Some(job)
            })
            .collect();

        let handles: Vec<_> = jobs
            .iter()
            .map(|&format| {
                let this = self.clone();
                let image = image.clone();
                let stem = Arc::clone(&stem);
                tokio::spawn(async move {
                    this.run_job(&image, &stem, original_size, started, format)
                        .await
                })
            })
            .collect();

        // Jobs hold the remaining references; the pixels are freed as they finish
        drop(image);

        let mut finished: Vec<JobResult> = Vec::with_capacity(jobs.len());
        for (handle, format) in handles.into_iter().zip(&jobs) {
            finished.push(handle.await.unwrap_or_else(|e| {
                Err(ConvertError::Encode {
                    format: format.to_string(),
                    message: format!("conversion task failed: {}", e),
                })
            }));
        }

        let mut results: Vec<Option<ConversionResult>> = vec![None; formats.len()];
        let mut produced: Vec<Option<String>> = vec![None; formats.len()];
        let mut errors = Vec::new();

        for (index, (tag, target)) in formats.into_iter().zip(targets).enumerate() {
            let job = match target {
                Some(job) => &finished[job],
                None => {
                    warn!(name = %name, format = %tag, "Unsupported format requested");
                    errors.push(FormatFailure {
                        index,
                        error: ConvertError::UnsupportedFormat {
                            format: tag.clone(),
                        },
                        format: tag,
                    });
                    continue;
                }
            };

            match job {
                Ok((identity, result)) => {
                    results[index] = Some(result.clone());
                    produced[index] = Some(identity.clone());
                }
                Err(error) => {
                    warn!(name = %name, format = %tag, "Format failed: {}", error);
                    errors.push(FormatFailure {
                        index,
                        format: tag,
                        error: error.clone(),
                    });
                }
            }
        }

        let outcome = ConversionOutcome {
            results,
            files: produced.into_iter().flatten().collect(),
            errors,
        };

        self.stats.record_batch(outcome.successes());

        info!(
            name = %name,
            succeeded = outcome.success_count(),
            failed = outcome.errors.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Conversion finished"
        );

        Ok(outcome)
    }

    /// Produce a single format: cache lookup, encode, store, cache fill.
    ///
    /// A cache hit asks the store for a fresh URL. Cached entries never
    /// expire but presigned links do.
    async fn run_job(
        &self,
        image: &DecodedImage,
        stem: &str,
        original_size: u64,
        started: Instant,
        format: OutputFormat,
    ) -> JobResult {
        let identity = output_identity(stem, format);

        if let Some(mut cached) = self.cache.get(&identity).await {
            debug!(identity = %identity, "Cache hit");
            match self.store.url(&identity).await {
                Ok(url) => cached.image_url = url,
                Err(e) => warn!(identity = %identity, "Failed to refresh artifact URL: {}", e),
            }
            return Ok((identity, cached));
        }

        let output = self.output_dir.join(&identity);
        let artifact = self.encode(image, format, &output).await?;

        let time = started.elapsed().as_millis() as i64;
        let saved_bytes = original_size as i64 - artifact.size as i64;

        let (image_url, stored) = match self.store.store(&identity, &artifact.path).await {
            Ok(url) => (url, true),
            Err(e) => {
                warn!(identity = %identity, "Failed to store artifact, serving locally: {}", e);
                (local_image_url(&self.base_url, &identity), false)
            }
        };

        let result = ConversionResult {
            saved_bytes,
            new_size: artifact.size,
            time,
            image_url,
            format: format.extension().to_string(),
        };

        debug!(
            identity = %identity,
            new_size = artifact.size,
            saved_bytes,
            "Encoded"
        );

        // Unstored outputs are retried by the next request
        if stored {
            self.cache.set(identity.clone(), result.clone()).await;
        }

        Ok((identity, result))
    }

    async fn encode(
        &self,
        image: &DecodedImage,
        format: OutputFormat,
        output: &Path,
    ) -> Result<EncodedArtifact, ConvertError> {
        match self.encode_timeout {
            Some(limit) => tokio::time::timeout(limit, self.codec.encode(image, format, output))
                .await
                .map_err(|_| ConvertError::Timeout {
                    format: format.to_string(),
                    after_ms: limit.as_millis() as u64,
                })?,
            None => self.codec.encode(image, format, output).await,
        }
    }
}

impl<C: Codec> Clone for ConversionOrchestrator<C> {
    fn clone(&self) -> Self {
        Self {
            codec: Arc::clone(&self.codec),
            cache: Arc::clone(&self.cache),
            stats: Arc::clone(&self.stats),
            store: Arc::clone(&self.store),
            output_dir: self.output_dir.clone(),
            base_url: self.base_url.clone(),
            encode_timeout: self.encode_timeout,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
