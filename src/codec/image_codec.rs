//! In-process codec built on the `image` crate.
//!
//! # Design Decisions
//!
//! - **Decode once, encode many**: the decoded pixels are shared behind an
//!   `Arc` so every requested format encodes from the same buffer.
//!
//! - **Blocking pool**: decoding and encoding are CPU bound and run on
//!   `spawn_blocking`, keeping the async workers free for I/O.
//!
//! - **WebP is lossless**: the `image` crate only ships a lossless WebP
//!   encoder. JPEG honours the configured quality, PNG the compression level.
//!
//! - **Atomic outputs**: encoded bytes land in a temporary sibling file and
//!   are renamed into place, so a concurrent download never reads a
//!   half-written file.

use std::io;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use clap::ValueEnum;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::codecs::webp::WebPEncoder;
use image::DynamicImage;

use super::format::OutputFormat;
use super::{Codec, DecodedImage, EncodedArtifact};
use crate::error::ConvertError;

/// Default JPEG quality (1-100).
pub const DEFAULT_JPEG_QUALITY: u8 = 80;

/// Minimum allowed JPEG quality.
pub const MIN_JPEG_QUALITY: u8 = 1;

/// Maximum allowed JPEG quality.
pub const MAX_JPEG_QUALITY: u8 = 100;

// =============================================================================
// Encode Options
// =============================================================================

/// PNG compression effort.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum PngCompression {
    /// Fastest encoding, larger files
    Fast,

    /// Balanced
    Default,

    /// Smallest files, slowest encoding
    #[default]
    Best,
}

impl PngCompression {
    fn compression_type(self) -> CompressionType {
        match self {
            PngCompression::Fast => CompressionType::Fast,
            PngCompression::Default => CompressionType::Default,
            PngCompression::Best => CompressionType::Best,
        }
    }
}

/// Quality configuration applied to every encode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodeOptions {
    /// JPEG quality (1-100)
    pub jpeg_quality: u8,

    /// PNG compression effort
    pub png_compression: PngCompression,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self {
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            png_compression: PngCompression::default(),
        }
    }
}

// =============================================================================
// Image Codec
// =============================================================================

/// Codec that decodes and encodes with the `image` crate.
///
/// # Example
///
/// ```ignore
/// use tinyimg::codec::{Codec, ImageCodec, OutputFormat};
///
/// let codec = ImageCodec::default();
/// let decoded = codec.decode(upload_bytes, "image/png").await?;
/// let artifact = codec
///     .encode(&decoded, OutputFormat::Webp, Path::new("output/abc.webp"))
///     .await?;
/// println!("{} bytes", artifact.size);
/// ```
#[derive(Debug, Clone, Default)]
pub struct ImageCodec {
    options: EncodeOptions,
}

impl ImageCodec {
    /// Create a codec with the given quality configuration.
    pub fn new(options: EncodeOptions) -> Self {
        Self { options }
    }

    /// The quality configuration in use.
    pub fn options(&self) -> EncodeOptions {
        self.options
    }
}

#[async_trait]
impl Codec for ImageCodec {
    async fn decode(&self, data: Bytes, mime: &str) -> Result<DecodedImage, ConvertError> {
        let source = OutputFormat::from_mime(mime).ok_or_else(|| ConvertError::Decode {
            message: format!("unsupported source type: {}", mime),
        })?;

        let pixels = tokio::task::spawn_blocking(move || {
            image::load_from_memory_with_format(&data, source.image_format())
        })
        .await
        .map_err(|e| ConvertError::Decode {
            message: e.to_string(),
        })?
        .map_err(|e| ConvertError::Decode {
            message: e.to_string(),
        })?;

        Ok(DecodedImage::new(pixels, source))
    }

    async fn encode(
        &self,
        image: &DecodedImage,
        format: OutputFormat,
        output: &Path,
    ) -> Result<EncodedArtifact, ConvertError> {
        let pixels = image.shared_pixels();
        let options = self.options;

        let encoded = tokio::task::spawn_blocking(move || encode_pixels(&pixels, format, options))
            .await
            .map_err(|e| ConvertError::Encode {
                format: format.to_string(),
                message: e.to_string(),
            })??;

        write_atomic(output, &encoded)
            .await
            .map_err(|e| ConvertError::Encode {
                format: format.to_string(),
                message: format!("failed to write {}: {}", output.display(), e),
            })?;

        Ok(EncodedArtifact {
            path: output.to_path_buf(),
            size: encoded.len() as u64,
        })
    }
}

/// Encode decoded pixels into the target format.
pub fn encode_pixels(
    pixels: &Arc<DynamicImage>,
    format: OutputFormat,
    options: EncodeOptions,
) -> Result<Vec<u8>, ConvertError> {
    let mut output = Vec::new();

    let result = match format {
        OutputFormat::Jpeg => {
            // JPEG has no alpha channel
            let quality = clamp_quality(options.jpeg_quality);
            DynamicImage::ImageRgb8(pixels.to_rgb8())
                .write_with_encoder(JpegEncoder::new_with_quality(&mut output, quality))
        }
        OutputFormat::Png => pixels.write_with_encoder(PngEncoder::new_with_quality(
            &mut output,
            options.png_compression.compression_type(),
            FilterType::Adaptive,
        )),
        OutputFormat::Webp => DynamicImage::ImageRgba8(pixels.to_rgba8())
            .write_with_encoder(WebPEncoder::new_lossless(&mut output)),
    };

    result.map_err(|e| ConvertError::Encode {
        format: format.to_string(),
        message: e.to_string(),
    })?;

    Ok(output)
}

static TEMP_SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Write `data` to `path` through a temporary file in the same directory.
///
/// Readers of `path` see either the previous file or the complete new one.
pub async fn write_atomic(path: &Path, data: &[u8]) -> io::Result<()> {
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("output");
    let temp = path.with_file_name(format!(
        ".{}.{}.{}.tmp",
        file_name,
        std::process::id(),
        TEMP_SEQUENCE.fetch_add(1, Ordering::Relaxed)
    ));

    let written = match tokio::fs::write(&temp, data).await {
        Ok(()) => tokio::fs::rename(&temp, path).await,
        Err(e) => Err(e),
    };

    if written.is_err() {
        let _ = tokio::fs::remove_file(&temp).await;
    }
    written
}

/// Validate JPEG quality parameter.
#[inline]
pub fn is_valid_quality(quality: u8) -> bool {
    (MIN_JPEG_QUALITY..=MAX_JPEG_QUALITY).contains(&quality)
}

/// Clamp quality to valid range.
#[inline]
pub fn clamp_quality(quality: u8) -> u8 {
    quality.clamp(MIN_JPEG_QUALITY, MAX_JPEG_QUALITY)
}
