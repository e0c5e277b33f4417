//! Codec layer.
//!
//! A [`Codec`] turns uploaded bytes into pixels and pixels into an encoded
//! file on disk. The conversion orchestrator only talks to this trait, so the
//! in-process [`ImageCodec`] can be swapped for a wrapper around external
//! optimizer binaries without touching the pipeline.
//!
//! ```text
//! ┌──────────────┐  decode(bytes, mime)  ┌──────────────┐
//! │ Orchestrator │ ────────────────────▶ │    Codec     │
//! │              │ ◀──────────────────── │              │
//! │              │     DecodedImage      │ (ImageCodec) │
//! │              │                       │              │
//! │   N jobs     │ encode(img, fmt, out) │              │
//! │  in parallel │ ────────────────────▶ │              │
//! └──────────────┘   EncodedArtifact     └──────────────┘
//! ```

mod format;
mod image_codec;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use image::DynamicImage;

use crate::error::ConvertError;

pub use format::{content_type_for, detect_mime, is_image_mime, OutputFormat};
pub use image_codec::{
    clamp_quality, encode_pixels, is_valid_quality, write_atomic, EncodeOptions, ImageCodec,
    PngCompression, DEFAULT_JPEG_QUALITY, MAX_JPEG_QUALITY, MIN_JPEG_QUALITY,
};

// =============================================================================
// Codec Trait
// =============================================================================

/// Decode/encode capability used by the conversion pipeline.
///
/// Implementations must be safe to call concurrently for different formats
/// on the same [`DecodedImage`].
#[async_trait]
pub trait Codec: Send + Sync + 'static {
    /// Decode raw upload bytes of the given MIME type.
    async fn decode(&self, data: Bytes, mime: &str) -> Result<DecodedImage, ConvertError>;

    /// Encode `image` as `format`, writing the result to `output`.
    async fn encode(
        &self,
        image: &DecodedImage,
        format: OutputFormat,
        output: &Path,
    ) -> Result<EncodedArtifact, ConvertError>;
}

// =============================================================================
// Decoded Image
// =============================================================================

/// A decoded image, cheap to clone and share between encode jobs.
#[derive(Debug, Clone)]
pub struct DecodedImage {
    pixels: Arc<DynamicImage>,
    source: OutputFormat,
}

impl DecodedImage {
    /// Wrap decoded pixels together with the format they were decoded from.
    pub fn new(pixels: DynamicImage, source: OutputFormat) -> Self {
        Self {
            pixels: Arc::new(pixels),
            source,
        }
    }

    /// The decoded pixel buffer.
    pub fn pixels(&self) -> &DynamicImage {
        &self.pixels
    }

    /// A shared handle to the pixel buffer, for moving into blocking tasks.
    pub fn shared_pixels(&self) -> Arc<DynamicImage> {
        Arc::clone(&self.pixels)
    }

    /// Format of the uploaded source.
    pub fn source_format(&self) -> OutputFormat {
        self.source
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.pixels.height()
    }
}

/// A file produced by [`Codec::encode`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedArtifact {
    /// Where the encoded file was written
    pub path: PathBuf,

    /// Size of the encoded file in bytes
    pub size: u64,
}
