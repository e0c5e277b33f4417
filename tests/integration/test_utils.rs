//! Test utilities for integration tests.
//!
//! This module provides a mock codec that tracks its calls and helpers for
//! building image fixtures and multipart request bodies.

use async_trait::async_trait;
use bytes::Bytes;
use image::{ImageFormat, Rgb, RgbImage};
use std::collections::{HashMap, HashSet};
use std::io::Cursor;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tinyimg::codec::{Codec, DecodedImage, EncodedArtifact, OutputFormat};
use tinyimg::error::ConvertError;

// =============================================================================
// Mock Codec with Call Tracking
// =============================================================================

/// A codec that decodes for real but fakes encoding.
///
/// Encoding writes a fixed number of zero bytes per format, so saved-bytes
/// arithmetic is predictable. Formats can be made to fail or to stall.
pub struct MockCodec {
    decode_count: Arc<AtomicUsize>,
    encode_count: Arc<AtomicUsize>,
    sizes: HashMap<OutputFormat, usize>,
    failing: HashSet<OutputFormat>,
    delays: HashMap<OutputFormat, Duration>,
}

impl MockCodec {
    pub fn new() -> Self {
        Self {
            decode_count: Arc::new(AtomicUsize::new(0)),
            encode_count: Arc::new(AtomicUsize::new(0)),
            sizes: HashMap::from([
                (OutputFormat::Jpeg, 100),
                (OutputFormat::Png, 200),
                (OutputFormat::Webp, 50),
            ]),
            failing: HashSet::new(),
            delays: HashMap::new(),
        }
    }

    /// Make encoding `format` fail.
    pub fn failing(mut self, format: OutputFormat) -> Self {
        self.failing.insert(format);
        self
    }

    /// Make encoding `format` take at least `delay`.
    pub fn slow(mut self, format: OutputFormat, delay: Duration) -> Self {
        self.delays.insert(format, delay);
        self
    }

    /// Size in bytes of the fake output for `format`.
    pub fn output_size(&self, format: OutputFormat) -> usize {
        self.sizes[&format]
    }

    /// Shared handle to the encode counter, usable after the codec is moved.
    pub fn encode_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.encode_count)
    }

    /// Shared handle to the decode counter.
    pub fn decode_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.decode_count)
    }
}

impl Default for MockCodec {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Codec for MockCodec {
    async fn decode(&self, data: Bytes, mime: &str) -> Result<DecodedImage, ConvertError> {
        self.decode_count.fetch_add(1, Ordering::SeqCst);

        let source = OutputFormat::from_mime(mime).ok_or_else(|| ConvertError::Decode {
            message: format!("cannot decode {}", mime),
        })?;
        let pixels = image::load_from_memory(&data).map_err(|e| ConvertError::Decode {
            message: e.to_string(),
        })?;

        Ok(DecodedImage::new(pixels, source))
    }

    async fn encode(
        &self,
        _image: &DecodedImage,
        format: OutputFormat,
        output: &Path,
    ) -> Result<EncodedArtifact, ConvertError> {
        self.encode_count.fetch_add(1, Ordering::SeqCst);

        if let Some(delay) = self.delays.get(&format) {
            tokio::time::sleep(*delay).await;
        }

        if self.failing.contains(&format) {
            return Err(ConvertError::Encode {
                format: format.to_string(),
                message: "mock failure".to_string(),
            });
        }

        let size = self.output_size(format);
        tokio::fs::write(output, vec![0u8; size])
            .await
            .map_err(|e| ConvertError::Encode {
                format: format.to_string(),
                message: e.to_string(),
            })?;

        Ok(EncodedArtifact {
            path: output.to_path_buf(),
            size: size as u64,
        })
    }
}

// =============================================================================
// Image Fixtures
// =============================================================================

/// Encode a gradient image of the given size in `format`.
pub fn create_test_image(width: u32, height: u32, format: ImageFormat) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x * 255 / width) as u8, (y * 255 / height) as u8, 128])
    });

    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, format).unwrap();
    buf.into_inner()
}

/// A small PNG.
pub fn create_test_png() -> Vec<u8> {
    create_test_image(32, 32, ImageFormat::Png)
}

/// Bytes that carry a PNG signature but cannot be decoded.
pub fn create_corrupt_png() -> Vec<u8> {
    let mut data = vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
    data.extend_from_slice(&[0xAB; 64]);
    data
}

/// Check that the bytes start with the given format's magic.
pub fn is_format(data: &[u8], format: ImageFormat) -> bool {
    image::guess_format(data).map(|f| f == format).unwrap_or(false)
}

// =============================================================================
// Multipart Bodies
// =============================================================================

pub const BOUNDARY: &str = "tinyimg-test-boundary";

/// Content type header value for bodies built by [`multipart_body`].
pub fn multipart_content_type() -> String {
    format!("multipart/form-data; boundary={}", BOUNDARY)
}

/// Build a multipart body with an optional `file` and optional `formats`.
pub fn multipart_body(file: Option<&[u8]>, formats: Option<&str>) -> Vec<u8> {
    let mut body = Vec::new();

    if let Some(formats) = formats {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        body.extend_from_slice(b"Content-Disposition: form-data; name=\"formats\"\r\n\r\n");
        body.extend_from_slice(formats.as_bytes());
        body.extend_from_slice(b"\r\n");
    }

    if let Some(file) = file {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        body.extend_from_slice(
            b"Content-Disposition: form-data; name=\"file\"; filename=\"upload.bin\"\r\n",
        );
        body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
        body.extend_from_slice(file);
        body.extend_from_slice(b"\r\n");
    }

    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}
