//! Request and result types for the conversion pipeline.

use bytes::Bytes;
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::codec::{detect_mime, is_image_mime, OutputFormat};
use crate::error::ConvertError;

// =============================================================================
// Image Asset
// =============================================================================

/// An uploaded image, before decoding.
///
/// The name is content addressed (`sha256(data)` plus the source extension)
/// so two uploads of the same bytes map to the same output identities.
#[derive(Debug, Clone)]
pub struct ImageAsset {
    /// Raw uploaded bytes
    pub data: Bytes,

    /// MIME type detected from the bytes
    pub mime_type: String,

    /// Source format, if it is one we can decode
    pub format: Option<OutputFormat>,

    /// Display name, e.g. `"3a7bd3e2...c1.png"`
    pub name: String,

    /// Size of the upload in bytes
    pub size: u64,
}

impl ImageAsset {
    /// Build an asset from uploaded bytes and their detected MIME type.
    pub fn new(data: Bytes, mime_type: impl Into<String>) -> Self {
        let mime_type = mime_type.into();
        let format = OutputFormat::from_mime(&mime_type);
        let extension = match format {
            Some(f) => f.extension().to_string(),
            None => mime_subtype(&mime_type),
        };
        let name = format!("{}.{}", content_hash(&data), extension);
        let size = data.len() as u64;

        Self {
            data,
            mime_type,
            format,
            name,
            size,
        }
    }

    /// Build an asset, detecting the MIME type from magic bytes.
    ///
    /// Returns `None` if the bytes are not recognisable as an image.
    pub fn detect(data: Bytes) -> Option<Self> {
        let mime = detect_mime(&data).filter(|m| is_image_mime(m))?;
        Some(Self::new(data, mime))
    }

    /// The name without its extension; output identities are built from it.
    pub fn stem(&self) -> &str {
        self.name
            .split_once('.')
            .map(|(stem, _)| stem)
            .unwrap_or(&self.name)
    }

    /// Format tag used when the client does not ask for any.
    pub fn default_format_tag(&self) -> String {
        match self.format {
            Some(f) => f.extension().to_string(),
            None => mime_subtype(&self.mime_type),
        }
    }
}

/// Lowercase hex SHA-256 of the given bytes.
pub fn content_hash(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

fn mime_subtype(mime: &str) -> String {
    mime.rsplit('/')
        .next()
        .unwrap_or(mime)
        .trim_start_matches('.')
        .to_ascii_lowercase()
}

/// Output identity for a converted artifact: `"{stem}.{extension}"`.
pub fn output_identity(stem: &str, format: OutputFormat) -> String {
    format!("{}.{}", stem, format.extension())
}

// =============================================================================
// Conversion Request
// =============================================================================

/// Most format tags a single request may carry.
pub const MAX_REQUESTED_FORMATS: usize = 16;

/// An asset plus the ordered list of formats the client asked for.
///
/// Duplicate tags are allowed; each gets its own result slot. At most
/// [`MAX_REQUESTED_FORMATS`] tags are accepted.
#[derive(Debug, Clone)]
pub struct ConversionRequest {
    asset: ImageAsset,
    formats: Vec<String>,
}

impl ConversionRequest {
    /// Create a request. Fails if no formats, or more than
    /// [`MAX_REQUESTED_FORMATS`], are given.
    pub fn new(asset: ImageAsset, formats: Vec<String>) -> Result<Self, ConvertError> {
        if formats.is_empty() {
            return Err(ConvertError::EmptyRequest);
        }
        if formats.len() > MAX_REQUESTED_FORMATS {
            return Err(ConvertError::TooManyFormats {
                requested: formats.len(),
                max: MAX_REQUESTED_FORMATS,
            });
        }
        Ok(Self { asset, formats })
    }

    /// Parse a comma separated `formats` field.
    ///
    /// Empty entries are dropped. When nothing remains, the asset's own
    /// format is requested.
    pub fn from_format_list(asset: ImageAsset, formats: &str) -> Result<Self, ConvertError> {
        let mut requested: Vec<String> = formats
            .split(',')
            .map(str::trim)
            .filter(|f| !f.is_empty())
            .map(str::to_string)
            .collect();

        if requested.is_empty() {
            requested.push(asset.default_format_tag());
        }

        Self::new(asset, requested)
    }

    /// The uploaded asset.
    pub fn asset(&self) -> &ImageAsset {
        &self.asset
    }

    /// Requested format tags, in request order.
    pub fn formats(&self) -> &[String] {
        &self.formats
    }

    /// Split into the asset and the requested formats.
    pub fn into_parts(self) -> (ImageAsset, Vec<String>) {
        (self.asset, self.formats)
    }
}

// =============================================================================
// Conversion Result
// =============================================================================

/// Outcome of converting one asset into one format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionResult {
    /// `original size - new size`; negative when the output grew
    pub saved_bytes: i64,

    /// Size of the converted file in bytes
    pub new_size: u64,

    /// Milliseconds from request start until this format was ready
    pub time: i64,

    /// Where the client can fetch the converted file
    pub image_url: String,

    /// Canonical extension of the produced format (`jpg`, `png`, `webp`)
    pub format: String,
}

/// A requested format that could not be produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatFailure {
    /// Index of the format in the request
    pub index: usize,

    /// The requested format tag
    pub format: String,

    /// What went wrong
    pub error: ConvertError,
}

/// Everything a conversion request produced.
///
/// `results` has exactly one slot per requested format, in request order.
/// A `None` slot always has a matching entry in `errors`.
#[derive(Debug, Clone, Default)]
pub struct ConversionOutcome {
    /// Per-format results, aligned with the requested formats
    pub results: Vec<Option<ConversionResult>>,

    /// Identities of the outputs that were actually produced
    pub files: Vec<String>,

    /// One entry per failed format
    pub errors: Vec<FormatFailure>,
}

impl ConversionOutcome {
    /// Iterate over the successful results in request order.
    pub fn successes(&self) -> impl Iterator<Item = &ConversionResult> {
        self.results.iter().flatten()
    }

    /// Number of formats that converted successfully.
    pub fn success_count(&self) -> usize {
        self.successes().count()
    }

    /// Whether some, but not all, formats failed.
    pub fn is_partial(&self) -> bool {
        !self.errors.is_empty() && self.errors.len() < self.results.len()
    }

    /// Error messages in request order.
    pub fn error_messages(&self) -> Vec<String> {
        self.errors.iter().map(|f| f.error.to_string()).collect()
    }
}
