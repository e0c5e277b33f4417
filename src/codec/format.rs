//! Image format tags and MIME detection.
//!
//! Upload detection works on magic bytes, never on the client-supplied file
//! name or content type. Requested output tags are case-insensitive and
//! accept `jpeg` as an alias of `jpg`.

use image::ImageFormat;

// =============================================================================
// OutputFormat
// =============================================================================

/// An image format the service can decode from and encode to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputFormat {
    /// JPEG (`.jpg`)
    Jpeg,

    /// PNG (`.png`)
    Png,

    /// WebP (`.webp`)
    Webp,
}

impl OutputFormat {
    /// All supported formats, in the order they are advertised.
    pub const ALL: [OutputFormat; 3] = [OutputFormat::Jpeg, OutputFormat::Png, OutputFormat::Webp];

    /// Parse a requested format tag such as `"webp"` or `" JPEG "`.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag.trim().to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => Some(OutputFormat::Jpeg),
            "png" => Some(OutputFormat::Png),
            "webp" => Some(OutputFormat::Webp),
            _ => None,
        }
    }

    /// Map a detected MIME type to a format.
    pub fn from_mime(mime: &str) -> Option<Self> {
        match mime.trim().to_ascii_lowercase().as_str() {
            "image/jpeg" | "image/jpg" | "image/.jpg" => Some(OutputFormat::Jpeg),
            "image/png" => Some(OutputFormat::Png),
            "image/webp" => Some(OutputFormat::Webp),
            _ => None,
        }
    }

    /// Map a file extension (with or without the leading dot) to a format.
    pub fn from_extension(ext: &str) -> Option<Self> {
        Self::from_tag(ext.trim_start_matches('.'))
    }

    /// Canonical file extension, without the dot.
    pub const fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "jpg",
            OutputFormat::Png => "png",
            OutputFormat::Webp => "webp",
        }
    }

    /// MIME type used when serving artifacts of this format.
    pub const fn mime_type(&self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "image/jpeg",
            OutputFormat::Png => "image/png",
            OutputFormat::Webp => "image/webp",
        }
    }

    pub(crate) const fn image_format(&self) -> ImageFormat {
        match self {
            OutputFormat::Jpeg => ImageFormat::Jpeg,
            OutputFormat::Png => ImageFormat::Png,
            OutputFormat::Webp => ImageFormat::WebP,
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}

// =============================================================================
// Detection
// =============================================================================

/// Detect the MIME type of an uploaded file from its magic bytes.
///
/// Returns `None` when the bytes do not look like any image format.
pub fn detect_mime(data: &[u8]) -> Option<&'static str> {
    image::guess_format(data).ok().map(|f| f.to_mime_type())
}

/// Whether a MIME type names an image.
pub fn is_image_mime(mime: &str) -> bool {
    mime.to_ascii_lowercase().starts_with("image/")
}

/// Content type for a served file, based on its extension.
pub fn content_type_for(file_name: &str) -> &'static str {
    let ext = file_name.rsplit_once('.').map(|(_, ext)| ext).unwrap_or("");
    match ext.to_ascii_lowercase().as_str() {
        "gif" => "image/gif",
        other => OutputFormat::from_extension(other)
            .map(|f| f.mime_type())
            .unwrap_or("application/octet-stream"),
    }
}
