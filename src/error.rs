use thiserror::Error;

/// Errors raised while converting an uploaded image.
///
/// `Decode`, `EmptyRequest` and `TooManyFormats` are fatal to a whole
/// request. Every other
/// variant is attached to a single requested format and never aborts the
/// sibling formats of the same request.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConvertError {
    /// The uploaded bytes could not be decoded into an image
    #[error("Failed to decode image: {message}")]
    Decode { message: String },

    /// The requested output format is not one we can encode
    #[error("Unsupported format: {format}")]
    UnsupportedFormat { format: String },

    /// The codec failed to produce the requested format
    #[error("Failed to encode {format}: {message}")]
    Encode { format: String, message: String },

    /// The codec did not finish within the configured deadline
    #[error("Encoding {format} timed out after {after_ms}ms")]
    Timeout { format: String, after_ms: u64 },

    /// A conversion request must name at least one format
    #[error("No output formats requested")]
    EmptyRequest,

    /// The request named more formats than a single upload may ask for
    #[error("Too many formats requested: {requested} (max {max})")]
    TooManyFormats { requested: usize, max: usize },
}

impl ConvertError {
    /// Whether this error fails the entire request rather than one format.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ConvertError::Decode { .. }
                | ConvertError::EmptyRequest
                | ConvertError::TooManyFormats { .. }
        )
    }
}

/// Errors from the artifact store.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// Local filesystem error while reading the artifact
    #[error("I/O error: {0}")]
    Io(String),

    /// Error from S3 or S3-compatible storage
    #[error("S3 error: {0}")]
    S3(String),

    /// Building a zip archive failed
    #[error("Archive error: {0}")]
    Archive(String),
}

/// Admission control errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LimitError {
    /// The client has exhausted its token bucket
    #[error("Rate limit exceeded for {client}")]
    RateLimited { client: String },
}

/// Errors raised by the HTTP layer before or around a conversion.
#[derive(Debug, Error)]
pub enum RequestError {
    /// The multipart body was malformed or missing the `file` field
    #[error("Invalid upload: {0}")]
    InvalidUpload(String),

    /// A JSON request body was malformed or unusable
    #[error("Invalid request body: {0}")]
    InvalidBody(String),

    /// The upload exceeded the configured body limit
    #[error("Upload exceeds the maximum size")]
    PayloadTooLarge,

    /// The uploaded bytes are not a recognisable image
    #[error("Uploaded file is not an image")]
    NotAnImage,

    /// The requested file name is empty or escapes the output directory
    #[error("Invalid file name: {0}")]
    InvalidFileName(String),

    /// No produced file has this name
    #[error("File not found: {0}")]
    NotFound(String),

    /// Reading a produced file failed
    #[error("I/O error: {0}")]
    Io(String),

    /// The conversion itself failed
    #[error(transparent)]
    Convert(#[from] ConvertError),

    /// Reading or bundling stored files failed
    #[error(transparent)]
    Store(#[from] StoreError),
}
