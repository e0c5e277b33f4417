//! HTTP request handlers for the tinyimg API.
//!
//! # Endpoints
//!
//! - `POST /upload` - Convert an uploaded image into the requested formats
//! - `GET /image?f={identity}` - Download a converted file
//! - `POST /download-all` - Download several converted files as one zip
//! - `GET /stats` - Usage totals
//! - `GET /health` - Health check endpoint

use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    extract::{multipart::MultipartError, rejection::JsonRejection, Multipart, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::codec::{content_type_for, Codec};
use crate::convert::{
    ConversionOrchestrator, ConversionOutcome, ConversionRequest, ConversionResult, ImageAsset,
    UsageStats,
};
use crate::error::{ConvertError, LimitError, RequestError};
use crate::storage::{bundle_outputs, MAX_ARCHIVE_FILES};

// =============================================================================
// Application State
// =============================================================================

/// Shared application state containing the conversion orchestrator.
///
/// This is passed to all handlers via Axum's State extractor.
pub struct AppState<C: Codec> {
    /// The orchestrator handling conversions
    pub orchestrator: Arc<ConversionOrchestrator<C>>,

    /// Directory produced files are served from
    pub output_dir: PathBuf,
}

impl<C: Codec> AppState<C> {
    /// Create a new application state around an orchestrator.
    pub fn new(orchestrator: ConversionOrchestrator<C>) -> Self {
        let output_dir = orchestrator.output_dir().to_path_buf();
        Self {
            orchestrator: Arc::new(orchestrator),
            output_dir,
        }
    }
}

impl<C: Codec> Clone for AppState<C> {
    fn clone(&self) -> Self {
        Self {
            orchestrator: Arc::clone(&self.orchestrator),
            output_dir: self.output_dir.clone(),
        }
    }
}

// =============================================================================
// Request Parameters
// =============================================================================

/// Query parameters for the image endpoint.
#[derive(Debug, Deserialize)]
pub struct ImageQueryParams {
    /// Identity of the produced file, e.g. `"3a7b...c1.webp"`
    pub f: String,
}

/// Body of the download-all endpoint.
#[derive(Debug, Deserialize)]
pub struct DownloadAllRequest {
    /// Identities of produced files, as returned in `UploadResponse::files`
    pub files: Vec<String>,
}

// =============================================================================
// Response Types
// =============================================================================

/// JSON error response returned for all error conditions.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error type identifier (e.g., "not_found", "rate_limited")
    pub error: String,

    /// Human-readable error message
    pub message: String,

    /// HTTP status code (included for convenience)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

impl ErrorResponse {
    /// Create a new error response with status code.
    pub fn with_status(
        error: impl Into<String>,
        message: impl Into<String>,
        status: StatusCode,
    ) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            status: Some(status.as_u16()),
        }
    }
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Service status
    pub status: String,

    /// Service version
    pub version: String,
}

/// Response from the upload endpoint.
///
/// `data` has one entry per requested format, `null` where that format
/// failed. `errors` lists the failure messages in request order.
#[derive(Debug, Serialize)]
pub struct UploadResponse {
    /// Per-format results, aligned with the requested formats
    pub data: Vec<Option<ConversionResult>>,

    /// Identities of the files that were produced
    pub files: Vec<String>,

    /// One message per failed format
    pub errors: Vec<String>,
}

impl From<ConversionOutcome> for UploadResponse {
    fn from(outcome: ConversionOutcome) -> Self {
        let errors = outcome.error_messages();
        Self {
            data: outcome.results,
            files: outcome.files,
            errors,
        }
    }
}

// =============================================================================
// Error Mapping
// =============================================================================

/// Build a JSON error response, logging it by severity.
///
/// 5xx responses are logged at ERROR, 404s at DEBUG, other 4xx at WARN.
fn error_response(status: StatusCode, error_type: &str, message: String) -> Response {
    if status.is_server_error() {
        error!(
            error_type = error_type,
            status = status.as_u16(),
            "Server error: {}",
            message
        );
    } else if status == StatusCode::NOT_FOUND {
        debug!(
            error_type = error_type,
            status = status.as_u16(),
            "Resource not found: {}",
            message
        );
    } else {
        warn!(
            error_type = error_type,
            status = status.as_u16(),
            "Client error: {}",
            message
        );
    }

    let body = ErrorResponse::with_status(error_type, message, status);
    (status, Json(body)).into_response()
}

impl IntoResponse for ConvertError {
    fn into_response(self) -> Response {
        let (status, error_type) = match &self {
            ConvertError::Decode { .. } => (StatusCode::UNPROCESSABLE_ENTITY, "decode_error"),
            ConvertError::EmptyRequest => (StatusCode::BAD_REQUEST, "invalid_request"),
            ConvertError::TooManyFormats { .. } => (StatusCode::BAD_REQUEST, "too_many_formats"),
            ConvertError::UnsupportedFormat { .. } => {
                (StatusCode::BAD_REQUEST, "unsupported_format")
            }
            ConvertError::Encode { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "encode_error"),
            ConvertError::Timeout { .. } => (StatusCode::GATEWAY_TIMEOUT, "timeout"),
        };

        error_response(status, error_type, self.to_string())
    }
}

impl IntoResponse for LimitError {
    fn into_response(self) -> Response {
        error_response(StatusCode::TOO_MANY_REQUESTS, "rate_limited", self.to_string())
    }
}

impl IntoResponse for RequestError {
    fn into_response(self) -> Response {
        let message = self.to_string();
        let (status, error_type) = match self {
            RequestError::Convert(err) => return err.into_response(),
            RequestError::Store(_) => (StatusCode::INTERNAL_SERVER_ERROR, "storage_error"),
            RequestError::InvalidUpload(_) | RequestError::InvalidBody(_) => {
                (StatusCode::BAD_REQUEST, "invalid_request")
            }
            RequestError::PayloadTooLarge => (StatusCode::PAYLOAD_TOO_LARGE, "payload_too_large"),
            RequestError::NotAnImage => (StatusCode::BAD_REQUEST, "not_an_image"),
            RequestError::InvalidFileName(_) => (StatusCode::BAD_REQUEST, "invalid_file_name"),
            RequestError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            RequestError::Io(_) => (StatusCode::INTERNAL_SERVER_ERROR, "io_error"),
        };

        error_response(status, error_type, message)
    }
}

impl From<MultipartError> for RequestError {
    fn from(err: MultipartError) -> Self {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            RequestError::PayloadTooLarge
        } else {
            RequestError::InvalidUpload(err.body_text())
        }
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// Handle image uploads.
///
/// # Endpoint
///
/// `POST /upload` (multipart/form-data)
///
/// # Fields
///
/// - `file`: the image (required)
/// - `formats`: comma separated output formats, e.g. `jpg,webp`. Defaults to
///   the format of the upload.
///
/// # Response
///
/// ```json
/// {
///   "data": [{"savedBytes": 5120, "newSize": 2048, "time": 41,
///             "imageUrl": "http://localhost:8080/image?f=3a7b...c1.webp",
///             "format": "webp"}, null],
///   "files": ["3a7b...c1.webp"],
///   "errors": ["Unsupported format: bmp"]
/// }
/// ```
pub async fn upload_handler<C: Codec>(
    State(state): State<AppState<C>>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, RequestError> {
    let mut file: Option<Bytes> = None;
    let mut formats = String::new();

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("file") => file = Some(field.bytes().await?),
            Some("formats") => formats = field.text().await?,
            _ => {}
        }
    }

    let data = file.ok_or_else(|| RequestError::InvalidUpload("missing file field".to_string()))?;
    let asset = ImageAsset::detect(data).ok_or(RequestError::NotAnImage)?;

    info!(
        name = %asset.name,
        mime = %asset.mime_type,
        size = asset.size,
        formats = %formats,
        "Upload received"
    );

    let request = ConversionRequest::from_format_list(asset, &formats)?;
    let outcome = state.orchestrator.convert(request).await?;

    Ok(Json(UploadResponse::from(outcome)))
}

/// Serve a produced file from the output directory.
///
/// # Endpoint
///
/// `GET /image?f={identity}`
///
/// Names containing path separators or `..` are rejected.
pub async fn image_handler<C: Codec>(
    State(state): State<AppState<C>>,
    Query(query): Query<ImageQueryParams>,
) -> Result<Response, RequestError> {
    let name = query.f;
    if !is_safe_file_name(&name) {
        return Err(RequestError::InvalidFileName(name));
    }

    let path = state.output_dir.join(&name);
    let data = tokio::fs::read(&path).await.map_err(|e| match e.kind() {
        ErrorKind::NotFound => RequestError::NotFound(name.clone()),
        _ => RequestError::Io(format!("{}: {}", path.display(), e)),
    })?;

    // Identities are content addressed, so a name never changes content
    Ok((
        [
            (header::CONTENT_TYPE, content_type_for(&name)),
            (header::CACHE_CONTROL, "public, max-age=31536000, immutable"),
        ],
        data,
    )
        .into_response())
}

/// Bundle several produced files into one zip download.
///
/// # Endpoint
///
/// `POST /download-all` (application/json)
///
/// ```json
/// {"files": ["3a7b...c1.webp", "3a7b...c1.png"]}
/// ```
///
/// Files that no longer exist are left out. The archive is named after a
/// hash of the requested names.
pub async fn download_all_handler<C: Codec>(
    State(state): State<AppState<C>>,
    payload: Result<Json<DownloadAllRequest>, JsonRejection>,
) -> Result<Response, RequestError> {
    let Json(body) = payload.map_err(|e| RequestError::InvalidBody(e.body_text()))?;

    if body.files.is_empty() {
        return Err(RequestError::InvalidBody("no files requested".to_string()));
    }
    if body.files.len() > MAX_ARCHIVE_FILES {
        return Err(RequestError::InvalidBody(format!(
            "too many files: {} (max {})",
            body.files.len(),
            MAX_ARCHIVE_FILES
        )));
    }
    if let Some(name) = body.files.iter().find(|f| !is_safe_file_name(f)) {
        return Err(RequestError::InvalidFileName(name.clone()));
    }

    let archive = bundle_outputs(&state.output_dir, &body.files).await?;
    if archive.entries.is_empty() {
        return Err(RequestError::NotFound(archive.name));
    }

    Ok((
        [
            (header::CONTENT_TYPE, "application/zip".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", archive.name),
            ),
        ],
        archive.data,
    )
        .into_response())
}

/// Handle usage statistics requests.
///
/// # Endpoint
///
/// `GET /stats`
///
/// # Response
///
/// ```json
/// {"byteCount": 1048576, "imageCount": 42, "timeCount": 3120}
/// ```
pub async fn stats_handler<C: Codec>(State(state): State<AppState<C>>) -> Json<UsageStats> {
    Json(state.orchestrator.stats().snapshot())
}

/// Handle health check requests.
///
/// # Endpoint
///
/// `GET /health`
///
/// # Response
///
/// ```json
/// {
///   "status": "healthy",
///   "version": "0.1.0"
/// }
/// ```
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Whether `name` refers to a file directly inside the output directory.
pub fn is_safe_file_name(name: &str) -> bool {
    !name.is_empty() && !name.contains(['/', '\\']) && !name.contains("..")
}

// =============================================================================
// Tests
// =============================================================================
