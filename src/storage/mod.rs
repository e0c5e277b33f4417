//! Artifact storage.
//!
//! After a format is encoded, the orchestrator hands the file to an
//! [`ArtifactStore`] and gets back the URL clients should download it from.
//! Storage failures never fail a conversion: the orchestrator logs them and
//! falls back to the URL this process serves itself (see [`local_image_url`]).
//!
//! - [`LocalStore`]: artifacts stay in the output directory and are served by
//!   `GET /image?f=<identity>`.
//! - [`S3Store`]: artifacts are uploaded to a bucket and handed out as
//!   presigned GET URLs.
//!
//! [`bundle_outputs`] zips produced files for the download-all endpoint.

mod archive;
mod local;
mod s3;

use std::path::Path;

use async_trait::async_trait;

use crate::error::StoreError;

pub use archive::{archive_name, bundle_outputs, Archive, MAX_ARCHIVE_FILES};
pub use local::LocalStore;
pub use s3::{create_s3_client, S3Store, DEFAULT_PRESIGN_TTL_SECS};

/// Persists produced artifacts and returns a retrieval URL for them.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Store the file at `path` under `identity` and return its URL.
    async fn store(&self, identity: &str, path: &Path) -> Result<String, StoreError>;

    /// Current URL of an identity that was stored earlier.
    ///
    /// Called on cache hits, so links that expire can be handed out fresh.
    async fn url(&self, identity: &str) -> Result<String, StoreError>;
}

/// URL of an artifact served by this process's `/image` endpoint.
pub fn local_image_url(base_url: &str, identity: &str) -> String {
    format!("{}/image?f={}", base_url.trim_end_matches('/'), identity)
}
