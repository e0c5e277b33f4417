//! S3-backed artifact store.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use tracing::debug;

use super::ArtifactStore;
use crate::codec::content_type_for;
use crate::error::StoreError;

/// Default lifetime of presigned download URLs (1 hour).
pub const DEFAULT_PRESIGN_TTL_SECS: u64 = 3600;

/// Uploads artifacts to S3 or an S3-compatible service (R2, MinIO, ...).
///
/// # Example
///
/// ```ignore
/// use tinyimg::storage::{create_s3_client, S3Store};
///
/// let client = create_s3_client(None, "us-east-1").await;
/// let store = S3Store::new(client, "optipic".to_string());
///
/// let url = store.store("abc.webp", Path::new("output/abc.webp")).await?;
/// ```
#[derive(Clone)]
pub struct S3Store {
    client: Client,
    bucket: String,
    prefix: Option<String>,
    presign_ttl: Duration,
}

impl S3Store {
    /// Create a store for the given bucket.
    pub fn new(client: Client, bucket: String) -> Self {
        Self {
            client,
            bucket,
            prefix: None,
            presign_ttl: Duration::from_secs(DEFAULT_PRESIGN_TTL_SECS),
        }
    }

    /// Store objects under `prefix/` inside the bucket.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        let trimmed = prefix.trim_matches('/');
        self.prefix = (!trimmed.is_empty()).then(|| trimmed.to_string());
        self
    }

    /// Set how long presigned URLs stay valid.
    pub fn with_presign_ttl(mut self, ttl: Duration) -> Self {
        self.presign_ttl = ttl;
        self
    }

    /// Get the bucket name.
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Object key for an artifact identity.
    pub fn key_for(&self, identity: &str) -> String {
        match &self.prefix {
            Some(prefix) => format!("{}/{}", prefix, identity),
            None => identity.to_string(),
        }
    }
}

#[async_trait]
impl ArtifactStore for S3Store {
    async fn store(&self, identity: &str, path: &Path) -> Result<String, StoreError> {
        let key = self.key_for(identity);
        debug!(bucket = %self.bucket, key = %key, "Uploading artifact");

        let body = ByteStream::from_path(path)
            .await
            .map_err(|e| StoreError::Io(format!("{}: {}", path.display(), e)))?;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(body)
            .content_type(content_type_for(identity))
            .content_disposition(format!("attachment; filename=\"{}\"", identity))
            .send()
            .await
            .map_err(|e| StoreError::S3(e.to_string()))?;

        self.url(identity).await
    }

    async fn url(&self, identity: &str) -> Result<String, StoreError> {
        let presigning =
            PresigningConfig::expires_in(self.presign_ttl).map_err(|e| StoreError::S3(e.to_string()))?;

        let presigned = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(self.key_for(identity))
            .presigned(presigning)
            .await
            .map_err(|e| StoreError::S3(e.to_string()))?;

        Ok(presigned.uri().to_string())
    }
}

/// Create an S3 client with optional custom endpoint and region.
///
/// Use a custom endpoint for S3-compatible services like MinIO or R2:
/// ```ignore
/// let client = create_s3_client(Some("http://localhost:9000"), "us-east-1").await;
/// ```
pub async fn create_s3_client(endpoint_url: Option<&str>, region: &str) -> Client {
    let region = aws_config::Region::new(region.to_string());
    let mut config_loader =
        aws_config::defaults(aws_config::BehaviorVersion::latest()).region(region);

    if let Some(endpoint) = endpoint_url {
        config_loader = config_loader.endpoint_url(endpoint);
    }

    let sdk_config = config_loader.load().await;

    // S3-compatible services usually need path-style addressing
    let s3_config = if endpoint_url.is_some() {
        aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(true)
            .build()
    } else {
        aws_sdk_s3::config::Builder::from(&sdk_config).build()
    };

    Client::from_conf(s3_config)
}
