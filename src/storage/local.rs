use std::path::Path;

use async_trait::async_trait;

use super::{local_image_url, ArtifactStore};
use crate::error::StoreError;

/// Keeps artifacts in the output directory and serves them over HTTP.
#[derive(Debug, Clone)]
pub struct LocalStore {
    base_url: String,
}

impl LocalStore {
    /// Create a store whose URLs start with `base_url`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }

    /// Public base URL of this server.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl ArtifactStore for LocalStore {
    async fn store(&self, identity: &str, path: &Path) -> Result<String, StoreError> {
        // The file is already where the /image endpoint looks for it
        tokio::fs::metadata(path)
            .await
            .map_err(|e| StoreError::Io(format!("{}: {}", path.display(), e)))?;

        Ok(local_image_url(&self.base_url, identity))
    }

    async fn url(&self, identity: &str) -> Result<String, StoreError> {
        Ok(local_image_url(&self.base_url, identity))
    }
}
