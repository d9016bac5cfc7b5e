//! Archive lifecycle over an `object_store` client.
//!
//! Azure and GCP differ only in how the client is built and authenticated;
//! listing, transfer and the retention sweep go through this type.

use super::retention::{is_expired, LatestObject};
use crate::error::{BackupError, Result};
use bytes::Bytes;
use chrono::Utc;
use futures::StreamExt;
use object_store::path::Path as ObjectPath;
use object_store::{ObjectStore, PutPayload};
use std::path::Path;
use std::sync::Arc;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

pub struct BlobStore {
    store: Arc<dyn ObjectStore>,
    backend: &'static str,
}

impl BlobStore {
    pub fn new(store: Arc<dyn ObjectStore>, backend: &'static str) -> Self {
        Self { store, backend }
    }

    fn location(&self, object_name: &str) -> Result<ObjectPath> {
        ObjectPath::parse(object_name).map_err(|e| {
            BackupError::backend(self.backend, format!("invalid object name '{}': {}", object_name, e))
        })
    }

    fn map_err(&self, object_name: &str, err: object_store::Error) -> BackupError {
        match err {
            object_store::Error::NotFound { .. } => BackupError::NotFound(object_name.to_string()),
            other => BackupError::backend(self.backend, other.to_string()),
        }
    }

    pub async fn upload(&self, object_name: &str, payload: Bytes) -> Result<String> {
        let location = self.location(object_name)?;
        let size = payload.len();
        let result = self
            .store
            .put(&location, PutPayload::from(payload))
            .await
            .map_err(|e| BackupError::backend(self.backend, format!("failed to upload object: {}", e)))?;

        debug!("Uploaded {} bytes to {}", size, location);
        Ok(result.e_tag.or(result.version).unwrap_or_default())
    }

    pub async fn download(&self, object_name: &str, destination: &Path) -> Result<()> {
        let location = self.location(object_name)?;
        let result = self
            .store
            .get(&location)
            .await
            .map_err(|e| self.map_err(object_name, e))?;

        if let Some(parent) = destination.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut output = File::create(destination).await?;
        let mut stream = result.into_stream();
        let mut total = 0usize;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| {
                BackupError::backend(self.backend, format!("failed to download object: {}", e))
            })?;
            output.write_all(&chunk).await?;
            total += chunk.len();
        }
        output.flush().await?;

        info!("Downloaded {} bytes from {} to {}", total, location, destination.display());
        Ok(())
    }

    pub async fn resolve_target_object_name(&self, requested: &str) -> Result<String> {
        if !requested.is_empty() {
            let location = self.location(requested)?;
            match self.store.head(&location).await {
                Ok(_) => return Ok(requested.to_string()),
                Err(object_store::Error::NotFound { .. }) => {
                    warn!(
                        "Object {} not found in {}, falling back to the latest one",
                        requested, self.backend
                    );
                }
                Err(e) => {
                    return Err(BackupError::backend(
                        self.backend,
                        format!("failed to retrieve metadata: {}", e),
                    ))
                }
            }
        }

        let mut latest = LatestObject::default();
        let mut listing = self.store.list(None);
        while let Some(meta) = listing.next().await {
            let meta = meta
                .map_err(|e| BackupError::backend(self.backend, format!("failed to list objects: {}", e)))?;
            latest.observe(meta.location.to_string(), meta.last_modified);
        }

        latest
            .into_name()
            .ok_or_else(|| BackupError::NotFound(format!("no objects found in {}", self.backend)))
    }

    pub async fn delete_expired(&self, expiry_days: u32) -> Result<()> {
        if expiry_days == 0 {
            return Ok(());
        }

        let now = Utc::now();
        let mut listing = self.store.list(None);
        while let Some(meta) = listing.next().await {
            let meta = meta.map_err(|e| BackupError::sweep(self.backend, e.to_string()))?;
            if !is_expired(meta.last_modified, now, expiry_days) {
                continue;
            }
            match self.store.delete(&meta.location).await {
                Ok(()) => info!("Deleted object: {}", meta.location),
                Err(e) => warn!("Failed to delete object {}: {}", meta.location, e),
            }
        }

        Ok(())
    }
}
