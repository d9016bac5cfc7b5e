use super::backend::StorageBackend;
use super::blob::BlobStore;
use crate::config::AzureConfig;
use crate::error::{BackupError, Result};
use async_trait::async_trait;
use bytes::Bytes;
use object_store::azure::MicrosoftAzureBuilder;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

const NAME: &str = "Azure";

/// Block blobs in one Azure Storage container, shared-key authenticated.
pub struct AzureBlobBackend {
    blobs: BlobStore,
}

impl AzureBlobBackend {
    pub fn new(config: &AzureConfig) -> Result<Self> {
        if config.account_name.is_empty() || config.container_name.is_empty() {
            return Err(BackupError::Config(
                "Azure storage needs account_name and container_name".to_string(),
            ));
        }

        let mut builder = MicrosoftAzureBuilder::new()
            .with_account(&config.account_name)
            .with_access_key(&config.account_key)
            .with_container_name(&config.container_name);

        if let Some(endpoint) = &config.endpoint {
            debug!("Using custom Azure endpoint {}", endpoint);
            builder = builder
                .with_endpoint(endpoint.clone())
                .with_allow_http(endpoint.starts_with("http://"));
        }

        let store = builder
            .build()
            .map_err(|e| BackupError::Config(format!("failed to create blob container client: {}", e)))?;

        Ok(Self {
            blobs: BlobStore::new(Arc::new(store), NAME),
        })
    }
}

#[async_trait]
impl StorageBackend for AzureBlobBackend {
    async fn upload(&self, object_name: &str, payload: Bytes) -> Result<String> {
        self.blobs.upload(object_name, payload).await
    }

    async fn download(&self, object_name: &str, destination: &Path) -> Result<()> {
        self.blobs.download(object_name, destination).await
    }

    async fn resolve_target_object_name(&self, requested: &str) -> Result<String> {
        self.blobs.resolve_target_object_name(requested).await
    }

    async fn delete_expired(&self, expiry_days: u32) -> Result<()> {
        self.blobs.delete_expired(expiry_days).await
    }

    fn name(&self) -> &'static str {
        NAME
    }
}
