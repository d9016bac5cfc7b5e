use super::backend::StorageBackend;
use super::blob::BlobStore;
use crate::config::GcpConfig;
use crate::error::{BackupError, Result};
use async_trait::async_trait;
use bytes::Bytes;
use object_store::gcp::GoogleCloudStorageBuilder;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

const NAME: &str = "GCP";

/// Objects in a Google Cloud Storage bucket.
pub struct GcpBackend {
    blobs: BlobStore,
}

#[derive(Debug, Serialize)]
struct ServiceAccountKey<'a> {
    #[serde(rename = "type")]
    key_type: &'a str,
    project_id: &'a str,
    private_key_id: &'a str,
    private_key: String,
    client_email: &'a str,
    client_id: &'a str,
    auth_uri: &'a str,
    token_uri: &'a str,
    auth_provider_x509_cert_url: &'a str,
    universe_domain: &'a str,
}

/// Builds a service-account key document from individually configured
/// fields. Returns `None` unless every field is present.
fn assemble_service_account_key(config: &GcpConfig) -> Result<Option<String>> {
    let (Some(project_id), Some(private_key_id), Some(private_key), Some(client_email), Some(client_id)) = (
        config.project_id.as_deref(),
        config.private_key_id.as_deref(),
        config.private_key.as_deref(),
        config.client_email.as_deref(),
        config.client_id.as_deref(),
    ) else {
        return Ok(None);
    };

    let key = ServiceAccountKey {
        key_type: "service_account",
        project_id,
        private_key_id,
        // Keys passed through env/config usually carry escaped newlines.
        private_key: private_key.replace("\\n", "\n"),
        client_email,
        client_id,
        auth_uri: "https://accounts.google.com/o/oauth2/auth",
        token_uri: "https://oauth2.googleapis.com/token",
        auth_provider_x509_cert_url: "https://www.googleapis.com/oauth2/v1/certs",
        universe_domain: "googleapis.com",
    };

    serde_json::to_string(&key)
        .map(Some)
        .map_err(|e| BackupError::Config(format!("failed to encode GCP credentials: {}", e)))
}

impl GcpBackend {
    pub fn new(config: &GcpConfig) -> Result<Self> {
        if config.bucket.is_empty() {
            return Err(BackupError::Config("GCP storage needs a bucket".to_string()));
        }

        let mut builder = GoogleCloudStorageBuilder::new().with_bucket_name(&config.bucket);

        if let Some(path) = &config.creds_file {
            debug!("Using GCP credentials file {}", path.display());
            builder = builder.with_service_account_path(path.to_string_lossy());
        } else if let Some(key) = assemble_service_account_key(config)? {
            builder = builder.with_service_account_key(key);
        } else {
            info!("No GCP credentials configured, using application default credentials");
        }

        let store = builder
            .build()
            .map_err(|e| BackupError::Config(format!("failed to create GCP storage client: {}", e)))?;

        Ok(Self {
            blobs: BlobStore::new(Arc::new(store), NAME),
        })
    }
}

#[async_trait]
impl StorageBackend for GcpBackend {
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
