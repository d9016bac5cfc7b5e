mod azure;
mod backend;
mod blob;
mod gcp;
mod local;
pub mod retention;
mod s3;

pub use azure::AzureBlobBackend;
pub use backend::StorageBackend;
pub use gcp::GcpBackend;
pub use local::LocalBackend;
pub use s3::S3Backend;

use crate::config::{StorageConfig, StorageKind};
use crate::error::{BackupError, Result};
use tracing::info;

/// Builds the backend for one configured storage kind.
pub async fn create_backend(config: &StorageConfig, kind: StorageKind) -> Result<Box<dyn StorageBackend>> {
    let missing = || BackupError::Config(format!("{} storage is not configured", kind));

    let backend: Box<dyn StorageBackend> = match kind {
        StorageKind::Azure => Box::new(AzureBlobBackend::new(config.azure.as_ref().ok_or_else(missing)?)?),
        StorageKind::S3 => Box::new(S3Backend::new(config.s3.as_ref().ok_or_else(missing)?).await?),
        StorageKind::Gcp => Box::new(GcpBackend::new(config.gcp.as_ref().ok_or_else(missing)?)?),
        StorageKind::Local => Box::new(LocalBackend::new(config.local.as_ref().ok_or_else(missing)?)?),
    };

    info!("Found storage option: {}", kind);
    Ok(backend)
}

/// Builds every configured backend, in selection order.
pub async fn create_backends(config: &StorageConfig) -> Result<Vec<Box<dyn StorageBackend>>> {
    let mut backends = Vec::new();
    for kind in config.kinds() {
        backends.push(create_backend(config, kind).await?);
    }
    Ok(backends)
}
