use crate::error::Result;
use async_trait::async_trait;
use bytes::Bytes;
use std::path::Path;

/// Archive lifecycle operations shared by every storage destination.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Stores `payload` under `object_name`, replacing any existing object.
    /// Returns the backend's version token (ETag or stored path).
    async fn upload(&self, object_name: &str, payload: Bytes) -> Result<String>;

    /// Writes the object to `destination`, creating parent directories.
    async fn download(&self, object_name: &str, destination: &Path) -> Result<()>;

    /// Returns `requested` if it exists, otherwise the most recently modified
    /// object. An empty `requested` always selects the latest object.
    async fn resolve_target_object_name(&self, requested: &str) -> Result<String>;

    /// Deletes every object older than `expiry_days`. Zero disables the sweep.
    async fn delete_expired(&self, expiry_days: u32) -> Result<()>;

    fn name(&self) -> &'static str;
}
