use super::backend::StorageBackend;
use super::retention::{is_expired, LatestObject};
use crate::config::LocalConfig;
use crate::error::{BackupError, Result};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

const NAME: &str = "Local";

/// Archives kept as plain files under a root directory.
pub struct LocalBackend {
    root: PathBuf,
}

struct LocalFile {
    name: String,
    path: PathBuf,
    modified: DateTime<Utc>,
}

impl LocalBackend {
    pub fn new(config: &LocalConfig) -> Result<Self> {
        if config.path.as_os_str().is_empty() {
            return Err(BackupError::Config("local storage path is empty".to_string()));
        }
        std::fs::create_dir_all(&config.path)?;
        Ok(Self {
            root: config.path.clone(),
        })
    }

    /// Maps an object name to a file below the root. Absolute names and
    /// names with `..` are rejected.
    fn object_path(&self, object_name: &str) -> Result<PathBuf> {
        let relative = Path::new(object_name);
        let contained = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
        if object_name.is_empty() || !contained {
            return Err(BackupError::Config(format!(
                "object name '{}' is outside {}",
                object_name,
                self.root.display()
            )));
        }
        Ok(self.root.join(relative))
    }

    /// Every regular file below the root, with its modification time.
    async fn list_files(&self) -> Result<Vec<LocalFile>> {
        let root = self.root.clone();
        tokio::task::spawn_blocking(move || walk_files(&root))
            .await
            .map_err(|e| BackupError::backend(NAME, format!("directory walk aborted: {}", e)))?
    }
}

fn walk_files(root: &Path) -> Result<Vec<LocalFile>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root) {
        let entry = entry.map_err(|e| {
            BackupError::backend(NAME, format!("failed to walk {}: {}", root.display(), e))
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let metadata = entry.metadata().map_err(|e| {
            BackupError::backend(NAME, format!("failed to stat {}: {}", entry.path().display(), e))
        })?;
        let modified = metadata.modified()?;
        let name = entry
            .path()
            .strip_prefix(root)
            .unwrap_or(entry.path())
            .to_string_lossy()
            .replace('\\', "/");
        files.push(LocalFile {
            name,
            path: entry.path().to_path_buf(),
            modified: DateTime::<Utc>::from(modified),
        });
    }
    Ok(files)
}

#[async_trait]
impl StorageBackend for LocalBackend {
    async fn upload(&self, object_name: &str, payload: Bytes) -> Result<String> {
        let target = self.object_path(object_name)?;
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).await?;
        }

        fs::write(&target, &payload).await.map_err(|e| {
            BackupError::backend(NAME, format!("failed to write {}: {}", target.display(), e))
        })?;

        debug!("Stored {} bytes at {}", payload.len(), target.display());
        Ok(target.to_string_lossy().to_string())
    }

    async fn download(&self, object_name: &str, destination: &Path) -> Result<()> {
        let source = self.object_path(object_name)?;
        if !fs::try_exists(&source).await? {
            return Err(BackupError::NotFound(format!(
                "{} in {}",
                object_name,
                self.root.display()
            )));
        }

        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent).await?;
        }

        let mut reader = fs::File::open(&source).await?;
        let mut writer = fs::File::create(destination).await?;
        let copied = tokio::io::copy(&mut reader, &mut writer).await.map_err(|e| {
            BackupError::backend(NAME, format!("failed to copy {}: {}", source.display(), e))
        })?;

        info!("Copied {} bytes from {} to {}", copied, source.display(), destination.display());
        Ok(())
    }

    async fn resolve_target_object_name(&self, requested: &str) -> Result<String> {
        if !requested.is_empty() {
            if fs::metadata(self.object_path(requested)?)
                .await
                .map(|m| m.is_file())
                .unwrap_or(false)
            {
                return Ok(requested.to_string());
            }
            warn!("Archive {} not found locally, falling back to the latest one", requested);
        }

        let mut latest = LatestObject::default();
        for file in self.list_files().await? {
            latest.observe(file.name, file.modified);
        }

        latest
            .into_name()
            .ok_or_else(|| BackupError::NotFound(format!("no archives in {}", self.root.display())))
    }

    async fn delete_expired(&self, expiry_days: u32) -> Result<()> {
        if expiry_days == 0 {
            return Ok(());
        }

        let files = self
            .list_files()
            .await
            .map_err(|e| BackupError::sweep(NAME, e.to_string()))?;
        let now = Utc::now();

        for file in files {
            if !is_expired(file.modified, now, expiry_days) {
                continue;
            }
            match fs::remove_file(&file.path).await {
                Ok(()) => info!("Deleted file: {}", file.name),
                Err(e) => warn!("Failed to delete file {}: {}", file.name, e),
            }
        }

        Ok(())
    }

    fn name(&self) -> &'static str {
        NAME
    }
}
