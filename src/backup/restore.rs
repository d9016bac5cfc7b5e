use crate::backup::compression::extract_tar_gz;
use crate::backup::naming::strip_archive_extension;
use crate::backup::Shutdown;
use crate::config::AppConfig;
use crate::database::args::{restore_args, shell_args};
use crate::database::updates::{load_updates, update_script, UpdateSpec};
use crate::database::{DatabaseTool, ToolReport};
use crate::error::{BackupError, Result};
use crate::notify::{notify_all, Notifier, Operation, RunResult};
use crate::storage::StorageBackend;
use chrono_tz::Tz;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

/// Fetches an archive from one backend and feeds it to the restore tool.
pub struct RestoreJob<'a> {
    config: &'a AppConfig,
    tool: &'a dyn DatabaseTool,
    shell: Option<&'a dyn DatabaseTool>,
    backend: &'a dyn StorageBackend,
    notifiers: &'a [Box<dyn Notifier>],
    tz: Tz,
    shutdown: Shutdown,
}

impl<'a> RestoreJob<'a> {
    pub fn new(
        config: &'a AppConfig,
        tool: &'a dyn DatabaseTool,
        backend: &'a dyn StorageBackend,
        notifiers: &'a [Box<dyn Notifier>],
        tz: Tz,
        shutdown: Shutdown,
    ) -> Self {
        Self {
            config,
            tool,
            shell: None,
            backend,
            notifiers,
            tz,
            shutdown,
        }
    }

    /// Tool that applies configured post-restore updates.
    pub fn with_update_tool(mut self, shell: &'a dyn DatabaseTool) -> Self {
        self.shell = Some(shell);
        self
    }

    /// Restores `requested`, or the latest archive when it is empty or missing.
    pub async fn run(&self, requested: &str) -> Result<ToolReport> {
        let mut artifacts = Vec::new();
        let outcome = self.execute(requested, &mut artifacts).await;

        if self.config.keep {
            info!("Keeping restore artifacts in {}", self.config.restore.restore_path.display());
        } else {
            cleanup(&artifacts).await;
        }

        let result = match &outcome {
            Ok((object_name, _)) => RunResult::success(object_name.clone()),
            Err(e) => {
                error!("Restore failed: {}", e);
                RunResult::failure(e.to_string())
            }
        }
        .with_operation(Operation::Restore);
        notify_all(self.notifiers, &result, self.tz).await;

        outcome.map(|(_, report)| report)
    }

    async fn execute(&self, requested: &str, artifacts: &mut Vec<PathBuf>) -> Result<(String, ToolReport)> {
        let updates = load_updates(&self.config.restore)?;
        if !updates.is_empty() && self.shell.is_none() {
            return Err(BackupError::Config("updates configured without an update tool".to_string()));
        }

        let object_name = self.backend.resolve_target_object_name(requested).await?;
        if !requested.is_empty() && object_name != requested {
            warn!("{} not found on {}, using latest archive {}", requested, self.backend.name(), object_name);
        }

        let restore_root = &self.config.restore.restore_path;
        let downloaded = archive_path(restore_root, &object_name);
        artifacts.push(downloaded.clone());
        info!("Downloading {} from {}", object_name, self.backend.name());
        self.backend.download(&object_name, &downloaded).await?;

        let extract_dir = restore_root.join(strip_archive_extension(&object_name));
        artifacts.push(extract_dir.clone());
        let (source, dest) = (downloaded, extract_dir.clone());
        tokio::task::spawn_blocking(move || extract_tar_gz(&source, &dest))
            .await
            .map_err(|e| BackupError::Archive(format!("extract task failed: {}", e)))??;

        let args = restore_args(&self.config.restore, &extract_dir);
        let report = self.tool.run(&args, &self.shutdown).await?;
        info!(
            "{} document(s) restored successfully. {} document(s) failed to restore.",
            report.successes, report.failures
        );

        if !updates.is_empty() {
            self.apply_updates(&updates).await?;
        }

        Ok((object_name, report))
    }

    async fn apply_updates(&self, updates: &[UpdateSpec]) -> Result<()> {
        let Some(shell) = self.shell else {
            return Ok(());
        };
        info!("Applying {} update(s) with {}", updates.len(), shell.tool_name());

        let script = update_script(updates, self.config.restore.db.as_deref())?;
        let report = shell.run(&shell_args(&self.config.restore, &script), &self.shutdown).await?;
        info!("Updates finished: {} document(s) modified", report.successes);
        Ok(())
    }
}

async fn cleanup(artifacts: &[PathBuf]) {
    for path in artifacts {
        let removed = if path.is_dir() {
            tokio::fs::remove_dir_all(path).await
        } else if path.exists() {
            tokio::fs::remove_file(path).await
        } else {
            continue;
        };
        if let Err(e) = removed {
            warn!("Failed to remove {}: {}", path.display(), e);
        }
    }
}

/// Where a downloaded archive lands under the restore directory.
pub fn archive_path(restore_root: &Path, object_name: &str) -> PathBuf {
    restore_root.join(object_name.rsplit('/').next().unwrap_or(object_name))
}
