use crate::backup::compression::{calculate_sha256, compress_dir_to_tar_gz};
use crate::backup::naming::ArchiveName;
use crate::backup::Shutdown;
use crate::config::AppConfig;
use crate::database::args::dump_args;
use crate::database::DatabaseTool;
use crate::error::{BackupError, Result};
use crate::notify::{notify_all, Notifier, RunResult};
use crate::storage::StorageBackend;
use bytes::Bytes;
use chrono_tz::Tz;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Idle,
    Dumping,
    Archiving,
    Publishing,
    CleaningUp,
    Notifying,
    Done,
    Failed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Idle => "idle",
            Stage::Dumping => "dumping",
            Stage::Archiving => "archiving",
            Stage::Publishing => "publishing",
            Stage::CleaningUp => "cleaning up",
            Stage::Notifying => "notifying",
            Stage::Done => "done",
            Stage::Failed => "failed",
        };
        f.write_str(name)
    }
}

#[derive(Debug)]
pub struct JobReport {
    /// `Done` or `Failed`.
    pub stage: Stage,
    /// Stage that was active when the run failed.
    pub failed_at: Option<Stage>,
    pub result: RunResult,
    pub duration_secs: u64,
}

impl JobReport {
    pub fn is_success(&self) -> bool {
        self.stage == Stage::Done
    }
}

/// Local artifacts of one run, removed during cleanup.
struct WorkPaths {
    dump_dir: PathBuf,
    tarball: PathBuf,
}

impl WorkPaths {
    fn new(root: &Path, name: &ArchiveName) -> Self {
        Self {
            dump_dir: root.join(name.stem()),
            tarball: root.join(name.file_name()),
        }
    }
}

/// One dump, archive, publish, notify cycle.
pub struct ArchiveJob<'a> {
    config: &'a AppConfig,
    tool: &'a dyn DatabaseTool,
    backends: &'a [Box<dyn StorageBackend>],
    notifiers: &'a [Box<dyn Notifier>],
    tz: Tz,
    shutdown: Shutdown,
    stage: Stage,
}

impl<'a> ArchiveJob<'a> {
    pub fn new(
        config: &'a AppConfig,
        tool: &'a dyn DatabaseTool,
        backends: &'a [Box<dyn StorageBackend>],
        notifiers: &'a [Box<dyn Notifier>],
        tz: Tz,
        shutdown: Shutdown,
    ) -> Self {
        Self {
            config,
            tool,
            backends,
            notifiers,
            tz,
            shutdown,
            stage: Stage::Idle,
        }
    }

    fn enter(&mut self, next: Stage) {
        info!("Archive job: {} -> {}", self.stage, next);
        self.stage = next;
    }

    pub async fn run(mut self) -> JobReport {
        self.run_named(ArchiveName::now()).await
    }

    pub async fn run_named(&mut self, name: ArchiveName) -> JobReport {
        let start = Instant::now();
        let paths = WorkPaths::new(&self.config.dump.dump_path, &name);

        let outcome = self.execute(&name, &paths).await;
        let failed_at = outcome.as_ref().err().map(|_| self.stage);

        if paths.dump_dir.exists() || paths.tarball.exists() {
            self.enter(Stage::CleaningUp);
            self.cleanup(&paths).await;
        }

        let result = match &outcome {
            Ok(file_name) => RunResult::success(file_name.clone()),
            Err(e) => {
                error!("Archive job failed while {}: {}", failed_at.unwrap_or(Stage::Idle), e);
                RunResult::failure(e.to_string())
            }
        };

        self.enter(Stage::Notifying);
        notify_all(self.notifiers, &result, self.tz).await;

        self.enter(if outcome.is_ok() { Stage::Done } else { Stage::Failed });
        JobReport {
            stage: self.stage,
            failed_at,
            result,
            duration_secs: start.elapsed().as_secs(),
        }
    }

    async fn execute(&mut self, name: &ArchiveName, paths: &WorkPaths) -> Result<String> {
        if self.backends.is_empty() {
            return Err(BackupError::Config("no storage backend configured".to_string()));
        }

        self.enter(Stage::Dumping);
        tokio::fs::create_dir_all(&paths.dump_dir).await?;
        let args = dump_args(&self.config.dump, &paths.dump_dir);
        let report = self.tool.run(&args, &self.shutdown).await?;
        info!(
            "{} finished: {} document(s) dumped",
            self.tool.tool_name(),
            report.successes
        );

        self.enter(Stage::Archiving);
        let (source, dest) = (paths.dump_dir.clone(), paths.tarball.clone());
        let checksum = tokio::task::spawn_blocking(move || {
            compress_dir_to_tar_gz(&source, &dest)?;
            calculate_sha256(&dest)
        })
        .await
        .map_err(|e| BackupError::Archive(format!("archive task failed: {}", e)))??;
        info!("Created {} (sha256 {})", name, checksum);

        self.enter(Stage::Publishing);
        let payload = Bytes::from(tokio::fs::read(&paths.tarball).await?);
        let object_name = name.file_name();
        for backend in self.backends {
            if let Err(e) = backend.delete_expired(self.config.storage.expiry_days).await {
                warn!("Retention sweep on {} failed: {}", backend.name(), e);
            }

            info!("Uploading {} to {}", object_name, backend.name());
            let version = backend.upload(&object_name, payload.clone()).await.map_err(|e| match e {
                e @ BackupError::Backend { .. } => e,
                other => BackupError::backend(backend.name(), other.to_string()),
            })?;
            info!("Uploaded {} to {} ({})", object_name, backend.name(), version);
        }

        Ok(object_name)
    }

    async fn cleanup(&self, paths: &WorkPaths) {
        if self.config.keep {
            info!(
                "Keeping {} and {}",
                paths.dump_dir.display(),
                paths.tarball.display()
            );
            return;
        }

        if paths.dump_dir.exists() {
            if let Err(e) = tokio::fs::remove_dir_all(&paths.dump_dir).await {
                warn!("Failed to remove {}: {}", paths.dump_dir.display(), e);
            }
        }
        if paths.tarball.exists() {
            if let Err(e) = tokio::fs::remove_file(&paths.tarball).await {
                warn!("Failed to remove {}: {}", paths.tarball.display(), e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backup::test_support::{FakeBackend, FakeTool, RecordingNotifier};
    use chrono::{TimeZone, Utc};
    use tempfile::tempdir;

    fn config(root: &Path) -> AppConfig {
        let mut config = AppConfig::default();
        config.dump.dump_path = root.to_path_buf();
        config.storage.expiry_days = 7;
        config
    }

    fn name() -> ArchiveName {
        ArchiveName::at(Utc.timestamp_millis_opt(1_700_000_000_000).unwrap())
    }

    #[tokio::test]
    async fn test_successful_run_publishes_everywhere() {
        let dir = tempdir().unwrap();
        let config = config(dir.path());
        let tool = FakeTool::default();
        let (first, second) = (FakeBackend::new("First"), FakeBackend::new("Second"));
        let (first_log, second_log) = (first.log(), second.log());
        let backends: Vec<Box<dyn StorageBackend>> = vec![Box::new(first), Box::new(second)];
        let notifier = RecordingNotifier::default();
        let received = notifier.received();
        let notifiers: Vec<Box<dyn Notifier>> = vec![Box::new(notifier)];

        let report = ArchiveJob::new(&config, &tool, &backends, &notifiers, Tz::UTC, Shutdown::new())
            .run_named(name())
            .await;

        assert!(report.is_success());
        let expected = "8299999999999-2023-11-14T221320.000Z.tar.gz";
        assert_eq!(report.result, RunResult::success(expected));
        for log in [first_log, second_log] {
            let log = log.lock().unwrap();
            assert_eq!(log.sweeps, vec![7]);
            assert_eq!(log.uploads, vec![expected.to_string()]);
        }
        assert_eq!(received.lock().unwrap().as_slice(), &[RunResult::success(expected)]);

        // dump directory and tarball are cleaned up
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_first_upload_failure_aborts_remaining_backends() {
        let dir = tempdir().unwrap();
        let config = config(dir.path());
        let tool = FakeTool::default();
        let failing = FakeBackend::new("Broken").failing_upload();
        let healthy = FakeBackend::new("Healthy");
        let healthy_log = healthy.log();
        let backends: Vec<Box<dyn StorageBackend>> = vec![Box::new(failing), Box::new(healthy)];
        let notifier = RecordingNotifier::default();
        let received = notifier.received();
        let notifiers: Vec<Box<dyn Notifier>> = vec![Box::new(notifier)];

        let report = ArchiveJob::new(&config, &tool, &backends, &notifiers, Tz::UTC, Shutdown::new())
            .run_named(name())
            .await;

        assert_eq!(report.stage, Stage::Failed);
        assert_eq!(report.failed_at, Some(Stage::Publishing));
        assert!(healthy_log.lock().unwrap().uploads.is_empty());

        let received = received.lock().unwrap();
        assert_eq!(received.len(), 1);
        assert!(!received[0].success);
        assert!(received[0].label.contains("Broken"), "{}", received[0].label);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_sweep_failure_does_not_block_upload() {
        let dir = tempdir().unwrap();
        let config = config(dir.path());
        let tool = FakeTool::default();
        let backend = FakeBackend::new("Flaky").failing_sweep();
        let log = backend.log();
        let backends: Vec<Box<dyn StorageBackend>> = vec![Box::new(backend)];

        let report = ArchiveJob::new(&config, &tool, &backends, &[], Tz::UTC, Shutdown::new())
            .run_named(name())
            .await;

        assert!(report.is_success());
        assert_eq!(log.lock().unwrap().uploads.len(), 1);
    }

    #[tokio::test]
    async fn test_no_backends_fails_before_dump() {
        let dir = tempdir().unwrap();
        let config = config(dir.path());
        let tool = FakeTool::default();
        let notifier = RecordingNotifier::default();
        let received = notifier.received();
        let notifiers: Vec<Box<dyn Notifier>> = vec![Box::new(notifier)];

        let report = ArchiveJob::new(&config, &tool, &[], &notifiers, Tz::UTC, Shutdown::new())
            .run_named(name())
            .await;

        assert_eq!(report.failed_at, Some(Stage::Idle));
        assert_eq!(tool.calls(), 0);
        assert!(!received.lock().unwrap()[0].success);
    }

    #[tokio::test]
    async fn test_dump_failure_cleans_partial_output() {
        let dir = tempdir().unwrap();
        let config = config(dir.path());
        let tool = FakeTool::failing();
        let backend = FakeBackend::new("Unused");
        let log = backend.log();
        let backends: Vec<Box<dyn StorageBackend>> = vec![Box::new(backend)];

        let report = ArchiveJob::new(&config, &tool, &backends, &[], Tz::UTC, Shutdown::new())
            .run_named(name())
            .await;

        assert_eq!(report.failed_at, Some(Stage::Dumping));
        assert!(log.lock().unwrap().uploads.is_empty());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_keep_leaves_artifacts() {
        let dir = tempdir().unwrap();
        let mut config = config(dir.path());
        config.keep = true;
        let tool = FakeTool::default();
        let backends: Vec<Box<dyn StorageBackend>> = vec![Box::new(FakeBackend::new("Only"))];

        let report = ArchiveJob::new(&config, &tool, &backends, &[], Tz::UTC, Shutdown::new())
            .run_named(name())
            .await;

        assert!(report.is_success());
        let name = name();
        assert!(dir.path().join(name.stem()).join("app").is_dir());
        assert!(dir.path().join(name.file_name()).is_file());
    }
}
