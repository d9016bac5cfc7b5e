//! In-memory stand-ins for the dump tool, storage backends and notifiers.

use crate::backup::Shutdown;
use crate::database::{DatabaseTool, ToolReport};
use crate::error::{BackupError, Result};
use crate::notify::{Notifier, RunResult};
use crate::storage::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use chrono_tz::Tz;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Default)]
pub struct FakeTool {
    fail: bool,
    calls: AtomicUsize,
    pub seen_args: Mutex<Vec<Vec<String>>>,
    pub seen_dirs: Mutex<Vec<PathBuf>>,
}

impl FakeTool {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DatabaseTool for FakeTool {
    async fn run(&self, args: &[String], _shutdown: &Shutdown) -> Result<ToolReport> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen_args.lock().unwrap().push(args.to_vec());

        for arg in args {
            if let Some(out) = arg.strip_prefix("--out=") {
                let db_dir = Path::new(out).join("app");
                std::fs::create_dir_all(&db_dir)?;
                std::fs::write(db_dir.join("users.bson.gz"), b"users")?;
            }
            if let Some(dir) = arg.strip_prefix("--dir=") {
                self.seen_dirs.lock().unwrap().push(PathBuf::from(dir));
            }
        }

        if self.fail {
            return Err(BackupError::ExternalTool("fake tool exited with 1".to_string()));
        }
        Ok(ToolReport {
            successes: 3,
            failures: 0,
        })
    }

    fn tool_name(&self) -> &str {
        "fake-tool"
    }
}

#[derive(Debug, Default)]
pub struct BackendLog {
    pub sweeps: Vec<u32>,
    pub uploads: Vec<String>,
}

pub struct FakeBackend {
    name: &'static str,
    fail_upload: bool,
    fail_sweep: bool,
    log: Arc<Mutex<BackendLog>>,
    objects: Mutex<BTreeMap<String, Bytes>>,
}

impl FakeBackend {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            fail_upload: false,
            fail_sweep: false,
            log: Arc::default(),
            objects: Mutex::default(),
        }
    }

    pub fn failing_upload(mut self) -> Self {
        self.fail_upload = true;
        self
    }

    pub fn failing_sweep(mut self) -> Self {
        self.fail_sweep = true;
        self
    }

    pub fn with_object(self, name: &str, payload: impl Into<Bytes>) -> Self {
        self.objects.lock().unwrap().insert(name.to_string(), payload.into());
        self
    }

    pub fn log(&self) -> Arc<Mutex<BackendLog>> {
        self.log.clone()
    }
}

#[async_trait]
impl StorageBackend for FakeBackend {
    async fn upload(&self, object_name: &str, payload: Bytes) -> Result<String> {
        if self.fail_upload {
            return Err(BackupError::backend(self.name, "access denied"));
        }
        self.log.lock().unwrap().uploads.push(object_name.to_string());
        self.objects.lock().unwrap().insert(object_name.to_string(), payload);
        Ok("v1".to_string())
    }

    async fn download(&self, object_name: &str, destination: &Path) -> Result<()> {
        let payload = self
            .objects
            .lock()
            .unwrap()
            .get(object_name)
            .cloned()
            .ok_or_else(|| BackupError::NotFound(object_name.to_string()))?;
        if let Some(parent) = destination.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(destination, &payload)?;
        Ok(())
    }

    async fn resolve_target_object_name(&self, requested: &str) -> Result<String> {
        let objects = self.objects.lock().unwrap();
        if objects.contains_key(requested) {
            return Ok(requested.to_string());
        }
        // Inverse timestamps sort newest first.
        objects
            .keys()
            .next()
            .cloned()
            .ok_or_else(|| BackupError::NotFound("no archives".to_string()))
    }

    async fn delete_expired(&self, expiry_days: u32) -> Result<()> {
        self.log.lock().unwrap().sweeps.push(expiry_days);
        if self.fail_sweep {
            return Err(BackupError::sweep(self.name, "listing failed"));
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        self.name
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    received: Arc<Mutex<Vec<RunResult>>>,
}

impl RecordingNotifier {
    pub fn received(&self) -> Arc<Mutex<Vec<RunResult>>> {
        self.received.clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, result: &RunResult, _tz: Tz) -> Result<()> {
        self.received.lock().unwrap().push(result.clone());
        Ok(())
    }

    fn name(&self) -> &'static str {
        "Recording"
    }
}
