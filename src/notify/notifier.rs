use crate::error::Result;
use async_trait::async_trait;
use chrono_tz::Tz;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Operation {
    #[default]
    Archive,
    Restore,
}

/// Outcome of one archive or restore run as reported to notification channels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunResult {
    pub operation: Operation,
    pub success: bool,
    /// Archive file name on success, error text on failure.
    pub label: String,
}

impl RunResult {
    pub fn success(label: impl Into<String>) -> Self {
        Self {
            operation: Operation::Archive,
            success: true,
            label: label.into(),
        }
    }

    pub fn failure(label: impl Into<String>) -> Self {
        Self {
            operation: Operation::Archive,
            success: false,
            label: label.into(),
        }
    }

    pub fn with_operation(mut self, operation: Operation) -> Self {
        self.operation = operation;
        self
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, result: &RunResult, tz: Tz) -> Result<()>;
    fn name(&self) -> &'static str;
}
