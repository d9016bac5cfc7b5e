use crate::backup::Shutdown;
use crate::error::Result;
use async_trait::async_trait;

/// Per-document counts reported by a dump or restore run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ToolReport {
    pub successes: u64,
    pub failures: u64,
}

/// External dump/restore program. Implementations must return an error
/// rather than hang once `shutdown` is requested.
#[async_trait]
pub trait DatabaseTool: Send + Sync {
    async fn run(&self, args: &[String], shutdown: &Shutdown) -> Result<ToolReport>;
    fn tool_name(&self) -> &str;
}
