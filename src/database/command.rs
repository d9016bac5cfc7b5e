use super::driver::{DatabaseTool, ToolReport};
use crate::backup::Shutdown;
use crate::error::{BackupError, Result};
use async_trait::async_trait;
use regex::Regex;
use std::process::Stdio;
use std::sync::OnceLock;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Runs a dump/restore executable found on `PATH` (or at an absolute path).
pub struct CommandTool {
    program: String,
}

fn restore_summary() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(\d+) document\(s\) restored successfully\. (\d+) document\(s\) failed to restore")
            .expect("valid regex")
    })
}

fn dump_progress() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"done dumping \S+ \((\d+) documents?\)").expect("valid regex"))
}

fn update_progress() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"Update\[\d+\]: modified count: (\d+)").expect("valid regex"))
}

/// Extracts document counts from tool output. A restore summary line wins
/// over per-collection dump lines and update counts.
pub fn parse_report(lines: &[String]) -> ToolReport {
    let mut report = ToolReport::default();
    for line in lines {
        if let Some(caps) = restore_summary().captures(line) {
            return ToolReport {
                successes: caps[1].parse().unwrap_or(0),
                failures: caps[2].parse().unwrap_or(0),
            };
        }
        if let Some(caps) = dump_progress()
            .captures(line)
            .or_else(|| update_progress().captures(line))
        {
            report.successes += caps[1].parse::<u64>().unwrap_or(0);
        }
    }
    report
}

async fn forward_lines<R>(reader: Option<R>, program: String) -> Vec<String>
where
    R: AsyncRead + Unpin,
{
    let Some(reader) = reader else {
        return Vec::new();
    };
    let mut lines = BufReader::new(reader).lines();
    let mut seen = Vec::new();
    while let Ok(Some(line)) = lines.next_line().await {
        info!("[{}] {}", program, line);
        seen.push(line);
    }
    seen
}

impl CommandTool {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

#[async_trait]
impl DatabaseTool for CommandTool {
    async fn run(&self, args: &[String], shutdown: &Shutdown) -> Result<ToolReport> {
        debug!("Running {} with {} argument(s)", self.program, args.len());

        let mut child = Command::new(&self.program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| BackupError::ExternalTool(format!("failed to start {}: {}", self.program, e)))?;

        let stdout = tokio::spawn(forward_lines(child.stdout.take(), self.program.clone()));
        let stderr = tokio::spawn(forward_lines(child.stderr.take(), self.program.clone()));

        let status = tokio::select! {
            status = child.wait() => Some(status),
            _ = shutdown.requested() => None,
        };

        let Some(status) = status else {
            warn!("Interrupt received, stopping {}", self.program);
            if let Err(e) = child.start_kill() {
                warn!("Failed to signal {}: {}", self.program, e);
            }
            let _ = child.wait().await;
            return Err(BackupError::ExternalTool(format!("{} was interrupted", self.program)));
        };
        let status = status
            .map_err(|e| BackupError::ExternalTool(format!("failed to wait for {}: {}", self.program, e)))?;

        let mut lines = stdout.await.unwrap_or_default();
        lines.extend(stderr.await.unwrap_or_default());

        if !status.success() {
            let last = lines.last().cloned().unwrap_or_default();
            return Err(BackupError::ExternalTool(format!(
                "{} exited with {}: {}",
                self.program, status, last
            )));
        }

        Ok(parse_report(&lines))
    }

    fn tool_name(&self) -> &str {
        &self.program
    }
}
