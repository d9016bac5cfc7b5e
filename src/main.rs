mod backup;
mod config;
mod database;
mod error;
mod log;
mod notify;
mod storage;

use backup::{parse_timezone, run_scheduler, ArchiveJob, CronSchedule, RestoreJob, Shutdown};
use clap::{Parser, Subcommand};
use config::{AppConfig, StorageKind};
use database::CommandTool;
use error::{BackupError, Result};
use notify::{create_notifiers, Notifier};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};

#[derive(Debug, Parser)]
#[command(version, about = "Dump a database, archive it and publish it to cloud storage", long_about = None)]
struct Cli {
    /// Configuration file (default: ~/.dbarchive/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Dump, archive and upload to every configured backend
    Archive {
        /// Keep running on the configured cron schedule
        #[arg(long)]
        cron: bool,
        /// Keep the local dump directory and tarball
        #[arg(long)]
        keep: bool,
    },
    /// Download an archive and load it with the restore tool
    Restore {
        /// Object to restore; the latest archive is used when absent or missing
        #[arg(long)]
        object: Option<String>,
        /// Backend to restore from (azure, s3, gcp, local)
        #[arg(long)]
        from: Option<StorageKind>,
        #[arg(long)]
        keep: bool,
    },
    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    log::init(cli.verbose, cli.quiet);

    match run(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<bool> {
    let config_path = cli.config.unwrap_or_else(config::config_path);

    match cli.command {
        Command::Archive { cron, keep } => {
            let (mut config, notifiers, shutdown) = prepare(&config_path)?;
            config.keep |= keep;
            config.schedule.cron |= cron;
            archive(Arc::new(config), &notifiers, shutdown).await
        }
        Command::Restore { object, from, keep } => {
            let (mut config, notifiers, shutdown) = prepare(&config_path)?;
            config.keep |= keep;
            restore(&config, &notifiers, object.as_deref().unwrap_or(""), from, shutdown).await
        }
        Command::Init { force } => {
            if config_path.exists() && !force {
                return Err(BackupError::Config(format!(
                    "{} already exists, use --force to overwrite",
                    config_path.display()
                )));
            }
            config::save_to(&AppConfig::default(), &config_path)?;
            Ok(true)
        }
    }
}

fn prepare(config_path: &Path) -> Result<(AppConfig, Vec<Box<dyn Notifier>>, Shutdown)> {
    let config = config::load_from(config_path)?;
    let notifiers = create_notifiers(&config.notification)?;

    let shutdown = Shutdown::new();
    shutdown
        .install_signal_handler()
        .map_err(|e| BackupError::Config(format!("failed to install signal handler: {}", e)))?;

    Ok((config, notifiers, shutdown))
}

async fn archive(config: Arc<AppConfig>, notifiers: &[Box<dyn Notifier>], shutdown: Shutdown) -> Result<bool> {
    let backends = storage::create_backends(&config.storage).await?;
    let tool = CommandTool::new(config.dump.program.clone());

    if !config.schedule.cron {
        let tz = parse_timezone(&config.schedule.timezone)?;
        let report = ArchiveJob::new(&config, &tool, &backends, notifiers, tz, shutdown).run().await;
        info!("Archive run {} after {}s", report.stage, report.duration_secs);
        return Ok(report.is_success());
    }

    let schedule = CronSchedule::new(&config.schedule.expression, &config.schedule.timezone)?;
    let tz = schedule.timezone();
    let (job_config, tool, backends, stop) = (&*config, &tool, &backends[..], &shutdown);
    run_scheduler(&schedule, &shutdown, move || async move {
        let report = ArchiveJob::new(job_config, tool, backends, notifiers, tz, stop.clone())
            .run()
            .await;
        info!("Scheduled archive run {} after {}s", report.stage, report.duration_secs);
    })
    .await;

    Ok(true)
}

async fn restore(
    config: &AppConfig,
    notifiers: &[Box<dyn Notifier>],
    object: &str,
    from: Option<StorageKind>,
    shutdown: Shutdown,
) -> Result<bool> {
    let kind = match from {
        Some(kind) => kind,
        None => config
            .storage
            .kinds()
            .into_iter()
            .next()
            .ok_or_else(|| BackupError::Config("no storage backend configured".to_string()))?,
    };
    let backend = storage::create_backend(&config.storage, kind).await?;
    let tool = CommandTool::new(config.restore.program.clone());
    let shell = CommandTool::new(config.restore.shell_program.clone());
    let tz = parse_timezone(&config.schedule.timezone)?;

    let outcome = RestoreJob::new(config, &tool, backend.as_ref(), notifiers, tz, shutdown)
        .with_update_tool(&shell)
        .run(object)
        .await;
    Ok(outcome.is_ok())
}
