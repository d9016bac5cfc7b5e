use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    Azure,
    S3,
    Gcp,
    Local,
}

impl std::fmt::Display for StorageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageKind::Azure => write!(f, "Azure"),
            StorageKind::S3 => write!(f, "AWS S3"),
            StorageKind::Gcp => write!(f, "GCP"),
            StorageKind::Local => write!(f, "Local"),
        }
    }
}

impl std::str::FromStr for StorageKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "azure" | "az" => Ok(StorageKind::Azure),
            "s3" | "aws" => Ok(StorageKind::S3),
            "gcp" | "gcs" => Ok(StorageKind::Gcp),
            "local" => Ok(StorageKind::Local),
            other => Err(format!("unknown storage kind '{}'", other)),
        }
    }
}

/// TLS options forwarded verbatim to the database tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SslConfig {
    pub enabled: bool,
    pub ca_file: Option<String>,
    pub pem_key_file: Option<String>,
    pub pem_key_password: Option<String>,
    pub crl_file: Option<String>,
    pub allow_invalid_certificates: bool,
    pub allow_invalid_hostnames: bool,
    pub fips_mode: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    pub uri: Option<String>,
    /// Strip the database path and query string from `uri`.
    pub uri_prune: bool,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub authentication_database: Option<String>,
    pub authentication_mechanism: Option<String>,
    pub ssl: SslConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DumpConfig {
    pub program: String,
    pub dump_path: PathBuf,
    #[serde(flatten)]
    pub connection: ConnectionConfig,
    pub db: Option<String>,
    pub collection: Option<String>,
    pub query: Option<String>,
    pub read_preference: Option<String>,
    pub gzip: bool,
    pub extra_args: Vec<String>,
}

impl Default for DumpConfig {
    fn default() -> Self {
        Self {
            program: "mongodump".to_string(),
            dump_path: PathBuf::from("/tmp/datadump"),
            connection: ConnectionConfig::default(),
            db: None,
            collection: None,
            query: None,
            read_preference: None,
            gzip: true,
            extra_args: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RestoreConfig {
    pub program: String,
    pub restore_path: PathBuf,
    #[serde(flatten)]
    pub connection: ConnectionConfig,
    /// Sub-directory of the extracted archive handed to the tool.
    pub dir: Option<String>,
    pub db: Option<String>,
    pub ns_from: Option<String>,
    pub ns_to: Option<String>,
    pub drop: bool,
    pub dry_run: bool,
    pub write_concern: Option<String>,
    pub gzip: bool,
    pub extra_args: Vec<String>,
    /// Shell used to apply post-restore updates.
    pub shell_program: String,
    /// JSON array of `{collection, filter, update}` applied with `updateMany`
    /// after a successful restore. Takes precedence over `updates_file`.
    pub updates: Option<String>,
    pub updates_file: Option<PathBuf>,
}

impl Default for RestoreConfig {
    fn default() -> Self {
        Self {
            program: "mongorestore".to_string(),
            restore_path: PathBuf::from("/tmp/datarestore"),
            connection: ConnectionConfig::default(),
            dir: None,
            db: None,
            ns_from: None,
            ns_to: None,
            drop: true,
            dry_run: false,
            write_concern: None,
            gzip: true,
            extra_args: Vec::new(),
            shell_program: "mongosh".to_string(),
            updates: None,
            updates_file: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct S3Config {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub region: String,
    pub bucket: String,
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub force_path_style: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AzureConfig {
    pub account_name: String,
    pub account_key: String,
    pub container_name: String,
    #[serde(default)]
    pub endpoint: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GcpConfig {
    pub bucket: String,
    pub creds_file: Option<PathBuf>,
    pub project_id: Option<String>,
    pub private_key_id: Option<String>,
    pub private_key: Option<String>,
    pub client_email: Option<String>,
    pub client_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalConfig {
    pub path: PathBuf,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Maximum archive age in days; 0 keeps everything.
    #[serde(default)]
    pub expiry_days: u32,
    #[serde(default)]
    pub azure: Option<AzureConfig>,
    #[serde(default)]
    pub s3: Option<S3Config>,
    #[serde(default)]
    pub gcp: Option<GcpConfig>,
    #[serde(default)]
    pub local: Option<LocalConfig>,
}

impl StorageConfig {
    /// Configured backend kinds in selection order.
    pub fn kinds(&self) -> Vec<StorageKind> {
        let mut kinds = Vec::new();
        if self.azure.is_some() {
            kinds.push(StorageKind::Azure);
        }
        if self.s3.is_some() {
            kinds.push(StorageKind::S3);
        }
        if self.gcp.is_some() {
            kinds.push(StorageKind::Gcp);
        }
        if self.local.is_some() {
            kinds.push(StorageKind::Local);
        }
        kinds
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RocketChatConfig {
    pub webhook_url: String,
    #[serde(default)]
    pub prefix: Option<String>,
    #[serde(default)]
    pub notify_on_failure_only: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotificationConfig {
    #[serde(default)]
    pub rocketchat: Option<RocketChatConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Run under the scheduler instead of once.
    pub cron: bool,
    pub expression: String,
    pub timezone: String,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            cron: false,
            expression: "0 2 * * *".to_string(),
            timezone: "UTC".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub dump: DumpConfig,
    #[serde(default)]
    pub restore: RestoreConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub notification: NotificationConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    /// Keep the local dump directory and tarball after a run.
    #[serde(default)]
    pub keep: bool,
}
