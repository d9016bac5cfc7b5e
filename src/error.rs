use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BackupError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("External tool error: {0}")]
    ExternalTool(String),

    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Storage error ({backend}): {message}")]
    Backend {
        backend: &'static str,
        message: String,
    },

    #[error("Retention sweep error ({backend}): {message}")]
    RetentionSweep {
        backend: &'static str,
        message: String,
    },

    #[error("Archive error: {0}")]
    Archive(String),

    #[error("Notification error: {0}")]
    Notification(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl BackupError {
    pub fn backend(backend: &'static str, message: impl Into<String>) -> Self {
        BackupError::Backend {
            backend,
            message: message.into(),
        }
    }

    pub fn sweep(backend: &'static str, message: impl Into<String>) -> Self {
        BackupError::RetentionSweep {
            backend,
            message: message.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, BackupError::NotFound(_))
    }
}

impl From<toml::de::Error> for BackupError {
    fn from(err: toml::de::Error) -> Self {
        BackupError::Serialization(err.to_string())
    }
}

impl From<toml::ser::Error> for BackupError {
    fn from(err: toml::ser::Error) -> Self {
        BackupError::Serialization(err.to_string())
    }
}

impl From<reqwest::Error> for BackupError {
    fn from(err: reqwest::Error) -> Self {
        BackupError::Notification(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, BackupError>;
