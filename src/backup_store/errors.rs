//! Backup store errors

use thiserror::Error;

use crate::file_tools::FileWriteError;

#[derive(Error, Debug)]
pub enum BackupError {
    #[error("Source file not found: {0}")]
    SourceNotFound(String),

    #[error("Not a regular file: {0}")]
    NotAFile(String),

    #[error("Backup not found: {0}")]
    NotFound(String),

    #[error("Backup data missing for {backup_id}: {path}")]
    DataMissing { backup_id: String, path: String },

    #[error("Backup index error: {0}")]
    Index(String),

    #[error("Write failed: {0}")]
    Write(#[from] FileWriteError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, BackupError>;
