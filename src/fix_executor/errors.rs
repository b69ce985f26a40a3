//! Fix executor errors

use std::io;

use crate::backup_store::BackupError;
use crate::file_tools::FileWriteError;

/// Failures while applying a fix
#[derive(Debug, thiserror::Error)]
pub enum ExecutionError {
    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("File is not valid UTF-8: {0}")]
    NotUtf8(String),

    #[error("Backup required but could not be created: {0}")]
    BackupRequired(#[source] BackupError),

    #[error("Backups required but no backup store is configured")]
    NoBackupStore,

    #[error("Backups required but the earlier backup attempt produced none")]
    BackupMissing,

    #[error("Line number out of range: {line} (file has {total} lines)")]
    LineOutOfRange { line: usize, total: usize },

    #[error("Conflicting fixes anchored to line {0}")]
    ConflictingEdits(usize),

    #[error("Syntax validation failed for {path}: {reason}")]
    SyntaxInvalid { path: String, reason: String },

    #[error("Write failed: {0}")]
    Write(#[from] FileWriteError),

    #[error("Post-write verification failed for {path}: {reason}")]
    VerifyFailed { path: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Failures while restoring original content
#[derive(Debug, thiserror::Error)]
pub enum RollbackError {
    #[error("No original content captured for {0}")]
    NoOriginalContent(String),

    #[error("No backup linked to fix {0}")]
    NoBackup(String),

    #[error("Backup restore failed: {0}")]
    Backup(#[from] BackupError),

    #[error("Rewrite failed: {0}")]
    Io(#[from] io::Error),
}
