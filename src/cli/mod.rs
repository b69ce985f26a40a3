//! CLI module
//!
//! Provides:
//! - Argument parsing (clap derive)
//! - Command dispatch (apply, diff, backups)
//! - Error type with deterministic exit codes

pub mod args;
pub mod dispatch;

// Re-exports
pub use args::{ApplyArgs, BackupsCommand, Cli, Command, DiffArgs};
pub use dispatch::{load_config, run_cli, ExitCode};

use crate::backup_store::BackupError;
use crate::config::ConfigError;

/// CLI errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Cannot read {path}: {reason}")]
    Input { path: String, reason: String },

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Backup error: {0}")]
    Backup(#[from] BackupError),

    #[error("Fix error: {0}")]
    Fix(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Config(_) => EXIT_CONFIG_ERROR,
            Error::Backup(_) => EXIT_BACKUP_ERROR,
            _ => EXIT_FAILURE,
        }
    }
}

/// Exit codes (deterministic)
pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FAILURE: i32 = 1;
pub const EXIT_BACKUP_ERROR: i32 = 2;
pub const EXIT_CONFIG_ERROR: i32 = 3;

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, Error>;
