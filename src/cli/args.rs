//! CLI argument definitions
//!
//! ```text
//! odincode-fix [options] apply <file> --response <file> --issues <file>
//! odincode-fix [options] diff <old> <new> [--format F]
//! odincode-fix [options] backups list|restore|stats|cleanup|delete
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::diff_engine::DiffFormat;

/// Backup, diff, confirm and apply fix suggestions
#[derive(Parser, Debug)]
#[command(name = "odincode-fix")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Backup store directory (default: $ODINCODE_FIX_HOME/backups, then ./.odincode_backups)
    #[arg(long, global = true, value_name = "DIR")]
    pub backup_root: Option<PathBuf>,

    /// Config file (default: config.toml in the fix home directory)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    pub json_logs: bool,

    /// Print results as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Apply a recorded model response to a file
    Apply(ApplyArgs),

    /// Show the difference between two files
    Diff(DiffArgs),

    /// Inspect and manage backups
    #[command(subcommand)]
    Backups(BackupsCommand),
}

#[derive(clap::Args, Debug, Clone, PartialEq)]
pub struct ApplyArgs {
    /// File to fix
    pub file: PathBuf,

    /// Model response (JSON fix object or free text with code blocks)
    #[arg(long, value_name = "FILE")]
    pub response: PathBuf,

    /// JSON array of issues reported for the file
    #[arg(long, value_name = "FILE")]
    pub issues: PathBuf,

    /// Analyzer that reported the issues
    #[arg(long, default_value = "comprehensive")]
    pub analysis_type: String,

    /// Approve without prompting
    #[arg(short = 'y', long)]
    pub yes: bool,

    /// Print the diff and stop before any change
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(clap::Args, Debug, Clone, PartialEq)]
pub struct DiffArgs {
    pub old: PathBuf,
    pub new: PathBuf,

    /// unified, context, side-by-side, side-by-side-html, html or json
    #[arg(long, default_value = "unified")]
    pub format: DiffFormat,

    /// Context lines for unified and context output
    #[arg(long, default_value_t = 3)]
    pub context: usize,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum BackupsCommand {
    /// List backups, newest first
    List {
        /// Only backups of this file
        #[arg(long)]
        file: Option<PathBuf>,

        #[arg(long, default_value_t = 20)]
        limit: usize,
    },

    /// Restore a backup to its original path or to --target
    Restore {
        backup_id: String,

        #[arg(long)]
        target: Option<PathBuf>,
    },

    /// Backup store statistics
    Stats,

    /// Delete backups older than --days (default: configured retention)
    Cleanup {
        #[arg(long)]
        days: Option<u32>,
    },

    /// Delete one backup
    Delete { backup_id: String },
}
