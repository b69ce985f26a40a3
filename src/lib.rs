//! OdinCode Fix: applies model-generated code fixes safely
//!
//! Every change goes through the same path: back up the file, diff the
//! proposed content, get a decision, write atomically, roll back on failure.

pub mod backup_store;
pub mod cli;
pub mod config;
pub mod confirmation;
pub mod diff_engine;
pub mod file_tools;
pub mod fix_executor;
pub mod logging;
pub mod pipeline;
pub mod suggestions;

// Re-export the main entry points
pub use backup_store::{BackupError, BackupRecord, BackupStore};
pub use config::{BackupPolicy, FixConfig};
pub use confirmation::{ConfirmationDecision, ConfirmationGate, ConfirmationStatus, DecisionProvider};
pub use diff_engine::{generate_diff, DiffEngine, DiffReport};
pub use fix_executor::{ExecutionRecord, ExecutionStatus, FixExecutor};
pub use pipeline::{BatchProcessResult, FixPipeline, FixProcessResult, FixRequest};
pub use suggestions::{parse_fix_response, CodeIssue, FixResult, FixSuggestion};
