//! Fix executor: atomic application of approved suggestions
//!
//! Backs up, merges, validates, writes atomically and rolls back on failure.

mod errors;
mod executor;
mod merge;
mod record;
mod syntax;

pub use errors::{ExecutionError, RollbackError};
pub use executor::{
    ContinueOnFailure, FailurePolicy, FixExecutor, NoopProgress, PriorBackup, ProgressCallback,
    StopOnFailure, PRE_FIX_REASON,
};
pub use merge::{build_fixed_content, merge_suggestions, select_suggestions};
pub use record::{
    BatchExecutionResult, ExecutionEntry, ExecutionRecord, ExecutionStatus, RollbackOutcome,
};
pub use syntax::{NoopValidator, SyntaxValidator, TreeSitterValidator};
