//! Execution records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::confirmation::ConfirmationDecision;
use crate::suggestions::{FixResult, FixSuggestion};

/// Execution status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
    Failed,
    RolledBack,
}

impl ExecutionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ExecutionStatus::Completed | ExecutionStatus::Failed | ExecutionStatus::RolledBack
        )
    }

    fn can_move_to(&self, next: ExecutionStatus) -> bool {
        use ExecutionStatus::*;
        matches!(
            (self, next),
            (Pending, InProgress | Completed | Failed) | (InProgress, Completed | Failed | RolledBack)
        )
    }
}

impl std::fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ExecutionStatus::Pending => "pending",
            ExecutionStatus::InProgress => "in_progress",
            ExecutionStatus::Completed => "completed",
            ExecutionStatus::Failed => "failed",
            ExecutionStatus::RolledBack => "rolled_back",
        };
        f.write_str(s)
    }
}

/// History entry for one fix application
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub fix_id: String,
    pub file_path: PathBuf,
    pub status: ExecutionStatus,
    pub backup_id: Option<String>,
    pub original_content: Option<String>,
    pub fixed_content: Option<String>,
    pub applied_suggestions: Vec<FixSuggestion>,
    pub error: Option<String>,
    /// Set only when a rollback was attempted
    pub rollback_successful: Option<bool>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl ExecutionRecord {
    pub fn new(fix_id: &str, file_path: PathBuf) -> Self {
        Self {
            fix_id: fix_id.to_string(),
            file_path,
            status: ExecutionStatus::Pending,
            backup_id: None,
            original_content: None,
            fixed_content: None,
            applied_suggestions: Vec::new(),
            error: None,
            rollback_successful: None,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    /// Advance the status; illegal transitions are ignored and logged
    pub(crate) fn transition(&mut self, next: ExecutionStatus) {
        if self.status.can_move_to(next) {
            self.status = next;
            if next.is_terminal() {
                self.finished_at = Some(Utc::now());
            }
        } else {
            tracing::error!(
                fix_id = %self.fix_id,
                from = %self.status,
                to = %next,
                "illegal execution status transition"
            );
        }
    }

    pub fn success(&self) -> bool {
        self.status == ExecutionStatus::Completed
    }

    pub fn duration_ms(&self) -> i64 {
        self.finished_at
            .map(|end| (end - self.started_at).num_milliseconds())
            .unwrap_or(0)
    }
}

/// One unit of work for the executor
#[derive(Debug, Clone)]
pub struct ExecutionEntry {
    pub fix_id: String,
    pub file_path: PathBuf,
    pub fix_result: FixResult,
    pub decision: ConfirmationDecision,
    pub backup_id: Option<String>,
}

/// Aggregate of a sequential batch
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchExecutionResult {
    pub records: Vec<ExecutionRecord>,
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
    pub rolled_back: usize,
    /// Entries never attempted because the failure policy stopped the batch
    pub skipped: usize,
    pub stopped_early: bool,
    pub duration_ms: i64,
}

impl BatchExecutionResult {
    pub fn all_succeeded(&self) -> bool {
        self.completed == self.total
    }
}

/// Outcome of one explicit rollback
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollbackOutcome {
    pub fix_id: Option<String>,
    pub file_path: PathBuf,
    pub backup_id: Option<String>,
    pub success: bool,
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transitions() {
        let mut record = ExecutionRecord::new("f1", PathBuf::from("a.py"));
        record.transition(ExecutionStatus::InProgress);
        assert_eq!(record.status, ExecutionStatus::InProgress);
        assert!(record.finished_at.is_none());

        record.transition(ExecutionStatus::RolledBack);
        assert_eq!(record.status, ExecutionStatus::RolledBack);
        assert!(record.finished_at.is_some());

        // terminal stays terminal
        record.transition(ExecutionStatus::Completed);
        assert_eq!(record.status, ExecutionStatus::RolledBack);
    }

    #[test]
    fn test_pending_cannot_roll_back() {
        let mut record = ExecutionRecord::new("f1", PathBuf::from("a.py"));
        record.transition(ExecutionStatus::RolledBack);
        assert_eq!(record.status, ExecutionStatus::Pending);
    }

    #[test]
    fn test_status_display() {
        assert_eq!(ExecutionStatus::RolledBack.to_string(), "rolled_back");
        assert_eq!(
            serde_json::to_string(&ExecutionStatus::InProgress).unwrap(),
            "\"in_progress\""
        );
    }
}
