//! Confirmation decisions
//!
//! Provides:
//! - ConfirmationStatus: Pending → {Approved, Rejected, Partial, Cancelled}
//! - ConfirmationDecision: one terminal decision per fix_id
//! - ConfirmationRequest: what a decision provider gets to look at

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::diff_engine::DiffReport;
use crate::suggestions::FixResult;

/// Decision state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfirmationStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
    Partial,
    Cancelled,
}

impl ConfirmationStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ConfirmationStatus::Pending)
    }

    /// Whether any suggestion may be applied under this status
    pub fn allows_changes(&self) -> bool {
        matches!(self, ConfirmationStatus::Approved | ConfirmationStatus::Partial)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConfirmationStatus::Pending => "pending",
            ConfirmationStatus::Approved => "approved",
            ConfirmationStatus::Rejected => "rejected",
            ConfirmationStatus::Partial => "partial",
            ConfirmationStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for ConfirmationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecisionError {
    #[error("Decision for {fix_id} already resolved as {status}")]
    AlreadyResolved {
        fix_id: String,
        status: ConfirmationStatus,
    },

    #[error("Cannot resolve a decision to pending")]
    NotTerminal,
}

/// Outcome of the confirmation gate for one fix
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfirmationDecision {
    pub fix_id: String,
    pub status: ConfirmationStatus,
    /// Suggestion indices to apply (Partial only, sorted, 0-based)
    pub selected_indices: Vec<usize>,
    pub message: Option<String>,
    /// Time spent waiting for the decision
    pub elapsed: Duration,
    pub decided_at: Option<DateTime<Utc>>,
    /// Resolved by policy without asking a provider
    pub auto_approved: bool,
}

impl ConfirmationDecision {
    pub fn pending(fix_id: &str) -> Self {
        Self {
            fix_id: fix_id.to_string(),
            status: ConfirmationStatus::Pending,
            selected_indices: Vec::new(),
            message: None,
            elapsed: Duration::ZERO,
            decided_at: None,
            auto_approved: false,
        }
    }

    pub fn approved(fix_id: &str) -> Self {
        Self::resolved(fix_id, ConfirmationStatus::Approved, Vec::new(), None)
    }

    pub fn rejected(fix_id: &str, message: &str) -> Self {
        Self::resolved(
            fix_id,
            ConfirmationStatus::Rejected,
            Vec::new(),
            Some(message.to_string()),
        )
    }

    pub fn partial(fix_id: &str, selected_indices: Vec<usize>) -> Self {
        Self::resolved(fix_id, ConfirmationStatus::Partial, selected_indices, None)
    }

    pub fn cancelled(fix_id: &str, message: &str) -> Self {
        Self::resolved(
            fix_id,
            ConfirmationStatus::Cancelled,
            Vec::new(),
            Some(message.to_string()),
        )
    }

    fn resolved(
        fix_id: &str,
        status: ConfirmationStatus,
        selected_indices: Vec<usize>,
        message: Option<String>,
    ) -> Self {
        let mut decision = Self::pending(fix_id);
        // Fresh pending decision, cannot already be resolved
        let _ = decision.resolve(status, selected_indices, message);
        decision
    }

    /// Move from Pending to a terminal status
    pub fn resolve(
        &mut self,
        status: ConfirmationStatus,
        mut selected_indices: Vec<usize>,
        message: Option<String>,
    ) -> Result<(), DecisionError> {
        if self.status.is_terminal() {
            return Err(DecisionError::AlreadyResolved {
                fix_id: self.fix_id.clone(),
                status: self.status,
            });
        }
        if !status.is_terminal() {
            return Err(DecisionError::NotTerminal);
        }

        if status == ConfirmationStatus::Partial {
            selected_indices.sort_unstable();
            selected_indices.dedup();
        } else {
            selected_indices.clear();
        }

        self.status = status;
        self.selected_indices = selected_indices;
        self.message = message;
        self.decided_at = Some(Utc::now());
        Ok(())
    }

    /// Whether the suggestion at `index` is to be applied
    pub fn selects(&self, index: usize) -> bool {
        match self.status {
            ConfirmationStatus::Approved => true,
            ConfirmationStatus::Partial => self.selected_indices.binary_search(&index).is_ok(),
            _ => false,
        }
    }
}

/// Everything a decision provider sees for one fix
#[derive(Debug, Clone)]
pub struct ConfirmationRequest {
    pub fix_id: String,
    pub file_path: PathBuf,
    pub fix_result: FixResult,
    pub diff: DiffReport,
    pub backup_id: Option<String>,
    pub timeout_seconds: u64,
}

impl ConfirmationRequest {
    pub fn new(
        fix_id: &str,
        fix_result: FixResult,
        diff: DiffReport,
        backup_id: Option<String>,
        timeout_seconds: u64,
    ) -> Self {
        Self {
            fix_id: fix_id.to_string(),
            file_path: fix_result.file_path.clone(),
            fix_result,
            diff,
            backup_id,
            timeout_seconds,
        }
    }

    pub fn suggestion_count(&self) -> usize {
        self.fix_result.suggestions.len()
    }
}
