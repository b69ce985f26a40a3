//! Per-file and batch pipeline results

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::confirmation::ConfirmationDecision;
use crate::diff_engine::ChangeComplexity;
use crate::fix_executor::ExecutionRecord;
use crate::suggestions::FixResult;

/// Pipeline stages, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Validation,
    Generation,
    Backup,
    Diff,
    Confirmation,
    Execution,
}

impl PipelineStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStage::Validation => "validation",
            PipelineStage::Generation => "generation",
            PipelineStage::Backup => "backup",
            PipelineStage::Diff => "diff",
            PipelineStage::Confirmation => "confirmation",
            PipelineStage::Execution => "execution",
        }
    }
}

impl std::fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure classification used for batch histograms
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    Generation,
    Backup,
    Confirmation,
    Execution,
    Rollback,
    Cancelled,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::Generation => "generation",
            ErrorKind::Backup => "backup",
            ErrorKind::Confirmation => "confirmation",
            ErrorKind::Execution => "execution",
            ErrorKind::Rollback => "rollback",
            ErrorKind::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything the pipeline learned about one file
#[derive(Debug, Clone, Serialize)]
pub struct FixProcessResult {
    pub fix_id: String,
    pub file_path: PathBuf,
    pub success: bool,
    pub completed_stages: Vec<PipelineStage>,
    pub failed_stage: Option<PipelineStage>,
    pub error_kind: Option<ErrorKind>,
    pub error: Option<String>,
    pub fix_result: Option<FixResult>,
    pub backup_id: Option<String>,
    pub diff_summary: Option<String>,
    pub complexity: Option<ChangeComplexity>,
    pub decision: Option<ConfirmationDecision>,
    pub execution: Option<ExecutionRecord>,
    pub elapsed_ms: u64,
}

impl FixProcessResult {
    pub(crate) fn new(fix_id: &str, file_path: PathBuf) -> Self {
        Self {
            fix_id: fix_id.to_string(),
            file_path,
            success: false,
            completed_stages: Vec::new(),
            failed_stage: None,
            error_kind: None,
            error: None,
            fix_result: None,
            backup_id: None,
            diff_summary: None,
            complexity: None,
            decision: None,
            execution: None,
            elapsed_ms: 0,
        }
    }

    pub(crate) fn complete(&mut self, stage: PipelineStage) {
        self.completed_stages.push(stage);
    }

    pub(crate) fn fail(mut self, stage: Option<PipelineStage>, kind: ErrorKind, error: impl Into<String>) -> Self {
        self.success = false;
        self.failed_stage = stage;
        self.error_kind = Some(kind);
        self.error = Some(error.into());
        self
    }

    pub(crate) fn finish(mut self, elapsed: Duration) -> Self {
        self.elapsed_ms = elapsed.as_millis() as u64;
        self
    }

    pub fn reached(&self, stage: PipelineStage) -> bool {
        self.completed_stages.contains(&stage)
    }

    /// Number of suggestions actually written
    pub fn applied_count(&self) -> usize {
        self.execution
            .as_ref()
            .map(|r| r.applied_suggestions.len())
            .unwrap_or(0)
    }
}

/// Aggregate over a batch; `results` keeps input order
#[derive(Debug, Clone, Serialize)]
pub struct BatchProcessResult {
    pub total_files: usize,
    pub successful: usize,
    pub failed: usize,
    pub results: Vec<FixProcessResult>,
    pub elapsed_ms: u64,
    pub summary: String,
    /// Files that completed each stage
    pub stage_histogram: BTreeMap<PipelineStage, usize>,
    pub error_histogram: BTreeMap<ErrorKind, usize>,
    pub stopped_early: bool,
}

impl BatchProcessResult {
    pub(crate) fn from_results(
        results: Vec<FixProcessResult>,
        elapsed: Duration,
        stopped_early: bool,
    ) -> Self {
        let total_files = results.len();
        let successful = results.iter().filter(|r| r.success).count();
        let failed = total_files - successful;

        let mut stage_histogram = BTreeMap::new();
        let mut error_histogram = BTreeMap::new();
        for result in &results {
            for stage in &result.completed_stages {
                *stage_histogram.entry(*stage).or_insert(0) += 1;
            }
            if let Some(kind) = result.error_kind {
                *error_histogram.entry(kind).or_insert(0) += 1;
            }
        }

        let mut summary = format!(
            "{} files: {} succeeded, {} failed",
            total_files, successful, failed
        );
        if !error_histogram.is_empty() {
            let parts: Vec<String> = error_histogram
                .iter()
                .map(|(kind, count)| format!("{}: {}", kind, count))
                .collect();
            summary.push_str(&format!(" ({})", parts.join(", ")));
        }
        if stopped_early {
            summary.push_str(", stopped early");
        }
        summary.push_str(&format!(" in {:.2}s", elapsed.as_secs_f64()));

        Self {
            total_files,
            successful,
            failed,
            results,
            elapsed_ms: elapsed.as_millis() as u64,
            summary,
            stage_histogram,
            error_histogram,
            stopped_early,
        }
    }

    pub fn all_succeeded(&self) -> bool {
        self.failed == 0
    }
}
