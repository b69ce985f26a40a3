//! FixExecutor: applies approved suggestions to one file at a time
//!
//! Per fix:
//! 1. Read original content (missing file fails)
//! 2. Ensure a backup exists, per `BackupPolicy`
//! 3. Select suggestions by decision; rejected/cancelled is a no-op success
//! 4. Build fixed content (precomputed or merged)
//! 5. Syntax check; failure leaves the file untouched
//! 6. Stage temp file, verify, rename over the target
//! 7. Re-read and compare with the fixed content
//! 8. On failure after step 3, restore original content if auto-rollback is on

use parking_lot::Mutex;
use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

use super::errors::{ExecutionError, RollbackError};
use super::merge::build_fixed_content;
use super::record::{
    BatchExecutionResult, ExecutionEntry, ExecutionRecord, ExecutionStatus, RollbackOutcome,
};
use super::syntax::{SyntaxValidator, TreeSitterValidator};
use crate::backup_store::BackupStore;
use crate::config::{BackupPolicy, ExecutorConfig};
use crate::confirmation::ConfirmationDecision;
use crate::file_tools::stage_write;
use crate::suggestions::FixResult;

/// Backup reason recorded for executor-created backups
pub const PRE_FIX_REASON: &str = "pre_fix";

/// What the caller already did about the pre-fix backup
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum PriorBackup {
    /// The executor backs up per policy
    #[default]
    NotAttempted,
    /// Backup taken by the caller
    Created(String),
    /// The caller's best-effort attempt failed or was skipped; do not retry
    Attempted,
}

/// Callback for progress updates during execution
pub trait ProgressCallback: Send + Sync {
    /// Called before a fix is applied
    fn on_fix_start(&self, fix_id: &str, path: &Path);

    /// Called after a fix completes successfully
    fn on_fix_complete(&self, record: &ExecutionRecord);

    /// Called after a fix fails or is rolled back
    fn on_fix_failed(&self, record: &ExecutionRecord);
}

/// No-op progress callback
#[derive(Clone, Copy, Default)]
pub struct NoopProgress;

impl ProgressCallback for NoopProgress {
    fn on_fix_start(&self, _fix_id: &str, _path: &Path) {}
    fn on_fix_complete(&self, _record: &ExecutionRecord) {}
    fn on_fix_failed(&self, _record: &ExecutionRecord) {}
}

/// Decides whether a batch keeps going after a failed entry
pub trait FailurePolicy: Send + Sync {
    fn should_continue(&self, failed: &ExecutionRecord) -> bool;
}

/// Always continue (batch default)
#[derive(Clone, Copy, Default)]
pub struct ContinueOnFailure;

impl FailurePolicy for ContinueOnFailure {
    fn should_continue(&self, _failed: &ExecutionRecord) -> bool {
        true
    }
}

/// Stop at the first failure
#[derive(Clone, Copy, Default)]
pub struct StopOnFailure;

impl FailurePolicy for StopOnFailure {
    fn should_continue(&self, _failed: &ExecutionRecord) -> bool {
        false
    }
}

pub struct FixExecutor {
    config: ExecutorConfig,
    backups: Option<Arc<BackupStore>>,
    validator: Box<dyn SyntaxValidator>,
    progress: Box<dyn ProgressCallback>,
    history: Mutex<HashMap<String, ExecutionRecord>>,
}

impl FixExecutor {
    pub fn new(config: ExecutorConfig, backups: Option<Arc<BackupStore>>) -> Self {
        Self {
            config,
            backups,
            validator: Box::new(TreeSitterValidator),
            progress: Box::new(NoopProgress),
            history: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_validator(mut self, validator: Box<dyn SyntaxValidator>) -> Self {
        self.validator = validator;
        self
    }

    pub fn with_progress(mut self, progress: Box<dyn ProgressCallback>) -> Self {
        self.progress = progress;
        self
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    pub fn backup_store(&self) -> Option<&Arc<BackupStore>> {
        self.backups.as_ref()
    }

    /// Apply one fix; always returns a terminal record
    ///
    /// `backup_id` links a backup the caller already took; with `None` the
    /// executor backs up per policy.
    pub fn execute_fix(
        &self,
        fix_id: &str,
        path: &Path,
        fix_result: &FixResult,
        decision: &ConfirmationDecision,
        backup_id: Option<String>,
    ) -> ExecutionRecord {
        let prior = backup_id.map_or(PriorBackup::NotAttempted, PriorBackup::Created);
        self.execute_fix_with(fix_id, path, fix_result, decision, prior)
    }

    /// Apply one fix, given what the caller already did about the backup
    pub fn execute_fix_with(
        &self,
        fix_id: &str,
        path: &Path,
        fix_result: &FixResult,
        decision: &ConfirmationDecision,
        prior: PriorBackup,
    ) -> ExecutionRecord {
        let mut record = ExecutionRecord::new(fix_id, path.to_path_buf());
        let attempted = prior != PriorBackup::NotAttempted;
        if let PriorBackup::Created(backup_id) = prior {
            record.backup_id = Some(backup_id);
        }
        self.progress.on_fix_start(fix_id, path);

        let original = match read_text(path) {
            Ok(text) => text,
            Err(e) => return self.fail_early(record, e),
        };
        record.original_content = Some(original.clone());

        if !decision.status.allows_changes() {
            info!(
                fix_id,
                file = %path.display(),
                decision = %decision.status,
                "no changes approved, nothing applied"
            );
            record.fixed_content = Some(original);
            record.transition(ExecutionStatus::Completed);
            return self.finish(record);
        }

        if !attempted {
            if let Err(e) = self.ensure_backup(&mut record, fix_result) {
                return self.fail_early(record, e);
            }
        } else if record.backup_id.is_none() && self.config.backup_policy == BackupPolicy::Required {
            return self.fail_early(record, ExecutionError::BackupMissing);
        }

        record.transition(ExecutionStatus::InProgress);
        match self.apply(&mut record, &original, fix_result, decision) {
            Ok(()) => {
                info!(
                    fix_id,
                    file = %path.display(),
                    applied = record.applied_suggestions.len(),
                    "fix applied"
                );
                record.transition(ExecutionStatus::Completed);
            }
            Err(e) => self.handle_failure(&mut record, &original, e),
        }
        self.finish(record)
    }

    /// Apply a batch sequentially
    ///
    /// After a failure that was not rolled back, `policy` decides whether the
    /// remaining entries run.
    pub fn execute_batch(
        &self,
        entries: &[ExecutionEntry],
        policy: &dyn FailurePolicy,
    ) -> BatchExecutionResult {
        let start = Instant::now();
        let mut result = BatchExecutionResult {
            total: entries.len(),
            ..Default::default()
        };

        for (idx, entry) in entries.iter().enumerate() {
            let record = self.execute_fix(
                &entry.fix_id,
                &entry.file_path,
                &entry.fix_result,
                &entry.decision,
                entry.backup_id.clone(),
            );

            match record.status {
                ExecutionStatus::Completed => result.completed += 1,
                ExecutionStatus::RolledBack => result.rolled_back += 1,
                _ => result.failed += 1,
            }
            let stop = record.status == ExecutionStatus::Failed && !policy.should_continue(&record);
            result.records.push(record);

            if stop {
                result.skipped = entries.len() - idx - 1;
                result.stopped_early = result.skipped > 0;
                warn!(
                    skipped = result.skipped,
                    "batch stopped by failure policy"
                );
                break;
            }
        }

        result.duration_ms = start.elapsed().as_millis() as i64;
        info!(
            total = result.total,
            completed = result.completed,
            failed = result.failed,
            rolled_back = result.rolled_back,
            "batch execution finished"
        );
        result
    }

    /// Restore `path` from a backup
    pub fn rollback_fix(&self, path: &Path, backup_id: &str) -> Result<PathBuf, RollbackError> {
        let store = self
            .backups
            .as_ref()
            .ok_or_else(|| RollbackError::NoBackup(backup_id.to_string()))?;
        let restored = store.restore_backup(backup_id, Some(path))?;
        info!(file = %restored.display(), backup_id, "rollback from backup");
        Ok(restored)
    }

    /// Restore a previously executed fix from its linked backup
    pub fn rollback_record(&self, fix_id: &str) -> Result<PathBuf, RollbackError> {
        let record = self
            .get_record(fix_id)
            .ok_or_else(|| RollbackError::NoBackup(fix_id.to_string()))?;
        let backup_id = record
            .backup_id
            .ok_or_else(|| RollbackError::NoBackup(fix_id.to_string()))?;
        self.rollback_fix(&record.file_path, &backup_id)
    }

    /// Best-effort restore of several records, newest first
    pub fn rollback_batch(&self, records: &[ExecutionRecord]) -> Vec<RollbackOutcome> {
        records
            .iter()
            .rev()
            .map(|record| {
                let outcome = match record.backup_id.as_deref() {
                    Some(backup_id) => self.rollback_fix(&record.file_path, backup_id),
                    None => Err(RollbackError::NoBackup(record.fix_id.clone())),
                };
                if let Err(ref e) = outcome {
                    warn!(fix_id = %record.fix_id, "rollback failed: {}", e);
                }
                RollbackOutcome {
                    fix_id: Some(record.fix_id.clone()),
                    file_path: record.file_path.clone(),
                    backup_id: record.backup_id.clone(),
                    success: outcome.is_ok(),
                    error: outcome.err().map(|e| e.to_string()),
                }
            })
            .collect()
    }

    /// Latest record for a fix
    pub fn get_record(&self, fix_id: &str) -> Option<ExecutionRecord> {
        self.history.lock().get(fix_id).cloned()
    }

    pub fn history(&self) -> Vec<ExecutionRecord> {
        let mut records: Vec<_> = self.history.lock().values().cloned().collect();
        records.sort_by_key(|r| r.started_at);
        records
    }

    fn ensure_backup(
        &self,
        record: &mut ExecutionRecord,
        fix_result: &FixResult,
    ) -> Result<(), ExecutionError> {
        if record.backup_id.is_some() || !self.config.backup_policy.creates_backups() {
            return Ok(());
        }
        let required = self.config.backup_policy == BackupPolicy::Required;

        let Some(store) = self.backups.as_ref() else {
            if required {
                return Err(ExecutionError::NoBackupStore);
            }
            warn!(fix_id = %record.fix_id, "no backup store, proceeding without backup");
            return Ok(());
        };

        let issues: Vec<String> = fix_result
            .suggestions
            .iter()
            .map(|s| s.issue_id.clone())
            .collect();
        match store.create_backup(
            &record.file_path,
            PRE_FIX_REASON,
            Some(record.fix_id.as_str()),
            &issues,
        ) {
            Ok(backup) => {
                record.backup_id = Some(backup.backup_id);
                Ok(())
            }
            Err(e) if required => Err(ExecutionError::BackupRequired(e)),
            Err(e) => {
                warn!(fix_id = %record.fix_id, "backup failed, proceeding: {}", e);
                Ok(())
            }
        }
    }

    fn apply(
        &self,
        record: &mut ExecutionRecord,
        original: &str,
        fix_result: &FixResult,
        decision: &ConfirmationDecision,
    ) -> Result<(), ExecutionError> {
        let (fixed, applied) = build_fixed_content(original, fix_result, decision)?;
        record.fixed_content = Some(fixed.clone());
        record.applied_suggestions = applied;

        if self.config.validate_syntax {
            self.validator
                .validate(&record.file_path, &fixed)
                .map_err(|reason| ExecutionError::SyntaxInvalid {
                    path: record.file_path.display().to_string(),
                    reason,
                })?;
        }

        let staged = stage_write(&record.file_path, fixed.as_bytes())?;
        debug!(temp = %staged.temp_path().display(), "fixed content staged");
        staged.commit()?;

        let on_disk = fs::read(&record.file_path)?;
        if on_disk != fixed.as_bytes() {
            return Err(ExecutionError::VerifyFailed {
                path: record.file_path.display().to_string(),
                reason: "content on disk differs from fixed content".to_string(),
            });
        }
        if !original.is_empty() && on_disk.is_empty() {
            return Err(ExecutionError::VerifyFailed {
                path: record.file_path.display().to_string(),
                reason: "file is empty after applying fixes".to_string(),
            });
        }
        Ok(())
    }

    fn handle_failure(&self, record: &mut ExecutionRecord, original: &str, err: ExecutionError) {
        error!(fix_id = %record.fix_id, file = %record.file_path.display(), "fix failed: {}", err);
        record.error = Some(err.to_string());

        // Syntax failures stop before anything is written
        if matches!(err, ExecutionError::SyntaxInvalid { .. }) || !self.config.auto_rollback {
            record.transition(ExecutionStatus::Failed);
            return;
        }

        match fs::write(&record.file_path, original) {
            Ok(()) => {
                info!(fix_id = %record.fix_id, "original content restored");
                record.rollback_successful = Some(true);
                record.transition(ExecutionStatus::RolledBack);
            }
            Err(e) => {
                error!(fix_id = %record.fix_id, "rollback failed: {}", e);
                record.rollback_successful = Some(false);
                record.transition(ExecutionStatus::Failed);
            }
        }
    }

    fn fail_early(&self, mut record: ExecutionRecord, err: ExecutionError) -> ExecutionRecord {
        error!(fix_id = %record.fix_id, file = %record.file_path.display(), "fix not started: {}", err);
        record.error = Some(err.to_string());
        record.transition(ExecutionStatus::Failed);
        self.finish(record)
    }

    fn finish(&self, record: ExecutionRecord) -> ExecutionRecord {
        if record.success() {
            self.progress.on_fix_complete(&record);
        } else {
            self.progress.on_fix_failed(&record);
        }
        self.history
            .lock()
            .insert(record.fix_id.clone(), record.clone());
        record
    }
}

fn read_text(path: &Path) -> Result<String, ExecutionError> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(ExecutionError::FileNotFound(path.display().to_string()))
        }
        Err(e) => return Err(e.into()),
    };
    String::from_utf8(bytes).map_err(|_| ExecutionError::NotUtf8(path.display().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fix_executor::NoopValidator;
    use crate::suggestions::{FixSuggestion, Location, Severity};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    fn fix(line: usize, code: &str) -> FixSuggestion {
        FixSuggestion {
            issue_id: format!("i{}", line),
            issue_type: "style".to_string(),
            description: String::new(),
            location: Location::new(line, 0),
            severity: Severity::Low,
            fixed_code: code.to_string(),
            explanation: String::new(),
            confidence: 0.9,
            tags: vec![],
        }
    }

    fn no_backup_executor() -> FixExecutor {
        let config = ExecutorConfig {
            backup_policy: BackupPolicy::Disabled,
            ..Default::default()
        };
        FixExecutor::new(config, None).with_validator(Box::new(NoopValidator))
    }

    #[derive(Default)]
    struct Counting {
        started: AtomicUsize,
        completed: AtomicUsize,
        failed: AtomicUsize,
    }

    impl ProgressCallback for Arc<Counting> {
        fn on_fix_start(&self, _fix_id: &str, _path: &Path) {
            self.started.fetch_add(1, Ordering::SeqCst);
        }
        fn on_fix_complete(&self, _record: &ExecutionRecord) {
            self.completed.fetch_add(1, Ordering::SeqCst);
        }
        fn on_fix_failed(&self, _record: &ExecutionRecord) {
            self.failed.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_required_backup_without_store_fails() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.txt");
        fs::write(&path, "a\n").unwrap();

        let executor = FixExecutor::new(ExecutorConfig::default(), None);
        let result = FixResult::new(path.clone(), vec![fix(1, "b")], "m");
        let record = executor.execute_fix(
            "f1",
            &path,
            &result,
            &ConfirmationDecision::approved("f1"),
            None,
        );
        assert_eq!(record.status, ExecutionStatus::Failed);
        assert_eq!(fs::read_to_string(&path).unwrap(), "a\n");
    }

    #[test]
    fn test_best_effort_without_store_proceeds() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.txt");
        fs::write(&path, "a\n").unwrap();

        let config = ExecutorConfig {
            backup_policy: BackupPolicy::BestEffort,
            ..Default::default()
        };
        let executor = FixExecutor::new(config, None);
        let result = FixResult::new(path.clone(), vec![fix(1, "b")], "m");
        let record = executor.execute_fix(
            "f1",
            &path,
            &result,
            &ConfirmationDecision::approved("f1"),
            None,
        );
        assert_eq!(record.status, ExecutionStatus::Completed);
        assert!(record.backup_id.is_none());
        assert_eq!(fs::read_to_string(&path).unwrap(), "b\n");
    }

    #[test]
    fn test_attempted_backup_is_not_retried() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.txt");
        fs::write(&path, "a\n").unwrap();

        let config = ExecutorConfig {
            backup_policy: BackupPolicy::BestEffort,
            ..Default::default()
        };
        let store = Arc::new(
            BackupStore::open(&dir.path().join("backups"), Default::default()).unwrap(),
        );
        let executor = FixExecutor::new(config, Some(store.clone()))
            .with_validator(Box::new(NoopValidator));
        let result = FixResult::new(path.clone(), vec![fix(1, "b")], "m");
        let record = executor.execute_fix_with(
            "f1",
            &path,
            &result,
            &ConfirmationDecision::approved("f1"),
            PriorBackup::Attempted,
        );

        assert_eq!(record.status, ExecutionStatus::Completed);
        assert!(record.backup_id.is_none());
        assert!(store.list_backups(None, 10).is_empty());
        assert_eq!(fs::read_to_string(&path).unwrap(), "b\n");
    }

    #[test]
    fn test_attempted_without_backup_fails_when_required() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.txt");
        fs::write(&path, "a\n").unwrap();

        let store = Arc::new(
            BackupStore::open(&dir.path().join("backups"), Default::default()).unwrap(),
        );
        let executor = FixExecutor::new(ExecutorConfig::default(), Some(store.clone()))
            .with_validator(Box::new(NoopValidator));
        let result = FixResult::new(path.clone(), vec![fix(1, "b")], "m");
        let record = executor.execute_fix_with(
            "f1",
            &path,
            &result,
            &ConfirmationDecision::approved("f1"),
            PriorBackup::Attempted,
        );

        assert_eq!(record.status, ExecutionStatus::Failed);
        assert!(store.list_backups(None, 10).is_empty());
        assert_eq!(fs::read_to_string(&path).unwrap(), "a\n");
    }

    #[test]
    fn test_not_utf8_fails() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bin.dat");
        fs::write(&path, [0xff, 0xfe, 0x00]).unwrap();

        let executor = no_backup_executor();
        let result = FixResult::new(path.clone(), vec![fix(1, "b")], "m");
        let record = executor.execute_fix(
            "f1",
            &path,
            &result,
            &ConfirmationDecision::approved("f1"),
            None,
        );
        assert_eq!(record.status, ExecutionStatus::Failed);
        assert!(record.error.unwrap().contains("UTF-8"));
    }

    #[test]
    fn test_progress_callbacks_and_history() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.txt");
        fs::write(&path, "a\n").unwrap();

        let counts = Arc::new(Counting::default());
        let executor = no_backup_executor().with_progress(Box::new(counts.clone()));
        let result = FixResult::new(path.clone(), vec![fix(1, "b")], "m");

        executor.execute_fix("ok", &path, &result, &ConfirmationDecision::approved("ok"), None);
        executor.execute_fix(
            "missing",
            &dir.path().join("nope.txt"),
            &result,
            &ConfirmationDecision::approved("missing"),
            None,
        );

        assert_eq!(counts.started.load(Ordering::SeqCst), 2);
        assert_eq!(counts.completed.load(Ordering::SeqCst), 1);
        assert_eq!(counts.failed.load(Ordering::SeqCst), 1);
        assert_eq!(executor.history().len(), 2);
        assert!(executor.get_record("ok").unwrap().success());
    }

    #[test]
    fn test_no_rollback_when_disabled() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.txt");
        fs::write(&path, "a\n").unwrap();

        let config = ExecutorConfig {
            backup_policy: BackupPolicy::Disabled,
            auto_rollback: false,
            ..Default::default()
        };
        let executor = FixExecutor::new(config, None);
        let result = FixResult::new(path.clone(), vec![fix(9, "b")], "m");
        let record = executor.execute_fix(
            "f1",
            &path,
            &result,
            &ConfirmationDecision::approved("f1"),
            None,
        );
        assert_eq!(record.status, ExecutionStatus::Failed);
        assert!(record.rollback_successful.is_none());
    }
}
