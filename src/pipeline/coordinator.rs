//! Fix pipeline coordinator
//!
//! Drives one file through validation, generation, backup, diff,
//! confirmation and execution. Stage failures end up in the file's
//! `FixProcessResult`; a batch never aborts because one file failed.
//!
//! With `batch_confirmation` every file of a batch is prepared first and
//! the decision provider is asked once for all of them.

use futures::stream::{self, StreamExt};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::backup_store::BackupStore;
use crate::config::{BackupPolicy, FixConfig};
use crate::confirmation::{
    ConfirmationDecision, ConfirmationGate, ConfirmationRequest, DecisionProvider,
};
use crate::diff_engine::{analyze_change_complexity, DiffEngine};
use crate::fix_executor::{
    build_fixed_content, ContinueOnFailure, ExecutionStatus, FixExecutor, PriorBackup,
    ProgressCallback, StopOnFailure, SyntaxValidator, PRE_FIX_REASON,
};
use crate::pipeline::request::{path_key, validate_request, FixRequest, ValidationError};
use crate::pipeline::result::{BatchProcessResult, ErrorKind, FixProcessResult, PipelineStage};
use crate::suggestions::{
    build_fix_prompt, parse_fix_response, FixResult, GenerationError, GenerationRequest,
    SuggestionGenerator,
};

/// How a batch is scheduled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchMode {
    /// One file at a time; the failure hook may stop the batch
    Sequential,
    /// Up to `max_parallel_files` files in flight; results keep input order
    Parallel { max_parallel_files: usize },
}

/// Decides whether a sequential batch continues after a failed file
pub trait BatchFailureHook: Send + Sync {
    fn should_continue(&self, failed: &FixProcessResult) -> bool;
}

impl BatchFailureHook for ContinueOnFailure {
    fn should_continue(&self, _failed: &FixProcessResult) -> bool {
        true
    }
}

impl BatchFailureHook for StopOnFailure {
    fn should_continue(&self, _failed: &FixProcessResult) -> bool {
        false
    }
}

/// End-to-end fix pipeline
pub struct FixPipeline {
    config: FixConfig,
    generator: Arc<dyn SuggestionGenerator>,
    backups: Option<Arc<BackupStore>>,
    gate: ConfirmationGate,
    executor: FixExecutor,
    diff_engine: DiffEngine,
}

impl FixPipeline {
    pub fn new(
        config: FixConfig,
        generator: Arc<dyn SuggestionGenerator>,
        backups: Option<Arc<BackupStore>>,
        provider: Arc<dyn DecisionProvider>,
    ) -> Self {
        let gate = ConfirmationGate::new(config.confirmation.clone(), provider);
        let executor = FixExecutor::new(config.executor.clone(), backups.clone());
        Self {
            config,
            generator,
            backups,
            gate,
            executor,
            diff_engine: DiffEngine::default(),
        }
    }

    pub fn with_validator(mut self, validator: Box<dyn SyntaxValidator>) -> Self {
        self.executor = self.executor.with_validator(validator);
        self
    }

    pub fn with_progress(mut self, progress: Box<dyn ProgressCallback>) -> Self {
        self.executor = self.executor.with_progress(progress);
        self
    }

    pub fn with_diff_engine(mut self, engine: DiffEngine) -> Self {
        self.diff_engine = engine;
        self
    }

    pub fn config(&self) -> &FixConfig {
        &self.config
    }

    pub fn gate(&self) -> &ConfirmationGate {
        &self.gate
    }

    pub fn executor(&self) -> &FixExecutor {
        &self.executor
    }

    pub fn backup_store(&self) -> Option<&Arc<BackupStore>> {
        self.backups.as_ref()
    }

    /// Process one file with no external cancellation
    pub async fn process_file(&self, request: FixRequest) -> FixProcessResult {
        self.process_file_with(request, &CancellationToken::new())
            .await
    }

    /// Process one file
    ///
    /// `cancel` is honoured until generation finishes; once a file reaches
    /// backup it runs to completion.
    pub async fn process_file_with(
        &self,
        request: FixRequest,
        cancel: &CancellationToken,
    ) -> FixProcessResult {
        let prepared = match self.prepare(request, cancel).await {
            Ok(prepared) => prepared,
            Err(done) => return done,
        };
        let decision = self.gate.decide(&prepared.confirm).await;
        self.execute_prepared(prepared, decision)
    }

    /// Validation through diff; `Err` carries the finished, failed result
    async fn prepare(
        &self,
        request: FixRequest,
        cancel: &CancellationToken,
    ) -> Result<Prepared, FixProcessResult> {
        let started = Instant::now();
        let fix_id = request.fix_id.clone().unwrap_or_else(new_fix_id);
        let result = FixProcessResult::new(&fix_id, request.file_path.clone());

        if cancel.is_cancelled() {
            return Err(result
                .fail(None, ErrorKind::Cancelled, "batch cancelled before file started")
                .finish(started.elapsed()));
        }

        self.prepare_stages(request, result, cancel, started)
            .await
            .map_err(|failed| failed.finish(started.elapsed()))
    }

    async fn prepare_stages(
        &self,
        request: FixRequest,
        mut result: FixProcessResult,
        cancel: &CancellationToken,
        started: Instant,
    ) -> Result<Prepared, FixProcessResult> {
        let path = request.file_path.clone();
        let fix_id = result.fix_id.clone();

        // Validation
        let validated = match validate_request(&request, self.config.pipeline.max_file_size_bytes) {
            Ok(v) => v,
            Err(e) => {
                warn!(fix_id = %fix_id, file = %path.display(), "request rejected: {}", e);
                return Err(result.fail(Some(PipelineStage::Validation), ErrorKind::Validation, e.to_string()));
            }
        };
        result.complete(PipelineStage::Validation);
        let original = validated.content;

        // Generation
        let fix_result = match self
            .generate(&path, &original, &request, validated.analysis_type.as_str(), cancel)
            .await
        {
            Ok(fr) => fr,
            Err(GenerationError::Cancelled) => {
                info!(fix_id = %fix_id, "generation cancelled");
                return Err(result.fail(
                    Some(PipelineStage::Generation),
                    ErrorKind::Cancelled,
                    GenerationError::Cancelled.to_string(),
                ));
            }
            Err(e) => {
                warn!(fix_id = %fix_id, file = %path.display(), "generation failed: {}", e);
                return Err(result.fail(Some(PipelineStage::Generation), ErrorKind::Generation, e.to_string()));
            }
        };
        result.fix_result = Some(fix_result.clone());
        if !fix_result.success {
            let reason = fix_result
                .error
                .clone()
                .unwrap_or_else(|| "no usable fixes".to_string());
            return Err(result.fail(Some(PipelineStage::Generation), ErrorKind::Generation, reason));
        }
        result.complete(PipelineStage::Generation);

        // Backup
        let prior_backup = match self.backup(&path, &fix_id, &request) {
            Ok(prior) => prior,
            Err(reason) => {
                return Err(result.fail(Some(PipelineStage::Backup), ErrorKind::Backup, reason));
            }
        };
        if let PriorBackup::Created(ref backup_id) = prior_backup {
            result.backup_id = Some(backup_id.clone());
        }
        result.complete(PipelineStage::Backup);

        // Diff of the full preview; a merge conflict here is an execution failure
        let preview = ConfirmationDecision::approved(&fix_id);
        let fixed = match build_fixed_content(&original, &fix_result, &preview) {
            Ok((fixed, _)) => fixed,
            Err(e) => {
                warn!(fix_id = %fix_id, file = %path.display(), "fixes do not merge: {}", e);
                return Err(result.fail(Some(PipelineStage::Diff), ErrorKind::Execution, e.to_string()));
            }
        };
        let diff = self.diff_engine.generate_diff(&path, &original, &fixed);
        let complexity = analyze_change_complexity(&diff);
        debug!(
            fix_id = %fix_id,
            complexity = %complexity.complexity,
            ratio = complexity.ratio,
            "diff prepared"
        );
        result.diff_summary = Some(diff.summary.clone());
        result.complexity = Some(complexity.complexity);
        result.complete(PipelineStage::Diff);

        let confirm = ConfirmationRequest::new(
            &fix_id,
            fix_result,
            diff,
            result.backup_id.clone(),
            self.config.confirmation.timeout_seconds,
        );
        Ok(Prepared {
            result,
            path,
            confirm,
            prior_backup,
            started,
        })
    }

    /// Record the decision and run the executor
    fn execute_prepared(&self, prepared: Prepared, decision: ConfirmationDecision) -> FixProcessResult {
        let Prepared {
            mut result,
            path,
            confirm,
            prior_backup,
            started,
        } = prepared;

        result.decision = Some(decision.clone());
        result.complete(PipelineStage::Confirmation);

        let record = self.executor.execute_fix_with(
            &confirm.fix_id,
            &path,
            &confirm.fix_result,
            &decision,
            prior_backup,
        );
        let status = record.status;
        let rollback_failed = record.rollback_successful == Some(false);
        let error = record.error.clone();
        if record.backup_id.is_some() {
            result.backup_id = record.backup_id.clone();
        }
        result.execution = Some(record);

        let result = match status {
            ExecutionStatus::Completed => {
                result.complete(PipelineStage::Execution);
                result.success = true;
                result
            }
            _ => {
                let kind = if rollback_failed {
                    ErrorKind::Rollback
                } else {
                    ErrorKind::Execution
                };
                let reason = error.unwrap_or_else(|| format!("execution ended {}", status));
                result.fail(Some(PipelineStage::Execution), kind, reason)
            }
        };
        result.finish(started.elapsed())
    }

    async fn generate(
        &self,
        path: &Path,
        content: &str,
        request: &FixRequest,
        analysis_type: &str,
        cancel: &CancellationToken,
    ) -> Result<FixResult, GenerationError> {
        let gen_request = GenerationRequest {
            file_path: path.to_path_buf(),
            prompt: build_fix_prompt(path, content, &request.issues, analysis_type),
            issues: request.issues.clone(),
        };
        let secs = self.config.pipeline.generation_timeout_secs;

        let completion = tokio::select! {
            _ = cancel.cancelled() => return Err(GenerationError::Cancelled),
            outcome = tokio::time::timeout(
                Duration::from_secs(secs),
                self.generator.generate(&gen_request),
            ) => match outcome {
                Ok(completion) => completion?,
                Err(_) => return Err(GenerationError::Timeout(secs)),
            },
        };

        let mut fix_result = parse_fix_response(path, &completion.text, &completion.model, &request.issues);
        fix_result.token_usage = completion.token_usage;
        Ok(fix_result)
    }

    /// Backup per policy; `Err` only when a required backup is missing
    fn backup(&self, path: &Path, fix_id: &str, request: &FixRequest) -> Result<PriorBackup, String> {
        let policy = self.config.executor.backup_policy;
        if !policy.creates_backups() {
            return Ok(PriorBackup::NotAttempted);
        }
        let required = policy == BackupPolicy::Required;

        let Some(store) = self.backups.as_ref() else {
            if required {
                return Err("backups required but no backup store is configured".to_string());
            }
            warn!(fix_id, "no backup store, proceeding without backup");
            return Ok(PriorBackup::Attempted);
        };

        let issues: Vec<String> = request.issues.iter().map(|i| i.issue_id.clone()).collect();
        match store.create_backup(path, PRE_FIX_REASON, Some(fix_id), &issues) {
            Ok(record) => {
                debug!(fix_id, backup_id = %record.backup_id, "backup created");
                Ok(PriorBackup::Created(record.backup_id))
            }
            Err(e) if required => Err(e.to_string()),
            Err(e) => {
                warn!(fix_id, "backup failed, proceeding: {}", e);
                Ok(PriorBackup::Attempted)
            }
        }
    }

    /// Process a batch using the configured mode and failure policy
    pub async fn process_batch(&self, requests: Vec<FixRequest>) -> BatchProcessResult {
        let mode = if self.config.pipeline.parallel {
            BatchMode::Parallel {
                max_parallel_files: self.config.pipeline.max_parallel_files,
            }
        } else {
            BatchMode::Sequential
        };
        let cancel = CancellationToken::new();
        if self.config.executor.continue_on_failure {
            self.process_batch_with(requests, mode, &ContinueOnFailure, &cancel)
                .await
        } else {
            self.process_batch_with(requests, mode, &StopOnFailure, &cancel)
                .await
        }
    }

    /// Process a batch; one result per request, in input order
    pub async fn process_batch_with(
        &self,
        requests: Vec<FixRequest>,
        mode: BatchMode,
        hook: &dyn BatchFailureHook,
        cancel: &CancellationToken,
    ) -> BatchProcessResult {
        let started = Instant::now();
        info!(files = requests.len(), ?mode, "processing batch");

        // Same file twice in one batch: only the first is processed
        let mut seen = HashSet::new();
        let slots: Vec<Slot> = requests
            .into_iter()
            .map(|request| {
                if seen.insert(path_key(&request.file_path)) {
                    Ok(request)
                } else {
                    let fix_id = request.fix_id.clone().unwrap_or_else(new_fix_id);
                    let err = ValidationError::DuplicatePath(request.file_path.display().to_string());
                    Err(FixProcessResult::new(&fix_id, request.file_path).fail(
                        Some(PipelineStage::Validation),
                        ErrorKind::Validation,
                        err.to_string(),
                    ))
                }
            })
            .collect();

        let (results, stopped_early) = if self.config.pipeline.batch_confirmation {
            self.run_confirmed_batch(slots, mode, hook, cancel).await
        } else {
            self.run_batch(slots, mode, hook, cancel).await
        };

        let batch = BatchProcessResult::from_results(results, started.elapsed(), stopped_early);
        info!(
            total = batch.total_files,
            successful = batch.successful,
            failed = batch.failed,
            "{}",
            batch.summary
        );
        batch
    }

    async fn run_batch(
        &self,
        slots: Vec<Slot>,
        mode: BatchMode,
        hook: &dyn BatchFailureHook,
        cancel: &CancellationToken,
    ) -> (Vec<FixProcessResult>, bool) {
        match mode {
            BatchMode::Sequential => {
                let mut stopped_early = false;
                let mut results = Vec::with_capacity(slots.len());
                for slot in slots {
                    let request = match slot {
                        Ok(request) => request,
                        Err(done) => {
                            results.push(done);
                            continue;
                        }
                    };
                    if stopped_early || cancel.is_cancelled() {
                        stopped_early = true;
                        results.push(skipped(request));
                        continue;
                    }
                    let result = self.process_file_with(request, cancel).await;
                    if !result.success && !hook.should_continue(&result) {
                        warn!(fix_id = %result.fix_id, "stopping batch after failure");
                        stopped_early = true;
                    }
                    results.push(result);
                }
                (results, stopped_early)
            }
            BatchMode::Parallel { max_parallel_files } => {
                let results: Vec<FixProcessResult> = stream::iter(slots)
                    .map(|slot| async move {
                        match slot {
                            Ok(request) => self.process_file_with(request, cancel).await,
                            Err(done) => done,
                        }
                    })
                    .buffered(max_parallel_files.max(1))
                    .collect()
                    .await;
                (results, cancel.is_cancelled())
            }
        }
    }

    /// Prepare every file, ask once for the whole batch, then execute in order
    async fn run_confirmed_batch(
        &self,
        slots: Vec<Slot>,
        mode: BatchMode,
        hook: &dyn BatchFailureHook,
        cancel: &CancellationToken,
    ) -> (Vec<FixProcessResult>, bool) {
        let mut stopped_early = false;
        let staged: Vec<Result<Prepared, FixProcessResult>> = match mode {
            BatchMode::Sequential => {
                let mut staged = Vec::with_capacity(slots.len());
                for slot in slots {
                    let request = match slot {
                        Ok(request) => request,
                        Err(done) => {
                            staged.push(Err(done));
                            continue;
                        }
                    };
                    if stopped_early || cancel.is_cancelled() {
                        stopped_early = true;
                        staged.push(Err(skipped(request)));
                        continue;
                    }
                    let prepared = self.prepare(request, cancel).await;
                    if let Err(ref failed) = prepared {
                        if !hook.should_continue(failed) {
                            warn!(fix_id = %failed.fix_id, "stopping batch after failure");
                            stopped_early = true;
                        }
                    }
                    staged.push(prepared);
                }
                staged
            }
            BatchMode::Parallel { max_parallel_files } => {
                stream::iter(slots)
                    .map(|slot| async move {
                        match slot {
                            Ok(request) => self.prepare(request, cancel).await,
                            Err(done) => Err(done),
                        }
                    })
                    .buffered(max_parallel_files.max(1))
                    .collect()
                    .await
            }
        };

        let requests: Vec<ConfirmationRequest> = staged
            .iter()
            .filter_map(|entry| entry.as_ref().ok())
            .map(|prepared| prepared.confirm.clone())
            .collect();
        let mut decisions = if requests.is_empty() {
            Vec::new()
        } else {
            self.gate.decide_batch(&requests).await
        }
        .into_iter();
        info!(pending = requests.len(), "batch confirmation resolved");

        let mut halted = false;
        let mut results = Vec::with_capacity(staged.len());
        for entry in staged {
            let prepared = match entry {
                Ok(prepared) => prepared,
                Err(done) => {
                    results.push(done);
                    continue;
                }
            };
            let decision = decisions.next();
            if halted {
                results.push(prepared.skip());
                continue;
            }
            let decision = decision.unwrap_or_else(|| {
                ConfirmationDecision::cancelled(&prepared.confirm.fix_id, "no batch decision")
            });
            let result = self.execute_prepared(prepared, decision);
            if mode == BatchMode::Sequential && !result.success && !hook.should_continue(&result) {
                warn!(fix_id = %result.fix_id, "stopping batch after failure");
                halted = true;
            }
            results.push(result);
        }
        (results, stopped_early || halted || cancel.is_cancelled())
    }
}

/// A deduplicated request, or its already-final result
type Slot = Result<FixRequest, FixProcessResult>;

/// A file that passed validation, generation, backup and diff
struct Prepared {
    result: FixProcessResult,
    path: PathBuf,
    confirm: ConfirmationRequest,
    prior_backup: PriorBackup,
    started: Instant,
}

impl Prepared {
    fn skip(self) -> FixProcessResult {
        self.result
            .fail(None, ErrorKind::Cancelled, "not attempted: batch stopped")
            .finish(self.started.elapsed())
    }
}

fn skipped(request: FixRequest) -> FixProcessResult {
    let fix_id = request.fix_id.clone().unwrap_or_else(new_fix_id);
    FixProcessResult::new(&fix_id, request.file_path).fail(
        None,
        ErrorKind::Cancelled,
        "not attempted: batch stopped",
    )
}

fn new_fix_id() -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    format!("fix_{}", &id[..12])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::confirmation::{AutoDecision, ConfirmationStatus};
    use crate::fix_executor::NoopValidator;
    use crate::suggestions::{CodeIssue, StaticGenerator};
    use std::fs;
    use tempfile::TempDir;

    const RESPONSE: &str = r#"{
        "fixes": [{
            "issue_id": "B105",
            "line": 1,
            "fixed_code": "PASSWORD = os.environ.get(\"APP_PASSWORD\")",
            "explanation": "read from env",
            "confidence": 0.9
        }]
    }"#;

    fn request(path: &Path) -> FixRequest {
        FixRequest::new(
            path,
            vec![CodeIssue::new("B105", "hardcoded_password", "Hardcoded password", 1)],
            "bandit",
        )
    }

    fn pipeline(dir: &TempDir, generator: StaticGenerator) -> FixPipeline {
        let mut config = FixConfig::default();
        config.pipeline.generation_timeout_secs = 1;
        let store = BackupStore::open(&dir.path().join("backups"), config.backup.clone()).unwrap();
        FixPipeline::new(
            config,
            Arc::new(generator),
            Some(Arc::new(store)),
            Arc::new(AutoDecision::approve()),
        )
        .with_validator(Box::new(NoopValidator))
    }

    #[tokio::test]
    async fn test_process_file_applies_fix() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("settings.py");
        fs::write(&file, "PASSWORD = \"hunter2\"\nDEBUG = True\n").unwrap();

        let pipeline = pipeline(&dir, StaticGenerator::new(RESPONSE));
        let result = pipeline.process_file(request(&file)).await;

        assert!(result.success, "{:?}", result.error);
        assert_eq!(result.completed_stages.len(), 6);
        assert!(result.backup_id.is_some());
        assert_eq!(result.applied_count(), 1);
        assert_eq!(
            fs::read_to_string(&file).unwrap(),
            "PASSWORD = os.environ.get(\"APP_PASSWORD\")\nDEBUG = True\n"
        );
    }

    #[tokio::test]
    async fn test_generation_timeout() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("a.py");
        fs::write(&file, "PASSWORD = \"hunter2\"\n").unwrap();

        let generator = StaticGenerator::new(RESPONSE).delayed(Duration::from_secs(5));
        let result = pipeline(&dir, generator).process_file(request(&file)).await;

        assert!(!result.success);
        assert_eq!(result.failed_stage, Some(PipelineStage::Generation));
        assert_eq!(result.error_kind, Some(ErrorKind::Generation));
        assert_eq!(fs::read_to_string(&file).unwrap(), "PASSWORD = \"hunter2\"\n");
    }

    #[tokio::test]
    async fn test_cancel_during_generation() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("a.py");
        fs::write(&file, "PASSWORD = \"hunter2\"\n").unwrap();

        let generator = StaticGenerator::new(RESPONSE).delayed(Duration::from_millis(500));
        let pipeline = pipeline(&dir, generator);
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let result = pipeline.process_file_with(request(&file), &cancel).await;
        assert_eq!(result.error_kind, Some(ErrorKind::Cancelled));
        assert!(!result.reached(PipelineStage::Backup));
    }

    #[tokio::test]
    async fn test_rejected_is_success_without_changes() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("a.py");
        fs::write(&file, "PASSWORD = \"hunter2\"\n").unwrap();

        let mut config = FixConfig::default();
        config.pipeline.generation_timeout_secs = 1;
        let store = BackupStore::open(&dir.path().join("backups"), config.backup.clone()).unwrap();
        let pipeline = FixPipeline::new(
            config,
            Arc::new(StaticGenerator::new(RESPONSE)),
            Some(Arc::new(store)),
            Arc::new(AutoDecision::reject()),
        );

        let result = pipeline.process_file(request(&file)).await;
        assert!(result.success);
        assert_eq!(
            result.decision.as_ref().map(|d| d.status),
            Some(ConfirmationStatus::Rejected)
        );
        assert_eq!(result.applied_count(), 0);
        assert_eq!(fs::read_to_string(&file).unwrap(), "PASSWORD = \"hunter2\"\n");
    }

    #[tokio::test]
    async fn test_sequential_stop_on_failure() {
        let dir = TempDir::new().unwrap();
        let good = dir.path().join("good.py");
        fs::write(&good, "PASSWORD = \"hunter2\"\n").unwrap();

        let pipeline = pipeline(&dir, StaticGenerator::new(RESPONSE));
        let batch = pipeline
            .process_batch_with(
                vec![request(&dir.path().join("missing.py")), request(&good)],
                BatchMode::Sequential,
                &StopOnFailure,
                &CancellationToken::new(),
            )
            .await;

        assert_eq!(batch.total_files, 2);
        assert!(batch.stopped_early);
        assert_eq!(batch.results[1].error_kind, Some(ErrorKind::Cancelled));
        assert_eq!(fs::read_to_string(&good).unwrap(), "PASSWORD = \"hunter2\"\n");
    }

    #[tokio::test]
    async fn test_duplicate_path_in_batch() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("a.py");
        fs::write(&file, "PASSWORD = \"hunter2\"\n").unwrap();

        let pipeline = pipeline(&dir, StaticGenerator::new(RESPONSE));
        let batch = pipeline
            .process_batch_with(
                vec![request(&file), request(&file)],
                BatchMode::Parallel { max_parallel_files: 2 },
                &ContinueOnFailure,
                &CancellationToken::new(),
            )
            .await;

        assert_eq!(batch.successful, 1);
        assert_eq!(batch.results[1].failed_stage, Some(PipelineStage::Validation));
        assert!(batch.results[1]
            .error
            .as_deref()
            .unwrap_or_default()
            .contains("Duplicate path"));
    }

    #[tokio::test]
    async fn test_unmergeable_fix_fails_at_diff_as_execution() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("a.py");
        fs::write(&file, "PASSWORD = \"hunter2\"\nDEBUG = True\n").unwrap();

        let response = r#"{"fixes": [{"issue_id": "B105", "line": 40, "fixed_code": "x = 1", "confidence": 0.9}]}"#;
        let result = pipeline(&dir, StaticGenerator::new(response))
            .process_file(request(&file))
            .await;

        assert!(!result.success);
        assert_eq!(result.failed_stage, Some(PipelineStage::Diff));
        assert_eq!(result.error_kind, Some(ErrorKind::Execution));
        assert!(result.error.as_deref().unwrap_or_default().contains("out of range"));
        assert_eq!(
            fs::read_to_string(&file).unwrap(),
            "PASSWORD = \"hunter2\"\nDEBUG = True\n"
        );
    }

    #[tokio::test]
    async fn test_best_effort_without_store_skips_backup() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("a.py");
        fs::write(&file, "PASSWORD = \"hunter2\"\n").unwrap();

        let mut config = FixConfig::default();
        config.pipeline.generation_timeout_secs = 1;
        config.executor.backup_policy = BackupPolicy::BestEffort;
        let pipeline = FixPipeline::new(
            config,
            Arc::new(StaticGenerator::new(RESPONSE)),
            None,
            Arc::new(AutoDecision::approve()),
        )
        .with_validator(Box::new(NoopValidator));

        let result = pipeline.process_file(request(&file)).await;
        assert!(result.success, "{:?}", result.error);
        assert!(result.backup_id.is_none());
        assert!(result.reached(PipelineStage::Backup));
        assert_eq!(
            fs::read_to_string(&file).unwrap(),
            "PASSWORD = os.environ.get(\"APP_PASSWORD\")\n"
        );
    }
}
