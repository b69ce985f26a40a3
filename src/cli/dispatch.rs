//! CLI command dispatch
//!
//! Dispatches to command handlers:
//! - apply: run one recorded model response through the fix pipeline
//! - diff: render the difference between two files
//! - backups: list, restore, stats, cleanup, delete

use std::fs;
use std::io::{self, BufReader};
use std::path::Path;
use std::sync::Arc;

use crate::backup_store::{BackupRecord, BackupStatistics, BackupStore};
use crate::cli::args::{ApplyArgs, BackupsCommand, Cli, Command, DiffArgs};
use crate::cli::{Error, Result, EXIT_FAILURE, EXIT_SUCCESS};
use crate::config::{config_home, resolve_backup_root, FixConfig};
use crate::confirmation::{AutoDecision, ConfirmationDecision, DecisionProvider, InteractiveProvider};
use crate::diff_engine::{analyze_change_complexity, DiffEngine};
use crate::fix_executor::build_fixed_content;
use crate::pipeline::{FixPipeline, FixProcessResult, FixRequest};
use crate::suggestions::{parse_fix_response, CodeIssue, StaticGenerator};

/// Model name recorded for responses read from disk
const RECORDED_MODEL: &str = "recorded";

/// Exit code wrapper for CLI operations
pub type ExitCode = i32;

/// Run a parsed command line and return the process exit code
pub async fn run_cli(cli: Cli) -> ExitCode {
    match dispatch(&cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {}", e);
            e.exit_code()
        }
    }
}

async fn dispatch(cli: &Cli) -> Result<ExitCode> {
    let config = load_config(cli.config.as_deref())?;

    match &cli.command {
        Command::Apply(args) => run_apply(cli, config, args).await,
        Command::Diff(args) => run_diff(args),
        Command::Backups(cmd) => run_backups(cli, &config, cmd),
    }
}

/// `--config` if given, else `config.toml` in the fix home, else defaults
pub fn load_config(explicit: Option<&Path>) -> Result<FixConfig> {
    let config = match explicit {
        Some(path) => FixConfig::load(path)?,
        None => FixConfig::load_or_default(&config_home())?,
    };
    Ok(config)
}

fn open_store(cli: &Cli, config: &FixConfig) -> Result<BackupStore> {
    let root = resolve_backup_root(cli.backup_root.as_deref());
    Ok(BackupStore::open(&root, config.backup.clone())?)
}

fn read_text(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|e| Error::Input {
        path: path.display().to_string(),
        reason: e.to_string(),
    })
}

async fn run_apply(cli: &Cli, config: FixConfig, args: &ApplyArgs) -> Result<ExitCode> {
    let response = read_text(&args.response)?;
    let issues: Vec<CodeIssue> = serde_json::from_str(&read_text(&args.issues)?)?;

    if args.dry_run {
        return preview_fix(args, &response, &issues);
    }

    let store = if config.executor.backup_policy.creates_backups() {
        Some(Arc::new(open_store(cli, &config)?))
    } else {
        None
    };
    let generator = Arc::new(StaticGenerator::new(&response).with_model(RECORDED_MODEL));
    let provider: Arc<dyn DecisionProvider> = if args.yes {
        Arc::new(AutoDecision::approve())
    } else {
        Arc::new(InteractiveProvider::new(
            BufReader::new(io::stdin()),
            io::stdout(),
        ))
    };

    let pipeline = FixPipeline::new(config, generator, store, provider);
    let request = FixRequest::new(&args.file, issues, &args.analysis_type);
    let result = pipeline.process_file(request).await;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_process_result(&result);
    }
    Ok(if result.success { EXIT_SUCCESS } else { EXIT_FAILURE })
}

/// Parse, merge and diff without touching the file or the backup store
fn preview_fix(args: &ApplyArgs, response: &str, issues: &[CodeIssue]) -> Result<ExitCode> {
    let original = read_text(&args.file)?;
    let fix_result = parse_fix_response(&args.file, response, RECORDED_MODEL, issues);
    if !fix_result.success {
        return Err(Error::Fix(
            fix_result
                .error
                .unwrap_or_else(|| "no usable fixes".to_string()),
        ));
    }

    let preview = ConfirmationDecision::approved("dry-run");
    let (fixed, applied) = build_fixed_content(&original, &fix_result, &preview)
        .map_err(|e| Error::Fix(e.to_string()))?;

    let engine = DiffEngine::default();
    let report = engine.generate_diff(&args.file, &original, &fixed);
    let complexity = analyze_change_complexity(&report);

    print!("{}", engine.unified_diff(&report));
    println!("{}", report.summary);
    println!(
        "{} suggestion(s), complexity {}: {}",
        applied.len(),
        complexity.complexity,
        complexity.recommendation
    );
    Ok(EXIT_SUCCESS)
}

fn print_process_result(result: &FixProcessResult) {
    println!("{}: {}", result.fix_id, result.file_path.display());
    let stages: Vec<&str> = result.completed_stages.iter().map(|s| s.as_str()).collect();
    println!("  stages:   {}", stages.join(" -> "));
    if let Some(ref summary) = result.diff_summary {
        println!("  diff:     {}", summary);
    }
    if let Some(ref decision) = result.decision {
        let auto = if decision.auto_approved { " (auto)" } else { "" };
        println!("  decision: {}{}", decision.status, auto);
    }
    if let Some(ref backup_id) = result.backup_id {
        println!("  backup:   {}", backup_id);
    }
    println!("  applied:  {} suggestion(s)", result.applied_count());
    if let Some(ref error) = result.error {
        println!("  error:    {}", error);
    }
}

fn run_diff(args: &DiffArgs) -> Result<ExitCode> {
    let old = read_text(&args.old)?;
    let new = read_text(&args.new)?;

    let engine = DiffEngine {
        context_lines: args.context,
        ..DiffEngine::default()
    };
    let report = engine.generate_diff(&args.old, &old, &new);
    print!("{}", engine.render(&report, args.format)?);
    Ok(EXIT_SUCCESS)
}

fn run_backups(cli: &Cli, config: &FixConfig, cmd: &BackupsCommand) -> Result<ExitCode> {
    let store = open_store(cli, config)?;

    match cmd {
        BackupsCommand::List { file, limit } => {
            let records = store.list_backups(file.as_deref(), *limit);
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&records)?);
            } else if records.is_empty() {
                println!("No backups");
            } else {
                for record in &records {
                    println!("{}", format_record(record));
                }
            }
        }
        BackupsCommand::Restore { backup_id, target } => {
            let restored = store.restore_backup(backup_id, target.as_deref())?;
            println!("Restored {} to {}", backup_id, restored.display());
        }
        BackupsCommand::Stats => {
            let stats = store.get_statistics();
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                print_statistics(&stats);
            }
        }
        BackupsCommand::Cleanup { days } => {
            let removed = match days {
                Some(days) => store.cleanup_expired(*days)?,
                None => store.cleanup_default()?,
            };
            println!("Removed {} expired backup(s)", removed);
        }
        BackupsCommand::Delete { backup_id } => {
            let record = store.delete_backup(backup_id)?;
            println!(
                "Deleted {} ({})",
                record.backup_id,
                record.original_path.display()
            );
        }
    }
    Ok(EXIT_SUCCESS)
}

fn format_record(record: &BackupRecord) -> String {
    let compressed = if record.is_compressed() { " gz" } else { "" };
    format!(
        "{}  {}  {:>8}B{}  {:<10}  {}",
        record.backup_id,
        record.timestamp.format("%Y-%m-%d %H:%M:%S"),
        record.size,
        compressed,
        record.reason,
        record.original_path.display()
    )
}

fn print_statistics(stats: &BackupStatistics) {
    println!("Backups:        {}", stats.total_backups);
    println!("Files tracked:  {}", stats.files_tracked);
    println!(
        "Size:           {} bytes ({} stored, {} compressed)",
        stats.total_size, stats.stored_size, stats.compressed_backups
    );
    println!("Average size:   {:.1} bytes", stats.average_size);
    if let (Some(oldest), Some(newest)) = (stats.oldest, stats.newest) {
        println!("Oldest:         {}", oldest.to_rfc3339());
        println!("Newest:         {}", newest.to_rfc3339());
    }
    for (reason, count) in &stats.by_reason {
        println!("  {:<14}{}", reason, count);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_backups_list_on_empty_store() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("backups");
        let cli = Cli::try_parse_from([
            "odincode-fix",
            "--backup-root",
            root.to_str().unwrap(),
            "backups",
            "list",
        ])
        .unwrap();
        assert_eq!(run_cli(cli).await, EXIT_SUCCESS);
    }

    #[tokio::test]
    async fn test_restore_unknown_backup_fails() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("backups");
        let cli = Cli::try_parse_from([
            "odincode-fix",
            "--backup-root",
            root.to_str().unwrap(),
            "backups",
            "restore",
            "nope",
        ])
        .unwrap();
        assert_eq!(run_cli(cli).await, crate::cli::EXIT_BACKUP_ERROR);
    }

    #[tokio::test]
    async fn test_apply_dry_run_leaves_file() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("app.py");
        fs::write(&file, "PASSWORD = \"hunter2\"\n").unwrap();
        let response = dir.path().join("response.json");
        fs::write(
            &response,
            r#"{"fixes": [{"issue_id": "B105", "line": 1, "fixed_code": "PASSWORD = os.environ[\"PW\"]", "confidence": 0.9}]}"#,
        )
        .unwrap();
        let issues = dir.path().join("issues.json");
        fs::write(
            &issues,
            r#"[{"issue_id": "B105", "issue_type": "hardcoded_password", "message": "Hardcoded password", "line": 1}]"#,
        )
        .unwrap();

        let cli = Cli::try_parse_from([
            "odincode-fix",
            "--config",
            dir.path().join("missing.toml").to_str().unwrap(),
            "apply",
            file.to_str().unwrap(),
            "--response",
            response.to_str().unwrap(),
            "--issues",
            issues.to_str().unwrap(),
            "--dry-run",
        ])
        .unwrap();
        // Explicit config path that does not exist is an error
        assert_eq!(run_cli(cli).await, crate::cli::EXIT_CONFIG_ERROR);

        let cli = Cli::try_parse_from([
            "odincode-fix",
            "--backup-root",
            dir.path().join("backups").to_str().unwrap(),
            "apply",
            file.to_str().unwrap(),
            "--response",
            response.to_str().unwrap(),
            "--issues",
            issues.to_str().unwrap(),
            "--dry-run",
        ])
        .unwrap();
        assert_eq!(run_cli(cli).await, EXIT_SUCCESS);
        assert_eq!(fs::read_to_string(&file).unwrap(), "PASSWORD = \"hunter2\"\n");
        assert!(!dir.path().join("backups").exists());
    }
}
