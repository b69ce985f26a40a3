//! Fix pipeline configuration
//!
//! Policies for backups, execution, confirmation and batching.
//! Loaded from `<root>/config.toml`; every field has a default so a partial
//! (or empty) file is valid.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Config file name inside the fix root
pub const CONFIG_FILE: &str = "config.toml";

/// Environment variable pointing at the fix home directory
pub const HOME_ENV_VAR: &str = "ODINCODE_FIX_HOME";

/// Default backup directory when nothing else is configured
pub const DEFAULT_BACKUP_DIR: &str = ".odincode_backups";

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error reading config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Config parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Whether the executor must hold a backup before mutating a file
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackupPolicy {
    /// Never create backups
    Disabled,
    /// Try to create one; proceed without it on failure
    BestEffort,
    /// Refuse to mutate without a backup
    #[default]
    Required,
}

impl BackupPolicy {
    pub fn creates_backups(&self) -> bool {
        !matches!(self, BackupPolicy::Disabled)
    }
}

/// Backup store settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackupConfig {
    /// Retained backups per resolved path (oldest evicted first)
    pub max_backups_per_file: usize,
    /// Backups strictly larger than this are gzip-compressed
    pub compression_threshold_bytes: u64,
    /// Age limit used by `cleanup_expired` when no explicit value is given
    pub retention_days: u32,
    /// Recorded as `created_by` on every backup
    pub created_by: String,
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            max_backups_per_file: 10,
            compression_threshold_bytes: 1024,
            retention_days: 30,
            created_by: "odincode-fix".to_string(),
        }
    }
}

/// Executor settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    pub backup_policy: BackupPolicy,
    /// Parse merged content before writing it
    pub validate_syntax: bool,
    /// Restore original content when a write fails
    pub auto_rollback: bool,
    /// Keep going after a failed entry in a batch
    pub continue_on_failure: bool,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            backup_policy: BackupPolicy::Required,
            validate_syntax: true,
            auto_rollback: true,
            continue_on_failure: true,
        }
    }
}

/// Confirmation gate settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfirmationConfig {
    /// Skip the decision provider for low-risk, high-confidence fixes
    pub auto_approve_safe: bool,
    /// Minimum per-suggestion confidence for auto-approval
    pub min_auto_approve_confidence: f64,
    /// Passed to decision providers; the gate itself never times out
    pub timeout_seconds: u64,
}

impl Default for ConfirmationConfig {
    fn default() -> Self {
        Self {
            auto_approve_safe: false,
            min_auto_approve_confidence: 0.8,
            timeout_seconds: 300,
        }
    }
}

/// Pipeline/batch settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Run batch files concurrently (bounded by `max_parallel_files`)
    pub parallel: bool,
    pub max_parallel_files: usize,
    pub generation_timeout_secs: u64,
    /// Files larger than this are rejected during validation
    pub max_file_size_bytes: u64,
    /// Ask the decision provider once for the whole batch before executing
    pub batch_confirmation: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            parallel: false,
            max_parallel_files: 4,
            generation_timeout_secs: 120,
            max_file_size_bytes: 1_048_576,
            batch_confirmation: false,
        }
    }
}

/// Complete configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FixConfig {
    pub backup: BackupConfig,
    pub executor: ExecutorConfig,
    pub confirmation: ConfirmationConfig,
    pub pipeline: PipelineConfig,
}

impl FixConfig {
    /// Load and validate a TOML config file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config = Self::from_toml(&text)?;
        info!("Loaded fix configuration from {}", path.display());
        Ok(config)
    }

    /// Load `<root>/config.toml` if present, defaults otherwise
    pub fn load_or_default(root: &Path) -> Result<Self, ConfigError> {
        let path = root.join(CONFIG_FILE);
        if path.exists() {
            Self::load(&path)
        } else {
            debug!("No config at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// Parse and validate TOML text
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let config: FixConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Settings for unattended runs: auto-approval on, best-effort backups
    pub fn permissive() -> Self {
        Self {
            executor: ExecutorConfig {
                backup_policy: BackupPolicy::BestEffort,
                ..Default::default()
            },
            confirmation: ConfirmationConfig {
                auto_approve_safe: true,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// Settings for safety-critical runs: sequential, stop on first failure
    pub fn restrictive() -> Self {
        Self {
            executor: ExecutorConfig {
                continue_on_failure: false,
                ..Default::default()
            },
            confirmation: ConfirmationConfig {
                auto_approve_safe: false,
                min_auto_approve_confidence: 0.95,
                ..Default::default()
            },
            pipeline: PipelineConfig {
                parallel: false,
                max_parallel_files: 1,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// Validate that configuration values are sensible
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.backup.max_backups_per_file == 0 {
            return Err(ConfigError::Invalid(
                "backup.max_backups_per_file must be > 0".to_string(),
            ));
        }
        if self.backup.retention_days == 0 {
            return Err(ConfigError::Invalid(
                "backup.retention_days must be > 0".to_string(),
            ));
        }
        let confidence = self.confirmation.min_auto_approve_confidence;
        if !(0.0..=1.0).contains(&confidence) {
            return Err(ConfigError::Invalid(format!(
                "confirmation.min_auto_approve_confidence ({}) must be within [0, 1]",
                confidence
            )));
        }
        if self.pipeline.max_parallel_files == 0 {
            return Err(ConfigError::Invalid(
                "pipeline.max_parallel_files must be > 0".to_string(),
            ));
        }
        if self.pipeline.generation_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "pipeline.generation_timeout_secs must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Directory searched for `config.toml` when `--config` is not given
///
/// `$ODINCODE_FIX_HOME`, else the platform config dir (`odincode-fix`
/// inside it), else the current directory.
pub fn config_home() -> PathBuf {
    if let Ok(home) = std::env::var(HOME_ENV_VAR) {
        if !home.trim().is_empty() {
            return PathBuf::from(home);
        }
    }
    dirs::config_dir()
        .map(|dir| dir.join("odincode-fix"))
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Resolve the backup root
///
/// # Resolution Priority
/// 1. Explicit path (from `--backup-root`)
/// 2. `$ODINCODE_FIX_HOME/backups`
/// 3. `./.odincode_backups`
pub fn resolve_backup_root(explicit: Option<&Path>) -> PathBuf {
    if let Some(path) = explicit {
        return path.to_path_buf();
    }
    if let Ok(home) = std::env::var(HOME_ENV_VAR) {
        if !home.trim().is_empty() {
            return PathBuf::from(home).join("backups");
        }
    }
    PathBuf::from(DEFAULT_BACKUP_DIR)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = FixConfig::default();
        assert_eq!(config.backup.max_backups_per_file, 10);
        assert_eq!(config.backup.compression_threshold_bytes, 1024);
        assert_eq!(config.executor.backup_policy, BackupPolicy::Required);
        assert!(config.executor.validate_syntax);
        assert!(config.executor.auto_rollback);
        assert!(!config.confirmation.auto_approve_safe);
        assert_eq!(config.confirmation.min_auto_approve_confidence, 0.8);
        assert!(!config.pipeline.parallel);
        assert!(!config.pipeline.batch_confirmation);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_toml_is_default() {
        let config = FixConfig::from_toml("").unwrap();
        assert_eq!(config, FixConfig::default());
    }

    #[test]
    fn test_partial_toml() {
        let text = r#"
[backup]
max_backups_per_file = 3

[executor]
backup_policy = "best_effort"
validate_syntax = false

[pipeline]
parallel = true
max_parallel_files = 8
batch_confirmation = true
"#;
        let config = FixConfig::from_toml(text).unwrap();
        assert_eq!(config.backup.max_backups_per_file, 3);
        assert_eq!(config.backup.retention_days, 30);
        assert_eq!(config.executor.backup_policy, BackupPolicy::BestEffort);
        assert!(!config.executor.validate_syntax);
        assert!(config.pipeline.parallel);
        assert_eq!(config.pipeline.max_parallel_files, 8);
        assert!(config.pipeline.batch_confirmation);
    }

    #[test]
    fn test_validate_rejects_zero_retention_count() {
        let text = "[backup]\nmax_backups_per_file = 0\n";
        assert!(matches!(
            FixConfig::from_toml(text),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_validate_rejects_confidence_out_of_range() {
        let mut config = FixConfig::default();
        config.confirmation.min_auto_approve_confidence = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_workers() {
        let mut config = FixConfig::default();
        config.pipeline.max_parallel_files = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_bad_toml_is_parse_error() {
        assert!(matches!(
            FixConfig::from_toml("[backup\n"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_presets() {
        let permissive = FixConfig::permissive();
        assert!(permissive.confirmation.auto_approve_safe);
        assert_eq!(permissive.executor.backup_policy, BackupPolicy::BestEffort);
        assert!(permissive.validate().is_ok());

        let restrictive = FixConfig::restrictive();
        assert!(!restrictive.executor.continue_on_failure);
        assert_eq!(restrictive.pipeline.max_parallel_files, 1);
        assert!(restrictive.validate().is_ok());
    }

    #[test]
    fn test_resolve_backup_root_explicit_wins() {
        let root = resolve_backup_root(Some(Path::new("/tmp/explicit")));
        assert_eq!(root, PathBuf::from("/tmp/explicit"));
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = FixConfig::load_or_default(dir.path()).unwrap();
        assert_eq!(config, FixConfig::default());
    }

    #[test]
    fn test_load_reads_file() {
        let dir = tempfile::TempDir::new().unwrap();
        fs::write(
            dir.path().join(CONFIG_FILE),
            "[confirmation]\nauto_approve_safe = true\n",
        )
        .unwrap();
        let config = FixConfig::load_or_default(dir.path()).unwrap();
        assert!(config.confirmation.auto_approve_safe);
    }
}
