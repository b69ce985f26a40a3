//! Fix requests and their validation
//!
//! Validation runs before any stage touches the file: analysis type and
//! issue list first, then file checks.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::suggestions::CodeIssue;

/// Analyzer family that produced the issues
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisType {
    Ast,
    Pylint,
    Flake8,
    Bandit,
    Security,
    Style,
    Comprehensive,
}

impl AnalysisType {
    pub const ALL: [AnalysisType; 7] = [
        AnalysisType::Ast,
        AnalysisType::Pylint,
        AnalysisType::Flake8,
        AnalysisType::Bandit,
        AnalysisType::Security,
        AnalysisType::Style,
        AnalysisType::Comprehensive,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisType::Ast => "ast",
            AnalysisType::Pylint => "pylint",
            AnalysisType::Flake8 => "flake8",
            AnalysisType::Bandit => "bandit",
            AnalysisType::Security => "security",
            AnalysisType::Style => "style",
            AnalysisType::Comprehensive => "comprehensive",
        }
    }
}

impl FromStr for AnalysisType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        AnalysisType::ALL
            .into_iter()
            .find(|t| t.as_str() == wanted)
            .ok_or_else(|| ValidationError::UnknownAnalysisType(s.to_string()))
    }
}

impl std::fmt::Display for AnalysisType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request validation errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Unknown analysis type: {0}")]
    UnknownAnalysisType(String),

    #[error("No issues to fix for {0}")]
    NoIssues(String),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Not a regular file: {0}")]
    NotAFile(String),

    #[error("File too large: {path} ({size} bytes, limit {limit})")]
    TooLarge { path: String, size: u64, limit: u64 },

    #[error("File is not valid UTF-8: {0}")]
    NotUtf8(String),

    #[error("Duplicate path in batch: {0}")]
    DuplicatePath(String),

    #[error("Cannot read {path}: {reason}")]
    Unreadable { path: String, reason: String },
}

/// One file to fix
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixRequest {
    pub file_path: PathBuf,
    pub issues: Vec<CodeIssue>,
    pub analysis_type: String,
    /// Caller-chosen id; generated when absent
    #[serde(default)]
    pub fix_id: Option<String>,
}

impl FixRequest {
    pub fn new(file_path: impl Into<PathBuf>, issues: Vec<CodeIssue>, analysis_type: &str) -> Self {
        Self {
            file_path: file_path.into(),
            issues,
            analysis_type: analysis_type.to_string(),
            fix_id: None,
        }
    }

    pub fn with_fix_id(mut self, fix_id: &str) -> Self {
        self.fix_id = Some(fix_id.to_string());
        self
    }
}

/// A request that passed validation, with the file already read
#[derive(Debug, Clone)]
pub struct ValidatedRequest {
    pub analysis_type: AnalysisType,
    pub content: String,
}

/// Check a request without modifying anything
pub fn validate_request(
    request: &FixRequest,
    max_file_size: u64,
) -> Result<ValidatedRequest, ValidationError> {
    let analysis_type: AnalysisType = request.analysis_type.parse()?;
    let path = request.file_path.display().to_string();

    if request.issues.is_empty() {
        return Err(ValidationError::NoIssues(path));
    }

    let meta = match fs::metadata(&request.file_path) {
        Ok(meta) => meta,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(ValidationError::FileNotFound(path))
        }
        Err(e) => {
            return Err(ValidationError::Unreadable {
                path,
                reason: e.to_string(),
            })
        }
    };
    if !meta.is_file() {
        return Err(ValidationError::NotAFile(path));
    }
    if meta.len() > max_file_size {
        return Err(ValidationError::TooLarge {
            path,
            size: meta.len(),
            limit: max_file_size,
        });
    }

    let bytes = fs::read(&request.file_path).map_err(|e| ValidationError::Unreadable {
        path: path.clone(),
        reason: e.to_string(),
    })?;
    let content = String::from_utf8(bytes).map_err(|_| ValidationError::NotUtf8(path))?;

    Ok(ValidatedRequest {
        analysis_type,
        content,
    })
}

/// Key used to detect the same file twice in one batch
pub(crate) fn path_key(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}
