//! Suggestion data model
//!
//! Issues flow in from the analyzers, suggestions flow out of the parser.
//! Both are immutable once produced.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Issue severity, ordered from least to most severe
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Parse a severity label as produced by analyzers or the model
    ///
    /// Unknown labels map to `Medium` rather than failing the whole response.
    pub fn parse_lenient(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "info" | "information" | "convention" | "refactor" => Severity::Info,
            "low" | "minor" | "warning" => Severity::Low,
            "medium" | "moderate" => Severity::Medium,
            "high" | "major" | "error" => Severity::High,
            "critical" | "fatal" | "blocker" => Severity::Critical,
            _ => Severity::Medium,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 1-based line/column anchor. Line 0 means "not anchored".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub line: usize,
    #[serde(default)]
    pub column: usize,
}

impl Location {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

/// A raw issue reported by one of the static analyzers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeIssue {
    pub issue_id: String,
    pub issue_type: String,
    pub message: String,
    #[serde(default)]
    pub line: usize,
    #[serde(default)]
    pub column: usize,
    #[serde(default)]
    pub severity: Severity,
    /// Analyzer that reported the issue (ast, pylint, flake8, bandit, ...)
    #[serde(default)]
    pub source: String,
}

impl CodeIssue {
    pub fn new(issue_id: &str, issue_type: &str, message: &str, line: usize) -> Self {
        Self {
            issue_id: issue_id.to_string(),
            issue_type: issue_type.to_string(),
            message: message.to_string(),
            line,
            column: 0,
            severity: Severity::Medium,
            source: String::new(),
        }
    }
}

/// A single proposed, line-anchored text edit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixSuggestion {
    pub issue_id: String,
    pub issue_type: String,
    pub description: String,
    pub location: Location,
    pub severity: Severity,
    /// Replacement text for the anchored line (may span several lines)
    pub fixed_code: String,
    pub explanation: String,
    /// Model confidence in [0, 1]
    pub confidence: f64,
    pub tags: Vec<String>,
}

impl FixSuggestion {
    pub fn is_anchored(&self) -> bool {
        self.location.line > 0
    }
}

/// Token accounting reported by the completion call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

impl TokenUsage {
    pub fn new(prompt_tokens: u64, completion_tokens: u64) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }
}

/// Outcome of one generation call for one file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixResult {
    pub file_path: PathBuf,
    pub success: bool,
    pub suggestions: Vec<FixSuggestion>,
    /// Precomputed merge of all suggestions, when the model supplied one
    pub complete_fixed_content: Option<String>,
    pub model_used: String,
    pub token_usage: TokenUsage,
    pub error: Option<String>,
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl FixResult {
    /// Successful result carrying the given suggestions
    pub fn new(file_path: PathBuf, suggestions: Vec<FixSuggestion>, model_used: &str) -> Self {
        Self {
            file_path,
            success: true,
            suggestions,
            complete_fixed_content: None,
            model_used: model_used.to_string(),
            token_usage: TokenUsage::default(),
            error: None,
            metadata: BTreeMap::new(),
        }
    }

    /// Unsuccessful result with an error message and no suggestions
    pub fn failed(file_path: PathBuf, model_used: &str, error: impl Into<String>) -> Self {
        Self {
            file_path,
            success: false,
            suggestions: Vec::new(),
            complete_fixed_content: None,
            model_used: model_used.to_string(),
            token_usage: TokenUsage::default(),
            error: Some(error.into()),
            metadata: BTreeMap::new(),
        }
    }

    /// Lowest confidence across all suggestions (None when there are none)
    pub fn min_confidence(&self) -> Option<f64> {
        self.suggestions
            .iter()
            .map(|s| s.confidence)
            .fold(None, |acc, c| match acc {
                None => Some(c),
                Some(m) => Some(if c < m { c } else { m }),
            })
    }

    pub fn has_changes(&self) -> bool {
        !self.suggestions.is_empty() || self.complete_fixed_content.is_some()
    }
}
