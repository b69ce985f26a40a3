//! Fix response parser
//!
//! Turns a free-text completion into a structured `FixResult`.
//!
//! Accepted shapes, tried in order:
//! 1. The whole payload is the JSON object
//! 2. A fenced ```json block holds the JSON object
//! 3. The JSON object sits between the first `{` and the last `}`
//! 4. Fenced code blocks in free text, one suggestion per block
//!
//! Parsing never fails: an unusable response yields `success = false`.

use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::suggestions::types::{CodeIssue, FixResult, FixSuggestion, Location, Severity};

/// Confidence assigned to suggestions recovered from code blocks
pub const TEXT_PARSED_CONFIDENCE: f64 = 0.7;

/// Tag marking suggestions recovered from code blocks
pub const TEXT_PARSED_TAG: &str = "text_parsed";

/// Confidence used when the model omits one
const DEFAULT_CONFIDENCE: f64 = 0.5;

#[derive(Debug, Default, Deserialize)]
struct RawFixResponse {
    #[serde(default)]
    fixes: Vec<RawFix>,
    #[serde(default)]
    complete_fixed_file: Option<String>,
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    risk_assessment: Option<serde_json::Value>,
}

#[derive(Debug, Default, Deserialize)]
struct RawFix {
    #[serde(default)]
    issue_id: Option<String>,
    #[serde(default)]
    issue_type: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    location: Option<RawLocation>,
    #[serde(default)]
    line: Option<usize>,
    #[serde(default)]
    severity: Option<String>,
    #[serde(default)]
    fixed_code: Option<String>,
    #[serde(default)]
    explanation: Option<String>,
    #[serde(default)]
    confidence: Option<f64>,
    #[serde(default)]
    tags: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawLocation {
    #[serde(default)]
    line: usize,
    #[serde(default)]
    column: usize,
}

/// Parse a completion into a `FixResult`
///
/// `issues` is the request's issue list; code-block suggestions are anchored
/// to the issue at the same position when one exists.
pub fn parse_fix_response(
    file_path: &Path,
    raw: &str,
    model: &str,
    issues: &[CodeIssue],
) -> FixResult {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return FixResult::failed(file_path.to_path_buf(), model, "empty response from model");
    }

    if let Some(response) = parse_json_response(trimmed) {
        return from_json_response(file_path, model, response);
    }

    debug!(file = %file_path.display(), "response is not JSON, trying code block fallback");

    let suggestions = parse_code_blocks(trimmed, issues);
    if suggestions.is_empty() {
        warn!(file = %file_path.display(), "no usable fixes in model response");
        return FixResult::failed(
            file_path.to_path_buf(),
            model,
            "response contained neither a JSON fix object nor code blocks",
        );
    }

    let mut result = FixResult::new(file_path.to_path_buf(), suggestions, model);
    result
        .metadata
        .insert("parse_method".to_string(), serde_json::json!("text"));
    result
}

/// Try every JSON candidate in the payload, first success wins
fn parse_json_response(text: &str) -> Option<RawFixResponse> {
    let mut candidates: Vec<&str> = vec![text];
    if let Some(fenced) = extract_from_markdown(text) {
        candidates.push(fenced);
    }
    if let (Some(start), Some(end)) = (text.find('{'), text.rfind('}')) {
        if start < end {
            candidates.push(&text[start..=end]);
        }
    }

    for candidate in candidates {
        let candidate = candidate.trim();
        if !candidate.starts_with('{') {
            continue;
        }
        match serde_json::from_str::<RawFixResponse>(candidate) {
            Ok(response) => return Some(response),
            Err(e) => debug!("JSON candidate rejected: {}", e),
        }
    }
    None
}

/// Extract the body of the first fenced block tagged `json`
fn extract_from_markdown(text: &str) -> Option<&str> {
    let start = text.find("```json")?;
    let body_start = start + "```json".len();
    let end = text[body_start..].find("```")?;
    Some(&text[body_start..body_start + end])
}

fn from_json_response(file_path: &Path, model: &str, response: RawFixResponse) -> FixResult {
    let suggestions: Vec<FixSuggestion> = response
        .fixes
        .into_iter()
        .enumerate()
        .map(|(idx, raw)| convert_fix(idx, raw))
        .collect();

    let complete = response
        .complete_fixed_file
        .filter(|content| !content.trim().is_empty());

    let mut result = if suggestions.is_empty() && complete.is_none() {
        FixResult::failed(
            file_path.to_path_buf(),
            model,
            "response JSON contained no fixes",
        )
    } else {
        FixResult::new(file_path.to_path_buf(), suggestions, model)
    };
    result.complete_fixed_content = complete;

    result
        .metadata
        .insert("parse_method".to_string(), serde_json::json!("json"));
    if let Some(summary) = response.summary {
        result
            .metadata
            .insert("summary".to_string(), serde_json::json!(summary));
    }
    if let Some(risk) = response.risk_assessment {
        result.metadata.insert("risk_assessment".to_string(), risk);
    }
    result
}

fn convert_fix(idx: usize, raw: RawFix) -> FixSuggestion {
    let location = match (raw.location, raw.line) {
        (Some(loc), _) => Location::new(loc.line, loc.column),
        (None, Some(line)) => Location::new(line, 0),
        (None, None) => Location::default(),
    };

    FixSuggestion {
        issue_id: raw
            .issue_id
            .unwrap_or_else(|| format!("fix_{}", idx + 1)),
        issue_type: raw.issue_type.unwrap_or_else(|| "unknown".to_string()),
        description: raw.description.unwrap_or_default(),
        location,
        severity: raw
            .severity
            .as_deref()
            .map(Severity::parse_lenient)
            .unwrap_or_default(),
        fixed_code: raw.fixed_code.unwrap_or_default(),
        explanation: raw.explanation.unwrap_or_default(),
        confidence: clamp_confidence(raw.confidence.unwrap_or(DEFAULT_CONFIDENCE)),
        tags: raw.tags,
    }
}

fn clamp_confidence(value: f64) -> f64 {
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(0.0, 1.0)
}

fn code_block_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)```[A-Za-z0-9_+.\-]*[ \t]*\r?\n(.*?)```").ok())
        .as_ref()
}

/// Fallback: one suggestion per fenced code block
fn parse_code_blocks(text: &str, issues: &[CodeIssue]) -> Vec<FixSuggestion> {
    let Some(re) = code_block_regex() else {
        return Vec::new();
    };
    re.captures_iter(text)
        .filter_map(|cap| cap.get(1))
        .map(|m| m.as_str().trim_end_matches(['\n', '\r']).to_string())
        .filter(|code| !code.trim().is_empty())
        .enumerate()
        .map(|(idx, fixed_code)| match issues.get(idx) {
            Some(issue) => FixSuggestion {
                issue_id: issue.issue_id.clone(),
                issue_type: issue.issue_type.clone(),
                description: issue.message.clone(),
                location: Location::new(issue.line, issue.column),
                severity: issue.severity,
                fixed_code,
                explanation: "Extracted from free-text response".to_string(),
                confidence: TEXT_PARSED_CONFIDENCE,
                tags: vec![TEXT_PARSED_TAG.to_string()],
            },
            None => FixSuggestion {
                issue_id: format!("text_fix_{}", idx + 1),
                issue_type: "unknown".to_string(),
                description: "Code block from free-text response".to_string(),
                location: Location::default(),
                severity: Severity::Medium,
                fixed_code,
                explanation: "Extracted from free-text response".to_string(),
                confidence: TEXT_PARSED_CONFIDENCE,
                tags: vec![TEXT_PARSED_TAG.to_string()],
            },
        })
        .collect()
}
