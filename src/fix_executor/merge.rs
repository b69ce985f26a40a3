//! Line-anchored merge of fix suggestions
//!
//! Each suggestion replaces its anchored line with `fixed_code` (which may
//! span several lines, or be empty to delete the line). Suggestions are
//! applied in descending line order so pending edits never shift.
//!
//! Preserved from the original text: line ending style (LF or CRLF) and the
//! presence of a trailing newline.

use tracing::warn;

use super::errors::ExecutionError;
use crate::confirmation::{ConfirmationDecision, ConfirmationStatus};
use crate::suggestions::{FixResult, FixSuggestion};

/// Suggestions the decision allows, in their original order
pub fn select_suggestions(
    fix_result: &FixResult,
    decision: &ConfirmationDecision,
) -> Vec<FixSuggestion> {
    fix_result
        .suggestions
        .iter()
        .enumerate()
        .filter(|(idx, _)| decision.selects(*idx))
        .map(|(_, s)| s.clone())
        .collect()
}

/// Content to write plus the suggestions it embodies
///
/// A precomputed complete file is used only when every suggestion was
/// approved; a partial selection is always merged line by line.
pub fn build_fixed_content(
    original: &str,
    fix_result: &FixResult,
    decision: &ConfirmationDecision,
) -> Result<(String, Vec<FixSuggestion>), ExecutionError> {
    let selected = select_suggestions(fix_result, decision);

    if decision.status == ConfirmationStatus::Approved {
        if let Some(ref complete) = fix_result.complete_fixed_content {
            return Ok((complete.clone(), selected));
        }
    }

    merge_suggestions(original, &selected)
}

/// Apply anchored suggestions to `original`
///
/// Unanchored suggestions (line 0) are skipped. Two suggestions for the same
/// line are a conflict.
pub fn merge_suggestions(
    original: &str,
    suggestions: &[FixSuggestion],
) -> Result<(String, Vec<FixSuggestion>), ExecutionError> {
    let eol = if original.contains("\r\n") { "\r\n" } else { "\n" };
    let trailing_newline = original.ends_with('\n');
    let mut lines: Vec<String> = original.lines().map(str::to_string).collect();

    let mut anchored: Vec<&FixSuggestion> = Vec::with_capacity(suggestions.len());
    for suggestion in suggestions {
        if suggestion.is_anchored() {
            anchored.push(suggestion);
        } else {
            warn!(
                issue_id = %suggestion.issue_id,
                "skipping fix without a line anchor"
            );
        }
    }

    anchored.sort_by(|a, b| b.location.line.cmp(&a.location.line));
    if let Some(pair) = anchored
        .windows(2)
        .find(|w| w[0].location.line == w[1].location.line)
    {
        return Err(ExecutionError::ConflictingEdits(pair[0].location.line));
    }

    for suggestion in &anchored {
        let line = suggestion.location.line;
        if line > lines.len() {
            return Err(ExecutionError::LineOutOfRange {
                line,
                total: lines.len(),
            });
        }
        let idx = line - 1;
        let replacement = replacement_lines(&lines[idx], &suggestion.fixed_code);
        lines.splice(idx..=idx, replacement);
    }

    let mut merged = lines.join(eol);
    if trailing_newline && !lines.is_empty() {
        merged.push_str(eol);
    }

    let applied = anchored.into_iter().rev().cloned().collect();
    Ok((merged, applied))
}

/// Lines replacing `current`, carrying its indentation onto unindented code
fn replacement_lines(current: &str, fixed_code: &str) -> Vec<String> {
    let new_lines: Vec<&str> = fixed_code.lines().collect();
    let indent: String = current
        .chars()
        .take_while(|c| *c == ' ' || *c == '\t')
        .collect();

    let first_unindented = new_lines
        .first()
        .map(|l| !l.is_empty() && !l.starts_with([' ', '\t']))
        .unwrap_or(false);

    if indent.is_empty() || !first_unindented {
        return new_lines.into_iter().map(str::to_string).collect();
    }

    new_lines
        .into_iter()
        .map(|l| {
            if l.is_empty() {
                String::new()
            } else {
                format!("{}{}", indent, l)
            }
        })
        .collect()
}
