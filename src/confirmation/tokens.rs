//! Confirmation answer tokens
//!
//! Per-fix: `y/yes`, `n/no`, `p/partial`, `d/details`, `q/quit`
//! Batch: `a/all`, `r/none`, `i/individually`, `d/details`, `q/quit`

use std::fmt::Write as _;

use super::decision::ConfirmationRequest;

/// Answer to a per-fix prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmationToken {
    Approve,
    Reject,
    Partial,
    /// Show details, no state change
    Details,
    Quit,
}

pub fn parse_token(input: &str) -> Option<ConfirmationToken> {
    match input.trim().to_lowercase().as_str() {
        "y" | "yes" => Some(ConfirmationToken::Approve),
        "n" | "no" => Some(ConfirmationToken::Reject),
        "p" | "partial" => Some(ConfirmationToken::Partial),
        "d" | "details" => Some(ConfirmationToken::Details),
        "q" | "quit" => Some(ConfirmationToken::Quit),
        _ => None,
    }
}

/// Answer to a batch prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchToken {
    ApproveAll,
    RejectAll,
    Individually,
    Details,
    Quit,
}

pub fn parse_batch_token(input: &str) -> Option<BatchToken> {
    match input.trim().to_lowercase().as_str() {
        "a" | "all" | "y" | "yes" => Some(BatchToken::ApproveAll),
        "r" | "none" | "n" | "no" => Some(BatchToken::RejectAll),
        "i" | "individually" => Some(BatchToken::Individually),
        "d" | "details" => Some(BatchToken::Details),
        "q" | "quit" => Some(BatchToken::Quit),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SelectionError {
    #[error("Empty selection")]
    Empty,

    #[error("Not a number: {0}")]
    NotANumber(String),

    #[error("Fix {index} out of range (1-{count})")]
    OutOfRange { index: usize, count: usize },

    #[error("Bad range: {0}")]
    BadRange(String),
}

/// Parse a 1-based selection like `1,3-4` into sorted 0-based indices
pub fn parse_selection(input: &str, count: usize) -> Result<Vec<usize>, SelectionError> {
    let mut indices = Vec::new();

    for part in input.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let (lo, hi) = match part.split_once('-') {
            Some((lo, hi)) => (parse_index(lo)?, parse_index(hi)?),
            None => {
                let n = parse_index(part)?;
                (n, n)
            }
        };
        if lo > hi {
            return Err(SelectionError::BadRange(part.to_string()));
        }
        for index in lo..=hi {
            if index == 0 || index > count {
                return Err(SelectionError::OutOfRange { index, count });
            }
            indices.push(index - 1);
        }
    }

    if indices.is_empty() {
        return Err(SelectionError::Empty);
    }
    indices.sort_unstable();
    indices.dedup();
    Ok(indices)
}

fn parse_index(text: &str) -> Result<usize, SelectionError> {
    text.trim()
        .parse()
        .map_err(|_| SelectionError::NotANumber(text.trim().to_string()))
}

/// One-screen summary for a per-fix prompt
pub fn format_prompt(request: &ConfirmationRequest) -> String {
    let mut prompt = format!("Apply fixes to {}?\n", request.file_path.display());
    let _ = writeln!(prompt, "  Fixes: {}", request.suggestion_count());
    let _ = writeln!(prompt, "  Diff: {}", request.diff.summary);
    let _ = writeln!(
        prompt,
        "  Complexity: {} ({})",
        request.diff.complexity.complexity, request.diff.complexity.recommendation
    );
    if let Some(ref backup_id) = request.backup_id {
        let _ = writeln!(prompt, "  Backup: {}", backup_id);
    }
    prompt.push_str("  [y=yes, n=no, p=partial, d=details, q=quit] ");
    prompt
}

/// Numbered suggestion list shown by the details view
pub fn format_suggestions(request: &ConfirmationRequest) -> String {
    let mut out = String::new();
    for (idx, s) in request.fix_result.suggestions.iter().enumerate() {
        let _ = writeln!(
            out,
            "  {}. [{}] line {}: {} (confidence {:.2})",
            idx + 1,
            s.severity,
            s.location.line,
            s.description,
            s.confidence
        );
        if !s.explanation.is_empty() {
            let _ = writeln!(out, "     {}", s.explanation);
        }
    }
    for factor in &request.diff.complexity.risk_factors {
        let _ = writeln!(out, "  ! {}", factor);
    }
    out
}
