//! Fix prompt construction
//!
//! Only the response contract matters to the rest of the pipeline; the
//! prompt just carries the file, the issues and that contract.

use std::fmt::Write as _;
use std::path::Path;

use crate::suggestions::types::CodeIssue;

/// JSON shape the model is asked to answer with
pub const RESPONSE_CONTRACT: &str = r#"{
  "fixes": [
    {
      "issue_id": "<id of the issue being fixed>",
      "issue_type": "<issue type>",
      "description": "<what is wrong>",
      "location": {"line": <1-based line>, "column": <column>},
      "severity": "low|medium|high|critical",
      "fixed_code": "<replacement for the whole line>",
      "explanation": "<why this fixes it>",
      "confidence": <0.0 - 1.0>,
      "tags": ["<tag>"]
    }
  ],
  "complete_fixed_file": "<optional: the whole file with every fix applied>",
  "summary": "<one sentence>",
  "risk_assessment": "<low|medium|high and why>"
}"#;

/// Build the prompt for one file
pub fn build_fix_prompt(
    file_path: &Path,
    content: &str,
    issues: &[CodeIssue],
    analysis_type: &str,
) -> String {
    let mut prompt = String::new();

    let _ = writeln!(
        prompt,
        "Fix the following {} issues in `{}`.",
        analysis_type,
        file_path.display()
    );
    prompt.push_str("Each fix replaces exactly one anchored line.\n\n");

    prompt.push_str("ISSUES:\n");
    for issue in issues {
        let _ = writeln!(
            prompt,
            "- [{}] {} ({}, line {}): {}",
            issue.issue_id, issue.issue_type, issue.severity, issue.line, issue.message
        );
    }

    prompt.push_str("\nFILE:\n");
    for (idx, line) in content.lines().enumerate() {
        let _ = writeln!(prompt, "{:>5} | {}", idx + 1, line);
    }

    prompt.push_str("\nRespond with JSON only, using this shape:\n");
    prompt.push_str(RESPONSE_CONTRACT);
    prompt.push('\n');
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_contains_issues_and_numbered_lines() {
        let issues = vec![CodeIssue::new("B105", "hardcoded_password", "Hardcoded password", 1)];
        let prompt = build_fix_prompt(Path::new("app.py"), "PASSWORD = \"x\"\n", &issues, "bandit");

        assert!(prompt.contains("bandit issues in `app.py`"));
        assert!(prompt.contains("[B105] hardcoded_password"));
        assert!(prompt.contains("    1 | PASSWORD = \"x\""));
        assert!(prompt.contains("complete_fixed_file"));
    }
}
