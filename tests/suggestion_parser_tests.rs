//! Response parser tests
//!
//! Covers the accepted response shapes and the code-block fallback.

use std::path::Path;

use odincode_fix::suggestions::{
    build_fix_prompt, parse_fix_response, CodeIssue, Severity, RESPONSE_CONTRACT,
    TEXT_PARSED_CONFIDENCE, TEXT_PARSED_TAG,
};

const FIX_JSON: &str = r#"{
  "fixes": [
    {
      "issue_id": "B105",
      "issue_type": "security",
      "description": "Hardcoded password",
      "location": {"line": 3, "column": 0},
      "severity": "HIGH",
      "fixed_code": "PASSWORD = os.environ.get(\"APP_PASSWORD\")",
      "explanation": "Read the secret from the environment",
      "confidence": 0.92,
      "tags": ["secrets"]
    }
  ],
  "summary": "one fix",
  "risk_assessment": {"level": "low"}
}"#;

fn path() -> &'static Path {
    Path::new("settings.py")
}

#[test]
fn test_whole_payload_json() {
    let result = parse_fix_response(path(), FIX_JSON, "model-a", &[]);
    assert!(result.success);
    assert_eq!(result.model_used, "model-a");
    assert_eq!(result.suggestions.len(), 1);

    let fix = &result.suggestions[0];
    assert_eq!(fix.issue_id, "B105");
    assert_eq!(fix.location.line, 3);
    assert_eq!(fix.severity, Severity::High);
    assert_eq!(fix.confidence, 0.92);
    assert_eq!(fix.tags, vec!["secrets".to_string()]);
    assert_eq!(result.metadata["parse_method"], "json");
    assert_eq!(result.metadata["summary"], "one fix");
    assert_eq!(result.metadata["risk_assessment"]["level"], "low");
}

#[test]
fn test_fenced_json_block() {
    let raw = format!("Here is the fix.\n\n```json\n{}\n```\nLet me know.", FIX_JSON);
    let result = parse_fix_response(path(), &raw, "m", &[]);
    assert!(result.success);
    assert_eq!(result.suggestions[0].issue_id, "B105");
}

#[test]
fn test_json_between_prose() {
    let raw = format!("Sure! {} Hope that helps.", FIX_JSON);
    let result = parse_fix_response(path(), &raw, "m", &[]);
    assert!(result.success);
    assert_eq!(result.suggestions.len(), 1);
}

#[test]
fn test_complete_fixed_file_kept() {
    let raw = r#"{"fixes": [], "complete_fixed_file": "x = 2\n"}"#;
    let result = parse_fix_response(path(), raw, "m", &[]);
    assert!(result.success);
    assert!(result.suggestions.is_empty());
    assert_eq!(result.complete_fixed_content.as_deref(), Some("x = 2\n"));
    assert!(result.has_changes());
}

#[test]
fn test_code_block_fallback_anchors_to_issues() {
    let issues = vec![
        CodeIssue::new("E1", "style", "bad name", 2),
        CodeIssue::new("E2", "style", "unused import", 5),
    ];
    let raw = "First:\n```python\nfoo = 1\n```\nSecond:\n```\nimport sys\n```\nThird:\n```py\nbar()\n```\n";
    let result = parse_fix_response(path(), raw, "m", &issues);

    assert!(result.success);
    assert_eq!(result.metadata["parse_method"], "text");
    assert_eq!(result.suggestions.len(), 3);

    let first = &result.suggestions[0];
    assert_eq!(first.issue_id, "E1");
    assert_eq!(first.location.line, 2);
    assert_eq!(first.fixed_code, "foo = 1");
    assert_eq!(first.confidence, TEXT_PARSED_CONFIDENCE);
    assert_eq!(first.tags, vec![TEXT_PARSED_TAG.to_string()]);

    assert_eq!(result.suggestions[1].location.line, 5);

    // No issue left to anchor the third block
    let third = &result.suggestions[2];
    assert_eq!(third.issue_id, "text_fix_3");
    assert!(!third.is_anchored());
}

#[test]
fn test_unusable_responses_fail() {
    let empty = parse_fix_response(path(), "", "m", &[]);
    assert!(!empty.success);
    assert!(empty.suggestions.is_empty());

    let prose = parse_fix_response(path(), "I could not find anything to fix.", "m", &[]);
    assert!(!prose.success);
    assert!(prose.error.is_some());

    let no_fixes = parse_fix_response(path(), r#"{"fixes": []}"#, "m", &[]);
    assert!(!no_fixes.success);
}

#[test]
fn test_confidence_clamped() {
    let raw = r#"{"fixes": [
        {"issue_id": "a", "line": 1, "fixed_code": "x", "confidence": 3.5},
        {"issue_id": "b", "line": 2, "fixed_code": "y", "confidence": -1}
    ]}"#;
    let result = parse_fix_response(path(), raw, "m", &[]);
    assert_eq!(result.suggestions[0].confidence, 1.0);
    assert_eq!(result.suggestions[1].confidence, 0.0);
    assert_eq!(result.min_confidence(), Some(0.0));
}

#[test]
fn test_prompt_carries_issues_and_contract() {
    let issues = vec![CodeIssue::new("B105", "security", "Hardcoded password", 3)];
    let prompt = build_fix_prompt(path(), "PASSWORD = \"x\"\n", &issues, "bandit");
    assert!(prompt.contains("settings.py"));
    assert!(prompt.contains("B105"));
    assert!(prompt.contains("Hardcoded password"));
    assert!(prompt.contains("bandit"));
    assert!(prompt.contains(RESPONSE_CONTRACT));
}
