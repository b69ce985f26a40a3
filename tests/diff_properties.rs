// Property tests for diff reconstruction and merge ordering

use std::path::Path;

use odincode_fix::diff_engine::generate_diff;
use odincode_fix::fix_executor::merge_suggestions;
use odincode_fix::suggestions::{FixSuggestion, Location, Severity};
use proptest::prelude::*;

/// Small alphabet so old and new share lines often
fn text() -> impl Strategy<Value = String> {
    (prop::collection::vec("[abc]{0,2}", 0..16), any::<bool>()).prop_map(|(lines, trailing)| {
        let mut joined = lines.join("\n");
        if trailing && !joined.is_empty() {
            joined.push('\n');
        }
        joined
    })
}

fn fix(line: usize) -> FixSuggestion {
    FixSuggestion {
        issue_id: format!("I{}", line),
        issue_type: "style".to_string(),
        description: String::new(),
        location: Location::new(line, 0),
        severity: Severity::Low,
        fixed_code: format!("fixed_{}", line),
        explanation: String::new(),
        confidence: 0.9,
        tags: Vec::new(),
    }
}

/// Line count plus a shuffled subset of distinct line numbers
fn anchored_lines() -> impl Strategy<Value = (usize, Vec<usize>)> {
    (1usize..20).prop_flat_map(|n| {
        let all: Vec<usize> = (1..=n).collect();
        (
            Just(n),
            prop::sample::subsequence(all, 0..=n).prop_shuffle(),
        )
    })
}

proptest! {
    #[test]
    fn diff_reconstructs_both_sides(old in text(), new in text()) {
        let report = generate_diff(Path::new("f.txt"), &old, &new);
        prop_assert_eq!(report.reconstruct_old(), old.clone());
        prop_assert_eq!(report.reconstruct_new(), new.clone());

        let stats = report.stats;
        prop_assert_eq!(stats.unchanged + stats.deleted, stats.old_lines);
        prop_assert_eq!(stats.unchanged + stats.added, stats.new_lines);
        prop_assert_eq!(report.has_changes(), old != new);
    }

    #[test]
    fn merge_ignores_suggestion_order((n, lines) in anchored_lines()) {
        let original: String = (1..=n).map(|i| format!("line_{}\n", i)).collect();
        let shuffled: Vec<FixSuggestion> = lines.iter().map(|l| fix(*l)).collect();
        let mut sorted = lines.clone();
        sorted.sort_unstable();
        let ordered: Vec<FixSuggestion> = sorted.iter().map(|l| fix(*l)).collect();

        let (a, applied_a) = merge_suggestions(&original, &shuffled).unwrap();
        let (b, applied_b) = merge_suggestions(&original, &ordered).unwrap();
        prop_assert_eq!(&a, &b);
        prop_assert_eq!(applied_a.len(), lines.len());
        prop_assert_eq!(applied_a, applied_b);
        prop_assert_eq!(a.lines().count(), n);
    }
}
