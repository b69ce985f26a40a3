//! Change complexity scoring
//!
//! ratio = total_changes / max(old_lines, new_lines)
//! - high when ratio > 0.5
//! - medium when ratio > 0.2
//! - low otherwise

use serde::{Deserialize, Serialize};

use super::report::{DiffReport, DiffStats};

const HIGH_RATIO: f64 = 0.5;
const MEDIUM_RATIO: f64 = 0.2;

const MANY_ADDED: usize = 50;
const MANY_DELETED: usize = 30;
const REWRITE_RATIO: f64 = 0.7;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeComplexity {
    #[default]
    Low,
    Medium,
    High,
}

impl ChangeComplexity {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeComplexity::Low => "low",
            ChangeComplexity::Medium => "medium",
            ChangeComplexity::High => "high",
        }
    }
}

impl std::fmt::Display for ChangeComplexity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Risk score for one diff
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComplexityAnalysis {
    pub complexity: ChangeComplexity,
    pub ratio: f64,
    pub risk_factors: Vec<String>,
    pub recommendation: String,
}

/// Score the change described by a report
pub fn analyze_change_complexity(report: &DiffReport) -> ComplexityAnalysis {
    complexity_from_stats(&report.stats)
}

pub(crate) fn complexity_from_stats(stats: &DiffStats) -> ComplexityAnalysis {
    let base = stats.old_lines.max(stats.new_lines);
    let ratio = if base == 0 {
        0.0
    } else {
        stats.total_changes() as f64 / base as f64
    };

    let complexity = if ratio > HIGH_RATIO {
        ChangeComplexity::High
    } else if ratio > MEDIUM_RATIO {
        ChangeComplexity::Medium
    } else {
        ChangeComplexity::Low
    };

    let mut risk_factors = Vec::new();
    if stats.added > MANY_ADDED {
        risk_factors.push(format!("Large addition ({} lines)", stats.added));
    }
    if stats.deleted > MANY_DELETED {
        risk_factors.push(format!("Large deletion ({} lines)", stats.deleted));
    }
    if ratio > REWRITE_RATIO {
        risk_factors.push(format!(
            "Most of the file rewritten ({:.0}% of lines)",
            ratio * 100.0
        ));
    }

    let recommendation = match complexity {
        ChangeComplexity::High => "Review carefully before applying: a large share of the file changes",
        ChangeComplexity::Medium => "Review the diff before applying",
        ChangeComplexity::Low if risk_factors.is_empty() => "Low-risk change",
        ChangeComplexity::Low => "Small relative change, but check the flagged risk factors",
    }
    .to_string();

    ComplexityAnalysis {
        complexity,
        ratio,
        risk_factors,
        recommendation,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats(old: usize, new: usize, added: usize, deleted: usize, modified: usize) -> DiffStats {
        DiffStats {
            old_lines: old,
            new_lines: new,
            added,
            deleted,
            modified,
            unchanged: old.saturating_sub(deleted),
        }
    }

    #[test]
    fn test_no_lines_is_low() {
        let analysis = complexity_from_stats(&DiffStats::default());
        assert_eq!(analysis.complexity, ChangeComplexity::Low);
        assert_eq!(analysis.ratio, 0.0);
        assert!(analysis.risk_factors.is_empty());
    }

    #[test]
    fn test_thresholds() {
        // 1 modified line of 10 -> 0.1
        assert_eq!(
            complexity_from_stats(&stats(10, 10, 1, 1, 1)).complexity,
            ChangeComplexity::Low
        );
        // exactly 0.2 is still low
        assert_eq!(
            complexity_from_stats(&stats(10, 10, 2, 2, 2)).complexity,
            ChangeComplexity::Low
        );
        // 3 of 10 -> medium
        assert_eq!(
            complexity_from_stats(&stats(10, 10, 3, 3, 3)).complexity,
            ChangeComplexity::Medium
        );
        // exactly 0.5 is still medium
        assert_eq!(
            complexity_from_stats(&stats(10, 10, 5, 5, 5)).complexity,
            ChangeComplexity::Medium
        );
        // 6 of 10 -> high
        assert_eq!(
            complexity_from_stats(&stats(10, 10, 6, 6, 6)).complexity,
            ChangeComplexity::High
        );
    }

    #[test]
    fn test_risk_factors() {
        let analysis = complexity_from_stats(&stats(100, 100, 51, 31, 0));
        assert_eq!(analysis.risk_factors.len(), 3);
        assert!(analysis.risk_factors[0].contains("51"));
        assert!(analysis.risk_factors[1].contains("31"));

        let boundary = complexity_from_stats(&stats(1000, 1000, 50, 30, 30));
        assert!(boundary.risk_factors.is_empty());
    }
}
