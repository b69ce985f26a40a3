//! Diff report: ordered chunks, line statistics, summary and complexity

use serde::{Deserialize, Serialize};
use similar::{DiffOp, DiffTag, TextDiff};
use std::path::{Path, PathBuf};

use super::complexity::{complexity_from_stats, ComplexityAnalysis};

/// Chunk classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkKind {
    Equal,
    Replace,
    Delete,
    Insert,
}

/// A maximal run of one kind of change
///
/// Lines keep their terminators. `old_start`/`new_start` are 0-based line
/// offsets into the respective side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffChunk {
    pub kind: ChunkKind,
    pub old_start: usize,
    pub old_lines: Vec<String>,
    pub new_start: usize,
    pub new_lines: Vec<String>,
}

impl DiffChunk {
    pub fn is_change(&self) -> bool {
        self.kind != ChunkKind::Equal
    }
}

/// Line counts derived from the chunk list
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffStats {
    pub old_lines: usize,
    pub new_lines: usize,
    pub added: usize,
    pub deleted: usize,
    pub modified: usize,
    pub unchanged: usize,
}

impl DiffStats {
    /// Lines touched, counting a modified pair once
    pub fn total_changes(&self) -> usize {
        (self.added + self.deleted).saturating_sub(self.modified)
    }

    pub fn has_changes(&self) -> bool {
        self.added > 0 || self.deleted > 0
    }
}

/// Comparison of two versions of one file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiffReport {
    pub file_path: PathBuf,
    pub chunks: Vec<DiffChunk>,
    pub stats: DiffStats,
    pub summary: String,
    pub complexity: ComplexityAnalysis,
}

impl DiffReport {
    pub fn has_changes(&self) -> bool {
        self.stats.has_changes()
    }

    /// Concatenation of every chunk's old side
    pub fn reconstruct_old(&self) -> String {
        self.chunks
            .iter()
            .flat_map(|c| c.old_lines.iter())
            .map(String::as_str)
            .collect()
    }

    /// Concatenation of every chunk's new side
    pub fn reconstruct_new(&self) -> String {
        self.chunks
            .iter()
            .flat_map(|c| c.new_lines.iter())
            .map(String::as_str)
            .collect()
    }
}

/// Compare `old` and `new` line by line
///
/// Chunk lines are similar's line slices, so they keep their `\n` / `\r\n`
/// terminators and concatenate back to the inputs.
pub fn generate_diff(file_path: &Path, old: &str, new: &str) -> DiffReport {
    let diff = TextDiff::from_lines(old, new);
    let old_lines = diff.old_slices();
    let new_lines = diff.new_slices();
    let chunks = build_chunks(old_lines, new_lines, diff.ops());
    let stats = compute_stats(&chunks, old_lines.len(), new_lines.len());
    let complexity = complexity_from_stats(&stats);
    let summary = summarize(&stats);

    tracing::debug!(
        file = %file_path.display(),
        added = stats.added,
        deleted = stats.deleted,
        modified = stats.modified,
        complexity = %complexity.complexity,
        "diff computed"
    );

    DiffReport {
        file_path: file_path.to_path_buf(),
        chunks,
        stats,
        summary,
        complexity,
    }
}

/// Merge similar's ops into alternating equal and change chunks
fn build_chunks(old: &[&str], new: &[&str], ops: &[DiffOp]) -> Vec<DiffChunk> {
    let mut chunks: Vec<DiffChunk> = Vec::new();

    for op in ops {
        let (tag, old_range, new_range) = op.as_tag_tuple();
        if old_range.is_empty() && new_range.is_empty() {
            continue;
        }
        let equal = tag == DiffTag::Equal;
        let old_part = to_owned(&old[old_range.clone()]);
        let new_part = to_owned(&new[new_range.clone()]);

        match chunks.last_mut() {
            // Adjacent delete + insert ops form one replace chunk
            Some(last) if (last.kind == ChunkKind::Equal) == equal => {
                last.old_lines.extend(old_part);
                last.new_lines.extend(new_part);
                if !equal {
                    last.kind = change_kind(&last.old_lines, &last.new_lines);
                }
            }
            _ => {
                let kind = if equal {
                    ChunkKind::Equal
                } else {
                    change_kind(&old_part, &new_part)
                };
                chunks.push(DiffChunk {
                    kind,
                    old_start: old_range.start,
                    old_lines: old_part,
                    new_start: new_range.start,
                    new_lines: new_part,
                });
            }
        }
    }
    chunks
}

fn change_kind(old: &[String], new: &[String]) -> ChunkKind {
    match (old.is_empty(), new.is_empty()) {
        (false, false) => ChunkKind::Replace,
        (false, true) => ChunkKind::Delete,
        _ => ChunkKind::Insert,
    }
}

fn to_owned(lines: &[&str]) -> Vec<String> {
    lines.iter().map(|l| l.to_string()).collect()
}

fn compute_stats(chunks: &[DiffChunk], old_lines: usize, new_lines: usize) -> DiffStats {
    let mut stats = DiffStats {
        old_lines,
        new_lines,
        ..Default::default()
    };
    for chunk in chunks {
        match chunk.kind {
            ChunkKind::Equal => stats.unchanged += chunk.old_lines.len(),
            ChunkKind::Insert => stats.added += chunk.new_lines.len(),
            ChunkKind::Delete => stats.deleted += chunk.old_lines.len(),
            ChunkKind::Replace => {
                stats.added += chunk.new_lines.len();
                stats.deleted += chunk.old_lines.len();
                stats.modified += chunk.old_lines.len().min(chunk.new_lines.len());
            }
        }
    }
    stats
}

fn summarize(stats: &DiffStats) -> String {
    if !stats.has_changes() {
        return "No changes".to_string();
    }
    let base = stats.old_lines.max(stats.new_lines).max(1);
    let percent = stats.total_changes() as f64 * 100.0 / base as f64;
    format!(
        "{} added, {} deleted, {} modified ({:.1}% of lines changed)",
        plural(stats.added, "line"),
        plural(stats.deleted, "line"),
        plural(stats.modified, "line"),
        percent
    )
}

fn plural(n: usize, word: &str) -> String {
    if n == 1 {
        format!("1 {}", word)
    } else {
        format!("{} {}s", n, word)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn diff(old: &str, new: &str) -> DiffReport {
        generate_diff(Path::new("app.py"), old, new)
    }

    #[test]
    fn test_identical_content() {
        let report = diff("a\nb\n", "a\nb\n");
        assert!(!report.has_changes());
        assert_eq!(report.chunks.len(), 1);
        assert_eq!(report.chunks[0].kind, ChunkKind::Equal);
        assert_eq!(report.stats.unchanged, 2);
        assert_eq!(report.summary, "No changes");
    }

    #[test]
    fn test_replace_stats() {
        let report = diff("a\nb\nc\n", "a\nB\nc\n");
        let kinds: Vec<_> = report.chunks.iter().map(|c| c.kind).collect();
        assert_eq!(
            kinds,
            vec![ChunkKind::Equal, ChunkKind::Replace, ChunkKind::Equal]
        );
        assert_eq!(report.stats.added, 1);
        assert_eq!(report.stats.deleted, 1);
        assert_eq!(report.stats.modified, 1);
        assert_eq!(report.stats.unchanged, 2);
        assert_eq!(report.stats.total_changes(), 1);
        assert_eq!(report.chunks[1].old_start, 1);
        assert_eq!(report.chunks[1].new_start, 1);
    }

    #[test]
    fn test_insert_and_delete_chunks() {
        let inserted = diff("a\nc\n", "a\nb\nc\n");
        assert!(inserted.chunks.iter().any(|c| c.kind == ChunkKind::Insert));
        assert_eq!(inserted.stats.added, 1);
        assert_eq!(inserted.stats.modified, 0);

        let deleted = diff("a\nb\nc\n", "a\nc\n");
        assert!(deleted.chunks.iter().any(|c| c.kind == ChunkKind::Delete));
        assert_eq!(deleted.stats.deleted, 1);
    }

    #[test]
    fn test_missing_trailing_newline_is_a_change() {
        let report = diff("a\nb", "a\nb\n");
        assert!(report.has_changes());
        assert_eq!(report.reconstruct_old(), "a\nb");
        assert_eq!(report.reconstruct_new(), "a\nb\n");
    }

    #[test]
    fn test_crlf_reconstruction() {
        let old = "one\r\ntwo\r\n";
        let new = "one\r\nTWO\r\nthree";
        let report = diff(old, new);
        assert_eq!(report.reconstruct_old(), old);
        assert_eq!(report.reconstruct_new(), new);
    }

    #[test]
    fn test_lone_carriage_return_reconstruction() {
        let old = "a\rb\nc\n";
        let new = "a\rB\nc\n";
        let report = diff(old, new);
        assert!(report.has_changes());
        assert_eq!(report.reconstruct_old(), old);
        assert_eq!(report.reconstruct_new(), new);
    }

    #[test]
    fn test_full_rewrite_is_one_replace_chunk() {
        let report = diff("a\nb\nc\n", "x\ny\n");
        assert_eq!(report.chunks.len(), 1);
        assert_eq!(report.chunks[0].kind, ChunkKind::Replace);
        assert_eq!(report.stats.deleted, 3);
        assert_eq!(report.stats.added, 2);
        assert_eq!(report.stats.modified, 2);
    }

    #[test]
    fn test_empty_inputs() {
        let report = diff("", "");
        assert!(report.chunks.is_empty());
        assert_eq!(report.stats, DiffStats::default());

        let created = diff("", "x\n");
        assert_eq!(created.chunks.len(), 1);
        assert_eq!(created.chunks[0].kind, ChunkKind::Insert);
    }

    #[test]
    fn test_summary_text() {
        let report = diff("a\nb\n", "a\nc\n");
        assert_eq!(
            report.summary,
            "1 line added, 1 line deleted, 1 line modified (50.0% of lines changed)"
        );
    }
}
