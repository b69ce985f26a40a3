//! Text and HTML renderings of a diff report
//!
//! Every rendering is derived from the same chunk list.

use std::fmt::Write as _;
use std::path::Path;

use super::report::{ChunkKind, DiffChunk, DiffReport};

const NO_NEWLINE: &str = "\\ No newline at end of file\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Context,
    Removed,
    Added,
    ChangedOld,
    ChangedNew,
}

impl Mark {
    fn has_old(self) -> bool {
        matches!(self, Mark::Context | Mark::Removed | Mark::ChangedOld)
    }

    fn has_new(self) -> bool {
        matches!(self, Mark::Context | Mark::Added | Mark::ChangedNew)
    }
}

/// One rendered line with its position on both sides
#[derive(Debug, Clone, Copy)]
struct Row<'a> {
    mark: Mark,
    /// 0-based line on the old side (None for added lines)
    old_no: Option<usize>,
    new_no: Option<usize>,
    /// Old lines preceding this row
    old_pos: usize,
    new_pos: usize,
    text: &'a str,
}

fn flatten(chunks: &[DiffChunk]) -> Vec<Row<'_>> {
    let mut rows = Vec::new();
    for chunk in chunks {
        match chunk.kind {
            ChunkKind::Equal => {
                for (k, text) in chunk.old_lines.iter().enumerate() {
                    rows.push(Row {
                        mark: Mark::Context,
                        old_no: Some(chunk.old_start + k),
                        new_no: Some(chunk.new_start + k),
                        old_pos: chunk.old_start + k,
                        new_pos: chunk.new_start + k,
                        text,
                    });
                }
            }
            ChunkKind::Delete | ChunkKind::Replace => {
                let mark = if chunk.kind == ChunkKind::Delete {
                    Mark::Removed
                } else {
                    Mark::ChangedOld
                };
                for (k, text) in chunk.old_lines.iter().enumerate() {
                    rows.push(Row {
                        mark,
                        old_no: Some(chunk.old_start + k),
                        new_no: None,
                        old_pos: chunk.old_start + k,
                        new_pos: chunk.new_start,
                        text,
                    });
                }
                if chunk.kind == ChunkKind::Replace {
                    push_new_side(&mut rows, chunk, Mark::ChangedNew);
                }
            }
            ChunkKind::Insert => push_new_side(&mut rows, chunk, Mark::Added),
        }
    }
    rows
}

fn push_new_side<'a>(rows: &mut Vec<Row<'a>>, chunk: &'a DiffChunk, mark: Mark) {
    let old_pos = chunk.old_start + chunk.old_lines.len();
    for (k, text) in chunk.new_lines.iter().enumerate() {
        rows.push(Row {
            mark,
            old_no: None,
            new_no: Some(chunk.new_start + k),
            old_pos,
            new_pos: chunk.new_start + k,
            text,
        });
    }
}

/// Row ranges `[start, end)` of hunks with `context` lines around changes
fn hunk_ranges(rows: &[Row<'_>], context: usize) -> Vec<(usize, usize)> {
    let mut ranges: Vec<(usize, usize)> = Vec::new();
    for (idx, row) in rows.iter().enumerate() {
        if row.mark == Mark::Context {
            continue;
        }
        let start = idx.saturating_sub(context);
        let end = (idx + 1 + context).min(rows.len());
        match ranges.last_mut() {
            Some(last) if start <= last.1 => last.1 = last.1.max(end),
            _ => ranges.push((start, end)),
        }
    }
    ranges
}

/// 1-based start and length of one side of a hunk
fn side_range(rows: &[Row<'_>], old_side: bool) -> (usize, usize) {
    let on_side = |r: &&Row<'_>| {
        if old_side {
            r.mark.has_old()
        } else {
            r.mark.has_new()
        }
    };
    let len = rows.iter().filter(on_side).count();
    let start = match rows.iter().find(on_side) {
        Some(first) if old_side => first.old_no.map_or(0, |n| n + 1),
        Some(first) => first.new_no.map_or(0, |n| n + 1),
        // Empty side: GNU convention points at the line before
        None if old_side => rows.first().map_or(0, |r| r.old_pos),
        None => rows.first().map_or(0, |r| r.new_pos),
    };
    (start, len)
}

/// Name used in file headers
pub fn display_name(path: &Path) -> String {
    if path.is_absolute() {
        if let Some(name) = path.file_name() {
            return name.to_string_lossy().into_owned();
        }
    }
    path.display().to_string()
}

fn push_line(out: &mut String, prefix: &str, text: &str) {
    out.push_str(prefix);
    out.push_str(text);
    if !text.ends_with('\n') {
        out.push('\n');
        out.push_str(NO_NEWLINE);
    }
}

/// Unified diff with `context` lines around each change
///
/// Empty string when there are no changes.
pub fn unified_diff(report: &DiffReport, context: usize) -> String {
    let rows = flatten(&report.chunks);
    let ranges = hunk_ranges(&rows, context);
    if ranges.is_empty() {
        return String::new();
    }

    let name = display_name(&report.file_path);
    let mut out = String::new();
    let _ = writeln!(out, "--- a/{}", name);
    let _ = writeln!(out, "+++ b/{}", name);

    for (start, end) in ranges {
        let hunk = &rows[start..end];
        let (old_start, old_len) = side_range(hunk, true);
        let (new_start, new_len) = side_range(hunk, false);
        let _ = writeln!(
            out,
            "@@ -{},{} +{},{} @@",
            old_start, old_len, new_start, new_len
        );
        for row in hunk {
            let prefix = match row.mark {
                Mark::Context => " ",
                Mark::Removed | Mark::ChangedOld => "-",
                Mark::Added | Mark::ChangedNew => "+",
            };
            push_line(&mut out, prefix, row.text);
        }
    }
    out
}

fn context_range(start: usize, len: usize) -> String {
    match len {
        0 => start.to_string(),
        1 => start.to_string(),
        _ => format!("{},{}", start, start + len - 1),
    }
}

/// Context diff (`***` / `---` sections)
pub fn context_diff(report: &DiffReport, context: usize) -> String {
    let rows = flatten(&report.chunks);
    let ranges = hunk_ranges(&rows, context);
    if ranges.is_empty() {
        return String::new();
    }

    let name = display_name(&report.file_path);
    let mut out = String::new();
    let _ = writeln!(out, "*** a/{}", name);
    let _ = writeln!(out, "--- b/{}", name);

    for (start, end) in ranges {
        let hunk = &rows[start..end];
        let (old_start, old_len) = side_range(hunk, true);
        let (new_start, new_len) = side_range(hunk, false);

        out.push_str("***************\n");
        let _ = writeln!(out, "*** {} ****", context_range(old_start, old_len));
        if hunk
            .iter()
            .any(|r| matches!(r.mark, Mark::Removed | Mark::ChangedOld))
        {
            for row in hunk.iter().filter(|r| r.mark.has_old()) {
                let prefix = match row.mark {
                    Mark::Removed => "- ",
                    Mark::ChangedOld => "! ",
                    _ => "  ",
                };
                push_line(&mut out, prefix, row.text);
            }
        }

        let _ = writeln!(out, "--- {} ----", context_range(new_start, new_len));
        if hunk
            .iter()
            .any(|r| matches!(r.mark, Mark::Added | Mark::ChangedNew))
        {
            for row in hunk.iter().filter(|r| r.mark.has_new()) {
                let prefix = match row.mark {
                    Mark::Added => "+ ",
                    Mark::ChangedNew => "! ",
                    _ => "  ",
                };
                push_line(&mut out, prefix, row.text);
            }
        }
    }
    out
}

fn clean(text: &str) -> String {
    text.trim_end_matches(['\n', '\r']).replace('\t', "    ")
}

fn fit(text: &str, width: usize) -> String {
    let cleaned = clean(text);
    if cleaned.chars().count() <= width {
        cleaned
    } else {
        cleaned.chars().take(width).collect()
    }
}

/// Pairs of (old, new, marker) in display order
fn side_by_side_pairs(chunks: &[DiffChunk]) -> Vec<(Option<(usize, &str)>, Option<(usize, &str)>, char)> {
    let mut pairs = Vec::new();
    for chunk in chunks {
        let rows = chunk.old_lines.len().max(chunk.new_lines.len());
        for k in 0..rows {
            let left = chunk
                .old_lines
                .get(k)
                .map(|l| (chunk.old_start + k, l.as_str()));
            let right = chunk
                .new_lines
                .get(k)
                .map(|l| (chunk.new_start + k, l.as_str()));
            let marker = match (chunk.kind, left.is_some(), right.is_some()) {
                (ChunkKind::Equal, _, _) => ' ',
                (_, true, true) => '|',
                (_, true, false) => '<',
                _ => '>',
            };
            pairs.push((left, right, marker));
        }
    }
    pairs
}

/// Plain-text two-column view, `width` columns wide
pub fn side_by_side(report: &DiffReport, width: usize) -> String {
    let col = width.saturating_sub(3) / 2;
    let mut out = String::new();
    for (left, right, marker) in side_by_side_pairs(&report.chunks) {
        let left = left.map(|(_, t)| fit(t, col)).unwrap_or_default();
        let right = right.map(|(_, t)| fit(t, col)).unwrap_or_default();
        let line = format!("{:<col$} {} {}", left, marker, right, col = col);
        out.push_str(line.trim_end());
        out.push('\n');
    }
    out
}

pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Two-column HTML table
pub fn side_by_side_html(report: &DiffReport) -> String {
    let name = escape_html(&display_name(&report.file_path));
    let mut out = String::new();
    out.push_str("<table class=\"diff side-by-side\">\n");
    let _ = writeln!(
        out,
        "<thead><tr><th colspan=\"2\">a/{}</th><th colspan=\"2\">b/{}</th></tr></thead>",
        name, name
    );
    out.push_str("<tbody>\n");
    for (left, right, marker) in side_by_side_pairs(&report.chunks) {
        let class = match marker {
            ' ' => "equal",
            '|' => "replace",
            '<' => "delete",
            _ => "insert",
        };
        let cell = |side: Option<(usize, &str)>| match side {
            Some((no, text)) => format!(
                "<td class=\"lineno\">{}</td><td class=\"code\">{}</td>",
                no + 1,
                escape_html(&clean(text))
            ),
            None => "<td class=\"lineno\"></td><td class=\"code empty\"></td>".to_string(),
        };
        let _ = writeln!(
            out,
            "<tr class=\"{}\">{}{}</tr>",
            class,
            cell(left),
            cell(right)
        );
    }
    out.push_str("</tbody>\n</table>\n");
    out
}

/// Single-column HTML table with old/new line numbers
pub fn html_table(report: &DiffReport) -> String {
    let mut out = String::new();
    out.push_str("<table class=\"diff\">\n");
    let _ = writeln!(
        out,
        "<caption>{}</caption>",
        escape_html(&report.summary)
    );
    out.push_str("<tbody>\n");
    for row in flatten(&report.chunks) {
        let (class, marker) = match row.mark {
            Mark::Context => ("context", "&nbsp;"),
            Mark::Removed | Mark::ChangedOld => ("removed", "-"),
            Mark::Added | Mark::ChangedNew => ("added", "+"),
        };
        let number = |n: Option<usize>| n.map(|n| (n + 1).to_string()).unwrap_or_default();
        let _ = writeln!(
            out,
            "<tr class=\"{}\"><td class=\"lineno\">{}</td><td class=\"lineno\">{}</td><td class=\"marker\">{}</td><td class=\"code\">{}</td></tr>",
            class,
            number(row.old_no),
            number(row.new_no),
            marker,
            escape_html(&clean(row.text))
        );
    }
    out.push_str("</tbody>\n</table>\n");
    out
}

pub fn to_json(report: &DiffReport) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(report)
}
