//! Diff engine: line diffs, renderings and change-risk scoring
//!
//! ## Architecture
//!
//! - `report.rs`: chunk grouping over `similar` line ops, statistics, summary
//! - `complexity.rs`: ratio-based risk score
//! - `render.rs`: unified, context, side-by-side, HTML, JSON
//! - `engine.rs`: `DiffEngine` facade with rendering options

mod complexity;
mod engine;
mod render;
mod report;

pub use complexity::{analyze_change_complexity, ChangeComplexity, ComplexityAnalysis};
pub use engine::{DiffEngine, DiffFormat};
pub use render::{
    context_diff, display_name, escape_html, html_table, side_by_side, side_by_side_html,
    to_json, unified_diff,
};
pub use report::{generate_diff, ChunkKind, DiffChunk, DiffReport, DiffStats};
