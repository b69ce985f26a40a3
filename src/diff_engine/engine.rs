//! DiffEngine: diff computation plus rendering options

use serde::{Deserialize, Serialize};
use std::path::Path;

use super::render;
use super::report::{generate_diff, DiffReport};

/// Output format for rendered diffs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DiffFormat {
    #[default]
    Unified,
    Context,
    SideBySide,
    SideBySideHtml,
    Html,
    Json,
}

impl std::str::FromStr for DiffFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "unified" => Ok(DiffFormat::Unified),
            "context" => Ok(DiffFormat::Context),
            "side-by-side" | "sbs" => Ok(DiffFormat::SideBySide),
            "side-by-side-html" => Ok(DiffFormat::SideBySideHtml),
            "html" => Ok(DiffFormat::Html),
            "json" => Ok(DiffFormat::Json),
            other => Err(format!("unknown diff format: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiffEngine {
    /// Context lines around each hunk (unified and context formats)
    pub context_lines: usize,
    /// Total width of the plain-text side-by-side view
    pub width: usize,
}

impl Default for DiffEngine {
    fn default() -> Self {
        Self {
            context_lines: 3,
            width: 130,
        }
    }
}

impl DiffEngine {
    pub fn new(context_lines: usize, width: usize) -> Self {
        Self {
            context_lines,
            width,
        }
    }

    pub fn generate_diff(&self, path: &Path, old: &str, new: &str) -> DiffReport {
        generate_diff(path, old, new)
    }

    pub fn unified_diff(&self, report: &DiffReport) -> String {
        render::unified_diff(report, self.context_lines)
    }

    pub fn context_diff(&self, report: &DiffReport) -> String {
        render::context_diff(report, self.context_lines)
    }

    pub fn side_by_side(&self, report: &DiffReport) -> String {
        render::side_by_side(report, self.width)
    }

    pub fn side_by_side_html(&self, report: &DiffReport) -> String {
        render::side_by_side_html(report)
    }

    pub fn html(&self, report: &DiffReport) -> String {
        render::html_table(report)
    }

    pub fn render(&self, report: &DiffReport, format: DiffFormat) -> Result<String, serde_json::Error> {
        Ok(match format {
            DiffFormat::Unified => self.unified_diff(report),
            DiffFormat::Context => self.context_diff(report),
            DiffFormat::SideBySide => self.side_by_side(report),
            DiffFormat::SideBySideHtml => self.side_by_side_html(report),
            DiffFormat::Html => self.html(report),
            DiffFormat::Json => render::to_json(report)?,
        })
    }
}
