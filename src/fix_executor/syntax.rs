//! Syntax validation of merged content before it is written

use std::path::Path;
use tree_sitter::{Language, Node, Parser};

/// Checks that merged content still parses
pub trait SyntaxValidator: Send + Sync {
    /// `Err(reason)` when the content is not syntactically valid
    fn validate(&self, path: &Path, content: &str) -> Result<(), String>;
}

/// Accepts everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopValidator;

impl SyntaxValidator for NoopValidator {
    fn validate(&self, _path: &Path, _content: &str) -> Result<(), String> {
        Ok(())
    }
}

/// tree-sitter parse check, grammar chosen by file extension
///
/// Files with no known grammar pass.
#[derive(Debug, Clone, Copy, Default)]
pub struct TreeSitterValidator;

impl TreeSitterValidator {
    /// Get tree-sitter language for a file extension
    pub fn language_for(path: &Path) -> Option<Language> {
        let ext = path.extension()?.to_str()?.to_lowercase();
        match ext.as_str() {
            "py" | "pyi" => Some(tree_sitter_python::language()),
            "rs" => Some(tree_sitter_rust::language()),
            "js" | "mjs" | "cjs" | "jsx" => Some(tree_sitter_javascript::language()),
            _ => None,
        }
    }
}

impl SyntaxValidator for TreeSitterValidator {
    fn validate(&self, path: &Path, content: &str) -> Result<(), String> {
        let Some(language) = Self::language_for(path) else {
            return Ok(());
        };

        let mut parser = Parser::new();
        parser
            .set_language(language)
            .map_err(|e| format!("grammar unavailable: {}", e))?;
        let tree = parser
            .parse(content, None)
            .ok_or_else(|| "parser produced no tree".to_string())?;

        let root = tree.root_node();
        if !root.has_error() {
            return Ok(());
        }

        match first_error(root) {
            Some(node) => {
                let pos = node.start_position();
                let what = if node.is_missing() {
                    format!("missing `{}`", node.kind())
                } else {
                    "unexpected syntax".to_string()
                };
                Err(format!("{} at line {}, column {}", what, pos.row + 1, pos.column + 1))
            }
            None => Err("parse tree contains errors".to_string()),
        }
    }
}

fn first_error(node: Node<'_>) -> Option<Node<'_>> {
    if node.is_error() || node.is_missing() {
        return Some(node);
    }
    if !node.has_error() {
        return None;
    }
    let mut cursor = node.walk();
    let children: Vec<Node<'_>> = node.children(&mut cursor).collect();
    children.into_iter().find_map(first_error)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_python() {
        let v = TreeSitterValidator;
        assert!(v
            .validate(Path::new("a.py"), "import os\nPASSWORD = os.environ.get('APP_PASSWORD')\n")
            .is_ok());
    }

    #[test]
    fn test_invalid_python() {
        let v = TreeSitterValidator;
        let err = v
            .validate(Path::new("a.py"), "def f(:\n    return 1\n")
            .unwrap_err();
        assert!(err.contains("line"), "{}", err);
    }

    #[test]
    fn test_rust_and_javascript() {
        let v = TreeSitterValidator;
        assert!(v.validate(Path::new("lib.rs"), "fn main() {}\n").is_ok());
        assert!(v.validate(Path::new("lib.rs"), "fn main( {\n").is_err());
        assert!(v.validate(Path::new("x.js"), "const a = 1;\n").is_ok());
        assert!(v.validate(Path::new("x.js"), "const = ;\n").is_err());
    }

    #[test]
    fn test_unknown_extension_passes() {
        let v = TreeSitterValidator;
        assert!(v.validate(Path::new("notes.txt"), "(((").is_ok());
        assert!(v.validate(Path::new("Makefile"), "(((").is_ok());
    }

    #[test]
    fn test_noop() {
        assert!(NoopValidator.validate(Path::new("a.py"), "def (").is_ok());
    }
}
