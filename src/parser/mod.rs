//! Source parsing and entity extraction.
//!
//! tree-sitter produces a line-annotated syntax tree; files whose tree
//! contains error or missing nodes are reported as parse failures and never
//! reach the extractor.

pub mod extractor;
pub mod language;
pub mod names;

use std::path::Path;
use tree_sitter::{Node, Parser, Tree};

use crate::error::{Result, TraceLensError};

pub use extractor::{extract_entities, FileEntities};
pub use language::SourceLanguage;

/// A parser with the grammar for `language` loaded.
pub fn new_parser(language: SourceLanguage) -> Result<Parser> {
    let mut parser = Parser::new();
    parser
        .set_language(&language.tree_sitter_language())
        .map_err(|e| {
            TraceLensError::Language(format!("failed to load {} grammar: {e}", language.name()))
        })?;
    Ok(parser)
}

/// Parse one file with the grammar its extension selects.
///
/// A tree containing error or missing nodes is reported as
/// [`TraceLensError::Parse`] describing the first syntax error.
pub fn parse_source(path: &Path, source: &str) -> Result<Tree> {
    let language = SourceLanguage::from_path(path)
        .ok_or_else(|| TraceLensError::UnsupportedLanguage(path.to_path_buf()))?;
    let mut parser = new_parser(language)?;
    let parse_error = |message: String| TraceLensError::Parse {
        path: path.to_path_buf(),
        message,
    };

    let tree = parser
        .parse(source, None)
        .ok_or_else(|| parse_error("parser produced no tree".to_string()))?;
    let root = tree.root_node();
    if root.has_error() {
        let message = describe_syntax_error(&root, source.as_bytes())
            .unwrap_or_else(|| "invalid syntax".to_string());
        return Err(parse_error(message));
    }
    Ok(tree)
}

/// Parse and extract one file. `path` only selects the grammar and labels errors.
pub fn extract_file(path: &Path, source: &str) -> Result<FileEntities> {
    let tree = parse_source(path, source)?;
    Ok(extract_entities(&tree.root_node(), source.as_bytes()))
}

fn describe_syntax_error(node: &Node, source: &[u8]) -> Option<String> {
    if node.is_missing() {
        let pos = node.start_position();
        return Some(format!(
            "missing `{}` at line {}, column {}",
            node.kind(),
            pos.row + 1,
            pos.column + 1
        ));
    }
    if node.is_error() {
        let pos = node.start_position();
        let snippet: String = node
            .utf8_text(source)
            .unwrap_or_default()
            .lines()
            .next()
            .unwrap_or_default()
            .chars()
            .take(40)
            .collect();
        return Some(format!(
            "invalid syntax at line {}, column {}: `{}`",
            pos.row + 1,
            pos.column + 1,
            snippet.trim()
        ));
    }

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.has_error() {
            if let Some(description) = describe_syntax_error(&child, source) {
                return Some(description);
            }
        }
    }
    None
}
