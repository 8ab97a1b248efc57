//! Source language conventions and tree-sitter grammar loading.

use serde::{Deserialize, Serialize};
use std::path::Path;
use tree_sitter::Language;

/// Languages the analyzer understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceLanguage {
    Python,
}

impl SourceLanguage {
    /// Detect language from file extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?;
        match ext {
            "py" | "pyw" => Some(SourceLanguage::Python),
            _ => None,
        }
    }

    /// Get the tree-sitter Language for this language.
    pub fn tree_sitter_language(&self) -> Language {
        match self {
            SourceLanguage::Python => tree_sitter_python::LANGUAGE.into(),
        }
    }

    /// Extension (without the dot) that module files carry.
    pub fn module_extension(&self) -> &'static str {
        match self {
            SourceLanguage::Python => "py",
        }
    }

    /// File that marks a directory as an importable package.
    pub fn package_initializer(&self) -> &'static str {
        match self {
            SourceLanguage::Python => "__init__.py",
        }
    }

    /// Get the display name.
    pub fn name(&self) -> &'static str {
        match self {
            SourceLanguage::Python => "Python",
        }
    }
}
