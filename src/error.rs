//! Error types for tracelens.
//!
//! Only run-aborting conditions surface as errors. Per-file problems
//! (syntax errors, stale import paths, missing records) degrade into partial
//! results and are logged instead.

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, TraceLensError>;

#[derive(Debug, Error)]
pub enum TraceLensError {
    /// Filesystem failure on a specific path.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The traversal entry file does not exist.
    #[error("entry file {} does not exist", .0.display())]
    EntryNotFound(PathBuf),

    /// Source could not be parsed. Recorded on the file's record during
    /// traversal; only returned directly by the parser API.
    #[error("failed to parse {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },

    /// A persisted record or structure file could not be (de)serialized.
    #[error("invalid JSON in {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Configuration file is malformed.
    #[error("invalid config {}: {message}", path.display())]
    Config { path: PathBuf, message: String },

    /// No grammar is registered for this file's extension.
    #[error("unsupported language: {}", .0.display())]
    UnsupportedLanguage(PathBuf),

    /// The tree-sitter grammar could not be loaded.
    #[error("language error: {0}")]
    Language(String),
}

impl TraceLensError {
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        TraceLensError::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    pub fn json(path: impl AsRef<Path>, source: serde_json::Error) -> Self {
        TraceLensError::Json {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }
}
