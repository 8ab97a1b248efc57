//! Analyzer configuration.
//!
//! Read from `<root>/.tracelens/config.toml`. Every field is optional; a
//! missing or unreadable file falls back to defaults.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::{Result, TraceLensError};

/// Default number of source lines shown on each side of a failing line.
pub const DEFAULT_CONTEXT_LINES: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    /// Entry file, relative to the project root.
    pub entry: PathBuf,
    /// Maximum import depth to follow. `None` means unbounded.
    pub max_depth: Option<usize>,
    /// Directory holding per-project analysis output.
    pub workspace_dir: PathBuf,
    /// Excerpt context for diagnostic reports.
    pub context_lines: usize,
    /// Directory names the traversal will not descend into.
    pub ignored_dirs: Vec<String>,
    /// File names the traversal will not analyze.
    pub ignored_files: Vec<String>,
    /// Path fragments that exclude a file from traversal.
    pub ignored_path_substrings: Vec<String>,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            entry: PathBuf::from("main.py"),
            max_depth: None,
            workspace_dir: PathBuf::from("workspace"),
            context_lines: DEFAULT_CONTEXT_LINES,
            ignored_dirs: Vec::new(),
            ignored_files: Vec::new(),
            ignored_path_substrings: Vec::new(),
        }
    }
}

impl AnalyzerConfig {
    /// Load config from `path`, using defaults if the file is absent or invalid.
    pub fn load(path: &Path) -> Self {
        let (config, failure) = Self::load_or_default(path);
        if let Some(e) = failure {
            warn!(error = %e, "config load failed, using defaults");
        }
        config
    }

    /// Like [`load`](Self::load), but hands the failure back instead of
    /// logging it, for callers that load config before logging is set up.
    pub fn load_or_default(path: &Path) -> (Self, Option<TraceLensError>) {
        if !path.exists() {
            debug!(config = %path.display(), "no config file, using defaults");
            return (Self::default(), None);
        }
        match Self::try_load(path) {
            Ok(config) => (config, None),
            Err(e) => (Self::default(), Some(e)),
        }
    }

    /// Load config from `path`, reporting read and parse failures.
    pub fn try_load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| TraceLensError::io(path, e))?;
        toml::from_str(&text).map_err(|e| TraceLensError::Config {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Default config location for a project root.
    pub fn default_path(root: &Path) -> PathBuf {
        root.join(".tracelens").join("config.toml")
    }

    /// Whether traversal should stop at `rel_path` (project-relative).
    pub fn is_ignored(&self, rel_path: &Path) -> bool {
        let file_name = rel_path
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_default();
        if self.ignored_files.iter().any(|f| *f == file_name) {
            return true;
        }

        let in_ignored_dir = rel_path
            .parent()
            .into_iter()
            .flat_map(|p| p.components())
            .any(|c| {
                let c = c.as_os_str().to_string_lossy();
                self.ignored_dirs.iter().any(|d| *d == c)
            });
        if in_ignored_dir {
            return true;
        }

        let path_str = rel_path.to_string_lossy();
        self.ignored_path_substrings
            .iter()
            .any(|s| path_str.contains(s.as_str()))
    }
}
