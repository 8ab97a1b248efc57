//! Internal dependency tree.
//!
//! Resolved imports of one file grouped by the directories leading to them:
//!
//! ```text
//! modules:      [./snake.py]
//! directories:
//!   widgets     (path ./widgets)
//!     modules:  [./widgets/MapPlot.py]
//! ```

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::{Component, Path, PathBuf};

use super::types::ResolvedImport;

/// A resolved module file referenced by an import.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleEntry {
    /// File stem, e.g. `MapPlot` or `__init__`.
    pub name: String,
    /// Project-relative file path, e.g. `./widgets/MapPlot.py`.
    pub path: String,
    /// Members accessed on the module (`from widgets.MapPlot import MapWidget`).
    #[serde(default)]
    pub sub_references: Vec<String>,
}

/// One directory level of the tree. The root node has no `path`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyTree {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub modules: Vec<ModuleEntry>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub directories: BTreeMap<String, DependencyTree>,
}

impl DependencyTree {
    /// Group resolved imports under `root` into a tree.
    pub fn from_imports(root: &Path, imports: &[ResolvedImport]) -> Self {
        let mut tree = DependencyTree::default();
        for import in imports {
            tree.insert(root, import);
        }
        tree
    }

    /// Add one import. Returns false if its file lies outside `root`.
    pub fn insert(&mut self, root: &Path, import: &ResolvedImport) -> bool {
        let Some(parts) = relative_components(root, &import.file_path) else {
            return false;
        };
        let Some((file_name, dirs)) = parts.split_last() else {
            return false;
        };

        let mut node = self;
        for (i, dir) in dirs.iter().enumerate() {
            node = node
                .directories
                .entry(dir.clone())
                .or_insert_with(|| DependencyTree {
                    path: Some(format!("./{}", dirs[..=i].join("/"))),
                    ..Default::default()
                });
        }

        let name = Path::new(file_name)
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| file_name.clone());
        node.modules.push(ModuleEntry {
            name,
            path: format!("./{}", parts.join("/")),
            sub_references: import.sub_references.clone(),
        });
        true
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty() && self.directories.values().all(|d| d.is_empty())
    }

    /// Every module entry in the tree: this node's modules first, then each
    /// subdirectory in name order. Duplicates are kept.
    pub fn entries(&self) -> Vec<&ModuleEntry> {
        let mut out = Vec::new();
        self.collect_entries(&mut out);
        out
    }

    fn collect_entries<'a>(&'a self, out: &mut Vec<&'a ModuleEntry>) {
        out.extend(self.modules.iter());
        for child in self.directories.values() {
            child.collect_entries(out);
        }
    }

    /// Module paths with duplicates removed, first occurrence kept.
    pub fn unique_module_paths(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.entries()
            .into_iter()
            .filter(|e| seen.insert(e.path.as_str()))
            .map(|e| e.path.clone())
            .collect()
    }
}

/// `./`-prefixed, `/`-separated path of `path` relative to `root`.
pub fn project_relative(root: &Path, path: &Path) -> Option<String> {
    let parts = relative_components(root, path)?;
    if parts.is_empty() {
        return None;
    }
    Some(format!("./{}", parts.join("/")))
}

/// Inverse of [`project_relative`].
pub fn absolute_from_relative(root: &Path, rel: &str) -> PathBuf {
    let trimmed = rel.strip_prefix("./").unwrap_or(rel);
    trimmed
        .split('/')
        .filter(|p| !p.is_empty())
        .fold(root.to_path_buf(), |acc, p| acc.join(p))
}

fn relative_components(root: &Path, path: &Path) -> Option<Vec<String>> {
    let rel = path.strip_prefix(root).ok()?;
    Some(
        rel.components()
            .filter_map(|c| match c {
                Component::Normal(s) => Some(s.to_string_lossy().to_string()),
                _ => None,
            })
            .collect(),
    )
}
