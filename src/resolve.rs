//! Import resolution against the project tree.
//!
//! A dotted import `p1.p2...pn` is matched longest-prefix first: the first
//! `p1..pi` naming a module file (or package initializer) inside the root wins
//! and `p(i+1)..pn` are kept as sub-references. Imports with no matching prefix
//! are external and kept verbatim.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::graph::types::ResolvedImport;
use crate::parser::SourceLanguage;

/// Imports of one file split into project-internal and external.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassifiedImports {
    /// Resolved imports in source order. Duplicates are kept.
    pub internal: Vec<ResolvedImport>,
    /// Unresolved names, first occurrence kept.
    pub external: Vec<String>,
}

/// Resolves dotted import names to files under a project root.
#[derive(Debug, Clone)]
pub struct ImportResolver {
    root: PathBuf,
    language: SourceLanguage,
}

impl ImportResolver {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_language(root, SourceLanguage::Python)
    }

    pub fn with_language(root: impl Into<PathBuf>, language: SourceLanguage) -> Self {
        Self {
            root: root.into(),
            language,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve one import. `None` means the import is external.
    pub fn resolve(&self, import: &str) -> Option<ResolvedImport> {
        let parts: Vec<&str> = import.split('.').collect();
        for i in (1..=parts.len()).rev() {
            let (prefix, rest) = parts.split_at(i);
            if let Some(file_path) = self.resolve_prefix(prefix) {
                return Some(ResolvedImport {
                    module_name: prefix[i - 1].to_string(),
                    file_path,
                    sub_references: rest.iter().map(|s| s.to_string()).collect(),
                });
            }
        }
        None
    }

    /// Classify a file's raw imports.
    pub fn classify(&self, imports: &[String]) -> ClassifiedImports {
        let mut classified = ClassifiedImports::default();
        let mut seen_external = HashSet::new();

        for import in imports {
            match self.resolve(import) {
                Some(resolved) => {
                    debug!(import = %import, file = %resolved.file_path.display(), "internal import");
                    classified.internal.push(resolved);
                }
                None => {
                    if seen_external.insert(import.as_str()) {
                        classified.external.push(import.clone());
                    }
                }
            }
        }
        classified
    }

    /// File for an exact dotted prefix. Every component but the last must be
    /// an existing directory; the last names either `<leaf>.py` or a package
    /// `<leaf>/__init__.py`, the module file taking precedence.
    fn resolve_prefix(&self, prefix: &[&str]) -> Option<PathBuf> {
        if prefix.iter().any(|p| p.is_empty()) {
            return None;
        }
        let (leaf, dirs) = prefix.split_last()?;

        let mut base = self.root.clone();
        for dir in dirs {
            base.push(dir);
            if !base.is_dir() {
                return None;
            }
        }

        let module = base.join(format!("{leaf}.{}", self.language.module_extension()));
        if module.is_file() {
            return Some(module);
        }
        let package = base.join(leaf);
        let initializer = package.join(self.language.package_initializer());
        if package.is_dir() && initializer.is_file() {
            return Some(initializer);
        }
        None
    }
}
