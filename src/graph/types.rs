//! Core types for the tracelens data model.
//!
//! `SourceFileRecord` is the durable per-file result of a traversal. Everything
//! else (the consolidated graph, locator matches) is derived from records.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use super::tree::DependencyTree;

/// Whether a function was declared at module level or inside a class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Function,
    Method,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::Function => write!(f, "function"),
            EntityKind::Method => write!(f, "method"),
        }
    }
}

/// Anything declared with a 1-based inclusive line range.
pub trait LineSpan {
    fn start_line(&self) -> usize;
    fn end_line(&self) -> usize;

    fn contains_line(&self, line: usize) -> bool {
        self.start_line() <= line && line <= self.end_line()
    }

    /// Distance from `line` to the nearer boundary of the range.
    fn boundary_distance(&self, line: usize) -> usize {
        line.abs_diff(self.start_line())
            .min(line.abs_diff(self.end_line()))
    }

    /// Containment distance: 0 inside the range, otherwise the boundary distance.
    fn distance_to(&self, line: usize) -> usize {
        if self.contains_line(line) {
            0
        } else {
            self.boundary_distance(line)
        }
    }
}

/// A declared parameter with its optional annotation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    #[serde(default)]
    pub annotation: Option<String>,
}

/// Variable names read and written inside one function, first-occurrence order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableUsage {
    #[serde(default)]
    pub used: Vec<String>,
    #[serde(default)]
    pub assigned: Vec<String>,
}

impl VariableUsage {
    pub fn record_use(&mut self, name: &str) {
        if !self.used.iter().any(|n| n == name) {
            self.used.push(name.to_string());
        }
    }

    pub fn record_assignment(&mut self, name: &str) {
        if !self.assigned.iter().any(|n| n == name) {
            self.assigned.push(name.to_string());
        }
    }
}

/// A function or method declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionInfo {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: EntityKind,
    pub start_line: usize,
    pub end_line: usize,
    #[serde(default)]
    pub docstring: Option<String>,
    /// Callee names in call order. A trace of occurrences, not a set.
    #[serde(default)]
    pub calls: Vec<String>,
    #[serde(default)]
    pub variables: VariableUsage,
    #[serde(default)]
    pub decorators: Vec<String>,
    #[serde(default)]
    pub returns: Option<String>,
    #[serde(default)]
    pub parameters: Vec<Parameter>,
}

impl FunctionInfo {
    pub fn new(name: String, kind: EntityKind, start_line: usize, end_line: usize) -> Self {
        Self {
            name,
            kind,
            start_line,
            end_line,
            docstring: None,
            calls: Vec::new(),
            variables: VariableUsage::default(),
            decorators: Vec::new(),
            returns: None,
            parameters: Vec::new(),
        }
    }
}

impl LineSpan for FunctionInfo {
    fn start_line(&self) -> usize {
        self.start_line
    }
    fn end_line(&self) -> usize {
        self.end_line
    }
}

/// A class declaration and its directly declared methods.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassInfo {
    pub name: String,
    pub start_line: usize,
    pub end_line: usize,
    #[serde(default)]
    pub docstring: Option<String>,
    #[serde(default)]
    pub bases: Vec<String>,
    #[serde(default)]
    pub methods: BTreeMap<String, FunctionInfo>,
}

impl ClassInfo {
    pub fn new(name: String, start_line: usize, end_line: usize) -> Self {
        Self {
            name,
            start_line,
            end_line,
            docstring: None,
            bases: Vec::new(),
            methods: BTreeMap::new(),
        }
    }
}

impl LineSpan for ClassInfo {
    fn start_line(&self) -> usize {
        self.start_line
    }
    fn end_line(&self) -> usize {
        self.end_line
    }
}

/// An import that resolved to a file inside the project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedImport {
    /// Leaf identifier of the resolved prefix, as written in source.
    pub module_name: String,
    /// Absolute path of the resolved module file.
    pub file_path: PathBuf,
    /// Trailing dotted segments naming members of the module.
    pub sub_references: Vec<String>,
}

/// Everything known about one analyzed source file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFileRecord {
    /// Project-relative path, e.g. `./widgets/MapPlot.py`.
    pub path: String,
    #[serde(default)]
    pub internal_dependencies: DependencyTree,
    #[serde(default)]
    pub external_dependencies: Vec<String>,
    #[serde(default)]
    pub classes: BTreeMap<String, ClassInfo>,
    #[serde(default)]
    pub functions: BTreeMap<String, FunctionInfo>,
    /// Parse failure description. Set only on degraded records.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SourceFileRecord {
    /// A degraded record for a file that could not be parsed.
    pub fn failed(path: String, message: String) -> Self {
        Self {
            path,
            error: Some(message),
            ..Default::default()
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// A directed file-to-file import edge.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DependencyEdge {
    pub from: String,
    pub to: String,
}

/// File-level import graph. Edges are not deduplicated across files.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyGraph {
    pub nodes: Vec<String>,
    pub edges: Vec<DependencyEdge>,
}

/// Per-file entry of the consolidated structure file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleSummary {
    pub path: String,
    pub classes: Vec<String>,
    pub functions: Vec<String>,
    pub external_dependencies: Vec<String>,
    pub internal_dependencies: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// The consolidated `project_structure.json` document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectStructure {
    pub modules: BTreeMap<String, ModuleSummary>,
    pub dependencies_graph: DependencyGraph,
}
