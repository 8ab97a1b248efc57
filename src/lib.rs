//! # tracelens
//!
//! Dependency graph and failure-trace locator for Python projects.
//!
//! Starting from one entry file, tracelens follows project-internal imports,
//! records each reachable file's classes, functions, call sites and variable
//! usage, and aggregates the records into a file-level dependency graph. A
//! captured traceback can then be mapped back onto the nearest declared
//! entity for every frame.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use tracelens::{AnalyzerConfig, DependencyGraphBuilder, build_structure};
//! use std::path::Path;
//!
//! let builder = DependencyGraphBuilder::new(Path::new("."), AnalyzerConfig::default())?;
//! let mut records = Vec::new();
//! builder.analyze_from_entry(Path::new("main.py"), &mut records)?;
//!
//! let structure = build_structure(&records);
//! println!("{} modules", structure.dependencies_graph.nodes.len());
//! # Ok::<(), tracelens::TraceLensError>(())
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod graph;
pub mod locate;
pub mod parser;
pub mod report;
pub mod resolve;
pub mod storage;
pub mod trace;
pub mod workspace;

// Re-exports for convenience
pub use config::AnalyzerConfig;
pub use error::{Result, TraceLensError};

// Graph re-exports
pub use graph::{
    build_dependency_graph, build_structure, ClassInfo, DependencyGraph, DependencyGraphBuilder,
    DependencyTree, EntityKind, FunctionInfo, ModuleGraph, ProjectStructure, RecordSink,
    SourceFileRecord, TraversalContext, TraversalSummary,
};
pub use locate::{find_nearest_entity, EntityMatch, ErrorLocation};
pub use parser::{extract_file, SourceLanguage};
pub use resolve::ImportResolver;
pub use storage::RecordStore;
pub use trace::parse_traceback;
pub use workspace::Workspace;
