//! Dependency graph module.
//!
//! Provides the record data model, the traversal that produces records, the
//! aggregation into one project graph, and a petgraph view for querying it.

pub mod aggregate;
pub mod builder;
pub mod engine;
pub mod tree;
pub mod types;

pub use aggregate::{build_dependency_graph, build_structure};
pub use builder::{
    DependencyGraphBuilder, RecordSink, TraversalContext, TraversalSummary,
};
pub use engine::{GraphStats, ModuleGraph};
pub use tree::{DependencyTree, ModuleEntry};
pub use types::{
    ClassInfo, DependencyEdge, DependencyGraph, EntityKind, FunctionInfo, LineSpan,
    ModuleSummary, Parameter, ProjectStructure, ResolvedImport, SourceFileRecord, VariableUsage,
};
