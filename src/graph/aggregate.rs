//! Structure aggregation: per-file records → one project-wide graph.

use std::collections::BTreeSet;
use tracing::debug;

use super::types::{DependencyEdge, DependencyGraph, ModuleSummary, ProjectStructure, SourceFileRecord};

/// Flatten every record's dependency tree into a single graph.
///
/// Nodes are the sorted set of record paths. Each record contributes one edge
/// per distinct module it depends on, so a file importing the same module
/// twice yields a single edge.
pub fn build_dependency_graph(records: &[SourceFileRecord]) -> DependencyGraph {
    let nodes: BTreeSet<&str> = records.iter().map(|r| r.path.as_str()).collect();

    let mut edges = Vec::new();
    for record in records {
        for target in record.internal_dependencies.unique_module_paths() {
            edges.push(DependencyEdge {
                from: record.path.clone(),
                to: target,
            });
        }
    }

    debug!(nodes = nodes.len(), edges = edges.len(), "dependency graph aggregated");
    DependencyGraph {
        nodes: nodes.into_iter().map(String::from).collect(),
        edges,
    }
}

/// Summarize each record and attach the aggregated graph.
pub fn build_structure(records: &[SourceFileRecord]) -> ProjectStructure {
    let modules = records
        .iter()
        .map(|record| (record.path.clone(), summarize(record)))
        .collect();
    ProjectStructure {
        modules,
        dependencies_graph: build_dependency_graph(records),
    }
}

fn summarize(record: &SourceFileRecord) -> ModuleSummary {
    ModuleSummary {
        path: record.path.clone(),
        classes: record.classes.keys().cloned().collect(),
        functions: record.functions.keys().cloned().collect(),
        external_dependencies: record.external_dependencies.clone(),
        internal_dependencies: record.internal_dependencies.unique_module_paths(),
        error: record.error.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::tree::{absolute_from_relative, DependencyTree};
    use crate::graph::types::{ClassInfo, ResolvedImport};
    use std::path::Path;

    fn record(path: &str, deps: &[&str]) -> SourceFileRecord {
        let root = Path::new("/proj");
        let imports: Vec<ResolvedImport> = deps
            .iter()
            .map(|rel| ResolvedImport {
                module_name: String::new(),
                file_path: absolute_from_relative(root, rel),
                sub_references: vec![],
            })
            .collect();
        SourceFileRecord {
            path: path.to_string(),
            internal_dependencies: DependencyTree::from_imports(root, &imports),
            ..Default::default()
        }
    }

    #[test]
    fn test_nested_directory_module_becomes_edge() {
        let records = vec![
            record("./main.py", &["./widgets/MapPlot.py"]),
            record("./widgets/MapPlot.py", &[]),
        ];
        let graph = build_dependency_graph(&records);

        assert_eq!(graph.nodes, vec!["./main.py", "./widgets/MapPlot.py"]);
        assert_eq!(
            graph.edges,
            vec![DependencyEdge {
                from: "./main.py".into(),
                to: "./widgets/MapPlot.py".into(),
            }]
        );
    }

    #[test]
    fn test_edges_unique_per_source_but_not_across_files() {
        let records = vec![
            record("./a.py", &["./util.py", "./util.py"]),
            record("./b.py", &["./util.py"]),
            record("./util.py", &[]),
        ];
        let graph = build_dependency_graph(&records);

        assert_eq!(graph.edges.len(), 2);
        assert!(graph.edges.iter().all(|e| e.to == "./util.py"));
    }

    #[test]
    fn test_error_records_are_nodes_without_edges() {
        let records = vec![
            record("./main.py", &["./bad.py"]),
            SourceFileRecord::failed("./bad.py".into(), "invalid syntax".into()),
        ];
        let structure = build_structure(&records);

        assert_eq!(structure.dependencies_graph.nodes.len(), 2);
        assert_eq!(structure.dependencies_graph.edges.len(), 1);
        assert_eq!(
            structure.modules["./bad.py"].error.as_deref(),
            Some("invalid syntax")
        );
    }

    #[test]
    fn test_module_summary_lists_entities() {
        let mut main = record("./main.py", &["./pkg/util.py"]);
        main.classes
            .insert("App".into(), ClassInfo::new("App".into(), 1, 9));
        main.external_dependencies = vec!["os".into()];
        let structure = build_structure(&[main]);

        let summary = &structure.modules["./main.py"];
        assert_eq!(summary.classes, vec!["App"]);
        assert_eq!(summary.internal_dependencies, vec!["./pkg/util.py"]);
        assert_eq!(summary.external_dependencies, vec!["os"]);
    }
}
