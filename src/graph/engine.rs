//! In-memory module graph for querying the aggregated dependencies.
//!
//! Uses petgraph to answer who-imports-whom questions, find import cycles and
//! compute summary statistics over a [`DependencyGraph`].

use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

use super::types::DependencyGraph;

/// Directed file-to-file import graph. Parallel edges are allowed.
#[derive(Debug, Clone, Default)]
pub struct ModuleGraph {
    graph: DiGraph<String, ()>,
    /// Index: module path -> node index.
    index: HashMap<String, NodeIndex>,
}

impl ModuleGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load an aggregated graph. Edge targets without a record of their own
    /// (ignored or depth-limited modules) still become nodes.
    pub fn from_dependency_graph(deps: &DependencyGraph) -> Self {
        let mut graph = Self::new();
        for node in &deps.nodes {
            graph.add_module(node);
        }
        for edge in &deps.edges {
            graph.add_dependency(&edge.from, &edge.to);
        }
        graph
    }

    // ─── Node & Edge Operations ─────────────────────────────────

    /// Add a module node. Returns the existing index if already present.
    pub fn add_module(&mut self, path: &str) -> NodeIndex {
        if let Some(&idx) = self.index.get(path) {
            return idx;
        }
        let idx = self.graph.add_node(path.to_string());
        self.index.insert(path.to_string(), idx);
        idx
    }

    /// Record that `from` imports `to`.
    pub fn add_dependency(&mut self, from: &str, to: &str) {
        let from = self.add_module(from);
        let to = self.add_module(to);
        self.graph.add_edge(from, to, ());
    }

    pub fn contains(&self, path: &str) -> bool {
        self.index.contains_key(path)
    }

    // ─── Query Operations ───────────────────────────────────────

    /// Modules imported by `path`, sorted.
    pub fn dependencies(&self, path: &str) -> Vec<String> {
        self.neighbors(path, Direction::Outgoing)
    }

    /// Modules importing `path`, sorted.
    pub fn dependents(&self, path: &str) -> Vec<String> {
        self.neighbors(path, Direction::Incoming)
    }

    /// Every module reachable from `path`, in breadth-first order.
    pub fn transitive_dependencies(&self, path: &str) -> Vec<String> {
        let Some(&start) = self.index.get(path) else {
            return Vec::new();
        };
        let mut seen = HashSet::from([start]);
        let mut queue = VecDeque::from([start]);
        let mut out = Vec::new();

        while let Some(idx) = queue.pop_front() {
            let mut next: Vec<NodeIndex> = self
                .graph
                .edges_directed(idx, Direction::Outgoing)
                .map(|e| e.target())
                .filter(|t| seen.insert(*t))
                .collect();
            next.sort_by(|a, b| self.graph[*a].cmp(&self.graph[*b]));
            for target in next {
                out.push(self.graph[target].clone());
                queue.push_back(target);
            }
        }
        out
    }

    /// Import cycles: strongly connected components with more than one
    /// module, plus modules importing themselves. Each cycle is sorted, and
    /// cycles are ordered by their first module.
    pub fn cycles(&self) -> Vec<Vec<String>> {
        let mut cycles: Vec<Vec<String>> = tarjan_scc(&self.graph)
            .into_iter()
            .filter(|scc| scc.len() > 1 || self.graph.contains_edge(scc[0], scc[0]))
            .map(|scc| {
                let mut members: Vec<String> =
                    scc.into_iter().map(|idx| self.graph[idx].clone()).collect();
                members.sort();
                members
            })
            .collect();
        cycles.sort();
        cycles
    }

    // ─── Stats ──────────────────────────────────────────────────

    pub fn stats(&self) -> GraphStats {
        let unique_edges: HashSet<(NodeIndex, NodeIndex)> = self
            .graph
            .edge_references()
            .map(|e| (e.source(), e.target()))
            .collect();
        let roots = self
            .graph
            .node_indices()
            .filter(|&idx| {
                self.graph
                    .neighbors_directed(idx, Direction::Incoming)
                    .next()
                    .is_none()
            })
            .count();
        let leaves = self
            .graph
            .node_indices()
            .filter(|&idx| {
                self.graph
                    .neighbors_directed(idx, Direction::Outgoing)
                    .next()
                    .is_none()
            })
            .count();

        GraphStats {
            modules: self.graph.node_count(),
            edges: self.graph.edge_count(),
            unique_edges: unique_edges.len(),
            roots,
            leaves,
            cycles: self.cycles().len(),
        }
    }

    fn neighbors(&self, path: &str, direction: Direction) -> Vec<String> {
        let Some(&idx) = self.index.get(path) else {
            return Vec::new();
        };
        self.graph
            .neighbors_directed(idx, direction)
            .map(|n| self.graph[n].clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

/// Statistics about the module graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphStats {
    pub modules: usize,
    /// All edges, counting one per importing file.
    pub edges: usize,
    pub unique_edges: usize,
    /// Modules nothing imports (entry points).
    pub roots: usize,
    /// Modules importing nothing internal.
    pub leaves: usize,
    pub cycles: usize,
}

impl std::fmt::Display for GraphStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} modules, {} edges ({} unique), {} roots, {} leaves, {} cycles",
            self.modules, self.edges, self.unique_edges, self.roots, self.leaves, self.cycles
        )
    }
}
