//! The module dependency graph.
//!
//! Nodes are canonical absolute file paths (real paths after symlink
//! resolution). Edges carry a kind: `Type` for `import type` declarations,
//! `Value` for everything else, re-exports included. When both a type-only
//! and a value edge exist between the same pair of modules they collapse
//! into a single value edge. Self-edges are recorded explicitly; the
//! resolver turns them into errors.

use std::path::{Path, PathBuf};

use rustc_hash::FxHashMap;
use vibefun_common::Location;

/// The kind of a dependency edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeKind {
    /// `import type { ... }` -- erased at runtime, safe in cycles.
    Type,
    /// Any runtime dependency, including re-exports and wildcard imports.
    Value,
}

/// One dependency edge.
#[derive(Debug, Clone)]
pub struct Edge {
    pub to: PathBuf,
    pub kind: EdgeKind,
    pub location: Location,
}

/// A directed graph of modules keyed by canonical path.
///
/// Modules are stored in insertion order and identified by index;
/// path-based lookup goes through an internal hash map.
#[derive(Debug, Default)]
pub struct ModuleGraph {
    nodes: Vec<PathBuf>,
    index: FxHashMap<PathBuf, usize>,
    edges: Vec<Vec<Edge>>,
}

impl ModuleGraph {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a module node, returning its index. Adding an existing path
    /// returns the existing index.
    pub fn add_module(&mut self, path: PathBuf) -> usize {
        if let Some(&idx) = self.index.get(&path) {
            return idx;
        }
        let idx = self.nodes.len();
        self.index.insert(path.clone(), idx);
        self.nodes.push(path);
        self.edges.push(Vec::new());
        idx
    }

    /// Record an edge from `from` to `edge.to`.
    ///
    /// A duplicate edge between the same pair collapses: a `Value` edge
    /// absorbs a `Type` edge (and its location), never the reverse.
    pub fn add_edge(&mut self, from: usize, edge: Edge) {
        let existing = self.edges[from].iter_mut().find(|e| e.to == edge.to);
        match existing {
            Some(current) => {
                if current.kind == EdgeKind::Type && edge.kind == EdgeKind::Value {
                    *current = edge;
                }
            }
            None => self.edges[from].push(edge),
        }
    }

    /// Look up a module index by path.
    pub fn resolve(&self, path: &Path) -> Option<usize> {
        self.index.get(path).copied()
    }

    /// The path of the module at `idx`.
    pub fn path(&self, idx: usize) -> &Path {
        &self.nodes[idx]
    }

    /// All node paths in insertion order.
    pub fn nodes(&self) -> &[PathBuf] {
        &self.nodes
    }

    /// Outgoing edges of the module at `idx`, in declaration order.
    pub fn edges(&self, idx: usize) -> &[Edge] {
        &self.edges[idx]
    }

    /// Number of modules in the graph.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loc() -> Location {
        Location::new("t.vf", 1, 1, 0)
    }

    #[test]
    fn add_module_is_idempotent() {
        let mut graph = ModuleGraph::new();
        let a = graph.add_module("/a.vf".into());
        let a2 = graph.add_module("/a.vf".into());
        assert_eq!(a, a2);
        assert_eq!(graph.node_count(), 1);
    }

    #[test]
    fn mixed_edges_collapse_to_value() {
        let mut graph = ModuleGraph::new();
        let a = graph.add_module("/a.vf".into());
        graph.add_module("/b.vf".into());

        graph.add_edge(a, Edge { to: "/b.vf".into(), kind: EdgeKind::Type, location: loc() });
        graph.add_edge(a, Edge { to: "/b.vf".into(), kind: EdgeKind::Value, location: loc() });

        assert_eq!(graph.edges(a).len(), 1);
        assert_eq!(graph.edges(a)[0].kind, EdgeKind::Value);
    }

    #[test]
    fn value_edge_is_not_downgraded() {
        let mut graph = ModuleGraph::new();
        let a = graph.add_module("/a.vf".into());
        graph.add_module("/b.vf".into());

        graph.add_edge(a, Edge { to: "/b.vf".into(), kind: EdgeKind::Value, location: loc() });
        graph.add_edge(a, Edge { to: "/b.vf".into(), kind: EdgeKind::Type, location: loc() });

        assert_eq!(graph.edges(a)[0].kind, EdgeKind::Value);
    }

    #[test]
    fn self_edges_are_recorded() {
        let mut graph = ModuleGraph::new();
        let a = graph.add_module("/a.vf".into());
        graph.add_edge(a, Edge { to: "/a.vf".into(), kind: EdgeKind::Value, location: loc() });
        assert_eq!(graph.edges(a).len(), 1);
        assert_eq!(graph.edges(a)[0].to, PathBuf::from("/a.vf"));
    }
}
