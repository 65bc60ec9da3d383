//! Reference Graph
//!
//! Directed graph of reference edges between artifacts, kept inside the
//! [`Index`](crate::index::Index). An edge `A -> B` means "A references B";
//! the reverse-reference set of B is the set of its incoming edges, so
//! `referrers` costs O(in-degree) after an O(1) node lookup.
//!
//! Every edge remembers the document whose text declared it. Re-parsing a
//! document drops exactly the edges it declared before re-adding the new ones.

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use petgraph::stable_graph::{NodeIndex, StableDiGraph};
use petgraph::visit::EdgeRef;
use petgraph::Direction;

use crate::id::ArtifactId;
use crate::parser::RefKind;

/// Edge payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefEdge {
    pub kind: RefKind,
    /// Document whose text declares this edge
    pub declared_in: PathBuf,
}

/// Reference edges between artifact ids
#[derive(Debug, Default)]
pub struct ReferenceGraph {
    graph: StableDiGraph<ArtifactId, RefEdge>,
    node_indices: HashMap<ArtifactId, NodeIndex>,
}

impl ReferenceGraph {
    pub fn new() -> Self {
        Self::default()
    }

    fn node(&mut self, id: ArtifactId) -> NodeIndex {
        if let Some(&idx) = self.node_indices.get(&id) {
            return idx;
        }
        let idx = self.graph.add_node(id);
        self.node_indices.insert(id, idx);
        idx
    }

    /// Record that `from` references `to`
    pub fn add_edge(&mut self, from: ArtifactId, to: ArtifactId, kind: RefKind, declared_in: &Path) {
        let from_idx = self.node(from);
        let to_idx = self.node(to);
        let duplicate = self
            .graph
            .edges_directed(from_idx, Direction::Outgoing)
            .any(|e| e.target() == to_idx && e.weight().kind == kind && e.weight().declared_in == declared_in);
        if !duplicate {
            self.graph.add_edge(
                from_idx,
                to_idx,
                RefEdge {
                    kind,
                    declared_in: declared_in.to_path_buf(),
                },
            );
        }
    }

    /// Drop every edge declared by one document, then any node left without edges
    pub fn remove_declared_in(&mut self, path: &Path) {
        let stale: Vec<_> = self
            .graph
            .edge_indices()
            .filter(|&e| {
                self.graph
                    .edge_weight(e)
                    .map(|w| w.declared_in == path)
                    .unwrap_or(false)
            })
            .collect();
        for edge in stale {
            self.graph.remove_edge(edge);
        }

        let orphans: Vec<NodeIndex> = self
            .graph
            .node_indices()
            .filter(|&n| self.graph.neighbors_undirected(n).next().is_none())
            .collect();
        for idx in orphans {
            if let Some(id) = self.graph.remove_node(idx) {
                self.node_indices.remove(&id);
            }
        }
    }

    /// Ids that reference `id`
    pub fn referrers(&self, id: &ArtifactId) -> BTreeSet<ArtifactId> {
        let Some(&idx) = self.node_indices.get(id) else {
            return BTreeSet::new();
        };
        self.graph
            .edges_directed(idx, Direction::Incoming)
            .map(|e| self.graph[e.source()])
            .collect()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }
}
