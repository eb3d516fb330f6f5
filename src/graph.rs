//! Reference Graph
//!
//! Records which flattened definition points at which while a pass runs.
//! Cycles are legal in a flattened document; the graph exists so they can be
//! reported (SCCs via petgraph), not to break them. The resolver cache does that.

use std::collections::HashMap;
use std::fmt;

use petgraph::algo::kosaraju_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use serde::{Deserialize, Serialize};

use crate::model::ComponentKind;

/// A flattened definition: kind + local name
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DefinitionId {
    pub kind: ComponentKind,
    pub name: String,
}

impl DefinitionId {
    pub fn new(kind: ComponentKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
        }
    }
}

impl fmt::Display for DefinitionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind.namespace_key(), self.name)
    }
}

/// Directed graph of definition → referenced definition
#[derive(Debug, Default)]
pub struct ReferenceGraph {
    graph: DiGraph<DefinitionId, ()>,
    indices: HashMap<DefinitionId, NodeIndex>,
}

impl ReferenceGraph {
    pub fn new() -> Self {
        Self::default()
    }

    fn index_of(&mut self, id: DefinitionId) -> NodeIndex {
        if let Some(&idx) = self.indices.get(&id) {
            return idx;
        }
        let idx = self.graph.add_node(id.clone());
        self.indices.insert(id, idx);
        idx
    }

    /// Record an edge; duplicates are ignored
    pub fn add_edge(&mut self, from: DefinitionId, to: DefinitionId) {
        let from = self.index_of(from);
        let to = self.index_of(to);
        if self.graph.find_edge(from, to).is_none() {
            self.graph.add_edge(from, to, ());
        }
    }

    pub fn contains_edge(&self, from: &DefinitionId, to: &DefinitionId) -> bool {
        match (self.indices.get(from), self.indices.get(to)) {
            (Some(&from), Some(&to)) => self.graph.find_edge(from, to).is_some(),
            _ => false,
        }
    }

    /// Distinct edges recorded so far
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Reference cycles: SCCs with more than one member, plus self references.
    /// Members of each cycle are sorted, and cycles are sorted by first member.
    pub fn cycles(&self) -> Vec<Vec<DefinitionId>> {
        let mut cycles: Vec<Vec<DefinitionId>> = kosaraju_scc(&self.graph)
            .into_iter()
            .filter(|scc| {
                scc.len() > 1 || self.graph.find_edge(scc[0], scc[0]).is_some()
            })
            .map(|scc| {
                let mut members: Vec<DefinitionId> = scc
                    .into_iter()
                    .filter_map(|idx| self.graph.node_weight(idx).cloned())
                    .collect();
                members.sort();
                members
            })
            .collect();
        cycles.sort();
        cycles
    }
}
