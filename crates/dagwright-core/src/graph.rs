//! # Decision Graph
//!
//! [`Graph`] is the owned, serializable candidate graph that every stage
//! mutates in place. [`GraphIndex`] is a read-only arena view rebuilt from a
//! graph whenever a stage needs to reason about connectivity: nodes get dense
//! integer indices, ids are resolved once through a `BTreeMap`, and edges hold
//! index endpoints. String ids only matter again at serialization.
//!
//! Structural edges (decision → option, option → anything) encode branching
//! only. They are excluded from cycle detection, reachability and strength
//! statistics.

use crate::DagwrightError;
use crate::types::{Edge, Node, NodeKind, lenient};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, VecDeque};

// =============================================================================
// GRAPH
// =============================================================================

/// A candidate decision graph.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Graph {
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient::opt_string")]
    pub version: Option<String>,
    #[serde(default, alias = "seed", skip_serializing_if = "Option::is_none")]
    pub default_seed: Option<u64>,
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub edges: Vec<Edge>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub meta: Map<String, Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Graph {
    /// Create an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse generator output.
    pub fn from_json_str(raw: &str) -> Result<Self, DagwrightError> {
        serde_json::from_str(raw).map_err(|e| DagwrightError::Deserialization(e.to_string()))
    }

    /// Parse an already-decoded JSON value.
    pub fn from_value(value: Value) -> Result<Self, DagwrightError> {
        serde_json::from_value(value).map_err(|e| DagwrightError::Deserialization(e.to_string()))
    }

    /// Render back to JSON, passthrough keys included.
    pub fn to_value(&self) -> Result<Value, DagwrightError> {
        serde_json::to_value(self).map_err(|e| DagwrightError::Serialization(e.to_string()))
    }

    /// First node carrying `id`.
    #[must_use]
    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Mutable access to the first node carrying `id`.
    pub fn node_mut(&mut self, id: &str) -> Option<&mut Node> {
        self.nodes.iter_mut().find(|n| n.id == id)
    }

    /// Ids of all goal nodes in graph order.
    #[must_use]
    pub fn goal_ids(&self) -> Vec<String> {
        self.nodes
            .iter()
            .filter(|n| n.kind() == NodeKind::Goal)
            .map(|n| n.id.clone())
            .collect()
    }

    /// Build the arena view of the current state.
    #[must_use]
    pub fn index(&self) -> GraphIndex {
        GraphIndex::build(self)
    }
}

// =============================================================================
// ARENA INDEX
// =============================================================================

/// Dense index of a node inside [`GraphIndex`]; equals its position in
/// `Graph::nodes`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeIx(pub usize);

/// Edge with resolved endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexedEdge {
    /// Position in `Graph::edges`.
    pub position: usize,
    pub from: Option<NodeIx>,
    pub to: Option<NodeIx>,
    pub structural: bool,
}

impl IndexedEdge {
    /// Both endpoints resolve and the edge is not structural.
    #[must_use]
    pub fn is_causal(&self) -> bool {
        !self.structural && self.from.is_some() && self.to.is_some()
    }
}

/// Read-only connectivity view over a [`Graph`].
#[derive(Debug, Clone)]
pub struct GraphIndex {
    ids: BTreeMap<String, NodeIx>,
    /// `(id, position)` of every node shadowed by an earlier one with the same id.
    duplicates: Vec<(String, usize)>,
    kinds: Vec<NodeKind>,
    edges: Vec<IndexedEdge>,
    /// Causal adjacency: node -> [(target, edge position)].
    causal_out: Vec<Vec<(NodeIx, usize)>>,
    causal_in: Vec<Vec<NodeIx>>,
    structural_out: Vec<Vec<NodeIx>>,
}

impl GraphIndex {
    /// Rebuild the index. The first node with a given id wins.
    #[must_use]
    pub fn build(graph: &Graph) -> Self {
        let mut ids = BTreeMap::new();
        let mut duplicates = Vec::new();
        let mut kinds = Vec::with_capacity(graph.nodes.len());

        for (position, node) in graph.nodes.iter().enumerate() {
            kinds.push(node.kind());
            if ids.contains_key(&node.id) {
                duplicates.push((node.id.clone(), position));
            } else {
                ids.insert(node.id.clone(), NodeIx(position));
            }
        }

        let count = graph.nodes.len();
        let mut causal_out = vec![Vec::new(); count];
        let mut causal_in = vec![Vec::new(); count];
        let mut structural_out = vec![Vec::new(); count];
        let mut edges = Vec::with_capacity(graph.edges.len());

        for (position, edge) in graph.edges.iter().enumerate() {
            let from = ids.get(&edge.from).copied();
            let to = ids.get(&edge.to).copied();
            let structural = match (from, to) {
                (Some(f), Some(t)) => is_structural(kinds[f.0], kinds[t.0]),
                (Some(f), None) => kinds[f.0] == NodeKind::Option,
                _ => false,
            };
            let indexed = IndexedEdge {
                position,
                from,
                to,
                structural,
            };
            if let (Some(f), Some(t)) = (from, to) {
                if structural {
                    structural_out[f.0].push(t);
                } else {
                    causal_out[f.0].push((t, position));
                    causal_in[t.0].push(f);
                }
            }
            edges.push(indexed);
        }

        Self {
            ids,
            duplicates,
            kinds,
            edges,
            causal_out,
            causal_in,
            structural_out,
        }
    }

    #[must_use]
    pub fn resolve(&self, id: &str) -> Option<NodeIx> {
        self.ids.get(id).copied()
    }

    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains_key(id)
    }

    #[must_use]
    pub fn kind(&self, ix: NodeIx) -> NodeKind {
        self.kinds[ix.0]
    }

    #[must_use]
    pub fn node_count(&self) -> usize {
        self.kinds.len()
    }

    #[must_use]
    pub fn duplicates(&self) -> &[(String, usize)] {
        &self.duplicates
    }

    #[must_use]
    pub fn edges(&self) -> &[IndexedEdge] {
        &self.edges
    }

    /// Indices of goal nodes that own their id.
    #[must_use]
    pub fn goals(&self) -> Vec<NodeIx> {
        let mut goals: Vec<NodeIx> = self
            .ids
            .values()
            .copied()
            .filter(|ix| self.kinds[ix.0] == NodeKind::Goal)
            .collect();
        goals.sort_unstable();
        goals
    }

    /// Targets of structural edges leaving `ix`.
    #[must_use]
    pub fn structural_targets(&self, ix: NodeIx) -> &[NodeIx] {
        &self.structural_out[ix.0]
    }

    /// Nodes that reach any of `targets` over causal edges (targets included).
    ///
    /// Reverse breadth-first search; the result is indexed by `NodeIx`.
    #[must_use]
    pub fn reaching(&self, targets: &[NodeIx]) -> Vec<bool> {
        let mut seen = vec![false; self.node_count()];
        let mut queue = VecDeque::new();
        for &t in targets {
            if !seen[t.0] {
                seen[t.0] = true;
                queue.push_back(t);
            }
        }
        while let Some(current) = queue.pop_front() {
            for &pred in &self.causal_in[current.0] {
                if !seen[pred.0] {
                    seen[pred.0] = true;
                    queue.push_back(pred);
                }
            }
        }
        seen
    }

    /// Whether a causal path leads from `from` to `to`.
    #[must_use]
    pub fn has_causal_path(&self, from: NodeIx, to: NodeIx) -> bool {
        if from == to {
            return true;
        }
        let mut seen = vec![false; self.node_count()];
        let mut queue = VecDeque::from([from]);
        seen[from.0] = true;
        while let Some(current) = queue.pop_front() {
            for &(next, _) in &self.causal_out[current.0] {
                if next == to {
                    return true;
                }
                if !seen[next.0] {
                    seen[next.0] = true;
                    queue.push_back(next);
                }
            }
        }
        false
    }

    /// Whether adding a causal edge `from -> to` would close a cycle.
    #[must_use]
    pub fn would_create_cycle(&self, from: NodeIx, to: NodeIx) -> bool {
        self.has_causal_path(to, from)
    }

    /// Positions of causal back edges, one per cycle found.
    ///
    /// Iterative three-colour depth-first search in node order, so the result
    /// is deterministic for a given graph.
    #[must_use]
    pub fn back_edges(&self) -> Vec<usize> {
        #[derive(Clone, Copy, PartialEq)]
        enum Colour {
            White,
            Grey,
            Black,
        }

        let count = self.node_count();
        let mut colour = vec![Colour::White; count];
        let mut back = Vec::new();

        for start in 0..count {
            if colour[start] != Colour::White {
                continue;
            }
            // (node, next neighbour offset)
            let mut stack: Vec<(usize, usize)> = vec![(start, 0)];
            colour[start] = Colour::Grey;
            while let Some(frame) = stack.last_mut() {
                let (node, offset) = *frame;
                if let Some(&(next, position)) = self.causal_out[node].get(offset) {
                    frame.1 = offset.saturating_add(1);
                    match colour[next.0] {
                        Colour::White => {
                            colour[next.0] = Colour::Grey;
                            stack.push((next.0, 0));
                        }
                        Colour::Grey => back.push(position),
                        Colour::Black => {}
                    }
                } else {
                    colour[node] = Colour::Black;
                    stack.pop();
                }
            }
        }
        back.sort_unstable();
        back
    }
}

/// Structural edges: decision → option and option → anything.
#[must_use]
pub fn is_structural(from: NodeKind, to: NodeKind) -> bool {
    match from {
        NodeKind::Option => true,
        NodeKind::Decision => to == NodeKind::Option,
        NodeKind::Goal
        | NodeKind::Factor
        | NodeKind::Outcome
        | NodeKind::Risk
        | NodeKind::Action
        | NodeKind::Constraint => false,
    }
}

// =============================================================================
// TESTS
// =============================================================================
