//! # Structural Reconciler
//!
//! Restores connectivity that rewriting alone cannot fix:
//!
//! 1. Re-adds edges that earlier stages over-pruned, using an
//!    [`EdgeFieldSnapshot`] taken before any repair.
//! 2. Refills `origin` / `provenance` stripped from surviving edges.
//! 3. Wires a disconnected status-quo option into the causal backbone.
//!
//! Afterwards the graph is re-validated and every remaining violation is
//! escalated to Bucket C, whatever its severity.

use crate::catalog::ViolationCode;
use crate::constraints::normalize_id;
use crate::graph::{Graph, GraphIndex, NodeIx, is_structural};
use crate::primitives::{
    DEFAULT_BELIEF_EXISTS, DEFAULT_STRENGTH_MAGNITUDE, DEFAULT_STRENGTH_STD, REPAIR_EDGE_ORIGIN,
};
use crate::sweep::next_edge_id;
use crate::types::{
    Bucket, Edge, FactorCategory, Node, NodeBody, NodeKind, RepairAction, Violation,
    lenient,
};
use crate::validator::Validator;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// Normalized fragments that mark an option as the "do nothing" branch.
pub const STATUS_QUO_KEYWORDS: [&str; 8] = [
    "status_quo",
    "do_nothing",
    "no_change",
    "keep_current",
    "current_state",
    "baseline",
    "business_as_usual",
    "maintain_current",
];

/// Whether `node` is a status-quo option.
#[must_use]
pub fn is_status_quo(node: &Node) -> bool {
    if node.kind() != NodeKind::Option {
        return false;
    }
    let label = normalize_id(&node.label);
    let id = normalize_id(&node.id);
    STATUS_QUO_KEYWORDS
        .iter()
        .any(|k| label.contains(k) || id.contains(k))
}

// =============================================================================
// SNAPSHOT
// =============================================================================

/// Pre-repair edge fields keyed by `(from, to)`.
///
/// When several edges share an endpoint pair the last one wins.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EdgeFieldSnapshot {
    edges: BTreeMap<(String, String), Edge>,
}

impl EdgeFieldSnapshot {
    /// Record every edge of `graph` as it is now.
    #[must_use]
    pub fn capture(graph: &Graph) -> Self {
        let edges = graph
            .edges
            .iter()
            .map(|edge| (edge.endpoints(), edge.clone()))
            .collect();
        Self { edges }
    }

    #[must_use]
    pub fn get(&self, from: &str, to: &str) -> Option<&Edge> {
        self.edges.get(&(from.to_string(), to.to_string()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.edges.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }
}

// =============================================================================
// TRACE
// =============================================================================

/// What the reconciler did.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReconciliationTrace {
    /// Ids of status-quo options wired into the backbone.
    pub status_quo_wired: Vec<String>,
    pub edges_restored: usize,
    /// Paths of edge fields refilled from the snapshot.
    pub fields_refilled: Vec<String>,
    /// Violations promoted to Bucket C.
    pub escalated: usize,
    pub actions: Vec<RepairAction>,
}

/// Trace plus the post-reconciliation violation set.
#[derive(Debug, Clone)]
pub struct ReconcileOutcome {
    pub trace: ReconciliationTrace,
    pub violations: Vec<Violation>,
}

// =============================================================================
// RECONCILER
// =============================================================================

#[derive(Debug, Clone, Copy, Default)]
pub struct Reconciler {
    validator: Validator,
}

impl Reconciler {
    #[must_use]
    pub fn new(validator: Validator) -> Self {
        Self { validator }
    }

    /// Reconcile `graph` in place.
    pub fn reconcile(&self, graph: &mut Graph, snapshot: &EdgeFieldSnapshot) -> ReconcileOutcome {
        let mut trace = ReconciliationTrace::default();

        restore_edges(graph, snapshot, &mut trace);
        refill_fields(graph, snapshot, &mut trace);
        wire_status_quo(graph, &mut trace);

        let mut violations = self.validator.validate(graph);
        for violation in violations
            .iter_mut()
            .filter(|v| v.bucket != Bucket::C)
        {
            violation.escalate();
            trace.escalated = trace.escalated.saturating_add(1);
            tracing::warn!(
                code = %violation.code,
                path = %violation.path,
                "violation survived reconciliation, escalated to bucket C"
            );
        }

        tracing::info!(
            restored = trace.edges_restored,
            refilled = trace.fields_refilled.len(),
            status_quo = trace.status_quo_wired.len(),
            escalated = trace.escalated,
            "reconciliation complete"
        );
        ReconcileOutcome { trace, violations }
    }
}

fn used_edge_ids(graph: &Graph) -> BTreeSet<String> {
    graph
        .edges
        .iter()
        .filter_map(|e| e.id.as_deref().map(str::trim))
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .collect()
}

// =============================================================================
// EDGE RESTORATION
// =============================================================================

fn restore_edges(graph: &mut Graph, snapshot: &EdgeFieldSnapshot, trace: &mut ReconciliationTrace) {
    let mut present: BTreeSet<(String, String)> = graph.edges.iter().map(Edge::endpoints).collect();
    let mut used = used_edge_ids(graph);

    for (endpoints, cached) in &snapshot.edges {
        if present.contains(endpoints) {
            continue;
        }
        let index = graph.index();
        let (Some(from), Some(to)) = (index.resolve(&endpoints.0), index.resolve(&endpoints.1))
        else {
            continue;
        };
        if index.kind(from) == NodeKind::Goal {
            continue;
        }
        let structural = is_structural(index.kind(from), index.kind(to));
        if !structural && index.would_create_cycle(from, to) {
            continue;
        }

        let position = graph.edges.len();
        let mut edge = sanitized(cached);
        let keep_id = edge
            .id
            .as_deref()
            .map(str::trim)
            .is_some_and(|id| !id.is_empty() && !used.contains(id));
        if !keep_id {
            edge.id = Some(next_edge_id(&used, &edge.from, &edge.to, position));
        }
        if let Some(id) = &edge.id {
            used.insert(id.trim().to_string());
        }

        tracing::debug!(from = %edge.from, to = %edge.to, "restored edge from snapshot");
        trace.actions.push(RepairAction::new(
            ViolationCode::UnreachableNode,
            "restore_edges",
            format!("edges[{}]", position),
            format!("restored edge {} -> {} from snapshot", edge.from, edge.to),
        ));
        trace.edges_restored = trace.edges_restored.saturating_add(1);
        present.insert(endpoints.clone());
        graph.edges.push(edge);
    }
}

/// Snapshot edge with non-finite or out-of-range numerics replaced.
fn sanitized(cached: &Edge) -> Edge {
    let mut edge = cached.clone();
    edge.strength_mean = if edge.strength_mean.is_finite() {
        edge.strength_mean.clamp(-1.0, 1.0)
    } else {
        edge.effect_direction.sign() * DEFAULT_STRENGTH_MAGNITUDE
    };
    if !(edge.strength_std.is_finite() && edge.strength_std > 0.0) {
        edge.strength_std = DEFAULT_STRENGTH_STD;
    }
    edge.belief_exists = if edge.belief_exists.is_finite() {
        edge.belief_exists.clamp(0.0, 1.0)
    } else {
        DEFAULT_BELIEF_EXISTS
    };
    edge
}

fn refill_fields(graph: &mut Graph, snapshot: &EdgeFieldSnapshot, trace: &mut ReconciliationTrace) {
    for (position, edge) in graph.edges.iter_mut().enumerate() {
        let Some(cached) = snapshot.get(&edge.from, &edge.to) else {
            continue;
        };
        if edge.origin.is_none() && cached.origin.is_some() {
            edge.origin.clone_from(&cached.origin);
            trace.fields_refilled.push(format!("edges[{}].origin", position));
        }
        if edge.provenance.is_none() && cached.provenance.is_some() {
            edge.provenance.clone_from(&cached.provenance);
            trace
                .fields_refilled
                .push(format!("edges[{}].provenance", position));
        }
    }
}

// =============================================================================
// STATUS-QUO WIRING
// =============================================================================

fn wire_status_quo(graph: &mut Graph, trace: &mut ReconciliationTrace) {
    let index = graph.index();
    let goals = index.goals();
    let Some(&goal) = goals.first() else {
        return;
    };
    let reach = index.reaching(&goals);

    let disconnected: Vec<NodeIx> = owned_nodes(graph, &index)
        .filter(|&ix| is_status_quo(&graph.nodes[ix.0]))
        .filter(|&ix| !index.structural_targets(ix).iter().any(|t| reach[t.0]))
        .collect();
    if disconnected.is_empty() {
        return;
    }

    let mut used = used_edge_ids(graph);
    for option in disconnected {
        let option_id = graph.nodes[option.0].id.clone();
        for target in wiring_targets(graph, &index, &reach, option, goal) {
            let target_id = graph.nodes[target.0].id.clone();
            let position = graph.edges.len();
            let mut edge = Edge::new(
                option_id.clone(),
                target_id.clone(),
                DEFAULT_STRENGTH_MAGNITUDE,
                DEFAULT_STRENGTH_STD,
            );
            let id = next_edge_id(&used, &option_id, &target_id, position);
            used.insert(id.clone());
            edge.id = Some(id);
            edge.origin = Some(REPAIR_EDGE_ORIGIN.to_string());
            graph.edges.push(edge);

            trace.actions.push(RepairAction::new(
                ViolationCode::DisconnectedOption,
                "wire_status_quo",
                format!("edges[{}]", position),
                format!("wired status-quo option {} to {}", option_id, target_id),
            ));

            let level = factor_level(&graph.nodes[target.0]);
            if let (Some(level), NodeBody::Option(data)) = (level, &mut graph.nodes[option.0].body) {
                if !data.interventions.contains_key(&target_id) {
                    data.interventions
                        .insert(target_id.clone(), lenient::number_value(level));
                    trace.actions.push(RepairAction::new(
                        ViolationCode::DisconnectedOption,
                        "wire_status_quo",
                        format!("nodes[{}].data.interventions.{}", option_id, target_id),
                        format!("held {} at its current level {}", target_id, level),
                    ));
                }
            }
        }
        tracing::debug!(option = %option_id, "wired status-quo option");
        trace.status_quo_wired.push(option_id);
    }
}

/// Positions of nodes that own their id.
fn owned_nodes<'g>(graph: &'g Graph, index: &'g GraphIndex) -> impl Iterator<Item = NodeIx> + 'g {
    graph
        .nodes
        .iter()
        .enumerate()
        .filter(|(position, node)| index.resolve(&node.id).map(|ix| ix.0) == Some(*position))
        .map(|(position, _)| NodeIx(position))
}

/// Where a disconnected status-quo option should point.
///
/// Sibling options' targets inside the reach set, else controllable factors
/// inside it, else the goal.
fn wiring_targets(
    graph: &Graph,
    index: &GraphIndex,
    reach: &[bool],
    option: NodeIx,
    goal: NodeIx,
) -> Vec<NodeIx> {
    let parents: BTreeSet<NodeIx> = index
        .edges()
        .iter()
        .filter(|e| e.structural && e.to == Some(option))
        .filter_map(|e| e.from)
        .filter(|&from| index.kind(from) == NodeKind::Decision)
        .collect();

    let siblings: Vec<NodeIx> = if parents.is_empty() {
        owned_nodes(graph, index)
            .filter(|&ix| ix != option && index.kind(ix) == NodeKind::Option)
            .collect()
    } else {
        let mut siblings = Vec::new();
        for &parent in &parents {
            for &child in index.structural_targets(parent) {
                if child != option && index.kind(child) == NodeKind::Option && !siblings.contains(&child) {
                    siblings.push(child);
                }
            }
        }
        siblings
    };

    let mut targets = Vec::new();
    for sibling in siblings {
        for &target in index.structural_targets(sibling) {
            let usable = reach[target.0]
                && target != option
                && index.kind(target) != NodeKind::Option;
            if usable && !targets.contains(&target) {
                targets.push(target);
            }
        }
    }
    if targets.is_empty() {
        targets = owned_nodes(graph, index)
            .filter(|&ix| reach[ix.0])
            .filter(|&ix| {
                graph.nodes[ix.0]
                    .factor_body()
                    .is_some_and(|b| b.category == Some(FactorCategory::Controllable))
            })
            .collect();
    }
    if targets.is_empty() {
        targets.push(goal);
    }
    targets
}

/// Baseline of a factor, else its value.
fn factor_level(node: &Node) -> Option<f64> {
    let data = node.factor_body()?.data.as_ref()?;
    data.baseline.or(data.value)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EffectDirection, ExtractionType, FactorData, Provenance};

    fn edge(from: &str, to: &str, id: &str) -> Edge {
        let mut edge = Edge::new(from, to, 0.4, 0.1);
        edge.id = Some(id.to_string());
        edge
    }

    fn decision_graph() -> Graph {
        let mut graph = Graph::new();
        graph.nodes = vec![
            Node::new("goal", NodeKind::Goal, "Profit"),
            Node::new("dec", NodeKind::Decision, "Pricing"),
            Node::new("opt_raise", NodeKind::Option, "Raise price"),
            Node::new("opt_sq", NodeKind::Option, "Status quo"),
            Node::factor(
                "price",
                "Price",
                Some(FactorCategory::Controllable),
                Some(FactorData {
                    baseline: Some(8.0),
                    ..FactorData::with_value(10.0, ExtractionType::Explicit)
                }),
            ),
        ];
        graph.edges = vec![
            edge("dec", "opt_raise", "e1"),
            edge("dec", "opt_sq", "e2"),
            edge("opt_raise", "price", "e3"),
            edge("price", "goal", "e4"),
        ];
        graph
    }

    #[test]
    fn status_quo_detection() {
        assert!(is_status_quo(&Node::new("o1", NodeKind::Option, "Do nothing")));
        assert!(is_status_quo(&Node::new("keep_current_plan", NodeKind::Option, "Hold")));
        assert!(!is_status_quo(&Node::new("o2", NodeKind::Option, "Expand")));
        assert!(!is_status_quo(&Node::new("f", NodeKind::Factor, "Status quo")));
    }

    #[test]
    fn status_quo_is_wired_to_sibling_targets() {
        let mut graph = decision_graph();
        let outcome = Reconciler::default().reconcile(&mut graph, &EdgeFieldSnapshot::default());

        assert_eq!(outcome.trace.status_quo_wired, vec!["opt_sq".to_string()]);
        assert!(outcome.violations.is_empty(), "{:?}", outcome.violations);
        let added = graph.edges.last().expect("wired edge");
        assert_eq!((added.from.as_str(), added.to.as_str()), ("opt_sq", "price"));
        assert_eq!(added.origin.as_deref(), Some(REPAIR_EDGE_ORIGIN));
        assert_eq!(added.id.as_deref(), Some("opt_sq::price::4"));

        let held = match &graph.nodes[3].body {
            NodeBody::Option(data) => data.interventions.get("price").and_then(|v| v.as_f64()),
            _ => None,
        };
        assert_eq!(held, Some(8.0));
    }

    #[test]
    fn status_quo_falls_back_to_goal() {
        let mut graph = Graph::new();
        graph.nodes = vec![
            Node::new("goal", NodeKind::Goal, "Profit"),
            Node::new("do_nothing", NodeKind::Option, "Do nothing"),
        ];
        let outcome = Reconciler::default().reconcile(&mut graph, &EdgeFieldSnapshot::default());
        assert_eq!(graph.edges.len(), 1);
        assert_eq!(graph.edges[0].to, "goal");
        assert_eq!(outcome.violations.len(), 0);
    }

    #[test]
    fn over_pruned_edges_are_restored() {
        let mut graph = decision_graph();
        graph.nodes.push(Node::new("churn", NodeKind::Outcome, "Churn"));
        let mut cached = edge("churn", "goal", "e5");
        cached.strength_mean = f64::NAN;
        cached.effect_direction = EffectDirection::Negative;
        graph.edges.push(cached);
        let snapshot = EdgeFieldSnapshot::capture(&graph);
        graph.edges.pop();

        let outcome = Reconciler::default().reconcile(&mut graph, &snapshot);
        assert_eq!(outcome.trace.edges_restored, 1);
        let restored = graph
            .edges
            .iter()
            .find(|e| e.from == "churn")
            .expect("restored edge");
        assert_eq!(restored.strength_mean, -0.5);
        assert_eq!(restored.id.as_deref(), Some("e5"));
        assert!(
            !outcome
                .violations
                .iter()
                .any(|v| v.code == ViolationCode::UnreachableNode)
        );
    }

    #[test]
    fn restoration_never_closes_a_cycle() {
        let mut graph = Graph::new();
        graph.nodes = vec![
            Node::new("goal", NodeKind::Goal, "Goal"),
            Node::new("a", NodeKind::Outcome, "A"),
            Node::new("b", NodeKind::Outcome, "B"),
        ];
        graph.edges = vec![edge("a", "b", "e1"), edge("b", "goal", "e2"), edge("b", "a", "e3")];
        let snapshot = EdgeFieldSnapshot::capture(&graph);
        graph.edges.pop();

        let outcome = Reconciler::default().reconcile(&mut graph, &snapshot);
        assert_eq!(outcome.trace.edges_restored, 0);
        assert_eq!(graph.edges.len(), 2);
    }

    #[test]
    fn stripped_fields_are_refilled() {
        let mut graph = decision_graph();
        graph.edges[3].origin = Some("ai".into());
        graph.edges[3].provenance = Some(Provenance::from_source("brief"));
        let snapshot = EdgeFieldSnapshot::capture(&graph);
        graph.edges[3].origin = None;
        graph.edges[3].provenance = None;

        let outcome = Reconciler::default().reconcile(&mut graph, &snapshot);
        assert_eq!(
            outcome.trace.fields_refilled,
            vec!["edges[3].origin".to_string(), "edges[3].provenance".to_string()]
        );
        assert_eq!(graph.edges[3].origin.as_deref(), Some("ai"));
    }

    #[test]
    fn leftovers_are_escalated() {
        let mut graph = decision_graph();
        graph.nodes[3].label = "Expand abroad".into();
        graph.nodes[3].id = "opt_expand".into();
        graph.edges[1].to = "opt_expand".into();

        let outcome = Reconciler::default().reconcile(&mut graph, &EdgeFieldSnapshot::default());
        assert_eq!(outcome.trace.escalated, 1);
        let left = &outcome.violations[0];
        assert_eq!(left.code, ViolationCode::DisconnectedOption);
        assert_eq!(left.bucket, Bucket::C);
        assert!(left.escalated);
    }

    #[test]
    fn info_leftovers_are_escalated_too() {
        let mut graph = decision_graph();
        graph.edges[0].id = None;

        let outcome = Reconciler::default().reconcile(&mut graph, &EdgeFieldSnapshot::default());
        assert_eq!(outcome.trace.status_quo_wired.len(), 1);
        assert_eq!(outcome.trace.escalated, 1);
        let left = &outcome.violations[0];
        assert_eq!(left.code, ViolationCode::MissingEdgeId);
        assert_eq!(left.bucket, Bucket::C);
        assert!(left.escalated);
    }
}
