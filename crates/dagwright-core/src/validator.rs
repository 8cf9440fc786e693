//! # Structural Validator
//!
//! Checks a [`Graph`] against every structural invariant and returns the
//! violations as data. Never mutates, never fails: malformed input is exactly
//! what this module exists to describe.
//!
//! Output order is stable for a given graph: graph-level checks, then edges
//! in position order, then nodes in position order, then connectivity.

use crate::catalog::ViolationCode;
use crate::config::GraphLimits;
use crate::graph::{Graph, GraphIndex};
use crate::types::{Edge, Node, NodeBody, NodeKind, Subject, Violation};
use std::collections::BTreeSet;

/// Stateless validator parameterised by graph caps.
#[derive(Debug, Clone, Copy, Default)]
pub struct Validator {
    limits: GraphLimits,
}

impl Validator {
    #[must_use]
    pub fn new(limits: GraphLimits) -> Self {
        Self { limits }
    }

    #[must_use]
    pub fn limits(&self) -> GraphLimits {
        self.limits
    }

    /// Run every check.
    #[must_use]
    pub fn validate(&self, graph: &Graph) -> Vec<Violation> {
        let index = graph.index();
        let mut out = Vec::new();

        self.check_limits(graph, &mut out);
        check_node_ids(&index, &mut out);
        check_goals(graph, &mut out);
        check_edges(graph, &index, &mut out);
        for node in &graph.nodes {
            check_factor(node, &mut out);
        }
        check_cycles(graph, &index, &mut out);
        check_reachability(graph, &index, &mut out);

        tracing::debug!(violations = out.len(), "validation complete");
        out
    }

    fn check_limits(&self, graph: &Graph, out: &mut Vec<Violation>) {
        if graph.nodes.len() > self.limits.max_nodes {
            out.push(Violation::new(
                ViolationCode::NodeLimitExceeded,
                Subject::Graph,
                "nodes",
                format!(
                    "graph has {} nodes, cap is {}",
                    graph.nodes.len(),
                    self.limits.max_nodes
                ),
            ));
        }
        if graph.edges.len() > self.limits.max_edges {
            out.push(Violation::new(
                ViolationCode::EdgeLimitExceeded,
                Subject::Graph,
                "edges",
                format!(
                    "graph has {} edges, cap is {}",
                    graph.edges.len(),
                    self.limits.max_edges
                ),
            ));
        }
    }
}

/// Validate with default caps.
#[must_use]
pub fn validate(graph: &Graph) -> Vec<Violation> {
    Validator::default().validate(graph)
}

// =============================================================================
// GRAPH-LEVEL CHECKS
// =============================================================================

fn check_node_ids(index: &GraphIndex, out: &mut Vec<Violation>) {
    for (id, position) in index.duplicates() {
        out.push(Violation::new(
            ViolationCode::DuplicateNodeId,
            Subject::Node(id.clone()),
            format!("nodes[{}].id", position),
            format!("node id `{}` is already used", id),
        ));
    }
}

fn check_goals(graph: &Graph, out: &mut Vec<Violation>) {
    let goals = graph.goal_ids();
    match goals.len() {
        0 => out.push(Violation::new(
            ViolationCode::MissingGoal,
            Subject::Graph,
            "nodes",
            "graph has no goal node",
        )),
        1 => {}
        n => out.push(Violation::new(
            ViolationCode::MultipleGoals,
            Subject::Graph,
            "nodes",
            format!("graph has {} goal nodes: {}", n, goals.join(", ")),
        )),
    }
}

// =============================================================================
// EDGE CHECKS
// =============================================================================

fn check_edges(graph: &Graph, index: &GraphIndex, out: &mut Vec<Violation>) {
    let mut seen_ids = BTreeSet::new();

    for (position, edge) in graph.edges.iter().enumerate() {
        let subject = || Subject::Edge(position);

        for (end, id) in [("from", &edge.from), ("to", &edge.to)] {
            if !index.contains(id) {
                out.push(Violation::new(
                    ViolationCode::DanglingEdgeEndpoint,
                    subject(),
                    format!("edges[{}].{}", position, end),
                    format!("edge endpoint `{}` does not exist", id),
                ));
            }
        }

        check_edge_numerics(position, edge, out);

        match edge.id.as_deref().map(str::trim) {
            None | Some("") => out.push(Violation::new(
                ViolationCode::MissingEdgeId,
                subject(),
                format!("edges[{}].id", position),
                format!("edge {} -> {} has no id", edge.from, edge.to),
            )),
            Some(id) => {
                if !seen_ids.insert(id.to_string()) {
                    out.push(Violation::new(
                        ViolationCode::DuplicateEdgeId,
                        subject(),
                        format!("edges[{}].id", position),
                        format!("edge id `{}` is already used", id),
                    ));
                }
            }
        }

        let from_goal = index
            .resolve(&edge.from)
            .is_some_and(|ix| index.kind(ix) == NodeKind::Goal);
        if from_goal {
            out.push(Violation::new(
                ViolationCode::GoalHasOutgoingEdge,
                subject(),
                format!("edges[{}]", position),
                format!("goal `{}` has an outgoing edge to `{}`", edge.from, edge.to),
            ));
        }
    }
}

fn check_edge_numerics(position: usize, edge: &Edge, out: &mut Vec<Violation>) {
    let subject = Subject::Edge(position);

    if !edge.strength_mean.is_finite() {
        out.push(Violation::new(
            ViolationCode::NonFiniteStrengthMean,
            subject.clone(),
            format!("edges[{}].strength_mean", position),
            "strength_mean is not a finite number",
        ));
    } else if !(-1.0..=1.0).contains(&edge.strength_mean) {
        out.push(Violation::new(
            ViolationCode::StrengthOutOfRange,
            subject.clone(),
            format!("edges[{}].strength_mean", position),
            format!("strength_mean {} is outside [-1, 1]", edge.strength_mean),
        ));
    }

    if !edge.strength_std.is_finite() {
        out.push(Violation::new(
            ViolationCode::NonFiniteStrengthStd,
            subject.clone(),
            format!("edges[{}].strength_std", position),
            "strength_std is not a finite number",
        ));
    } else if edge.strength_std <= 0.0 {
        out.push(Violation::new(
            ViolationCode::StrengthStdNotPositive,
            subject.clone(),
            format!("edges[{}].strength_std", position),
            format!("strength_std {} is not positive", edge.strength_std),
        ));
    }

    if !edge.belief_exists.is_finite() || !(0.0..=1.0).contains(&edge.belief_exists) {
        out.push(Violation::new(
            ViolationCode::InvalidBelief,
            subject,
            format!("edges[{}].belief_exists", position),
            "belief_exists must be a finite number in [0, 1]",
        ));
    }
}

// =============================================================================
// NODE CHECKS
// =============================================================================

fn check_factor(node: &Node, out: &mut Vec<Violation>) {
    let body = match &node.body {
        NodeBody::Factor(body) => body,
        NodeBody::Goal(_)
        | NodeBody::Decision
        | NodeBody::Option(_)
        | NodeBody::Outcome
        | NodeBody::Risk
        | NodeBody::Action
        | NodeBody::Constraint => return,
    };
    let Some(category) = body.category else {
        return;
    };

    if category.requires_value() {
        match body.data.as_ref().and_then(|d| d.value.map(|v| (d, v))) {
            None => out.push(Violation::new(
                ViolationCode::FactorMissingValue,
                Subject::Node(node.id.clone()),
                format!("nodes[{}].data.value", node.id),
                format!("{} factor `{}` has no value", category.as_str(), node.id),
            )),
            Some((data, _)) if data.extraction_type.is_none() => out.push(Violation::new(
                ViolationCode::FactorMissingProvenance,
                Subject::Node(node.id.clone()),
                format!("nodes[{}].data.extractionType", node.id),
                format!("factor `{}` value has no extraction type", node.id),
            )),
            Some(_) => {}
        }
    } else if let Some(data) = &body.data {
        let fields = data.prohibited_external_fields();
        if !fields.is_empty() {
            out.push(Violation::new(
                ViolationCode::ExternalFactorHasData,
                Subject::Node(node.id.clone()),
                format!("nodes[{}].data", node.id),
                format!(
                    "external factor `{}` carries {}",
                    node.id,
                    fields.join(", ")
                ),
            ));
        }
    }
}

// =============================================================================
// CONNECTIVITY CHECKS
// =============================================================================

fn check_cycles(graph: &Graph, index: &GraphIndex, out: &mut Vec<Violation>) {
    for position in index.back_edges() {
        let Some(edge) = graph.edges.get(position) else {
            continue;
        };
        out.push(Violation::new(
            ViolationCode::CycleDetected,
            Subject::Edge(position),
            format!("edges[{}]", position),
            format!("edge {} -> {} closes a causal cycle", edge.from, edge.to),
        ));
    }
}

fn check_reachability(graph: &Graph, index: &GraphIndex, out: &mut Vec<Violation>) {
    let goals = index.goals();
    if goals.is_empty() {
        return;
    }
    let reach = index.reaching(&goals);

    for (position, node) in graph.nodes.iter().enumerate() {
        // Only the node that owns its id takes part in connectivity.
        if index.resolve(&node.id).map(|ix| ix.0) != Some(position) {
            continue;
        }
        let ix = crate::graph::NodeIx(position);
        match node.kind() {
            NodeKind::Factor | NodeKind::Outcome | NodeKind::Risk | NodeKind::Action => {
                if !reach[position] {
                    out.push(Violation::new(
                        ViolationCode::UnreachableNode,
                        Subject::Node(node.id.clone()),
                        format!("nodes[{}]", node.id),
                        format!("{} `{}` has no causal path to the goal", node.kind(), node.id),
                    ));
                }
            }
            NodeKind::Option => {
                let connected = index
                    .structural_targets(ix)
                    .iter()
                    .any(|target| reach[target.0]);
                if !connected {
                    out.push(Violation::new(
                        ViolationCode::DisconnectedOption,
                        Subject::Node(node.id.clone()),
                        format!("nodes[{}]", node.id),
                        format!("option `{}` has no causal path to the goal", node.id),
                    ));
                }
            }
            NodeKind::Goal | NodeKind::Decision | NodeKind::Constraint => {}
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Bucket, ExtractionType, FactorCategory, FactorData};

    fn codes(violations: &[Violation]) -> Vec<ViolationCode> {
        violations.iter().map(|v| v.code).collect()
    }

    fn clean() -> Graph {
        let mut graph = Graph::new();
        graph.nodes = vec![
            Node::new("goal", NodeKind::Goal, "Profit"),
            Node::new("dec", NodeKind::Decision, "Pricing"),
            Node::new("opt", NodeKind::Option, "Raise price"),
            Node::factor(
                "price",
                "Price",
                Some(FactorCategory::Controllable),
                Some(FactorData::with_value(10.0, ExtractionType::Explicit)),
            ),
        ];
        graph.edges = vec![
            Edge::new("dec", "opt", 1.0, 0.1),
            Edge::new("opt", "price", 1.0, 0.1),
            Edge::new("price", "goal", 0.6, 0.1),
        ];
        for (i, edge) in graph.edges.iter_mut().enumerate() {
            edge.id = Some(format!("e{}", i));
        }
        graph
    }

    #[test]
    fn clean_graph_has_no_violations() {
        assert!(validate(&clean()).is_empty());
    }

    #[test]
    fn reports_dangling_and_numeric_problems() {
        let mut graph = clean();
        let mut edge = Edge::new("price", "ghost", f64::NAN, -1.0);
        edge.id = Some("e9".into());
        edge.belief_exists = 2.0;
        graph.edges.push(edge);
        let found = codes(&validate(&graph));
        assert!(found.contains(&ViolationCode::DanglingEdgeEndpoint));
        assert!(found.contains(&ViolationCode::NonFiniteStrengthMean));
        assert!(found.contains(&ViolationCode::StrengthStdNotPositive));
        assert!(found.contains(&ViolationCode::InvalidBelief));
    }

    #[test]
    fn reports_missing_and_duplicate_edge_ids() {
        let mut graph = clean();
        graph.edges[0].id = None;
        graph.edges[2].id = Some("e1".into());
        let found = codes(&validate(&graph));
        assert_eq!(
            found,
            vec![ViolationCode::MissingEdgeId, ViolationCode::DuplicateEdgeId]
        );
    }

    #[test]
    fn reports_goal_problems() {
        let mut graph = clean();
        graph.nodes.push(Node::new("goal2", NodeKind::Goal, "Second"));
        let found = codes(&validate(&graph));
        assert!(found.contains(&ViolationCode::MultipleGoals));

        let mut none = clean();
        none.nodes.remove(0);
        none.edges.pop();
        let found = codes(&validate(&none));
        assert!(found.contains(&ViolationCode::MissingGoal));
        assert!(!found.contains(&ViolationCode::UnreachableNode));
    }

    #[test]
    fn reports_goal_outgoing_edge() {
        let mut graph = clean();
        let mut edge = Edge::new("goal", "price", 0.3, 0.1);
        edge.id = Some("back".into());
        graph.edges.push(edge);
        let found = codes(&validate(&graph));
        assert!(found.contains(&ViolationCode::GoalHasOutgoingEdge));
        assert!(found.contains(&ViolationCode::CycleDetected));
    }

    #[test]
    fn reports_factor_payload_problems() {
        let mut graph = clean();
        graph.nodes.push(Node::factor(
            "rates",
            "Interest rates",
            Some(FactorCategory::External),
            Some(FactorData::with_value(0.05, ExtractionType::Observed)),
        ));
        graph.nodes.push(Node::factor(
            "staff",
            "Staff",
            Some(FactorCategory::Observable),
            None,
        ));
        let mut edge = Edge::new("rates", "goal", 0.2, 0.1);
        edge.id = Some("r".into());
        graph.edges.push(edge);
        let mut edge = Edge::new("staff", "goal", 0.2, 0.1);
        edge.id = Some("s".into());
        graph.edges.push(edge);

        let violations = validate(&graph);
        let external = violations
            .iter()
            .find(|v| v.code == ViolationCode::ExternalFactorHasData)
            .expect("external violation");
        assert_eq!(external.bucket, Bucket::B);
        assert!(codes(&violations).contains(&ViolationCode::FactorMissingValue));
    }

    #[test]
    fn reports_unreachable_and_disconnected() {
        let mut graph = clean();
        graph.nodes.push(Node::new("risk", NodeKind::Risk, "Churn"));
        graph.nodes.push(Node::new("sq", NodeKind::Option, "Status quo"));
        let found = codes(&validate(&graph));
        assert_eq!(
            found,
            vec![ViolationCode::UnreachableNode, ViolationCode::DisconnectedOption]
        );
    }

    #[test]
    fn enforces_caps() {
        let validator = Validator::new(GraphLimits {
            max_nodes: 2,
            max_edges: 2,
        });
        let found = codes(&validator.validate(&clean()));
        assert!(found.contains(&ViolationCode::NodeLimitExceeded));
        assert!(found.contains(&ViolationCode::EdgeLimitExceeded));
    }
}
