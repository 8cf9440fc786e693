//! # Deterministic Sweep Engine
//!
//! Resolves Bucket A and B violations by rewriting the graph, without asking
//! the generator for a new one.
//!
//! The engine owns a fixed, ordered list of [`SweepRule`]s. One pass offers
//! every rule the violations it targets, re-validating after each rule that
//! changed something so the next rule sees current edge positions. Passes
//! repeat until one produces no action, the violation set stops changing, or
//! the iteration cap is reached.
//!
//! ## Rule contract
//!
//! - A rule only touches what its targeted violations point at.
//! - Applying a rule never introduces a code outside its `targets`.
//! - Applying a rule to its own output is a no-op.

use crate::catalog::ViolationCode;
use crate::graph::Graph;
use crate::primitives::{
    DEFAULT_BELIEF_EXISTS, DEFAULT_STRENGTH_MAGNITUDE, DEFAULT_STRENGTH_STD, MAX_SWEEP_ITERATIONS,
};
use crate::types::{BucketCounts, ExtractionType, NodeBody, RepairAction, Subject, Violation};
use crate::validator::Validator;
use serde::Serialize;
use std::collections::BTreeSet;

// =============================================================================
// RULES
// =============================================================================

type RuleFn = fn(&mut Graph, &[&Violation]) -> Vec<RepairAction>;

/// One named repair rule.
#[derive(Clone, Copy)]
pub struct SweepRule {
    pub name: &'static str,
    /// Codes this rule resolves. The engine only passes it these.
    pub targets: &'static [ViolationCode],
    apply: RuleFn,
}

impl SweepRule {
    /// Whether the rule resolves `code`.
    #[must_use]
    pub fn targets(&self, code: ViolationCode) -> bool {
        self.targets.contains(&code)
    }

    /// Apply to whichever of `violations` this rule targets.
    pub fn apply(&self, graph: &mut Graph, violations: &[Violation]) -> Vec<RepairAction> {
        let targeted: Vec<&Violation> = violations
            .iter()
            .filter(|v| self.targets(v.code))
            .collect();
        if targeted.is_empty() {
            return Vec::new();
        }
        (self.apply)(graph, &targeted)
    }
}

impl std::fmt::Debug for SweepRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SweepRule")
            .field("name", &self.name)
            .field("targets", &self.targets)
            .finish()
    }
}

/// The ordered rule list.
pub static SWEEP_RULES: [SweepRule; 7] = [
    SweepRule {
        name: "default_non_finite_strength",
        targets: &[
            ViolationCode::NonFiniteStrengthMean,
            ViolationCode::NonFiniteStrengthStd,
            ViolationCode::StrengthStdNotPositive,
        ],
        apply: default_non_finite_strength,
    },
    SweepRule {
        name: "clamp_numeric_ranges",
        targets: &[ViolationCode::StrengthOutOfRange, ViolationCode::InvalidBelief],
        apply: clamp_numeric_ranges,
    },
    SweepRule {
        name: "drop_dangling_edges",
        targets: &[ViolationCode::DanglingEdgeEndpoint],
        apply: drop_dangling_edges,
    },
    SweepRule {
        name: "drop_goal_outgoing_edges",
        targets: &[ViolationCode::GoalHasOutgoingEdge],
        apply: drop_goal_outgoing_edges,
    },
    SweepRule {
        name: "strip_external_payload",
        targets: &[ViolationCode::ExternalFactorHasData],
        apply: strip_external_payload,
    },
    SweepRule {
        name: "stamp_factor_provenance",
        targets: &[ViolationCode::FactorMissingProvenance],
        apply: stamp_factor_provenance,
    },
    SweepRule {
        name: "stamp_edge_ids",
        targets: &[ViolationCode::MissingEdgeId, ViolationCode::DuplicateEdgeId],
        apply: stamp_edge_ids,
    },
];

/// Edge positions referenced by `violations`, deduplicated, ascending.
fn edge_positions(violations: &[&Violation]) -> Vec<usize> {
    violations
        .iter()
        .filter_map(|v| match v.subject {
            Subject::Edge(position) => Some(position),
            Subject::Graph | Subject::Node(_) => None,
        })
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Node ids referenced by `violations`, deduplicated.
fn node_ids<'v>(violations: &[&'v Violation]) -> BTreeSet<&'v str> {
    violations
        .iter()
        .filter_map(|v| match &v.subject {
            Subject::Node(id) => Some(id.as_str()),
            Subject::Graph | Subject::Edge(_) => None,
        })
        .collect()
}

fn default_non_finite_strength(graph: &mut Graph, violations: &[&Violation]) -> Vec<RepairAction> {
    let mut actions = Vec::new();
    for position in edge_positions(violations) {
        let Some(edge) = graph.edges.get_mut(position) else {
            continue;
        };
        if !edge.strength_mean.is_finite() {
            edge.strength_mean = edge.effect_direction.sign() * DEFAULT_STRENGTH_MAGNITUDE;
            actions.push(RepairAction::new(
                ViolationCode::NonFiniteStrengthMean,
                "default_non_finite_strength",
                format!("edges[{}].strength_mean", position),
                format!(
                    "set strength_mean of {} -> {} to {}",
                    edge.from, edge.to, edge.strength_mean
                ),
            ));
        }
        if !edge.strength_std.is_finite() || edge.strength_std <= 0.0 {
            let code = if edge.strength_std.is_finite() {
                ViolationCode::StrengthStdNotPositive
            } else {
                ViolationCode::NonFiniteStrengthStd
            };
            edge.strength_std = DEFAULT_STRENGTH_STD;
            actions.push(RepairAction::new(
                code,
                "default_non_finite_strength",
                format!("edges[{}].strength_std", position),
                format!(
                    "set strength_std of {} -> {} to {}",
                    edge.from, edge.to, DEFAULT_STRENGTH_STD
                ),
            ));
        }
    }
    actions
}

fn clamp_numeric_ranges(graph: &mut Graph, violations: &[&Violation]) -> Vec<RepairAction> {
    let mut actions = Vec::new();
    for position in edge_positions(violations) {
        let Some(edge) = graph.edges.get_mut(position) else {
            continue;
        };
        if edge.strength_mean.is_finite() && !(-1.0..=1.0).contains(&edge.strength_mean) {
            let before = edge.strength_mean;
            edge.strength_mean = before.clamp(-1.0, 1.0);
            actions.push(RepairAction::new(
                ViolationCode::StrengthOutOfRange,
                "clamp_numeric_ranges",
                format!("edges[{}].strength_mean", position),
                format!("clamped strength_mean {} to {}", before, edge.strength_mean),
            ));
        }
        if !edge.belief_exists.is_finite() || !(0.0..=1.0).contains(&edge.belief_exists) {
            let before = edge.belief_exists;
            edge.belief_exists = if before.is_finite() {
                before.clamp(0.0, 1.0)
            } else {
                DEFAULT_BELIEF_EXISTS
            };
            actions.push(RepairAction::new(
                ViolationCode::InvalidBelief,
                "clamp_numeric_ranges",
                format!("edges[{}].belief_exists", position),
                format!("set belief_exists {} to {}", before, edge.belief_exists),
            ));
        }
    }
    actions
}

/// Remove edges at `positions` (highest first so earlier positions stay valid).
fn remove_edges(
    graph: &mut Graph,
    positions: Vec<usize>,
    code: ViolationCode,
    rule: &str,
    reason: &str,
) -> Vec<RepairAction> {
    let mut actions = Vec::new();
    for position in positions.into_iter().rev() {
        if position >= graph.edges.len() {
            continue;
        }
        let edge = graph.edges.remove(position);
        actions.push(RepairAction::new(
            code,
            rule,
            format!("edges[{}]", position),
            format!("dropped edge {} -> {}: {}", edge.from, edge.to, reason),
        ));
    }
    // Report in graph order.
    actions.reverse();
    actions
}

fn drop_dangling_edges(graph: &mut Graph, violations: &[&Violation]) -> Vec<RepairAction> {
    remove_edges(
        graph,
        edge_positions(violations),
        ViolationCode::DanglingEdgeEndpoint,
        "drop_dangling_edges",
        "endpoint does not exist",
    )
}

fn drop_goal_outgoing_edges(graph: &mut Graph, violations: &[&Violation]) -> Vec<RepairAction> {
    remove_edges(
        graph,
        edge_positions(violations),
        ViolationCode::GoalHasOutgoingEdge,
        "drop_goal_outgoing_edges",
        "goal must be a terminal sink",
    )
}

fn strip_external_payload(graph: &mut Graph, violations: &[&Violation]) -> Vec<RepairAction> {
    let ids = node_ids(violations);
    let mut actions = Vec::new();
    for node in graph.nodes.iter_mut().filter(|n| ids.contains(n.id.as_str())) {
        let NodeBody::Factor(body) = &mut node.body else {
            continue;
        };
        let Some(data) = body.data.as_mut() else {
            continue;
        };
        let fields = data.prohibited_external_fields();
        if fields.is_empty() {
            continue;
        }
        data.strip_external_prohibited();
        let cleared = !data.satisfies_external_shape();
        if cleared {
            body.data = None;
        }
        actions.push(RepairAction::new(
            ViolationCode::ExternalFactorHasData,
            "strip_external_payload",
            format!("nodes[{}].data", node.id),
            if cleared {
                format!("cleared payload of external factor ({})", fields.join(", "))
            } else {
                format!("stripped {} from external factor", fields.join(", "))
            },
        ));
    }
    actions
}

fn stamp_factor_provenance(graph: &mut Graph, violations: &[&Violation]) -> Vec<RepairAction> {
    let ids = node_ids(violations);
    let mut actions = Vec::new();
    for node in graph.nodes.iter_mut().filter(|n| ids.contains(n.id.as_str())) {
        let NodeBody::Factor(body) = &mut node.body else {
            continue;
        };
        let Some(data) = body.data.as_mut() else {
            continue;
        };
        if data.value.is_some() && data.extraction_type.is_none() {
            data.extraction_type = Some(ExtractionType::Inferred);
            actions.push(RepairAction::new(
                ViolationCode::FactorMissingProvenance,
                "stamp_factor_provenance",
                format!("nodes[{}].data.extractionType", node.id),
                "marked value as inferred",
            ));
        }
    }
    actions
}

fn stamp_edge_ids(graph: &mut Graph, violations: &[&Violation]) -> Vec<RepairAction> {
    let restamp: BTreeSet<usize> = edge_positions(violations).into_iter().collect();
    let mut used: BTreeSet<String> = graph
        .edges
        .iter()
        .enumerate()
        .filter(|(position, _)| !restamp.contains(position))
        .filter_map(|(_, e)| e.id.as_deref().map(str::trim))
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .collect();

    let mut actions = Vec::new();
    for position in restamp {
        let Some(edge) = graph.edges.get_mut(position) else {
            continue;
        };
        let previous = edge.id.clone();
        let candidate = next_edge_id(&used, &edge.from, &edge.to, position);
        used.insert(candidate.clone());
        let code = match previous.as_deref().map(str::trim) {
            None | Some("") => ViolationCode::MissingEdgeId,
            Some(_) => ViolationCode::DuplicateEdgeId,
        };
        actions.push(RepairAction::new(
            code,
            "stamp_edge_ids",
            format!("edges[{}].id", position),
            format!("stamped id {}", candidate),
        ));
        edge.id = Some(candidate);
    }
    actions
}

/// First `from::to::index` id not in `used`, counting up from `start`.
pub(crate) fn next_edge_id(used: &BTreeSet<String>, from: &str, to: &str, start: usize) -> String {
    let mut index = start;
    let mut candidate = format!("{}::{}::{}", from, to, index);
    while used.contains(&candidate) {
        index = index.saturating_add(1);
        candidate = format!("{}::{}::{}", from, to, index);
    }
    candidate
}

// =============================================================================
// ENGINE
// =============================================================================

/// Structured record of one sweep run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RepairTrace {
    /// Number of passes executed (including the final no-op pass).
    pub passes: usize,
    /// False only when the iteration cap cut the loop short.
    pub converged: bool,
    pub initial_counts: BucketCounts,
    pub remaining_counts: BucketCounts,
    pub actions: Vec<RepairAction>,
}

/// Result of a sweep: the trace plus the violations still present.
#[derive(Debug, Clone)]
pub struct SweepOutcome {
    pub trace: RepairTrace,
    pub violations: Vec<Violation>,
}

/// Runs [`SWEEP_RULES`] to a fixed point.
#[derive(Debug, Clone, Copy)]
pub struct SweepEngine {
    validator: Validator,
    max_iterations: usize,
}

impl Default for SweepEngine {
    fn default() -> Self {
        Self::new(Validator::default(), MAX_SWEEP_ITERATIONS)
    }
}

impl SweepEngine {
    #[must_use]
    pub fn new(validator: Validator, max_iterations: usize) -> Self {
        Self {
            validator,
            max_iterations: max_iterations.max(1),
        }
    }

    /// The ordered rule list this engine applies.
    #[must_use]
    pub fn rules(&self) -> &'static [SweepRule] {
        &SWEEP_RULES
    }

    /// Sweep `graph` in place.
    pub fn run(&self, graph: &mut Graph) -> SweepOutcome {
        let mut violations = self.validator.validate(graph);
        let mut trace = RepairTrace {
            initial_counts: BucketCounts::tally(&violations),
            ..RepairTrace::default()
        };

        for pass in 1..=self.max_iterations {
            trace.passes = pass;
            let before = violation_keys(&violations);
            let mut pass_actions = Vec::new();

            for rule in self.rules() {
                let actions = rule.apply(graph, &violations);
                if actions.is_empty() {
                    continue;
                }
                for action in &actions {
                    tracing::debug!(
                        rule = rule.name,
                        code = %action.code,
                        path = %action.path,
                        "{}",
                        action.description
                    );
                }
                violations = self.validator.validate(graph);
                pass_actions.extend(actions);
            }

            if pass_actions.is_empty() {
                trace.converged = true;
                break;
            }
            trace.actions.extend(pass_actions);
            if violation_keys(&violations) == before {
                trace.converged = true;
                break;
            }
        }

        trace.remaining_counts = BucketCounts::tally(&violations);
        if !trace.converged {
            tracing::warn!(
                passes = trace.passes,
                "sweep hit the iteration cap before reaching a fixed point"
            );
        }
        tracing::info!(
            passes = trace.passes,
            actions = trace.actions.len(),
            remaining = trace.remaining_counts.total(),
            "sweep complete"
        );

        SweepOutcome { trace, violations }
    }
}

fn violation_keys(violations: &[Violation]) -> BTreeSet<(ViolationCode, String)> {
    violations.iter().map(Violation::key).collect()
}

// =============================================================================
// TESTS
// =============================================================================
