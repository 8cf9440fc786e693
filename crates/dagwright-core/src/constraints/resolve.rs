//! Target resolution.
//!
//! Binds each extracted constraint's provisional target to a real node id
//! through an ordered cascade of [`ResolveStrategy`] implementations. The
//! first strategy to return a decision wins; later strategies never see the
//! constraint. Unresolvable constraints are dropped and counted, never raised.
//!
//! Precedence is fixed: an exact label match beats an alias-table match even
//! when the two would pick different nodes. Within a strategy, ties go to the
//! first matching node in graph order.

use super::extract::{ConstraintProvenance, DeadlineInfo, ExtractedConstraint, Operator};
use super::normalize::{content_stems, normalize_id, substantive_stem};
use crate::graph::Graph;
use crate::primitives::MIN_TARGET_STEM_LEN;
use crate::types::NodeKind;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

// =============================================================================
// CONTEXT
// =============================================================================

/// A node that may be a constraint target.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub id: String,
    pub kind: NodeKind,
    pub normalized_id: String,
    pub normalized_label: String,
    pub stems: BTreeSet<String>,
}

/// Everything a strategy may look at.
#[derive(Debug, Clone)]
pub struct ResolveContext {
    /// Candidate nodes in graph order. Decisions and options are excluded.
    pub candidates: Vec<Candidate>,
    /// Goal id supplied by the caller for temporal constraints.
    pub goal_node_id: Option<String>,
}

impl ResolveContext {
    #[must_use]
    pub fn new(graph: &Graph, goal_node_id: Option<&str>) -> Self {
        let mut seen = BTreeSet::new();
        let candidates = graph
            .nodes
            .iter()
            .filter(|n| !matches!(n.kind(), NodeKind::Decision | NodeKind::Option))
            .filter(|n| seen.insert(n.id.clone()))
            .map(|n| {
                let mut stems = content_stems(&n.label);
                stems.extend(content_stems(&n.id.replace('_', " ")));
                Candidate {
                    id: n.id.clone(),
                    kind: n.kind(),
                    normalized_id: normalize_id(&n.id),
                    normalized_label: normalize_id(&n.label),
                    stems,
                }
            })
            .collect();
        let goal_node_id = goal_node_id
            .filter(|id| graph.node(id).is_some())
            .map(str::to_string);
        Self {
            candidates,
            goal_node_id,
        }
    }

    fn first(&self, predicate: impl Fn(&Candidate) -> bool) -> Option<&Candidate> {
        self.candidates.iter().find(|c| predicate(c))
    }
}

// =============================================================================
// STRATEGIES
// =============================================================================

/// Why a constraint was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    Junk,
    NoMatch,
}

/// Decision of a single strategy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Resolved { node_id: String },
    Rejected(RejectReason),
    /// Not this strategy's call; try the next one.
    Pass,
}

/// One step of the resolution cascade.
pub trait ResolveStrategy {
    fn name(&self) -> &'static str;

    fn try_resolve(&self, constraint: &ExtractedConstraint, ctx: &ResolveContext) -> Resolution;
}

/// Rejects targets made only of stop words or too short to mean anything.
pub struct JunkFilter;

impl ResolveStrategy for JunkFilter {
    fn name(&self) -> &'static str {
        "junk_filter"
    }

    fn try_resolve(&self, constraint: &ExtractedConstraint, _ctx: &ResolveContext) -> Resolution {
        if constraint.is_temporal() {
            return Resolution::Pass;
        }
        if substantive_stem(&constraint.target_name).chars().count() < MIN_TARGET_STEM_LEN {
            return Resolution::Rejected(RejectReason::Junk);
        }
        Resolution::Pass
    }
}

/// Provisional id equals a node id.
pub struct ExactId;

impl ResolveStrategy for ExactId {
    fn name(&self) -> &'static str {
        "exact_id"
    }

    fn try_resolve(&self, constraint: &ExtractedConstraint, ctx: &ResolveContext) -> Resolution {
        if constraint.is_temporal() {
            return Resolution::Pass;
        }
        ctx.first(|c| c.id == constraint.target_id || c.normalized_id == constraint.target_id)
            .map_or(Resolution::Pass, |c| Resolution::Resolved {
                node_id: c.id.clone(),
            })
    }
}

/// Provisional id equals a normalized node label.
pub struct ExactLabel;

impl ResolveStrategy for ExactLabel {
    fn name(&self) -> &'static str {
        "exact_label"
    }

    fn try_resolve(&self, constraint: &ExtractedConstraint, ctx: &ResolveContext) -> Resolution {
        if constraint.is_temporal() {
            return Resolution::Pass;
        }
        ctx.first(|c| !c.normalized_label.is_empty() && c.normalized_label == constraint.target_id)
            .map_or(Resolution::Pass, |c| Resolution::Resolved {
                node_id: c.id.clone(),
            })
    }
}

/// Domain synonyms: any word of a group names the same quantity.
const ALIAS_GROUPS: &[&[&str]] = &[
    &["budget", "cost", "spend", "spending", "expense", "expenditure", "outlay", "capex", "opex"],
    &["revenue", "sales", "income", "turnover", "arr", "mrr", "bookings"],
    &["headcount", "staff", "staffing", "employees", "hires", "hiring", "team", "fte"],
    &["churn", "attrition", "retention", "cancellation"],
    &["timeline", "launch", "delivery", "schedule", "duration"],
    &["price", "pricing", "fee", "tariff"],
    &["margin", "profit", "profitability", "ebitda"],
    &["customers", "users", "subscribers", "clients", "accounts"],
    &["risk", "exposure", "downside"],
];

fn alias_group_stems(target_stems: &BTreeSet<String>) -> BTreeSet<String> {
    ALIAS_GROUPS
        .iter()
        .map(|group| group.iter().map(|w| super::normalize::stem(w)).collect::<BTreeSet<_>>())
        .filter(|group| !group.is_disjoint(target_stems))
        .flatten()
        .collect()
}

/// Target shares an alias group with a node.
pub struct AliasTable;

impl ResolveStrategy for AliasTable {
    fn name(&self) -> &'static str {
        "alias_table"
    }

    fn try_resolve(&self, constraint: &ExtractedConstraint, ctx: &ResolveContext) -> Resolution {
        if constraint.is_temporal() {
            return Resolution::Pass;
        }
        let target = content_stems(&constraint.target_name);
        let aliases = alias_group_stems(&target);
        if aliases.is_empty() {
            return Resolution::Pass;
        }
        ctx.first(|c| !c.stems.is_disjoint(&aliases))
            .map_or(Resolution::Pass, |c| Resolution::Resolved {
                node_id: c.id.clone(),
            })
    }
}

/// Every target stem appears in the node, or one normalized id contains the other.
pub struct StemContainment;

impl ResolveStrategy for StemContainment {
    fn name(&self) -> &'static str {
        "stem_containment"
    }

    fn try_resolve(&self, constraint: &ExtractedConstraint, ctx: &ResolveContext) -> Resolution {
        if constraint.is_temporal() {
            return Resolution::Pass;
        }
        let target = content_stems(&constraint.target_name);
        let id = &constraint.target_id;
        ctx.first(|c| {
            let stems_contained = !target.is_empty() && target.is_subset(&c.stems);
            let id_contained = id.len() >= MIN_TARGET_STEM_LEN
                && c.normalized_id.len() >= MIN_TARGET_STEM_LEN
                && (c.normalized_id.contains(id.as_str()) || id.contains(c.normalized_id.as_str()));
            stems_contained || id_contained
        })
        .map_or(Resolution::Pass, |c| Resolution::Resolved {
            node_id: c.id.clone(),
        })
    }
}

/// Deadlines bind to the caller's goal node, else are dropped.
pub struct TemporalGoal;

impl ResolveStrategy for TemporalGoal {
    fn name(&self) -> &'static str {
        "temporal_goal"
    }

    fn try_resolve(&self, constraint: &ExtractedConstraint, ctx: &ResolveContext) -> Resolution {
        if !constraint.is_temporal() {
            return Resolution::Pass;
        }
        match &ctx.goal_node_id {
            Some(goal) => Resolution::Resolved {
                node_id: goal.clone(),
            },
            None => Resolution::Rejected(RejectReason::NoMatch),
        }
    }
}

// =============================================================================
// RESOLVER
// =============================================================================

/// A constraint bound to a real node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoalConstraint {
    pub constraint_id: String,
    pub node_id: String,
    pub operator: Operator,
    pub value: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    pub confidence: f64,
    /// Target text as read from the brief.
    pub source_target: String,
    /// Strategy that bound the target.
    pub resolved_by: String,
    pub provenance: ConstraintProvenance,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deadline: Option<DeadlineInfo>,
}

/// Resolution counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionStats {
    /// Bound to the provisional id itself.
    pub exact: usize,
    /// Bound to a different node id.
    pub remapped: usize,
    pub rejected_junk: usize,
    pub rejected_no_match: usize,
}

/// Resolved constraints plus counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResolutionReport {
    pub constraints: Vec<GoalConstraint>,
    pub stats: ResolutionStats,
}

/// The ordered strategy cascade.
pub struct Resolver {
    strategies: Vec<Box<dyn ResolveStrategy + Send + Sync>>,
}

impl Default for Resolver {
    fn default() -> Self {
        Self {
            strategies: vec![
                Box::new(JunkFilter),
                Box::new(ExactId),
                Box::new(ExactLabel),
                Box::new(AliasTable),
                Box::new(StemContainment),
                Box::new(TemporalGoal),
            ],
        }
    }
}

impl std::fmt::Debug for Resolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.strategies.iter().map(|s| s.name()))
            .finish()
    }
}

impl Resolver {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Strategy names in cascade order.
    #[must_use]
    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Run the cascade for one constraint.
    ///
    /// Returns the decision and the name of the strategy that made it.
    #[must_use]
    pub fn resolve_one(
        &self,
        constraint: &ExtractedConstraint,
        ctx: &ResolveContext,
    ) -> (Resolution, &'static str) {
        for strategy in &self.strategies {
            match strategy.try_resolve(constraint, ctx) {
                Resolution::Pass => continue,
                decided => return (decided, strategy.name()),
            }
        }
        (Resolution::Rejected(RejectReason::NoMatch), "exhausted")
    }

    /// Resolve every constraint against `graph`.
    #[must_use]
    pub fn resolve(
        &self,
        constraints: &[ExtractedConstraint],
        graph: &Graph,
        goal_node_id: Option<&str>,
    ) -> ResolutionReport {
        let ctx = ResolveContext::new(graph, goal_node_id);
        let mut stats = ResolutionStats::default();
        let mut bound = Vec::new();

        for constraint in constraints {
            let (decision, strategy) = self.resolve_one(constraint, &ctx);
            match decision {
                Resolution::Resolved { node_id } => {
                    if node_id == constraint.target_id {
                        stats.exact = stats.exact.saturating_add(1);
                    } else {
                        stats.remapped = stats.remapped.saturating_add(1);
                    }
                    tracing::debug!(
                        target = %constraint.target_name,
                        node = %node_id,
                        strategy,
                        "constraint target resolved"
                    );
                    bound.push(GoalConstraint {
                        constraint_id: format!(
                            "{}::{}::{}",
                            node_id,
                            operator_slug(constraint.operator),
                            constraint.provenance.span.0
                        ),
                        node_id,
                        operator: constraint.operator,
                        value: constraint.value,
                        unit: constraint.unit.clone(),
                        confidence: constraint.confidence,
                        source_target: constraint.target_name.clone(),
                        resolved_by: strategy.to_string(),
                        provenance: constraint.provenance.clone(),
                        deadline: constraint.deadline.clone(),
                    });
                }
                Resolution::Rejected(reason) => {
                    match reason {
                        RejectReason::Junk => {
                            stats.rejected_junk = stats.rejected_junk.saturating_add(1);
                        }
                        RejectReason::NoMatch => {
                            stats.rejected_no_match = stats.rejected_no_match.saturating_add(1);
                        }
                    }
                    tracing::debug!(
                        target = %constraint.target_name,
                        ?reason,
                        "constraint dropped"
                    );
                }
                Resolution::Pass => {}
            }
        }

        let constraints = dedup_bound(bound);
        tracing::info!(
            bound = constraints.len(),
            exact = stats.exact,
            remapped = stats.remapped,
            rejected_junk = stats.rejected_junk,
            rejected_no_match = stats.rejected_no_match,
            "constraint resolution complete"
        );
        ResolutionReport { constraints, stats }
    }
}

fn operator_slug(operator: Operator) -> &'static str {
    match operator {
        Operator::AtMost => "max",
        Operator::AtLeast => "min",
    }
}

/// Two targets that bound to the same node keep only the stricter bound.
fn dedup_bound(constraints: Vec<GoalConstraint>) -> Vec<GoalConstraint> {
    let mut best: BTreeMap<(String, Operator, Option<String>), usize> = BTreeMap::new();
    let mut kept: Vec<Option<GoalConstraint>> = Vec::with_capacity(constraints.len());
    for constraint in constraints {
        let unit_key = constraint
            .deadline
            .is_some()
            .then(|| constraint.unit.clone())
            .flatten();
        let key = (constraint.node_id.clone(), constraint.operator, unit_key);
        match best.get(&key).copied() {
            Some(slot) => {
                let stricter = kept[slot]
                    .as_ref()
                    .is_some_and(|current| constraint.operator.is_stricter(constraint.value, current.value));
                if stricter {
                    kept[slot] = Some(constraint);
                }
            }
            None => {
                best.insert(key, kept.len());
                kept.push(Some(constraint));
            }
        }
    }
    kept.into_iter().flatten().collect()
}

// =============================================================================
// TESTS
// =============================================================================
