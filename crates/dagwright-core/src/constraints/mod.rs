//! # Constraint Extraction & Resolution
//!
//! Free-text brief → [`ExtractedConstraint`] (provisional targets) →
//! [`GoalConstraint`] (bound to real node ids).
//!
//! Nothing here fails: constraints that cannot be bound are dropped and
//! counted in [`ResolutionStats`].

mod extract;
mod normalize;
mod resolve;

pub use extract::{
    ConstraintProvenance, DEADLINE_TARGET, DeadlineInfo, ExtractedConstraint, Operator,
    extract_constraints,
};
pub use normalize::{content_stems, is_stop_word, normalize_id, stem, substantive_stem, words};
pub use resolve::{
    AliasTable, Candidate, ExactId, ExactLabel, GoalConstraint, JunkFilter, RejectReason,
    Resolution, ResolutionReport, ResolutionStats, ResolveContext, ResolveStrategy, Resolver,
    StemContainment, TemporalGoal,
};

use crate::graph::Graph;

/// Resolve extracted constraints with the default strategy cascade.
#[must_use]
pub fn resolve_constraints(
    constraints: &[ExtractedConstraint],
    graph: &Graph,
    goal_node_id: Option<&str>,
) -> ResolutionReport {
    Resolver::new().resolve(constraints, graph, goal_node_id)
}
