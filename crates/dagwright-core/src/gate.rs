//! # Repair Gate
//!
//! Pure decision over the post-reconciliation violation set: a regeneration
//! round is needed if and only if at least one Bucket C violation remains.
//! Bucket A and B leftovers never trigger it.

use crate::types::{Bucket, BucketCounts, Violation};
use serde::Serialize;

/// Outcome of the gate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GateDecision {
    pub llm_repair_needed: bool,
    /// Bucket C violations only: the payload for the regeneration round.
    pub remaining_violations: Vec<Violation>,
    /// Counts over the full violation set the gate was given.
    pub counts: BucketCounts,
}

impl GateDecision {
    /// Decide from `violations`.
    #[must_use]
    pub fn from_violations(violations: &[Violation]) -> Self {
        let remaining_violations: Vec<Violation> = violations
            .iter()
            .filter(|v| v.bucket == Bucket::C)
            .cloned()
            .collect();
        let decision = Self {
            llm_repair_needed: !remaining_violations.is_empty(),
            remaining_violations,
            counts: BucketCounts::tally(violations),
        };
        tracing::info!(
            llm_repair_needed = decision.llm_repair_needed,
            bucket_c = decision.counts.c,
            "repair gate decided"
        );
        decision
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ViolationCode;
    use crate::types::Subject;

    fn violation(code: ViolationCode) -> Violation {
        Violation::new(code, Subject::Graph, "nodes", "test")
    }

    #[test]
    fn a_and_b_alone_never_trigger() {
        let decision = GateDecision::from_violations(&[
            violation(ViolationCode::MissingEdgeId),
            violation(ViolationCode::DisconnectedOption),
        ]);
        assert!(!decision.llm_repair_needed);
        assert!(decision.remaining_violations.is_empty());
        assert_eq!(decision.counts.total(), 2);
    }

    #[test]
    fn bucket_c_triggers_and_is_the_only_payload() {
        let decision = GateDecision::from_violations(&[
            violation(ViolationCode::MissingEdgeId),
            violation(ViolationCode::CycleDetected),
        ]);
        assert!(decision.llm_repair_needed);
        assert_eq!(decision.remaining_violations.len(), 1);
        assert_eq!(decision.remaining_violations[0].code, ViolationCode::CycleDetected);
    }

    #[test]
    fn escalated_violations_count_as_c() {
        let mut v = violation(ViolationCode::UnreachableNode);
        v.escalate();
        assert!(GateDecision::from_violations(&[v]).llm_repair_needed);
    }

    #[test]
    fn empty_set_passes() {
        assert_eq!(GateDecision::from_violations(&[]), GateDecision::default());
    }
}
