//! # Rule Catalog
//!
//! The static table mapping every violation code to its bucket, severity and
//! the stage that resolves it. Built once on first use and never mutated.
//!
//! The bucket of a code is a property of the code, not of the instance: the
//! only way a violation changes bucket is reconciler escalation.

use crate::types::{Bucket, Severity};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::LazyLock;

// =============================================================================
// VIOLATION CODES
// =============================================================================

/// Every structural problem the validator can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ViolationCode {
    // Bucket A
    DanglingEdgeEndpoint,
    NonFiniteStrengthMean,
    NonFiniteStrengthStd,
    StrengthStdNotPositive,
    StrengthOutOfRange,
    InvalidBelief,
    MissingEdgeId,
    DuplicateEdgeId,
    // Bucket B
    GoalHasOutgoingEdge,
    ExternalFactorHasData,
    FactorMissingProvenance,
    DisconnectedOption,
    UnreachableNode,
    // Bucket C
    FactorMissingValue,
    DuplicateNodeId,
    MissingGoal,
    MultipleGoals,
    CycleDetected,
    NodeLimitExceeded,
    EdgeLimitExceeded,
}

impl ViolationCode {
    pub const ALL: [ViolationCode; 20] = [
        ViolationCode::DanglingEdgeEndpoint,
        ViolationCode::NonFiniteStrengthMean,
        ViolationCode::NonFiniteStrengthStd,
        ViolationCode::StrengthStdNotPositive,
        ViolationCode::StrengthOutOfRange,
        ViolationCode::InvalidBelief,
        ViolationCode::MissingEdgeId,
        ViolationCode::DuplicateEdgeId,
        ViolationCode::GoalHasOutgoingEdge,
        ViolationCode::ExternalFactorHasData,
        ViolationCode::FactorMissingProvenance,
        ViolationCode::DisconnectedOption,
        ViolationCode::UnreachableNode,
        ViolationCode::FactorMissingValue,
        ViolationCode::DuplicateNodeId,
        ViolationCode::MissingGoal,
        ViolationCode::MultipleGoals,
        ViolationCode::CycleDetected,
        ViolationCode::NodeLimitExceeded,
        ViolationCode::EdgeLimitExceeded,
    ];

    /// Stable wire name, e.g. `CYCLE_DETECTED`.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ViolationCode::DanglingEdgeEndpoint => "DANGLING_EDGE_ENDPOINT",
            ViolationCode::NonFiniteStrengthMean => "NON_FINITE_STRENGTH_MEAN",
            ViolationCode::NonFiniteStrengthStd => "NON_FINITE_STRENGTH_STD",
            ViolationCode::StrengthStdNotPositive => "STRENGTH_STD_NOT_POSITIVE",
            ViolationCode::StrengthOutOfRange => "STRENGTH_OUT_OF_RANGE",
            ViolationCode::InvalidBelief => "INVALID_BELIEF",
            ViolationCode::MissingEdgeId => "MISSING_EDGE_ID",
            ViolationCode::DuplicateEdgeId => "DUPLICATE_EDGE_ID",
            ViolationCode::GoalHasOutgoingEdge => "GOAL_HAS_OUTGOING_EDGE",
            ViolationCode::ExternalFactorHasData => "EXTERNAL_FACTOR_HAS_DATA",
            ViolationCode::FactorMissingProvenance => "FACTOR_MISSING_PROVENANCE",
            ViolationCode::DisconnectedOption => "DISCONNECTED_OPTION",
            ViolationCode::UnreachableNode => "UNREACHABLE_NODE",
            ViolationCode::FactorMissingValue => "FACTOR_MISSING_VALUE",
            ViolationCode::DuplicateNodeId => "DUPLICATE_NODE_ID",
            ViolationCode::MissingGoal => "MISSING_GOAL",
            ViolationCode::MultipleGoals => "MULTIPLE_GOALS",
            ViolationCode::CycleDetected => "CYCLE_DETECTED",
            ViolationCode::NodeLimitExceeded => "NODE_LIMIT_EXCEEDED",
            ViolationCode::EdgeLimitExceeded => "EDGE_LIMIT_EXCEEDED",
        }
    }
}

impl std::fmt::Display for ViolationCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// CATALOG
// =============================================================================

/// Static facts about one violation code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CatalogEntry {
    pub code: ViolationCode,
    pub bucket: Bucket,
    pub severity: Severity,
    /// Stage or rule that resolves the violation.
    pub fixed_by: &'static str,
    pub description: &'static str,
}

const fn row(
    code: ViolationCode,
    bucket: Bucket,
    severity: Severity,
    fixed_by: &'static str,
    description: &'static str,
) -> CatalogEntry {
    CatalogEntry {
        code,
        bucket,
        severity,
        fixed_by,
        description,
    }
}

const ROWS: [CatalogEntry; 20] = [
    row(
        ViolationCode::DanglingEdgeEndpoint,
        Bucket::A,
        Severity::Error,
        "drop_dangling_edges",
        "Edge references a node id that does not exist",
    ),
    row(
        ViolationCode::NonFiniteStrengthMean,
        Bucket::A,
        Severity::Error,
        "default_non_finite_strength",
        "strength_mean is NaN, infinite or missing",
    ),
    row(
        ViolationCode::NonFiniteStrengthStd,
        Bucket::A,
        Severity::Error,
        "default_non_finite_strength",
        "strength_std is NaN, infinite or missing",
    ),
    row(
        ViolationCode::StrengthStdNotPositive,
        Bucket::A,
        Severity::Error,
        "default_non_finite_strength",
        "strength_std is zero or negative",
    ),
    row(
        ViolationCode::StrengthOutOfRange,
        Bucket::A,
        Severity::Error,
        "clamp_numeric_ranges",
        "strength_mean lies outside [-1, 1]",
    ),
    row(
        ViolationCode::InvalidBelief,
        Bucket::A,
        Severity::Error,
        "clamp_numeric_ranges",
        "belief_exists is non-finite or outside [0, 1]",
    ),
    row(
        ViolationCode::MissingEdgeId,
        Bucket::A,
        Severity::Info,
        "stamp_edge_ids",
        "Edge has no identifier",
    ),
    row(
        ViolationCode::DuplicateEdgeId,
        Bucket::A,
        Severity::Warning,
        "stamp_edge_ids",
        "Edge identifier is used more than once",
    ),
    row(
        ViolationCode::GoalHasOutgoingEdge,
        Bucket::B,
        Severity::Error,
        "drop_goal_outgoing_edges",
        "Goal node has an outgoing causal edge",
    ),
    row(
        ViolationCode::ExternalFactorHasData,
        Bucket::B,
        Severity::Error,
        "strip_external_payload",
        "External factor carries prohibited numeric payload",
    ),
    row(
        ViolationCode::FactorMissingProvenance,
        Bucket::B,
        Severity::Warning,
        "stamp_factor_provenance",
        "Factor value has no extraction type",
    ),
    row(
        ViolationCode::DisconnectedOption,
        Bucket::B,
        Severity::Error,
        "reconciler",
        "Option has no causal path to the goal",
    ),
    row(
        ViolationCode::UnreachableNode,
        Bucket::B,
        Severity::Error,
        "reconciler",
        "Node has no causal path to the goal",
    ),
    row(
        ViolationCode::FactorMissingValue,
        Bucket::C,
        Severity::Error,
        "regeneration",
        "Controllable or observable factor has no value",
    ),
    row(
        ViolationCode::DuplicateNodeId,
        Bucket::C,
        Severity::Error,
        "regeneration",
        "Node identifier is used more than once",
    ),
    row(
        ViolationCode::MissingGoal,
        Bucket::C,
        Severity::Error,
        "regeneration",
        "Graph has no goal node",
    ),
    row(
        ViolationCode::MultipleGoals,
        Bucket::C,
        Severity::Error,
        "regeneration",
        "Graph has more than one goal node",
    ),
    row(
        ViolationCode::CycleDetected,
        Bucket::C,
        Severity::Error,
        "regeneration",
        "Causal subgraph contains a cycle",
    ),
    row(
        ViolationCode::NodeLimitExceeded,
        Bucket::C,
        Severity::Error,
        "regeneration",
        "Graph has more nodes than the configured cap",
    ),
    row(
        ViolationCode::EdgeLimitExceeded,
        Bucket::C,
        Severity::Error,
        "regeneration",
        "Graph has more edges than the configured cap",
    ),
];

static CATALOG: LazyLock<BTreeMap<ViolationCode, CatalogEntry>> =
    LazyLock::new(|| ROWS.iter().map(|entry| (entry.code, *entry)).collect());

/// Look up the static facts for a code.
#[must_use]
pub fn entry(code: ViolationCode) -> CatalogEntry {
    // Every code has a row; the fallback only guards against a table edit
    // that forgets one.
    CATALOG.get(&code).copied().unwrap_or(CatalogEntry {
        code,
        bucket: Bucket::C,
        severity: Severity::Error,
        fixed_by: "regeneration",
        description: "",
    })
}

/// Every catalog entry in code order.
pub fn all() -> impl Iterator<Item = &'static CatalogEntry> {
    CATALOG.values()
}

/// Static bucket of a code.
#[must_use]
pub fn bucket_of(code: ViolationCode) -> Bucket {
    entry(code).bucket
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_code_has_exactly_one_row() {
        assert_eq!(CATALOG.len(), ViolationCode::ALL.len());
        for code in ViolationCode::ALL {
            assert_eq!(entry(code).code, code);
        }
    }

    #[test]
    fn wire_names_match_serde() {
        for code in ViolationCode::ALL {
            let json = serde_json::to_value(code).expect("serialize");
            assert_eq!(json, serde_json::Value::String(code.as_str().to_string()));
        }
    }

    #[test]
    fn buckets_follow_table() {
        assert_eq!(bucket_of(ViolationCode::NonFiniteStrengthMean), Bucket::A);
        assert_eq!(bucket_of(ViolationCode::DisconnectedOption), Bucket::B);
        assert_eq!(bucket_of(ViolationCode::CycleDetected), Bucket::C);
        assert_eq!(entry(ViolationCode::MissingEdgeId).severity, Severity::Info);
    }

    #[test]
    fn all_iterates_in_code_order() {
        let codes: Vec<_> = all().map(|e| e.code).collect();
        let mut sorted = codes.clone();
        sorted.sort();
        assert_eq!(codes, sorted);
    }
}
