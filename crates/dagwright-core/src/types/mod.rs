//! # Core Type Definitions
//!
//! This module contains the shared vocabulary of the dagwright CORE:
//! - Graph entities (`Node`, `NodeBody`, `Edge`) in `node` / `edge`
//! - Violation classification (`Bucket`, `Severity`, `Violation`, `Subject`)
//! - Repair bookkeeping (`RepairAction`, `BucketCounts`)
//! - Error types (`DagwrightError`)
//!
//! ## Determinism Guarantees
//!
//! All types in this module:
//! - Preserve input order (nodes, edges, passthrough keys)
//! - Implement `Ord` where they are used as map keys
//! - Carry no clocks, randomness or global state

mod edge;
pub(crate) mod lenient;
mod node;

pub use edge::{EffectDirection, Edge, Provenance};
pub use node::{
    ExtractionType, FactorBody, FactorCategory, FactorData, GoalThreshold, Node, NodeBody,
    NodeKind, ObservedState, OptionData, ValueRange,
};

use crate::catalog::{self, ViolationCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// =============================================================================
// BUCKET & SEVERITY
// =============================================================================

/// Classification of a violation by who can fix it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Bucket {
    /// Auto-fixable by a deterministic rewrite.
    A,
    /// Needs a categorical correction (still deterministic).
    B,
    /// Needs semantic help: only a regeneration round can fix it.
    C,
}

impl std::fmt::Display for Bucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Bucket::A => "A",
            Bucket::B => "B",
            Bucket::C => "C",
        };
        f.write_str(s)
    }
}

/// Severity of a violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

// =============================================================================
// VIOLATION
// =============================================================================

/// What a violation points at.
///
/// Edge subjects are positions into `Graph::edges` at validation time;
/// they are only meaningful until the graph is next mutated.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Subject {
    #[default]
    Graph,
    Node(String),
    Edge(usize),
}

/// A single structural violation found by the validator.
///
/// Violations are data: they are returned, counted and traced, never raised.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    pub code: ViolationCode,
    pub severity: Severity,
    pub bucket: Bucket,
    pub message: String,
    /// JSON-path-like location, e.g. `edges[3].strength_mean`.
    pub path: String,
    #[serde(skip)]
    pub subject: Subject,
    /// Set when the reconciler promoted this violation to Bucket C.
    #[serde(default, skip_serializing_if = "is_false")]
    pub escalated: bool,
}

impl Violation {
    /// Create a violation; severity and bucket come from the static catalog.
    pub fn new(
        code: ViolationCode,
        subject: Subject,
        path: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        let entry = catalog::entry(code);
        Self {
            code,
            severity: entry.severity,
            bucket: entry.bucket,
            message: message.into(),
            path: path.into(),
            subject,
            escalated: false,
        }
    }

    /// Promote to Bucket C, remembering that this happened.
    pub fn escalate(&mut self) {
        if self.bucket != Bucket::C {
            self.bucket = Bucket::C;
            self.escalated = true;
        }
    }

    /// Stable key used to compare violation sets between passes.
    #[must_use]
    pub fn key(&self) -> (ViolationCode, String) {
        (self.code, self.path.clone())
    }
}

fn is_false(flag: &bool) -> bool {
    !*flag
}

/// Per-bucket violation counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketCounts {
    pub a: usize,
    pub b: usize,
    pub c: usize,
}

impl BucketCounts {
    /// Count violations by their current bucket.
    #[must_use]
    pub fn tally(violations: &[Violation]) -> Self {
        violations
            .iter()
            .fold(Self::default(), |mut counts, v| {
                match v.bucket {
                    Bucket::A => counts.a = counts.a.saturating_add(1),
                    Bucket::B => counts.b = counts.b.saturating_add(1),
                    Bucket::C => counts.c = counts.c.saturating_add(1),
                }
                counts
            })
    }

    #[must_use]
    pub fn total(&self) -> usize {
        self.a.saturating_add(self.b).saturating_add(self.c)
    }
}

// =============================================================================
// REPAIR ACTION
// =============================================================================

/// One mutation applied by the sweep engine, threshold pass or reconciler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepairAction {
    /// The violation code this action resolves.
    pub code: ViolationCode,
    /// Name of the rule that applied it.
    pub rule: String,
    pub path: String,
    pub description: String,
}

impl RepairAction {
    pub fn new(
        code: ViolationCode,
        rule: &str,
        path: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            code,
            rule: rule.to_string(),
            path: path.into(),
            description: description.into(),
        }
    }
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors that can occur in the dagwright system.
///
/// Structural problems in a graph are never errors (see [`Violation`]).
/// Only boundary failures and the final schema check produce `Err`.
#[derive(Debug, Error)]
pub enum DagwrightError {
    /// The response still fails the frozen external schema after all repair.
    #[error("Schema conformance failure: {}", .0.join("; "))]
    SchemaConformance(Vec<String>),

    /// Input could not be parsed into a graph.
    #[error("Deserialization error: {0}")]
    Deserialization(String),

    /// Output could not be serialized.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// An I/O error occurred (app layer only).
    #[error("I/O error: {0}")]
    Io(String),

    /// Configuration was rejected.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The regeneration collaborator failed.
    #[error("Regeneration failed: {0}")]
    Regeneration(String),
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn violation_takes_bucket_from_catalog() {
        let v = Violation::new(
            ViolationCode::CycleDetected,
            Subject::Edge(0),
            "edges[0]",
            "cycle",
        );
        assert_eq!(v.bucket, Bucket::C);
        assert_eq!(v.severity, Severity::Error);
    }

    #[test]
    fn escalate_marks_only_non_c() {
        let mut v = Violation::new(
            ViolationCode::UnreachableNode,
            Subject::Node("f".into()),
            "nodes[f]",
            "unreachable",
        );
        v.escalate();
        assert_eq!(v.bucket, Bucket::C);
        assert!(v.escalated);

        let mut c = Violation::new(ViolationCode::MissingGoal, Subject::Graph, "nodes", "none");
        c.escalate();
        assert!(!c.escalated);
    }

    #[test]
    fn bucket_counts_tally() {
        let vs = vec![
            Violation::new(ViolationCode::MissingEdgeId, Subject::Edge(0), "edges[0].id", "x"),
            Violation::new(
                ViolationCode::ExternalFactorHasData,
                Subject::Node("n".into()),
                "nodes[n].data",
                "x",
            ),
            Violation::new(ViolationCode::MissingGoal, Subject::Graph, "nodes", "x"),
            Violation::new(ViolationCode::MultipleGoals, Subject::Graph, "nodes", "x"),
        ];
        let counts = BucketCounts::tally(&vs);
        assert_eq!(counts, BucketCounts { a: 1, b: 1, c: 2 });
        assert_eq!(counts.total(), 4);
    }

    #[test]
    fn schema_error_lists_problems() {
        let err = DagwrightError::SchemaConformance(vec!["a".into(), "b".into()]);
        assert_eq!(err.to_string(), "Schema conformance failure: a; b");
    }
}
