//! # dagwright-core
//!
//! The deterministic layer for causal decision graphs produced by an
//! unreliable generator - THE LOGIC.
//!
//! A candidate graph comes in possibly malformed (cycles, dangling
//! references, NaNs, category/payload mismatches, disconnected branches).
//! This crate validates it, repairs what can be repaired by rule, restores
//! connectivity, and decides whether the generator must be asked again.
//! Alongside it extracts numeric constraints from the free-text brief and
//! watches for data silently lost between pipeline stages.
//!
//! ## Stages
//!
//! - `validator` → typed [`Violation`]s bucketed through the static `catalog`
//! - `sweep` → ordered idempotent repair rules, looped to a fixed point
//! - `grounding` → strips goal thresholds with nothing behind them
//! - `reconcile` → status-quo wiring, snapshot edge restoration, escalation
//! - `gate` → `llm_repair_needed` iff a Bucket C violation remains
//! - `constraints` → brief text → constraints bound to real node ids
//! - `export` → frozen `v3` external response
//! - `sentinel` → advisory cross-stage integrity check
//!
//! ## Architectural Constraints
//!
//! - Has NO async, NO network, NO filesystem access (pure Rust)
//! - Is deterministic: `BTreeMap` ordering, no clocks, no randomness
//! - Never fails on malformed graphs: problems are returned as data
//! - Is closed: the generator is reached only through [`GraphRegenerator`]

// =============================================================================
// MODULES
// =============================================================================

pub mod catalog;
pub mod config;
pub mod constraints;
pub mod export;
pub mod gate;
pub mod graph;
pub mod grounding;
pub mod pipeline;
pub mod primitives;
pub mod reconcile;
pub mod sentinel;
pub mod sweep;
pub mod types;
pub mod validator;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{
    Bucket, BucketCounts, DagwrightError, Edge, EffectDirection, ExtractionType, FactorBody,
    FactorCategory, FactorData, GoalThreshold, Node, NodeBody, NodeKind, ObservedState,
    OptionData, Provenance, RepairAction, Severity, Subject, ValueRange, Violation,
};

// =============================================================================
// RE-EXPORTS: Stages
// =============================================================================

pub use catalog::{CatalogEntry, ViolationCode};
pub use config::{ExportConfig, GraphLimits, PipelineConfig, SentinelConfig, SweepConfig};
pub use constraints::{
    ExtractedConstraint, GoalConstraint, Operator, ResolutionReport, ResolutionStats, Resolver,
    extract_constraints, normalize_id, resolve_constraints,
};
pub use export::{ExternalResponse, SchemaTransformer, check_conformance};
pub use gate::GateDecision;
pub use graph::{Graph, GraphIndex, NodeIx};
pub use grounding::{ThresholdTrace, ground_thresholds};
pub use reconcile::{EdgeFieldSnapshot, ReconciliationTrace, Reconciler};
pub use sentinel::{IntegrityCode, IntegrityReport, IntegrityWarning, Sentinel};
pub use sweep::{RepairTrace, SWEEP_RULES, SweepEngine, SweepOutcome, SweepRule};
pub use validator::{Validator, validate};

// =============================================================================
// RE-EXPORTS: Pipeline
// =============================================================================

pub use pipeline::{
    GraphRegenerator, Pipeline, PipelineOutcome, PipelineRequest, PipelineTrace,
};
