//! # Pipeline Orchestrator
//!
//! One request is one sequential run:
//!
//! ```text
//! candidate → Sweep (validate/repair to fixed point) → Threshold pass
//!           → Reconciler (re-validate, escalate) → Repair gate
//!           → [Constraint extraction + resolution] → Schema transformer
//! ```
//!
//! The Integrity Sentinel runs out of band through [`Pipeline::check_integrity`].
//!
//! Every stage is deterministic, so re-running a request from scratch is
//! always safe. The generator is reached only through [`GraphRegenerator`],
//! at most once per run.

use crate::DagwrightError;
use crate::config::PipelineConfig;
use crate::constraints::{ResolutionReport, extract_constraints, resolve_constraints};
use crate::export::{ExternalResponse, SchemaTransformer};
use crate::gate::GateDecision;
use crate::graph::Graph;
use crate::grounding::{ThresholdTrace, ground_thresholds};
use crate::reconcile::{EdgeFieldSnapshot, Reconciler, ReconciliationTrace};
use crate::sentinel::{IntegrityReport, Sentinel};
use crate::sweep::{RepairTrace, SweepEngine};
use crate::types::Violation;
use crate::validator::Validator;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// =============================================================================
// EXTENSION POINT
// =============================================================================

/// The generative collaborator asked for a corrected graph when the repair
/// gate finds Bucket C violations.
///
/// No implementation lives in this crate. Timeouts and retries are the
/// implementor's concern.
pub trait GraphRegenerator {
    /// Produce a corrected graph from the current one and its Bucket C violations.
    fn regenerate(&self, graph: &Graph, remaining: &[Violation]) -> Result<Graph, DagwrightError>;
}

// =============================================================================
// REQUEST / OUTCOME
// =============================================================================

/// Per-request inputs besides the graph itself.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineRequest {
    /// Decision brief for constraint extraction.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brief: Option<String>,
    /// Goal node that deadline constraints bind to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub goal_node_id: Option<String>,
    #[serde(default)]
    pub rationales: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality: Option<Value>,
    /// Passed through to the response.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Sub-traces of one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PipelineTrace {
    pub repair: RepairTrace,
    pub threshold: ThresholdTrace,
    pub reconciliation: ReconciliationTrace,
    /// Whether the final graph came from a regeneration round.
    pub regenerated: bool,
}

/// Everything a run produced.
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    pub graph: Graph,
    pub trace: PipelineTrace,
    pub gate: GateDecision,
    /// Present when the request carried a brief.
    pub constraints: Option<ResolutionReport>,
}

// =============================================================================
// PIPELINE
// =============================================================================

/// The deterministic layer, configured once and reused across requests.
///
/// Holds no per-request state.
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: PipelineConfig,
    sweep: SweepEngine,
    reconciler: Reconciler,
    transformer: SchemaTransformer,
    sentinel: Sentinel,
}

impl Pipeline {
    /// Build a pipeline, rejecting invalid configuration.
    pub fn new(config: PipelineConfig) -> Result<Self, DagwrightError> {
        config.validate()?;
        let validator = Validator::new(config.limits);
        Ok(Self {
            sweep: SweepEngine::new(validator, config.sweep.max_iterations),
            reconciler: Reconciler::new(validator),
            transformer: SchemaTransformer::new(config.export.clone()),
            sentinel: Sentinel::new(config.sentinel),
            config,
        })
    }

    #[must_use]
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Validator with this pipeline's caps.
    #[must_use]
    pub fn validator(&self) -> Validator {
        Validator::new(self.config.limits)
    }

    /// Run the deterministic stages once. Never calls the generator.
    #[must_use]
    pub fn run(&self, graph: Graph, request: &PipelineRequest) -> PipelineOutcome {
        let snapshot = EdgeFieldSnapshot::capture(&graph);
        let mut outcome = self.deterministic_round(graph, &snapshot);
        outcome.constraints = self.resolve(&outcome.graph, request);
        outcome
    }

    /// Run the deterministic stages, asking `regenerator` for a new graph at
    /// most once if the gate demands it.
    ///
    /// The second round reuses the first round's edge snapshot so edges the
    /// regenerator dropped can still be restored.
    pub fn run_with_regenerator(
        &self,
        graph: Graph,
        request: &PipelineRequest,
        regenerator: &dyn GraphRegenerator,
    ) -> Result<PipelineOutcome, DagwrightError> {
        let snapshot = EdgeFieldSnapshot::capture(&graph);
        let mut outcome = self.deterministic_round(graph, &snapshot);

        if outcome.gate.llm_repair_needed {
            tracing::info!(
                remaining = outcome.gate.remaining_violations.len(),
                "requesting regeneration"
            );
            let regenerated =
                regenerator.regenerate(&outcome.graph, &outcome.gate.remaining_violations)?;
            outcome = self.deterministic_round(regenerated, &snapshot);
            outcome.trace.regenerated = true;
        }

        outcome.constraints = self.resolve(&outcome.graph, request);
        Ok(outcome)
    }

    /// Transform an outcome into the external response.
    pub fn respond(
        &self,
        outcome: &PipelineOutcome,
        request: &PipelineRequest,
    ) -> Result<ExternalResponse, DagwrightError> {
        self.transformer.transform(outcome, request)
    }

    /// Compare two snapshots. Advisory only.
    #[must_use]
    pub fn check_integrity(&self, raw: &Value, output: &Value) -> IntegrityReport {
        self.sentinel.check(raw, output)
    }

    fn deterministic_round(&self, mut graph: Graph, snapshot: &EdgeFieldSnapshot) -> PipelineOutcome {
        let swept = self.sweep.run(&mut graph);
        let threshold = ground_thresholds(&mut graph);
        let reconciled = self.reconciler.reconcile(&mut graph, snapshot);
        let gate = GateDecision::from_violations(&reconciled.violations);

        PipelineOutcome {
            graph,
            trace: PipelineTrace {
                repair: swept.trace,
                threshold,
                reconciliation: reconciled.trace,
                regenerated: false,
            },
            gate,
            constraints: None,
        }
    }

    fn resolve(&self, graph: &Graph, request: &PipelineRequest) -> Option<ResolutionReport> {
        let brief = request.brief.as_deref().map(str::trim).filter(|b| !b.is_empty())?;
        let extracted = extract_constraints(brief);
        Some(resolve_constraints(
            &extracted,
            graph,
            request.goal_node_id.as_deref(),
        ))
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        let config = PipelineConfig::default();
        let validator = Validator::new(config.limits);
        Self {
            sweep: SweepEngine::new(validator, config.sweep.max_iterations),
            reconciler: Reconciler::new(validator),
            transformer: SchemaTransformer::new(config.export.clone()),
            sentinel: Sentinel::new(config.sentinel),
            config,
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ViolationCode;
    use crate::config::GraphLimits;
    use crate::types::{Edge, Node, NodeKind};
    use std::cell::Cell;

    struct Fixed {
        graph: Graph,
        calls: Cell<usize>,
    }

    impl GraphRegenerator for Fixed {
        fn regenerate(&self, _graph: &Graph, remaining: &[Violation]) -> Result<Graph, DagwrightError> {
            assert!(!remaining.is_empty());
            self.calls.set(self.calls.get() + 1);
            Ok(self.graph.clone())
        }
    }

    struct Failing;

    impl GraphRegenerator for Failing {
        fn regenerate(&self, _graph: &Graph, _remaining: &[Violation]) -> Result<Graph, DagwrightError> {
            Err(DagwrightError::Regeneration("model timed out".into()))
        }
    }

    fn healthy() -> Graph {
        let mut graph = Graph::new();
        graph.nodes = vec![
            Node::new("goal", NodeKind::Goal, "Revenue"),
            Node::new("demand", NodeKind::Outcome, "Demand"),
        ];
        graph.edges = vec![Edge::new("demand", "goal", 0.7, 0.1)];
        graph
    }

    fn cyclic() -> Graph {
        let mut graph = healthy();
        graph.nodes.push(Node::new("churn", NodeKind::Outcome, "Churn"));
        graph.edges.push(Edge::new("demand", "churn", -0.3, 0.1));
        graph.edges.push(Edge::new("churn", "demand", -0.3, 0.1));
        graph
    }

    #[test]
    fn clean_run_needs_no_regeneration() {
        let outcome = Pipeline::default().run(healthy(), &PipelineRequest::default());
        assert!(!outcome.gate.llm_repair_needed);
        // Only the missing edge id was repaired.
        assert_eq!(outcome.trace.repair.actions.len(), 1);
        assert_eq!(outcome.trace.repair.actions[0].code, ViolationCode::MissingEdgeId);
        assert!(outcome.constraints.is_none());
    }

    #[test]
    fn regenerator_is_called_at_most_once() {
        let regen = Fixed {
            graph: cyclic(),
            calls: Cell::new(0),
        };
        let outcome = Pipeline::default()
            .run_with_regenerator(cyclic(), &PipelineRequest::default(), &regen)
            .expect("regenerator succeeds");
        assert_eq!(regen.calls.get(), 1);
        assert!(outcome.trace.regenerated);
        assert!(outcome.gate.llm_repair_needed);
    }

    #[test]
    fn regenerator_is_skipped_when_clean() {
        let regen = Fixed {
            graph: cyclic(),
            calls: Cell::new(0),
        };
        let outcome = Pipeline::default()
            .run_with_regenerator(healthy(), &PipelineRequest::default(), &regen)
            .expect("no regeneration needed");
        assert_eq!(regen.calls.get(), 0);
        assert!(!outcome.trace.regenerated);
    }

    #[test]
    fn regeneration_failure_propagates() {
        let err = Pipeline::default()
            .run_with_regenerator(cyclic(), &PipelineRequest::default(), &Failing)
            .expect_err("must fail");
        assert!(matches!(err, DagwrightError::Regeneration(_)));
    }

    #[test]
    fn brief_constraints_are_resolved() {
        let request = PipelineRequest {
            brief: Some("Demand must not fall below 1,000 units.".into()),
            ..PipelineRequest::default()
        };
        let outcome = Pipeline::default().run(healthy(), &request);
        let report = outcome.constraints.expect("brief present");
        assert_eq!(report.constraints.len(), 1);
        assert_eq!(report.constraints[0].node_id, "demand");
        assert_eq!(report.constraints[0].value, 1000.0);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = PipelineConfig {
            limits: GraphLimits {
                max_nodes: 0,
                max_edges: 10,
            },
            ..PipelineConfig::default()
        };
        assert!(matches!(
            Pipeline::new(config),
            Err(DagwrightError::InvalidConfig(_))
        ));
    }

    #[test]
    fn outcome_transforms_into_response() {
        let pipeline = Pipeline::default();
        let request = PipelineRequest::default();
        let outcome = pipeline.run(healthy(), &request);
        let response = pipeline.respond(&outcome, &request).expect("conforms");
        assert_eq!(response.graph.edges[0].id, "demand::goal::0");
        assert_eq!(response.trace.repair.actions.len(), 1);
    }
}
