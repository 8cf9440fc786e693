//! # Pipeline Tier Tests (T0-T5)
//!
//! End-to-end checks of the deterministic layer, one tier per stage:
//!
//! - T0: Wire parsing (lenient numerics, aliases, passthrough)
//! - T1: Validation and sweep repair
//! - T2: Threshold grounding and reconciliation
//! - T3: Repair gate and regeneration
//! - T4: Constraint extraction and resolution
//! - T5: External response and integrity sentinel

use dagwright_core::{
    Bucket, DagwrightError, Graph, GraphRegenerator, IntegrityCode, Operator, Pipeline,
    PipelineRequest, Sentinel, Violation, ViolationCode, extract_constraints, resolve_constraints,
    validate,
};
use serde_json::{Value, json};
use std::cell::Cell;

// =============================================================================
// FIXTURES
// =============================================================================

/// A generator draft with a little of everything wrong.
fn pricing_draft() -> Value {
    json!({
        "version": "1",
        "seed": 17,
        "nodes": [
            {"id": "goal_profit", "kind": "Goal", "label": "Increase profit", "goal_threshold": 0.8},
            {"id": "dec_pricing", "kind": "decision", "label": "Pricing strategy"},
            {"id": "opt_raise", "kind": "option", "label": "Raise prices",
             "data": {"interventions": {"fac_price": 12}}},
            {"id": "opt_hold", "kind": "option", "label": "Keep current pricing (status quo)"},
            {"id": "fac_price", "kind": "factor", "label": "Unit price", "category": "controllable",
             "data": {"value": 10, "baseline": 9, "unit": "GBP"}},
            {"id": "fac_market", "kind": "factor", "label": "Market conditions", "category": "external",
             "data": {"value": 0.4, "factor_type": "macro"}},
            {"id": "fac_budget", "kind": "factor", "label": "Marketing budget", "category": "controllable",
             "data": {"value": 50000, "unit": "GBP", "extractionType": "explicit"}},
            {"id": "out_demand", "kind": "outcome", "label": "Customer demand"}
        ],
        "edges": [
            {"from": "dec_pricing", "to": "opt_raise", "strength_mean": 1, "strength_std": 0.1, "belief_exists": 1},
            {"from": "dec_pricing", "to": "opt_hold", "strength_mean": 1, "strength_std": 0.1, "belief_exists": 1},
            {"from": "opt_raise", "to": "fac_price", "strength_mean": 1, "strength_std": 0.1, "belief_exists": 1},
            {"id": "e4", "from": "fac_price", "to": "out_demand", "strength_mean": "NaN",
             "strength_std": 0.1, "belief_exists": 0.9, "effect_direction": "negative"},
            {"id": "e5", "from": "out_demand", "to": "goal_profit", "strength_mean": 0.6,
             "strength_std": 0.2, "belief_exists": 0.95, "provenance": {"source": "brief", "quote": "demand drives profit"}},
            {"id": "e6", "from": "fac_market", "to": "out_demand", "strength_mean": 0.3,
             "strength_std": 0.1, "belief_exists": 0.8},
            {"id": "e7", "from": "goal_profit", "to": "fac_price", "strength_mean": 0.2,
             "strength_std": 0.1, "belief_exists": 0.5},
            {"id": "e8", "from": "fac_ghost", "to": "goal_profit", "strength_mean": 0.4,
             "strength_std": 0.1, "belief_exists": 0.7},
            {"id": "e9", "from": "fac_budget", "to": "out_demand", "strength_mean": 0.4,
             "strength_std": 0.15, "belief_exists": 0.9}
        ],
        "meta": {"model": "draft-1"},
        "request_trace": "abc-123"
    })
}

fn parse(value: &Value) -> Graph {
    Graph::from_value(value.clone()).expect("draft parses")
}

fn edge<'g>(graph: &'g Graph, from: &str, to: &str) -> Option<&'g dagwright_core::Edge> {
    graph.edges.iter().find(|e| e.from == from && e.to == to)
}

fn cyclic() -> Graph {
    parse(&json!({
        "nodes": [
            {"id": "goal", "kind": "goal", "label": "Revenue"},
            {"id": "demand", "kind": "outcome", "label": "Demand"},
            {"id": "churn", "kind": "outcome", "label": "Churn"},
            {"id": "supply", "kind": "risk", "label": "Supply shock"}
        ],
        "edges": [
            {"id": "a", "from": "demand", "to": "goal", "strength_mean": 0.7, "strength_std": 0.1, "belief_exists": 0.9},
            {"id": "b", "from": "churn", "to": "demand", "strength_mean": -0.4, "strength_std": 0.1, "belief_exists": 0.9},
            {"id": "c", "from": "demand", "to": "churn", "strength_mean": -0.2, "strength_std": 0.1, "belief_exists": 0.6},
            {"id": "d", "from": "supply", "to": "goal", "strength_mean": -0.3, "strength_std": 0.2, "belief_exists": 0.7}
        ]
    }))
}

// =============================================================================
// T0: WIRE PARSING
// =============================================================================

mod t0_wire {
    use super::*;

    /// T0.1: Numeric strings, `seed` alias and unknown keys all survive parsing.
    #[test]
    fn lenient_draft_parses() {
        let graph = parse(&pricing_draft());
        assert_eq!(graph.default_seed, Some(17));
        assert_eq!(graph.nodes.len(), 8);
        assert_eq!(graph.edges.len(), 9);
        let e4 = edge(&graph, "fac_price", "out_demand").expect("e4");
        assert!(e4.strength_mean.is_nan());
        assert_eq!(graph.extra.get("request_trace"), Some(&json!("abc-123")));
    }

    /// T0.2: An edge without an endpoint is a dangling edge, not a parse error.
    #[test]
    fn missing_endpoint_is_swept() {
        let graph = parse(&json!({
            "nodes": [
                {"id": "goal_profit", "kind": "goal", "label": "Increase profit"},
                {"id": "out_demand", "kind": "outcome", "label": "Customer demand"}
            ],
            "edges": [
                {"id": "a", "from": "out_demand", "to": "goal_profit", "strength_mean": 0.6,
                 "strength_std": 0.1, "belief_exists": 0.9},
                {"id": "b", "to": "goal_profit", "strength_mean": 0.4,
                 "strength_std": 0.1, "belief_exists": 0.9}
            ]
        }));
        assert_eq!(graph.edges.len(), 2);
        assert!(
            validate(&graph)
                .iter()
                .any(|v| v.code == ViolationCode::DanglingEdgeEndpoint && v.path == "edges[1].from")
        );

        let outcome = Pipeline::default().run(graph, &PipelineRequest::default());
        assert_eq!(outcome.graph.edges.len(), 1);
        assert_eq!(outcome.graph.edges[0].id.as_deref(), Some("a"));
        assert!(!outcome.gate.llm_repair_needed);
    }

    /// T0.3: A document that is not a graph is a parse error, not a panic.
    #[test]
    fn non_graph_is_rejected() {
        let err = Graph::from_value(json!({"nodes": "nope"})).expect_err("must fail");
        assert!(matches!(err, DagwrightError::Deserialization(_)));
    }
}

// =============================================================================
// T1: VALIDATION AND SWEEP
// =============================================================================

mod t1_sweep {
    use super::*;

    /// T1.1: NaN strength on a negative edge becomes the signed default.
    #[test]
    fn nan_negative_edge_defaults() {
        let graph = parse(&json!({
            "nodes": [
                {"id": "goal", "kind": "goal", "label": "Margin"},
                {"id": "cost", "kind": "outcome", "label": "Cost"}
            ],
            "edges": [
                {"id": "e1", "from": "cost", "to": "goal", "strength_mean": "NaN",
                 "strength_std": "NaN", "belief_exists": 0.9, "effect_direction": "negative"}
            ]
        }));
        let outcome = Pipeline::default().run(graph, &PipelineRequest::default());

        let repaired = &outcome.graph.edges[0];
        assert_eq!(repaired.strength_mean, -0.5);
        assert_eq!(repaired.strength_std, 0.125);
        assert_eq!(outcome.trace.repair.remaining_counts.a, 0);
        assert!(!outcome.gate.llm_repair_needed);
    }

    /// T1.2: Every rule-fixable problem in the draft is gone after one run.
    #[test]
    fn draft_is_swept_clean() {
        let outcome = Pipeline::default().run(parse(&pricing_draft()), &PipelineRequest::default());
        let graph = &outcome.graph;

        assert!(edge(graph, "goal_profit", "fac_price").is_none());
        assert!(edge(graph, "fac_ghost", "goal_profit").is_none());
        assert_eq!(edge(graph, "fac_price", "out_demand").map(|e| e.strength_mean), Some(-0.5));
        assert!(graph.edges.iter().all(|e| e.id.is_some()));
        assert!(outcome.trace.repair.converged);
        assert_eq!(outcome.trace.repair.remaining_counts.a, 0);
        // The status-quo option waits for the reconciler.
        assert_eq!(outcome.trace.repair.remaining_counts.b, 1);
    }

    /// T1.3: External factor payload is reduced to what the category allows.
    #[test]
    fn external_factor_is_stripped() {
        let outcome = Pipeline::default().run(parse(&pricing_draft()), &PipelineRequest::default());
        let body = outcome
            .graph
            .node("fac_market")
            .and_then(|n| n.factor_body())
            .expect("factor");
        let data = body.data.as_ref().expect("factor_type kept");
        assert_eq!(data.value, None);
        assert_eq!(data.factor_type.as_deref(), Some("macro"));
    }

    /// T1.4: Controllable factor values get an inferred extraction type.
    #[test]
    fn controllable_value_gets_provenance() {
        let outcome = Pipeline::default().run(parse(&pricing_draft()), &PipelineRequest::default());
        let data = outcome
            .graph
            .node("fac_price")
            .and_then(|n| n.factor_body())
            .and_then(|b| b.data.as_ref())
            .expect("data");
        assert_eq!(data.extraction_type, Some(dagwright_core::ExtractionType::Inferred));
    }

    /// T1.5: The draft's raw validation sees both rule-fixable and structural problems.
    #[test]
    fn raw_draft_violations() {
        let violations = validate(&parse(&pricing_draft()));
        let has = |code| violations.iter().any(|v: &Violation| v.code == code);
        assert!(has(ViolationCode::NonFiniteStrengthMean));
        assert!(has(ViolationCode::DanglingEdgeEndpoint));
        assert!(has(ViolationCode::GoalHasOutgoingEdge));
        assert!(has(ViolationCode::ExternalFactorHasData));
        assert!(has(ViolationCode::DisconnectedOption));
    }
}

// =============================================================================
// T2: GROUNDING AND RECONCILIATION
// =============================================================================

mod t2_reconcile {
    use super::*;

    /// T2.1: A bare goal threshold is stripped.
    #[test]
    fn bare_threshold_is_stripped() {
        let outcome = Pipeline::default().run(parse(&pricing_draft()), &PipelineRequest::default());
        let threshold = outcome.graph.node("goal_profit").and_then(|n| n.goal_threshold());
        assert!(threshold.is_none_or(|t| t.is_empty()));
        assert!(outcome.trace.threshold.retained.is_empty());
    }

    /// T2.2: A threshold backed by a raw value and a unit is kept.
    #[test]
    fn grounded_threshold_is_kept() {
        let mut draft = pricing_draft();
        draft["nodes"][0]["goal_threshold_raw"] = json!(250000);
        draft["nodes"][0]["goal_threshold_unit"] = json!("GBP");
        let outcome = Pipeline::default().run(parse(&draft), &PipelineRequest::default());

        let kept = outcome
            .graph
            .node("goal_profit")
            .and_then(|n| n.goal_threshold())
            .expect("grounded threshold kept");
        assert_eq!(kept.threshold, Some(0.8));
        assert_eq!(kept.raw, Some(250_000.0));
        assert_eq!(outcome.trace.threshold.retained, vec!["goal_profit".to_string()]);
    }

    /// T2.3: The status-quo option is wired to its sibling's target and nothing reaches the gate.
    #[test]
    fn status_quo_wiring_clears_bucket_c() {
        let outcome = Pipeline::default().run(parse(&pricing_draft()), &PipelineRequest::default());

        assert_eq!(outcome.trace.reconciliation.status_quo_wired, vec!["opt_hold".to_string()]);
        let wired = edge(&outcome.graph, "opt_hold", "fac_price").expect("status quo edge");
        assert_eq!(wired.origin.as_deref(), Some("repair"));
        assert_eq!(outcome.gate.counts.c, 0);
        assert!(!outcome.gate.llm_repair_needed);

        let hold = outcome.graph.node("opt_hold").expect("option");
        let interventions = match &hold.body {
            dagwright_core::NodeBody::Option(data) => Some(data.interventions.clone()),
            _ => None,
        };
        assert_eq!(
            interventions.and_then(|i| i.get("fac_price").cloned()),
            Some(json!(9.0))
        );
    }

    /// T2.4: A cycle survives every rule and is escalated for the generator.
    #[test]
    fn cycles_reach_bucket_c() {
        let outcome = Pipeline::default().run(cyclic(), &PipelineRequest::default());
        assert!(outcome.gate.llm_repair_needed);
        assert!(
            outcome
                .gate
                .remaining_violations
                .iter()
                .all(|v| v.bucket == Bucket::C)
        );
        assert!(
            outcome
                .gate
                .remaining_violations
                .iter()
                .any(|v| v.code == ViolationCode::CycleDetected)
        );
    }
}

// =============================================================================
// T3: GATE AND REGENERATION
// =============================================================================

mod t3_regeneration {
    use super::*;

    struct DropsEdges {
        calls: Cell<usize>,
    }

    impl GraphRegenerator for DropsEdges {
        fn regenerate(&self, graph: &Graph, remaining: &[Violation]) -> Result<Graph, DagwrightError> {
            self.calls.set(self.calls.get() + 1);
            assert!(remaining.iter().any(|v| v.code == ViolationCode::CycleDetected));
            // Breaks the cycle but also loses an unrelated edge.
            let mut fixed = graph.clone();
            fixed
                .edges
                .retain(|e| !(e.from == "demand" && e.to == "churn") && e.from != "supply");
            Ok(fixed)
        }
    }

    /// T3.1: A regenerated graph gets lost edges back from the original snapshot.
    #[test]
    fn regeneration_restores_lost_edges() {
        let regen = DropsEdges { calls: Cell::new(0) };
        let outcome = Pipeline::default()
            .run_with_regenerator(cyclic(), &PipelineRequest::default(), &regen)
            .expect("regeneration succeeds");

        assert_eq!(regen.calls.get(), 1);
        assert!(outcome.trace.regenerated);
        assert!(!outcome.gate.llm_repair_needed);
        assert_eq!(outcome.trace.reconciliation.edges_restored, 1);
        let restored = edge(&outcome.graph, "supply", "goal").expect("restored");
        assert_eq!(restored.id.as_deref(), Some("d"));
        // Restoring demand -> churn would close the cycle again.
        assert!(edge(&outcome.graph, "demand", "churn").is_none());
    }

    /// T3.2: A clean draft never reaches the regenerator.
    #[test]
    fn clean_draft_skips_regeneration() {
        let regen = DropsEdges { calls: Cell::new(0) };
        let outcome = Pipeline::default()
            .run_with_regenerator(parse(&pricing_draft()), &PipelineRequest::default(), &regen)
            .expect("no regeneration");
        assert_eq!(regen.calls.get(), 0);
        assert!(!outcome.trace.regenerated);
    }
}

// =============================================================================
// T4: CONSTRAINTS
// =============================================================================

mod t4_constraints {
    use super::*;

    const BRIEF: &str = "We want to grow profit. Keep budget under £100k. \
                         Budget must not exceed £80k. Launch by Q3 2026.";

    /// T4.1: Two budget bounds collapse to the stricter one.
    #[test]
    fn budget_brief_keeps_stricter_bound() {
        let found = extract_constraints(BRIEF);
        let budget: Vec<_> = found.iter().filter(|c| c.target_id == "budget").collect();
        assert_eq!(budget.len(), 1);
        assert_eq!(budget[0].operator, Operator::AtMost);
        assert_eq!(budget[0].value, 80_000.0);
        assert_eq!(budget[0].unit.as_deref(), Some("GBP"));
    }

    /// T4.2: Constraints bind to real node ids through the strategy cascade.
    #[test]
    fn constraints_bind_to_nodes() {
        let request = PipelineRequest {
            brief: Some(BRIEF.to_string()),
            goal_node_id: Some("goal_profit".into()),
            ..PipelineRequest::default()
        };
        let outcome = Pipeline::default().run(parse(&pricing_draft()), &request);
        let report = outcome.constraints.expect("brief present");

        let budget = report
            .constraints
            .iter()
            .find(|c| c.source_target == "budget")
            .expect("budget bound");
        assert_eq!(budget.node_id, "fac_budget");
        assert_eq!(budget.resolved_by, "alias_table");
        assert_eq!(budget.value, 80_000.0);

        let deadline = report
            .constraints
            .iter()
            .find(|c| c.deadline.is_some())
            .expect("deadline bound");
        assert_eq!(deadline.node_id, "goal_profit");
        assert_eq!(
            deadline.deadline.as_ref().and_then(|d| d.date.as_deref()),
            Some("2026-09-30")
        );
        assert_eq!(report.stats.remapped, 2);
    }

    /// T4.3: Without a goal id the deadline has nowhere to go.
    #[test]
    fn deadline_needs_goal() {
        let request = PipelineRequest {
            brief: Some("Launch by Q3 2026.".into()),
            ..PipelineRequest::default()
        };
        let outcome = Pipeline::default().run(parse(&pricing_draft()), &request);
        let report = outcome.constraints.expect("brief present");
        assert!(report.constraints.is_empty());
        assert_eq!(report.stats.rejected_no_match, 1);
    }

    /// T4.4: Deadlines never bind to schedule-sounding factors.
    #[test]
    fn deadline_ignores_launch_and_delivery_nodes() {
        let graph = parse(&json!({
            "nodes": [
                {"id": "goal_profit", "kind": "goal", "label": "Increase profit"},
                {"id": "delivery_cost", "kind": "factor", "label": "Delivery cost"},
                {"id": "product_launch", "kind": "factor", "label": "Product launch"}
            ]
        }));
        let found = extract_constraints("Launch within 6 months.");
        assert_eq!(found.len(), 1);
        assert!(found[0].is_temporal());

        let unbound = resolve_constraints(&found, &graph, None);
        assert!(unbound.constraints.is_empty());
        assert_eq!(unbound.stats.rejected_no_match, 1);

        let bound = resolve_constraints(&found, &graph, Some("goal_profit"));
        assert_eq!(bound.constraints.len(), 1);
        assert_eq!(bound.constraints[0].node_id, "goal_profit");
        assert_eq!(bound.constraints[0].resolved_by, "temporal_goal");
        assert_eq!(bound.constraints[0].value, 180.0);
    }
}

// =============================================================================
// T5: RESPONSE AND SENTINEL
// =============================================================================

mod t5_response {
    use super::*;

    fn respond(draft: &Value) -> Value {
        let pipeline = Pipeline::default();
        let request = PipelineRequest::default();
        let outcome = pipeline.run(parse(draft), &request);
        pipeline
            .respond(&outcome, &request)
            .expect("response conforms")
            .to_value()
            .expect("response serializes")
    }

    /// T5.1: The response is frozen `v3` and keeps passthrough keys.
    #[test]
    fn response_shape() {
        let response = respond(&pricing_draft());
        assert_eq!(response["schema_version"], json!("v3"));
        assert_eq!(response["graph"]["default_seed"], json!(17));
        assert_eq!(response["graph"]["request_trace"], json!("abc-123"));
        assert_eq!(response["trace"]["llm_repair_needed"], json!(false));

        let edges = response["graph"]["edges"].as_array().expect("edges");
        assert!(edges.iter().all(|e| e["id"].is_string() && e["origin"].is_string()));
        let e5 = edges.iter().find(|e| e["id"] == json!("e5")).expect("e5");
        assert_eq!(e5["provenance_source"], json!("brief"));
    }

    /// T5.2: Across the whole run only the stripped threshold is lost.
    #[test]
    fn sentinel_sees_only_the_stripped_threshold() {
        let raw = pricing_draft();
        let response = respond(&raw);
        let report = Sentinel::default().check(&raw, &response);

        let codes: Vec<_> = report.warnings.iter().map(|w| w.code).collect();
        assert_eq!(codes, vec![IntegrityCode::GoalThresholdStripped]);
        assert_eq!(report.input_node_count, report.output_node_count);
        assert_eq!(report.strength_stats.causal_edges, 4);
    }

    /// T5.3: Four of five causal edges at the exact default trip both signals.
    #[test]
    fn uniform_default_strengths() {
        let graph = json!({
            "nodes": [
                {"id": "g", "kind": "goal", "label": "G"},
                {"id": "a", "kind": "outcome", "label": "A"},
                {"id": "b", "kind": "outcome", "label": "B"},
                {"id": "c", "kind": "risk", "label": "C"},
                {"id": "d", "kind": "risk", "label": "D"},
                {"id": "e", "kind": "outcome", "label": "E"}
            ],
            "edges": [
                {"from": "a", "to": "g", "strength_mean": 0.5, "strength_std": 0.125},
                {"from": "b", "to": "g", "strength_mean": -0.5, "strength_std": 0.125},
                {"from": "c", "to": "g", "strength_mean": 0.5, "strength_std": 0.125},
                {"from": "d", "to": "g", "strength_mean": 0.5, "strength_std": 0.125},
                {"from": "e", "to": "g", "strength_mean": 0.3, "strength_std": 0.2}
            ]
        });
        let report = Pipeline::default().check_integrity(&graph, &graph);
        assert!(report.has(IntegrityCode::UniformStrengthDefault));
        assert!(report.has(IntegrityCode::MeanDominantDefault));
        assert_eq!(report.strength_stats.default_both, 4);
    }

    /// T5.4: Magnitude defaults with varied std trip only the mean-dominant signal.
    #[test]
    fn mean_dominant_strengths() {
        let graph = json!({
            "nodes": [
                {"id": "g", "kind": "goal", "label": "G"},
                {"id": "a", "kind": "outcome", "label": "A"},
                {"id": "b", "kind": "outcome", "label": "B"},
                {"id": "c", "kind": "outcome", "label": "C"},
                {"id": "d", "kind": "outcome", "label": "D"}
            ],
            "edges": [
                {"from": "a", "to": "g", "strength_mean": 0.5, "strength_std": 0.1},
                {"from": "b", "to": "g", "strength_mean": -0.5, "strength_std": 0.3},
                {"from": "c", "to": "g", "strength_mean": 0.5, "strength_std": 0.2},
                {"from": "d", "to": "g", "strength_mean": 0.2, "strength_std": 0.2}
            ]
        });
        let report = Pipeline::default().check_integrity(&graph, &graph);
        assert!(!report.has(IntegrityCode::UniformStrengthDefault));
        assert!(report.has(IntegrityCode::MeanDominantDefault));
    }
}
