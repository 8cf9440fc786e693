//! # Schema Version Transformer
//!
//! Maps the internal graph and pipeline traces into the versioned external
//! response. This is the contract freeze point: field names and types of
//! [`ExternalResponse`] change only together with
//! [`RESPONSE_SCHEMA_VERSION`].
//!
//! ## Shape rules
//!
//! - Unknown keys on the graph, nodes, edges and request pass through
//!   verbatim. Nothing is filtered by an allow-list.
//! - A missing edge `origin` becomes the configured default.
//! - Nested edge provenance flattens to `provenance_*` keys.
//! - Factor nodes expose one `observed_state` view merged from the node's
//!   own observed state and its data.
//!
//! After transformation the response is checked against the frozen schema;
//! any failure is a terminal [`DagwrightError::SchemaConformance`].

use crate::DagwrightError;
use crate::config::ExportConfig;
use crate::constraints::{GoalConstraint, ResolutionStats};
use crate::grounding::ThresholdTrace;
use crate::pipeline::{PipelineOutcome, PipelineRequest};
use crate::primitives::RESPONSE_SCHEMA_VERSION;
use crate::reconcile::ReconciliationTrace;
use crate::sweep::RepairTrace;
use crate::types::{EffectDirection, Edge, Node, NodeBody, NodeKind, ObservedState, Violation};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeSet;

// =============================================================================
// RESPONSE TYPES
// =============================================================================

/// The external `v3` response.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExternalResponse {
    pub schema_version: String,
    pub graph: PublicGraph,
    pub rationales: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quality: Option<Value>,
    pub goal_constraints: Vec<GoalConstraint>,
    pub trace: ResponseTrace,
    /// Request-level passthrough keys.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ExternalResponse {
    pub fn to_value(&self) -> Result<Value, DagwrightError> {
        serde_json::to_value(self).map_err(|e| DagwrightError::Serialization(e.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PublicGraph {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_seed: Option<u64>,
    pub nodes: Vec<PublicNode>,
    pub edges: Vec<PublicEdge>,
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub meta: Map<String, Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Public node: the internal wire shape plus a merged observed-state view.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PublicNode {
    pub id: String,
    pub kind: NodeKind,
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observed_state: Option<ObservedState>,
    /// Every other key of the internal node, verbatim.
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

/// Public edge with flattened provenance and a guaranteed origin.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PublicEdge {
    pub id: String,
    pub from: String,
    pub to: String,
    pub strength_mean: f64,
    pub strength_std: f64,
    pub belief_exists: f64,
    pub effect_direction: EffectDirection,
    pub origin: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provenance_source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provenance_quote: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provenance_location: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResponseTrace {
    pub repair: RepairTrace,
    pub threshold: ThresholdTrace,
    pub reconciliation: ReconciliationTrace,
    pub llm_repair_needed: bool,
    pub remaining_violations: Vec<Violation>,
    pub regenerated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub constraint_resolution: Option<ResolutionStats>,
}

/// Top-level keys owned by the response; passthrough never overwrites them.
const RESERVED_KEYS: [&str; 6] = [
    "schema_version",
    "graph",
    "rationales",
    "quality",
    "goal_constraints",
    "trace",
];

// =============================================================================
// TRANSFORMER
// =============================================================================

/// Internal → external transformer.
#[derive(Debug, Clone, Default)]
pub struct SchemaTransformer {
    config: ExportConfig,
}

impl SchemaTransformer {
    #[must_use]
    pub fn new(config: ExportConfig) -> Self {
        Self { config }
    }

    /// Build and check the external response.
    pub fn transform(
        &self,
        outcome: &PipelineOutcome,
        request: &PipelineRequest,
    ) -> Result<ExternalResponse, DagwrightError> {
        let graph = &outcome.graph;
        let nodes = graph
            .nodes
            .iter()
            .map(public_node)
            .collect::<Result<Vec<_>, _>>()?;
        let edges = graph
            .edges
            .iter()
            .map(|e| self.public_edge(e))
            .collect();

        let mut extra = request.extra.clone();
        extra.retain(|key, _| !RESERVED_KEYS.contains(&key.as_str()));

        let response = ExternalResponse {
            schema_version: RESPONSE_SCHEMA_VERSION.to_string(),
            graph: PublicGraph {
                version: graph.version.clone(),
                default_seed: graph.default_seed,
                nodes,
                edges,
                meta: graph.meta.clone(),
                extra: graph.extra.clone(),
            },
            rationales: request.rationales.clone(),
            quality: request.quality.clone(),
            goal_constraints: outcome
                .constraints
                .as_ref()
                .map(|r| r.constraints.clone())
                .unwrap_or_default(),
            trace: ResponseTrace {
                repair: outcome.trace.repair.clone(),
                threshold: outcome.trace.threshold.clone(),
                reconciliation: outcome.trace.reconciliation.clone(),
                llm_repair_needed: outcome.gate.llm_repair_needed,
                remaining_violations: outcome.gate.remaining_violations.clone(),
                regenerated: outcome.trace.regenerated,
                constraint_resolution: outcome.constraints.as_ref().map(|r| r.stats),
            },
            extra,
        };

        check_conformance(&response)?;
        tracing::info!(
            nodes = response.graph.nodes.len(),
            edges = response.graph.edges.len(),
            schema = RESPONSE_SCHEMA_VERSION,
            "response built"
        );
        Ok(response)
    }

    fn public_edge(&self, edge: &Edge) -> PublicEdge {
        let origin = edge
            .origin
            .as_deref()
            .map(str::trim)
            .filter(|o| !o.is_empty())
            .unwrap_or(&self.config.default_edge_origin)
            .to_string();

        let mut extra = edge.extra.clone();
        let (source, quote, location) = match &edge.provenance {
            Some(p) => {
                for (key, value) in &p.extra {
                    extra
                        .entry(format!("provenance_{}", key))
                        .or_insert_with(|| value.clone());
                }
                let source = Some(p.source.clone()).filter(|s| !s.is_empty());
                (source, p.quote.clone(), p.location.clone())
            }
            None => (None, None, None),
        };

        PublicEdge {
            id: edge.id.clone().unwrap_or_default(),
            from: edge.from.clone(),
            to: edge.to.clone(),
            strength_mean: edge.strength_mean,
            strength_std: edge.strength_std,
            belief_exists: edge.belief_exists,
            effect_direction: edge.effect_direction,
            origin,
            provenance_source: source,
            provenance_quote: quote,
            provenance_location: location,
            extra,
        }
    }
}

fn public_node(node: &Node) -> Result<PublicNode, DagwrightError> {
    let Value::Object(mut fields) =
        serde_json::to_value(node).map_err(|e| DagwrightError::Serialization(e.to_string()))?
    else {
        return Err(DagwrightError::Serialization(format!(
            "node `{}` did not serialize to an object",
            node.id
        )));
    };
    for key in ["id", "kind", "label", "observed_state"] {
        fields.remove(key);
    }
    Ok(PublicNode {
        id: node.id.clone(),
        kind: node.kind(),
        label: node.label.clone(),
        observed_state: merged_observed_state(node),
        fields,
    })
}

/// Observed state of a factor filled from its data; other kinds pass through.
fn merged_observed_state(node: &Node) -> Option<ObservedState> {
    let data = match &node.body {
        NodeBody::Factor(body) => body.data.as_ref(),
        NodeBody::Goal(_)
        | NodeBody::Decision
        | NodeBody::Option(_)
        | NodeBody::Outcome
        | NodeBody::Risk
        | NodeBody::Action
        | NodeBody::Constraint => return node.observed_state.clone(),
    };
    let mut state = node.observed_state.clone().unwrap_or_default();
    if let Some(data) = data {
        state.value = state.value.or(data.value);
        state.baseline = state.baseline.or(data.baseline);
        state.raw_value = state.raw_value.or(data.raw_value);
        state.cap = state.cap.or(data.cap);
        if state.unit.is_none() {
            state.unit.clone_from(&data.unit);
        }
        if state.source.is_none() {
            state.source = data.extraction_type.map(|t| t.as_str().to_string());
        }
        if state.factor_type.is_none() {
            state.factor_type.clone_from(&data.factor_type);
        }
        if state.uncertainty_drivers.is_none() {
            state.uncertainty_drivers.clone_from(&data.uncertainty_drivers);
        }
    }
    (state != ObservedState::default()).then_some(state)
}

// =============================================================================
// CONFORMANCE
// =============================================================================

/// Check a response against the frozen schema, listing every problem.
pub fn check_conformance(response: &ExternalResponse) -> Result<(), DagwrightError> {
    let mut problems = Vec::new();

    if response.schema_version != RESPONSE_SCHEMA_VERSION {
        problems.push(format!(
            "schema_version is `{}`, expected `{}`",
            response.schema_version, RESPONSE_SCHEMA_VERSION
        ));
    }

    let mut node_ids = BTreeSet::new();
    for (i, node) in response.graph.nodes.iter().enumerate() {
        if node.id.trim().is_empty() {
            problems.push(format!("nodes[{}].id is empty", i));
        } else if !node_ids.insert(node.id.as_str()) {
            problems.push(format!("nodes[{}].id `{}` is not unique", i, node.id));
        }
    }

    let mut edge_ids = BTreeSet::new();
    for (i, edge) in response.graph.edges.iter().enumerate() {
        if edge.id.trim().is_empty() {
            problems.push(format!("edges[{}].id is empty", i));
        } else if !edge_ids.insert(edge.id.as_str()) {
            problems.push(format!("edges[{}].id `{}` is not unique", i, edge.id));
        }
        for (end, id) in [("from", &edge.from), ("to", &edge.to)] {
            if !node_ids.contains(id.as_str()) {
                problems.push(format!("edges[{}].{} `{}` does not resolve", i, end, id));
            }
        }
        if !(edge.strength_mean.is_finite() && (-1.0..=1.0).contains(&edge.strength_mean)) {
            problems.push(format!("edges[{}].strength_mean is not in [-1, 1]", i));
        }
        if !(edge.strength_std.is_finite() && edge.strength_std > 0.0) {
            problems.push(format!("edges[{}].strength_std is not positive", i));
        }
        if !(edge.belief_exists.is_finite() && (0.0..=1.0).contains(&edge.belief_exists)) {
            problems.push(format!("edges[{}].belief_exists is not in [0, 1]", i));
        }
    }

    if problems.is_empty() {
        Ok(())
    } else {
        tracing::warn!(problems = problems.len(), "response failed schema conformance");
        Err(DagwrightError::SchemaConformance(problems))
    }
}

// =============================================================================
// TESTS
// =============================================================================
