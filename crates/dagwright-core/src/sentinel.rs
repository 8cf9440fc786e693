//! # Integrity Sentinel
//!
//! Out-of-band comparison of an early ("raw") and a late ("output") snapshot
//! of the same logical graph, looking for data that silently disappeared or
//! appeared between stages.
//!
//! The snapshots are plain JSON values, so generator output can be compared
//! with an external response without sharing types. Identifiers are not
//! assumed to match: nodes are paired through [`normalize_id`] of their id
//! and label, so `"Marketing Spend"` and `marketing_spend` are one entity.
//! Every raw node is checked on its own, even when several normalize to the
//! same key.
//!
//! Every detector is advisory. The sentinel never fails and never alters the
//! graph.

use crate::config::SentinelConfig;
use crate::constraints::normalize_id;
use crate::graph::{Graph, is_structural};
use crate::primitives::{DEFAULT_MATCH_EPSILON, DEFAULT_STRENGTH_MAGNITUDE, DEFAULT_STRENGTH_STD};
use crate::types::{NodeKind, lenient};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

// =============================================================================
// WARNINGS
// =============================================================================

/// Stable integrity warning codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IntegrityCode {
    CategoryStripped,
    NodeDropped,
    NodeInjected,
    GoalThresholdStripped,
    EnrichmentMissing,
    InterventionsEmptied,
    UniformStrengthDefault,
    MeanDominantDefault,
}

impl IntegrityCode {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            IntegrityCode::CategoryStripped => "CATEGORY_STRIPPED",
            IntegrityCode::NodeDropped => "NODE_DROPPED",
            IntegrityCode::NodeInjected => "NODE_INJECTED",
            IntegrityCode::GoalThresholdStripped => "GOAL_THRESHOLD_STRIPPED",
            IntegrityCode::EnrichmentMissing => "ENRICHMENT_MISSING",
            IntegrityCode::InterventionsEmptied => "INTERVENTIONS_EMPTIED",
            IntegrityCode::UniformStrengthDefault => "UNIFORM_STRENGTH_DEFAULT",
            IntegrityCode::MeanDominantDefault => "MEAN_DOMINANT_DEFAULT",
        }
    }
}

impl std::fmt::Display for IntegrityCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One advisory finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrityWarning {
    pub code: IntegrityCode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_id: Option<String>,
    pub details: String,
}

/// Default-strength statistics over causal edges of the output snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct StrengthStats {
    /// Causal edges with a finite `strength_mean`.
    pub causal_edges: usize,
    /// Of those, edges at the default magnitude.
    pub default_magnitude: usize,
    /// Of those, edges at the default magnitude AND the default spread.
    pub default_both: usize,
}

impl StrengthStats {
    fn ratio(count: usize, total: usize) -> f64 {
        if total == 0 {
            0.0
        } else {
            count as f64 / total as f64
        }
    }

    #[must_use]
    pub fn uniform_ratio(&self) -> f64 {
        Self::ratio(self.default_both, self.causal_edges)
    }

    #[must_use]
    pub fn magnitude_ratio(&self) -> f64 {
        Self::ratio(self.default_magnitude, self.causal_edges)
    }
}

/// Result of one sentinel run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IntegrityReport {
    pub input_node_count: usize,
    pub input_edge_count: usize,
    pub output_node_count: usize,
    pub output_edge_count: usize,
    pub warnings: Vec<IntegrityWarning>,
    pub strength_stats: StrengthStats,
}

impl IntegrityReport {
    /// Compare two typed graphs with default thresholds.
    #[must_use]
    pub fn from_graphs(raw: &Graph, output: &Graph) -> Self {
        let raw = raw.to_value().unwrap_or(Value::Null);
        let output = output.to_value().unwrap_or(Value::Null);
        Sentinel::default().check(&raw, &output)
    }

    #[must_use]
    pub fn has(&self, code: IntegrityCode) -> bool {
        self.warnings.iter().any(|w| w.code == code)
    }
}

// =============================================================================
// SENTINEL
// =============================================================================

const THRESHOLD_FIELDS: [&str; 4] = [
    "goal_threshold",
    "goal_threshold_raw",
    "goal_threshold_unit",
    "goal_threshold_cap",
];

const ENRICHMENT_FIELDS: [&str; 4] = ["raw_value", "cap", "factor_type", "uncertainty_drivers"];

#[derive(Debug, Clone, Copy, Default)]
pub struct Sentinel {
    config: SentinelConfig,
}

impl Sentinel {
    #[must_use]
    pub fn new(config: SentinelConfig) -> Self {
        Self { config }
    }

    /// Compare `raw` with `output`. Either may be a graph object or an
    /// envelope carrying one under `graph`.
    #[must_use]
    pub fn check(&self, raw: &Value, output: &Value) -> IntegrityReport {
        let raw = graph_body(raw);
        let output = graph_body(output);
        let raw_nodes = array(raw, "nodes");
        let output_nodes = array(output, "nodes");

        let mut report = IntegrityReport {
            input_node_count: raw_nodes.len(),
            input_edge_count: array(raw, "edges").len(),
            output_node_count: output_nodes.len(),
            output_edge_count: array(output, "edges").len(),
            ..IntegrityReport::default()
        };

        let output_index = key_index(output_nodes);
        for raw_node in raw_nodes {
            let matched = node_keys(raw_node)
                .iter()
                .find_map(|k| output_index.get(k).copied());
            match matched {
                None => report.warnings.push(IntegrityWarning {
                    code: IntegrityCode::NodeDropped,
                    node_id: display_id(raw_node),
                    details: "present in raw snapshot, absent from output".to_string(),
                }),
                Some(out) => compare_node(raw_node, out, &mut report.warnings),
            }
        }

        let raw_index = key_index(raw_nodes);
        for out in output_nodes {
            let known = node_keys(out).iter().any(|k| raw_index.contains_key(k));
            if !known {
                report.warnings.push(IntegrityWarning {
                    code: IntegrityCode::NodeInjected,
                    node_id: display_id(out),
                    details: "present in output, absent from raw snapshot".to_string(),
                });
            }
        }

        report.strength_stats = strength_stats(output);
        self.check_strengths(&report.strength_stats, &mut report.warnings);

        for warning in &report.warnings {
            tracing::warn!(
                code = %warning.code,
                node = warning.node_id.as_deref().unwrap_or("-"),
                "{}",
                warning.details
            );
        }
        tracing::info!(
            input_nodes = report.input_node_count,
            output_nodes = report.output_node_count,
            warnings = report.warnings.len(),
            "integrity check complete"
        );
        report
    }

    fn check_strengths(&self, stats: &StrengthStats, warnings: &mut Vec<IntegrityWarning>) {
        if stats.causal_edges < self.config.min_causal_edges {
            return;
        }
        if stats.uniform_ratio() + DEFAULT_MATCH_EPSILON >= self.config.uniform_default_ratio {
            warnings.push(IntegrityWarning {
                code: IntegrityCode::UniformStrengthDefault,
                node_id: None,
                details: format!(
                    "{} of {} causal edges carry default mean and std",
                    stats.default_both, stats.causal_edges
                ),
            });
        }
        if stats.magnitude_ratio() + DEFAULT_MATCH_EPSILON >= self.config.mean_dominant_ratio {
            warnings.push(IntegrityWarning {
                code: IntegrityCode::MeanDominantDefault,
                node_id: None,
                details: format!(
                    "{} of {} causal edges carry the default magnitude",
                    stats.default_magnitude, stats.causal_edges
                ),
            });
        }
    }
}

// =============================================================================
// NODE DETECTORS
// =============================================================================

fn compare_node(raw: &Value, out: &Value, warnings: &mut Vec<IntegrityWarning>) {
    let node_id = display_id(raw);
    let kind = text(raw, "kind").and_then(NodeKind::parse);

    if kind == Some(NodeKind::Factor) && text(raw, "category").is_some() && text(out, "category").is_none() {
        warnings.push(IntegrityWarning {
            code: IntegrityCode::CategoryStripped,
            node_id: node_id.clone(),
            details: format!(
                "factor category `{}` missing from output",
                text(raw, "category").unwrap_or_default()
            ),
        });
    }

    let stripped: Vec<&str> = THRESHOLD_FIELDS
        .into_iter()
        .filter(|f| present(raw.get(*f)) && !present(out.get(*f)))
        .collect();
    if !stripped.is_empty() {
        warnings.push(IntegrityWarning {
            code: IntegrityCode::GoalThresholdStripped,
            node_id: node_id.clone(),
            details: format!("missing from output: {}", stripped.join(", ")),
        });
    }

    let missing: Vec<&str> = ENRICHMENT_FIELDS
        .into_iter()
        .filter(|f| {
            let in_raw = present(raw.pointer(&format!("/data/{}", f)))
                || present(raw.pointer(&format!("/observed_state/{}", f)));
            let in_out = present(out.pointer(&format!("/observed_state/{}", f)))
                || present(out.pointer(&format!("/data/{}", f)));
            in_raw && !in_out
        })
        .collect();
    if !missing.is_empty() {
        warnings.push(IntegrityWarning {
            code: IntegrityCode::EnrichmentMissing,
            node_id: node_id.clone(),
            details: format!("observed state lacks: {}", missing.join(", ")),
        });
    }

    if present(raw.pointer("/data/interventions")) && !present(out.pointer("/data/interventions")) {
        warnings.push(IntegrityWarning {
            code: IntegrityCode::InterventionsEmptied,
            node_id,
            details: "option interventions present raw but empty in output".to_string(),
        });
    }
}

// =============================================================================
// STRENGTH STATISTICS
// =============================================================================

fn near(value: f64, target: f64) -> bool {
    (value - target).abs() <= DEFAULT_MATCH_EPSILON
}

fn strength_stats(graph: &Value) -> StrengthStats {
    let kinds: BTreeMap<&str, NodeKind> = array(graph, "nodes")
        .iter()
        .filter_map(|n| Some((text(n, "id")?, text(n, "kind").and_then(NodeKind::parse)?)))
        .rev()
        .collect();

    let mut stats = StrengthStats::default();
    for edge in array(graph, "edges") {
        let endpoints = (
            text(edge, "from").or_else(|| text(edge, "source")),
            text(edge, "to").or_else(|| text(edge, "target")),
        );
        let (Some(from), Some(to)) = endpoints else {
            continue;
        };
        let (Some(&from_kind), Some(&to_kind)) = (kinds.get(from), kinds.get(to)) else {
            continue;
        };
        if is_structural(from_kind, to_kind) {
            continue;
        }
        let Some(mean) = edge
            .get("strength_mean")
            .and_then(lenient::number_raw)
            .filter(|m| m.is_finite())
        else {
            continue;
        };
        let std = edge
            .get("strength_std")
            .and_then(lenient::number_raw)
            .unwrap_or(f64::NAN);

        stats.causal_edges = stats.causal_edges.saturating_add(1);
        if near(mean.abs(), DEFAULT_STRENGTH_MAGNITUDE) {
            stats.default_magnitude = stats.default_magnitude.saturating_add(1);
            if near(std, DEFAULT_STRENGTH_STD) {
                stats.default_both = stats.default_both.saturating_add(1);
            }
        }
    }
    stats
}

// =============================================================================
// JSON HELPERS
// =============================================================================

fn graph_body(value: &Value) -> &Value {
    match value.get("graph") {
        Some(graph) if graph.is_object() => graph,
        _ => value,
    }
}

fn array<'v>(graph: &'v Value, key: &str) -> &'v [Value] {
    graph
        .get(key)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

fn text<'v>(node: &'v Value, key: &str) -> Option<&'v str> {
    node.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Whether a field carries anything.
fn present(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::String(s)) => !s.trim().is_empty(),
        Some(Value::Array(items)) => !items.is_empty(),
        Some(Value::Object(map)) => !map.is_empty(),
        Some(Value::Bool(_) | Value::Number(_)) => true,
    }
}

/// Normalized id and label of a node, in that order, without duplicates.
fn node_keys(node: &Value) -> Vec<String> {
    let mut keys = Vec::with_capacity(2);
    for field in ["id", "label"] {
        if let Some(raw) = text(node, field) {
            let key = normalize_id(raw);
            if !key.is_empty() && !keys.contains(&key) {
                keys.push(key);
            }
        }
    }
    keys
}

/// First node per normalized key.
fn key_index(nodes: &[Value]) -> BTreeMap<String, &Value> {
    let mut index = BTreeMap::new();
    for node in nodes {
        for key in node_keys(node) {
            index.entry(key).or_insert(node);
        }
    }
    index
}

fn display_id(node: &Value) -> Option<String> {
    text(node, "id")
        .or_else(|| text(node, "label"))
        .map(str::to_string)
}

// =============================================================================
// TESTS
// =============================================================================
