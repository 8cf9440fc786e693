//! # Pipeline Configuration
//!
//! Tunables for the deterministic stages. Every field defaults to the
//! matching constant in [`crate::primitives`], so an empty document is a
//! valid configuration.

use crate::DagwrightError;
use crate::primitives::{
    DEFAULT_EDGE_ORIGIN, DEFAULT_MAX_EDGES, DEFAULT_MAX_NODES, MAX_SWEEP_ITERATIONS,
    MEAN_DOMINANT_RATIO, MIN_CAUSAL_EDGES_FOR_STATS, UNIFORM_DEFAULT_RATIO,
};
use serde::{Deserialize, Serialize};

/// Node and edge caps enforced by the validator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GraphLimits {
    pub max_nodes: usize,
    pub max_edges: usize,
}

impl Default for GraphLimits {
    fn default() -> Self {
        Self {
            max_nodes: DEFAULT_MAX_NODES,
            max_edges: DEFAULT_MAX_EDGES,
        }
    }
}

/// Sweep loop settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SweepConfig {
    pub max_iterations: usize,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            max_iterations: MAX_SWEEP_ITERATIONS,
        }
    }
}

/// External response settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExportConfig {
    pub default_edge_origin: String,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            default_edge_origin: DEFAULT_EDGE_ORIGIN.to_string(),
        }
    }
}

/// Integrity sentinel thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SentinelConfig {
    pub uniform_default_ratio: f64,
    pub mean_dominant_ratio: f64,
    pub min_causal_edges: usize,
}

impl Default for SentinelConfig {
    fn default() -> Self {
        Self {
            uniform_default_ratio: UNIFORM_DEFAULT_RATIO,
            mean_dominant_ratio: MEAN_DOMINANT_RATIO,
            min_causal_edges: MIN_CAUSAL_EDGES_FOR_STATS,
        }
    }
}

/// Top-level configuration for one [`crate::Pipeline`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    pub limits: GraphLimits,
    pub sweep: SweepConfig,
    pub export: ExportConfig,
    pub sentinel: SentinelConfig,
}

impl PipelineConfig {
    /// Reject values that would make a stage meaningless.
    pub fn validate(&self) -> Result<(), DagwrightError> {
        if self.limits.max_nodes == 0 || self.limits.max_edges == 0 {
            return Err(DagwrightError::InvalidConfig(
                "limits.max_nodes and limits.max_edges must be positive".to_string(),
            ));
        }
        if self.sweep.max_iterations == 0 {
            return Err(DagwrightError::InvalidConfig(
                "sweep.max_iterations must be positive".to_string(),
            ));
        }
        if self.export.default_edge_origin.trim().is_empty() {
            return Err(DagwrightError::InvalidConfig(
                "export.default_edge_origin must not be empty".to_string(),
            ));
        }
        for (name, ratio) in [
            ("sentinel.uniform_default_ratio", self.sentinel.uniform_default_ratio),
            ("sentinel.mean_dominant_ratio", self.sentinel.mean_dominant_ratio),
        ] {
            if !(ratio > 0.0 && ratio <= 1.0) {
                return Err(DagwrightError::InvalidConfig(format!(
                    "{} must lie in (0, 1], got {}",
                    name, ratio
                )));
            }
        }
        if self.sentinel.min_causal_edges == 0 {
            return Err(DagwrightError::InvalidConfig(
                "sentinel.min_causal_edges must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_primitives() {
        let config = PipelineConfig::default();
        assert_eq!(config.limits.max_nodes, 50);
        assert_eq!(config.limits.max_edges, 200);
        assert_eq!(config.sweep.max_iterations, 10);
        assert_eq!(config.export.default_edge_origin, "ai");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_document_keeps_other_defaults() {
        let config: PipelineConfig =
            serde_json::from_str(r#"{"limits": {"max_nodes": 12}}"#).expect("parse");
        assert_eq!(config.limits.max_nodes, 12);
        assert_eq!(config.limits.max_edges, 200);
        assert_eq!(config.sentinel.min_causal_edges, 3);
    }

    #[test]
    fn rejects_out_of_range_ratio() {
        let mut config = PipelineConfig::default();
        config.sentinel.mean_dominant_ratio = 1.5;
        assert!(matches!(
            config.validate(),
            Err(DagwrightError::InvalidConfig(_))
        ));
    }

    #[test]
    fn rejects_zero_iterations() {
        let mut config = PipelineConfig::default();
        config.sweep.max_iterations = 0;
        assert!(config.validate().is_err());
    }
}
