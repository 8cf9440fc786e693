//! # Innate Primitives
//!
//! Hardcoded constants for the dagwright CORE.
//!
//! These values are compiled into the binary. Anything an operator may want
//! to tune is mirrored in [`crate::config::PipelineConfig`], which takes these
//! as its defaults.

// =============================================================================
// STRENGTH DEFAULTS
// =============================================================================

/// Magnitude written into an edge whose `strength_mean` is not finite.
///
/// The sign follows the edge's `effect_direction`.
pub const DEFAULT_STRENGTH_MAGNITUDE: f64 = 0.5;

/// Spread written into an edge whose `strength_std` is not finite or not positive.
pub const DEFAULT_STRENGTH_STD: f64 = 0.125;

/// Belief written into an edge whose `belief_exists` is not finite.
pub const DEFAULT_BELIEF_EXISTS: f64 = 1.0;

/// Tolerance used when deciding whether a value "is" one of the defaults.
pub const DEFAULT_MATCH_EPSILON: f64 = 1e-9;

// =============================================================================
// SWEEP LIMITS
// =============================================================================

/// Maximum number of validate/repair passes before the sweep gives up.
///
/// Bounds latency and guarantees termination regardless of input.
pub const MAX_SWEEP_ITERATIONS: usize = 10;

// =============================================================================
// GRAPH CAPS
// =============================================================================

/// Default cap on the number of nodes in a candidate graph.
pub const DEFAULT_MAX_NODES: usize = 50;

/// Default cap on the number of edges in a candidate graph.
pub const DEFAULT_MAX_EDGES: usize = 200;

// =============================================================================
// EXPORT
// =============================================================================

/// Version tag of the external response contract.
pub const RESPONSE_SCHEMA_VERSION: &str = "v3";

/// Origin written onto public edges that do not carry one.
pub const DEFAULT_EDGE_ORIGIN: &str = "ai";

/// Origin stamped onto edges added by the reconciler.
pub const REPAIR_EDGE_ORIGIN: &str = "repair";

// =============================================================================
// SENTINEL THRESHOLDS
// =============================================================================

/// Share of causal edges at default mean AND default std that fires
/// the "uniform default" signal.
pub const UNIFORM_DEFAULT_RATIO: f64 = 0.8;

/// Share of causal edges at default magnitude that fires the
/// "mean-dominant default" signal.
pub const MEAN_DOMINANT_RATIO: f64 = 0.7;

/// Fewer qualifying causal edges than this and neither statistical signal fires.
pub const MIN_CAUSAL_EDGES_FOR_STATS: usize = 3;

// =============================================================================
// RESOLVER
// =============================================================================

/// Minimum length of the substantive stem of a constraint target.
///
/// Shorter targets are rejected as junk before any matching is attempted.
pub const MIN_TARGET_STEM_LEN: usize = 4;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sweep_cap_is_ten() {
        assert_eq!(MAX_SWEEP_ITERATIONS, 10);
    }

    #[test]
    fn default_std_is_quarter_of_magnitude() {
        assert!((DEFAULT_STRENGTH_MAGNITUDE / 4.0 - DEFAULT_STRENGTH_STD).abs() < DEFAULT_MATCH_EPSILON);
    }

    #[test]
    fn sentinel_ratios_are_ordered() {
        assert!(MEAN_DOMINANT_RATIO < UNIFORM_DEFAULT_RATIO);
    }
}
