//! # Threshold Grounding
//!
//! Goal nodes may declare a numeric success threshold. A threshold is
//! grounded only when it is backed by an explicit raw value and a unit; a
//! normalized `goal_threshold` with nothing behind it is a generator guess.
//!
//! The pass strips every threshold field of an ungrounded goal and leaves
//! grounded goals untouched. It touches nothing but goal-threshold fields.

use crate::graph::Graph;
use crate::types::{GoalThreshold, NodeBody};
use serde::Serialize;

/// One goal whose threshold was removed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StrippedThreshold {
    pub goal_id: String,
    /// Field names that were present before stripping.
    pub fields: Vec<&'static str>,
}

/// What the threshold pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ThresholdTrace {
    /// Goals that declared any threshold field.
    pub goals_checked: usize,
    /// Ids of goals whose threshold was kept.
    pub retained: Vec<String>,
    pub stripped: Vec<StrippedThreshold>,
}

/// Strip ungrounded goal thresholds in place.
pub fn ground_thresholds(graph: &mut Graph) -> ThresholdTrace {
    let mut trace = ThresholdTrace::default();

    for node in &mut graph.nodes {
        let NodeBody::Goal(threshold) = &mut node.body else {
            continue;
        };
        if threshold.is_empty() {
            continue;
        }
        trace.goals_checked = trace.goals_checked.saturating_add(1);

        if threshold.is_grounded() {
            trace.retained.push(node.id.clone());
            continue;
        }

        let fields = declared_fields(threshold);
        *threshold = GoalThreshold::default();
        tracing::debug!(goal = %node.id, fields = %fields.join(","), "stripped ungrounded goal threshold");
        trace.stripped.push(StrippedThreshold {
            goal_id: node.id.clone(),
            fields,
        });
    }

    tracing::info!(
        checked = trace.goals_checked,
        stripped = trace.stripped.len(),
        "threshold pass complete"
    );
    trace
}

fn declared_fields(threshold: &GoalThreshold) -> Vec<&'static str> {
    [
        ("goal_threshold", threshold.threshold.is_some()),
        ("goal_threshold_raw", threshold.raw.is_some()),
        ("goal_threshold_unit", threshold.unit.is_some()),
        ("goal_threshold_cap", threshold.cap.is_some()),
    ]
    .into_iter()
    .filter_map(|(name, present)| present.then_some(name))
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Node, NodeKind};

    fn goal(threshold: GoalThreshold) -> Graph {
        let mut node = Node::new("goal", NodeKind::Goal, "Revenue");
        node.body = NodeBody::Goal(threshold);
        let mut graph = Graph::new();
        graph.nodes.push(node);
        graph
    }

    #[test]
    fn grounded_threshold_is_kept() {
        let threshold = GoalThreshold {
            threshold: Some(0.8),
            raw: Some(800_000.0),
            unit: Some("GBP".into()),
            cap: Some(1_000_000.0),
        };
        let mut graph = goal(threshold.clone());
        let trace = ground_thresholds(&mut graph);
        assert_eq!(trace.retained, vec!["goal".to_string()]);
        assert_eq!(graph.nodes[0].goal_threshold(), Some(&threshold));
    }

    #[test]
    fn inferred_threshold_is_stripped() {
        let mut graph = goal(GoalThreshold {
            threshold: Some(0.7),
            raw: None,
            unit: Some("percent".into()),
            cap: None,
        });
        let trace = ground_thresholds(&mut graph);
        assert_eq!(trace.stripped.len(), 1);
        assert_eq!(
            trace.stripped[0].fields,
            vec!["goal_threshold", "goal_threshold_unit"]
        );
        assert!(graph.nodes[0].goal_threshold().is_some_and(GoalThreshold::is_empty));
    }

    #[test]
    fn blank_unit_is_not_grounding() {
        let mut graph = goal(GoalThreshold {
            threshold: None,
            raw: Some(5.0),
            unit: Some("  ".into()),
            cap: None,
        });
        assert_eq!(ground_thresholds(&mut graph).stripped.len(), 1);
    }

    #[test]
    fn pass_is_idempotent() {
        let mut graph = goal(GoalThreshold {
            threshold: Some(0.5),
            ..GoalThreshold::default()
        });
        ground_thresholds(&mut graph);
        let snapshot = graph.clone();
        let second = ground_thresholds(&mut graph);
        assert_eq!(second.goals_checked, 0);
        assert_eq!(graph, snapshot);
    }
}
