//! Edge model.

use super::lenient;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

// =============================================================================
// EFFECT DIRECTION
// =============================================================================

/// Sign of a causal effect.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EffectDirection {
    #[default]
    Positive,
    Negative,
}

impl EffectDirection {
    /// `1.0` or `-1.0`.
    #[must_use]
    pub fn sign(&self) -> f64 {
        match self {
            EffectDirection::Positive => 1.0,
            EffectDirection::Negative => -1.0,
        }
    }

    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "positive" | "+" | "increase" | "increases" => Some(EffectDirection::Positive),
            "negative" | "-" | "decrease" | "decreases" => Some(EffectDirection::Negative),
            _ => None,
        }
    }
}

impl<'de> Deserialize<'de> for EffectDirection {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        // Unreadable directions fall back to positive rather than failing the graph.
        let value = Value::deserialize(deserializer)?;
        Ok(value
            .as_str()
            .and_then(EffectDirection::parse)
            .unwrap_or_default())
    }
}

// =============================================================================
// PROVENANCE
// =============================================================================

/// Where an edge claim came from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "ProvenanceRecord")]
pub struct Provenance {
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quote: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Provenance {
    pub fn from_source(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            ..Self::default()
        }
    }
}

/// Either a bare string or a structured provenance object.
#[derive(Deserialize)]
#[serde(untagged)]
enum ProvenanceRecord {
    Text(String),
    Full {
        #[serde(default, deserialize_with = "lenient::opt_string")]
        source: Option<String>,
        #[serde(default, deserialize_with = "lenient::opt_string")]
        quote: Option<String>,
        #[serde(default, deserialize_with = "lenient::opt_string")]
        location: Option<String>,
        #[serde(flatten)]
        extra: Map<String, Value>,
    },
}

impl From<ProvenanceRecord> for Provenance {
    fn from(record: ProvenanceRecord) -> Self {
        match record {
            ProvenanceRecord::Text(source) => Provenance::from_source(source),
            ProvenanceRecord::Full {
                source,
                quote,
                location,
                extra,
            } => Provenance {
                source: source.unwrap_or_default(),
                quote,
                location,
                extra,
            },
        }
    }
}

// =============================================================================
// EDGE
// =============================================================================

/// A directed edge between two nodes.
///
/// Numeric fields are kept as raw `f64` (possibly NaN) so that malformed
/// generator output survives parsing and is reported by the validator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient::opt_string")]
    pub id: Option<String>,
    #[serde(default, alias = "source", deserialize_with = "lenient::string_or_empty")]
    pub from: String,
    #[serde(default, alias = "target", deserialize_with = "lenient::string_or_empty")]
    pub to: String,
    #[serde(default = "lenient::nan", deserialize_with = "lenient::f64_or_nan", serialize_with = "ser_f64")]
    pub strength_mean: f64,
    #[serde(default = "lenient::nan", deserialize_with = "lenient::f64_or_nan", serialize_with = "ser_f64")]
    pub strength_std: f64,
    #[serde(
        default = "lenient::nan",
        alias = "exists_probability",
        deserialize_with = "lenient::f64_or_nan",
        serialize_with = "ser_f64"
    )]
    pub belief_exists: f64,
    #[serde(default)]
    pub effect_direction: EffectDirection,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient::opt_string")]
    pub origin: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provenance: Option<Provenance>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Edge {
    /// A fully specified positive edge with no id.
    pub fn new(from: impl Into<String>, to: impl Into<String>, mean: f64, std: f64) -> Self {
        Self {
            id: None,
            from: from.into(),
            to: to.into(),
            strength_mean: mean,
            strength_std: std,
            belief_exists: 1.0,
            effect_direction: if mean < 0.0 {
                EffectDirection::Negative
            } else {
                EffectDirection::Positive
            },
            origin: None,
            provenance: None,
            extra: Map::new(),
        }
    }

    /// Endpoint pair used to key snapshots.
    #[must_use]
    pub fn endpoints(&self) -> (String, String) {
        (self.from.clone(), self.to.clone())
    }

    /// All numeric fields are finite and in range.
    #[must_use]
    pub fn has_valid_numerics(&self) -> bool {
        self.strength_mean.is_finite()
            && (-1.0..=1.0).contains(&self.strength_mean)
            && self.strength_std.is_finite()
            && self.strength_std > 0.0
            && self.belief_exists.is_finite()
            && (0.0..=1.0).contains(&self.belief_exists)
    }
}

fn ser_f64<S>(value: &f64, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    lenient::number_value(*value).serialize(serializer)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn lenient_numerics_and_aliases() {
        let edge: Edge = serde_json::from_value(json!({
            "source": "a",
            "target": "b",
            "strength_mean": "NaN",
            "strength_std": "0.2",
            "exists_probability": 0.9,
            "effect_direction": "decrease"
        }))
        .expect("parse");
        assert_eq!(edge.from, "a");
        assert_eq!(edge.to, "b");
        assert!(edge.strength_mean.is_nan());
        assert_eq!(edge.strength_std, 0.2);
        assert_eq!(edge.belief_exists, 0.9);
        assert_eq!(edge.effect_direction, EffectDirection::Negative);
    }

    #[test]
    fn missing_numerics_are_nan() {
        let edge: Edge = serde_json::from_value(json!({"from": "a", "to": "b"})).expect("parse");
        assert!(edge.strength_mean.is_nan());
        assert!(edge.belief_exists.is_nan());
        assert_eq!(edge.effect_direction, EffectDirection::Positive);
        assert!(!edge.has_valid_numerics());
    }

    #[test]
    fn missing_endpoints_parse_as_empty() {
        let edge: Edge = serde_json::from_value(json!({"to": "goal", "strength_mean": 0.3}))
            .expect("parse");
        assert_eq!(edge.from, "");
        assert_eq!(edge.to, "goal");

        let edge: Edge = serde_json::from_value(json!({"from": 7, "to": null})).expect("parse");
        assert_eq!(edge.from, "7");
        assert_eq!(edge.to, "");
    }

    #[test]
    fn provenance_accepts_string_or_object() {
        let a: Edge = serde_json::from_value(json!({
            "from": "a", "to": "b", "provenance": "brief"
        }))
        .expect("parse");
        assert_eq!(a.provenance.map(|p| p.source), Some("brief".to_string()));

        let b: Edge = serde_json::from_value(json!({
            "from": "a", "to": "b",
            "provenance": {"source": "doc", "quote": "x", "page": 3}
        }))
        .expect("parse");
        let p = b.provenance.expect("provenance");
        assert_eq!(p.source, "doc");
        assert_eq!(p.quote.as_deref(), Some("x"));
        assert_eq!(p.extra.get("page"), Some(&json!(3)));
    }

    #[test]
    fn non_finite_serializes_as_null_and_extra_survives() {
        let edge: Edge = serde_json::from_value(json!({
            "from": "a", "to": "b", "strength_mean": "nan", "weight_hint": 7
        }))
        .expect("parse");
        let back = serde_json::to_value(&edge).expect("serialize");
        assert_eq!(back["strength_mean"], Value::Null);
        assert_eq!(back["weight_hint"], json!(7));
    }
}
