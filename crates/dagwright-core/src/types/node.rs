//! Node model.
//!
//! On the wire a node is a flat JSON object with a `kind` string. Internally
//! the kind and its payload are one closed enum, [`NodeBody`], so every
//! validation and repair site matches kinds exhaustively. Keys the model does
//! not recognize are kept in `extra` and written back verbatim.

use super::lenient;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

// =============================================================================
// NODE KIND
// =============================================================================

/// Kind of a decision-graph node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Goal,
    Decision,
    Option,
    Factor,
    Outcome,
    Risk,
    Action,
    Constraint,
}

impl NodeKind {
    pub const ALL: [NodeKind; 8] = [
        NodeKind::Goal,
        NodeKind::Decision,
        NodeKind::Option,
        NodeKind::Factor,
        NodeKind::Outcome,
        NodeKind::Risk,
        NodeKind::Action,
        NodeKind::Constraint,
    ];

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Goal => "goal",
            NodeKind::Decision => "decision",
            NodeKind::Option => "option",
            NodeKind::Factor => "factor",
            NodeKind::Outcome => "outcome",
            NodeKind::Risk => "risk",
            NodeKind::Action => "action",
            NodeKind::Constraint => "constraint",
        }
    }

    /// Case-insensitive parse.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let lowered = raw.trim().to_ascii_lowercase();
        Self::ALL.into_iter().find(|k| k.as_str() == lowered)
    }

    /// Kinds that take part in the causal backbone.
    #[must_use]
    pub fn is_causal(&self) -> bool {
        matches!(
            self,
            NodeKind::Factor | NodeKind::Outcome | NodeKind::Risk | NodeKind::Action
        )
    }
}

impl<'de> Deserialize<'de> for NodeKind {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        NodeKind::parse(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown node kind `{}`", raw)))
    }
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// FACTOR PAYLOAD
// =============================================================================

/// Who controls a factor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FactorCategory {
    Controllable,
    Observable,
    External,
}

impl FactorCategory {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            FactorCategory::Controllable => "controllable",
            FactorCategory::Observable => "observable",
            FactorCategory::External => "external",
        }
    }

    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "controllable" => Some(FactorCategory::Controllable),
            "observable" => Some(FactorCategory::Observable),
            "external" => Some(FactorCategory::External),
            _ => None,
        }
    }

    /// Controllable and observable factors must carry a value plus provenance.
    #[must_use]
    pub fn requires_value(&self) -> bool {
        match self {
            FactorCategory::Controllable | FactorCategory::Observable => true,
            FactorCategory::External => false,
        }
    }
}

/// Where a factor value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionType {
    Explicit,
    Inferred,
    Observed,
    Range,
}

impl ExtractionType {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ExtractionType::Explicit => "explicit",
            ExtractionType::Inferred => "inferred",
            ExtractionType::Observed => "observed",
            ExtractionType::Range => "range",
        }
    }

    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "explicit" => Some(ExtractionType::Explicit),
            "inferred" => Some(ExtractionType::Inferred),
            "observed" => Some(ExtractionType::Observed),
            "range" => Some(ExtractionType::Range),
            _ => None,
        }
    }
}

/// Numeric range on a factor value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ValueRange {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
}

const KEY_VALUE: &str = "value";
const KEY_BASELINE: &str = "baseline";
const KEY_UNIT: &str = "unit";
const KEY_RANGE: &str = "range";
const KEY_EXTRACTION: &str = "extractionType";
const KEY_RAW_VALUE: &str = "raw_value";
const KEY_CAP: &str = "cap";
const KEY_FACTOR_TYPE: &str = "factor_type";
const KEY_DRIVERS: &str = "uncertainty_drivers";

/// Keys an external factor must never carry.
pub(crate) const EXTERNAL_PROHIBITED_KEYS: [&str; 7] = [
    KEY_VALUE,
    KEY_BASELINE,
    KEY_UNIT,
    KEY_RANGE,
    KEY_EXTRACTION,
    KEY_RAW_VALUE,
    KEY_CAP,
];

/// Typed factor `data`.
///
/// Keys that fail to parse stay in `extra` under their original name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FactorData {
    pub value: Option<f64>,
    pub baseline: Option<f64>,
    pub unit: Option<String>,
    pub range: Option<ValueRange>,
    pub extraction_type: Option<ExtractionType>,
    pub raw_value: Option<f64>,
    pub cap: Option<f64>,
    pub factor_type: Option<String>,
    pub uncertainty_drivers: Option<Vec<String>>,
    pub extra: Map<String, Value>,
}

impl FactorData {
    /// A data block holding just a value and its provenance.
    #[must_use]
    pub fn with_value(value: f64, extraction_type: ExtractionType) -> Self {
        Self {
            value: Some(value),
            extraction_type: Some(extraction_type),
            ..Self::default()
        }
    }

    /// Parse a raw `data` object.
    #[must_use]
    pub fn from_map(map: Map<String, Value>) -> Self {
        let mut data = Self::default();
        for (key, value) in map {
            let parsed = match key.as_str() {
                KEY_VALUE => lenient::finite_number(&value).map(|n| data.value = Some(n)),
                KEY_BASELINE => lenient::finite_number(&value).map(|n| data.baseline = Some(n)),
                KEY_RAW_VALUE => lenient::finite_number(&value).map(|n| data.raw_value = Some(n)),
                KEY_CAP => lenient::finite_number(&value).map(|n| data.cap = Some(n)),
                KEY_UNIT => value.as_str().map(|s| data.unit = Some(s.to_string())),
                KEY_FACTOR_TYPE => value.as_str().map(|s| data.factor_type = Some(s.to_string())),
                KEY_EXTRACTION => value
                    .as_str()
                    .and_then(ExtractionType::parse)
                    .map(|t| data.extraction_type = Some(t)),
                KEY_RANGE => serde_json::from_value::<ValueRange>(value.clone())
                    .ok()
                    .map(|r| data.range = Some(r)),
                KEY_DRIVERS => value.as_array().map(|items| {
                    data.uncertainty_drivers = Some(
                        items
                            .iter()
                            .filter_map(|v| v.as_str().map(str::to_string))
                            .collect(),
                    );
                }),
                _ => None,
            };
            if parsed.is_none() {
                data.extra.insert(key, value);
            }
        }
        data
    }

    /// Render back to a raw `data` object.
    #[must_use]
    pub fn to_map(&self) -> Map<String, Value> {
        let mut map = Map::new();
        if let Some(v) = self.value {
            map.insert(KEY_VALUE.into(), lenient::number_value(v));
        }
        if let Some(v) = self.baseline {
            map.insert(KEY_BASELINE.into(), lenient::number_value(v));
        }
        if let Some(u) = &self.unit {
            map.insert(KEY_UNIT.into(), Value::String(u.clone()));
        }
        if let Some(r) = &self.range {
            if let Ok(v) = serde_json::to_value(r) {
                map.insert(KEY_RANGE.into(), v);
            }
        }
        if let Some(t) = self.extraction_type {
            map.insert(KEY_EXTRACTION.into(), Value::String(t.as_str().into()));
        }
        if let Some(v) = self.raw_value {
            map.insert(KEY_RAW_VALUE.into(), lenient::number_value(v));
        }
        if let Some(v) = self.cap {
            map.insert(KEY_CAP.into(), lenient::number_value(v));
        }
        if let Some(t) = &self.factor_type {
            map.insert(KEY_FACTOR_TYPE.into(), Value::String(t.clone()));
        }
        if let Some(d) = &self.uncertainty_drivers {
            map.insert(
                KEY_DRIVERS.into(),
                Value::Array(d.iter().cloned().map(Value::String).collect()),
            );
        }
        for (k, v) in &self.extra {
            map.entry(k.clone()).or_insert_with(|| v.clone());
        }
        map
    }

    /// Names of populated fields an external factor is not allowed to carry.
    #[must_use]
    pub fn prohibited_external_fields(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.value.is_some() {
            fields.push(KEY_VALUE);
        }
        if self.baseline.is_some() {
            fields.push(KEY_BASELINE);
        }
        if self.unit.is_some() {
            fields.push(KEY_UNIT);
        }
        if self.range.is_some() {
            fields.push(KEY_RANGE);
        }
        if self.extraction_type.is_some() {
            fields.push(KEY_EXTRACTION);
        }
        if self.raw_value.is_some() {
            fields.push(KEY_RAW_VALUE);
        }
        if self.cap.is_some() {
            fields.push(KEY_CAP);
        }
        for key in EXTERNAL_PROHIBITED_KEYS {
            if self.extra.contains_key(key) && !fields.contains(&key) {
                fields.push(key);
            }
        }
        fields
    }

    /// Whether what remains matches the one shape allowed for external factors:
    /// a factor type and/or uncertainty drivers.
    #[must_use]
    pub fn satisfies_external_shape(&self) -> bool {
        self.factor_type.as_deref().is_some_and(|t| !t.trim().is_empty())
            || self
                .uncertainty_drivers
                .as_ref()
                .is_some_and(|d| !d.is_empty())
    }

    /// Drop every field prohibited on external factors.
    pub fn strip_external_prohibited(&mut self) {
        self.value = None;
        self.baseline = None;
        self.unit = None;
        self.range = None;
        self.extraction_type = None;
        self.raw_value = None;
        self.cap = None;
        for key in EXTERNAL_PROHIBITED_KEYS {
            self.extra.remove(key);
        }
    }
}

/// Factor payload: category plus typed data.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FactorBody {
    pub category: Option<FactorCategory>,
    pub data: Option<FactorData>,
}

// =============================================================================
// OTHER PAYLOADS
// =============================================================================

/// Goal-threshold fields. All optional; grounding is decided by the threshold pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GoalThreshold {
    pub threshold: Option<f64>,
    pub raw: Option<f64>,
    pub unit: Option<String>,
    pub cap: Option<f64>,
}

impl GoalThreshold {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.threshold.is_none() && self.raw.is_none() && self.unit.is_none() && self.cap.is_none()
    }

    /// Backed by an explicit raw value and a unit.
    #[must_use]
    pub fn is_grounded(&self) -> bool {
        self.raw.is_some_and(f64::is_finite)
            && self.unit.as_deref().is_some_and(|u| !u.trim().is_empty())
    }
}

/// Option payload: interventions keyed by factor id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OptionData {
    pub interventions: Map<String, Value>,
    pub extra: Map<String, Value>,
}

impl OptionData {
    #[must_use]
    pub fn from_map(mut map: Map<String, Value>) -> Self {
        let interventions = match map.remove("interventions") {
            Some(Value::Object(obj)) => obj,
            Some(other) => {
                map.insert("interventions".into(), other);
                Map::new()
            }
            None => Map::new(),
        };
        Self {
            interventions,
            extra: map,
        }
    }

    #[must_use]
    pub fn to_map(&self) -> Map<String, Value> {
        let mut map = Map::new();
        if !self.interventions.is_empty() {
            map.insert(
                "interventions".into(),
                Value::Object(self.interventions.clone()),
            );
        }
        for (k, v) in &self.extra {
            map.entry(k.clone()).or_insert_with(|| v.clone());
        }
        map
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.interventions.is_empty() && self.extra.is_empty()
    }
}

/// Kind-specific node payload.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeBody {
    Goal(GoalThreshold),
    Decision,
    Option(OptionData),
    Factor(FactorBody),
    Outcome,
    Risk,
    Action,
    Constraint,
}

impl NodeBody {
    /// Empty payload for a kind.
    #[must_use]
    pub fn empty(kind: NodeKind) -> Self {
        match kind {
            NodeKind::Goal => NodeBody::Goal(GoalThreshold::default()),
            NodeKind::Decision => NodeBody::Decision,
            NodeKind::Option => NodeBody::Option(OptionData::default()),
            NodeKind::Factor => NodeBody::Factor(FactorBody::default()),
            NodeKind::Outcome => NodeBody::Outcome,
            NodeKind::Risk => NodeBody::Risk,
            NodeKind::Action => NodeBody::Action,
            NodeKind::Constraint => NodeBody::Constraint,
        }
    }

    #[must_use]
    pub fn kind(&self) -> NodeKind {
        match self {
            NodeBody::Goal(_) => NodeKind::Goal,
            NodeBody::Decision => NodeKind::Decision,
            NodeBody::Option(_) => NodeKind::Option,
            NodeBody::Factor(_) => NodeKind::Factor,
            NodeBody::Outcome => NodeKind::Outcome,
            NodeBody::Risk => NodeKind::Risk,
            NodeBody::Action => NodeKind::Action,
            NodeBody::Constraint => NodeKind::Constraint,
        }
    }
}

// =============================================================================
// OBSERVED STATE
// =============================================================================

/// The observed-state view of a factor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObservedState {
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient::opt_f64")]
    pub value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient::opt_f64")]
    pub baseline: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient::opt_f64")]
    pub raw_value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient::opt_f64")]
    pub cap: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub factor_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uncertainty_drivers: Option<Vec<String>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

// =============================================================================
// NODE
// =============================================================================

/// A node of the decision graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "NodeRecord", into = "NodeRecord")]
pub struct Node {
    pub id: String,
    pub label: String,
    pub body: NodeBody,
    pub observed_state: Option<ObservedState>,
    /// Unrecognized keys, written back verbatim.
    pub extra: Map<String, Value>,
}

impl Node {
    /// Create a node with an empty payload for its kind.
    pub fn new(id: impl Into<String>, kind: NodeKind, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            body: NodeBody::empty(kind),
            observed_state: None,
            extra: Map::new(),
        }
    }

    /// Create a factor node.
    pub fn factor(
        id: impl Into<String>,
        label: impl Into<String>,
        category: Option<FactorCategory>,
        data: Option<FactorData>,
    ) -> Self {
        let mut node = Self::new(id, NodeKind::Factor, label);
        node.body = NodeBody::Factor(FactorBody { category, data });
        node
    }

    #[must_use]
    pub fn kind(&self) -> NodeKind {
        self.body.kind()
    }

    /// Factor payload, if this is a factor.
    #[must_use]
    pub fn factor_body(&self) -> Option<&FactorBody> {
        match &self.body {
            NodeBody::Factor(body) => Some(body),
            _ => None,
        }
    }

    /// Goal threshold, if this is a goal.
    #[must_use]
    pub fn goal_threshold(&self) -> Option<&GoalThreshold> {
        match &self.body {
            NodeBody::Goal(threshold) => Some(threshold),
            _ => None,
        }
    }
}

/// Flat wire shape of a node.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct NodeRecord {
    id: String,
    kind: NodeKind,
    #[serde(default)]
    label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    category: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    observed_state: Option<ObservedState>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient::opt_f64")]
    goal_threshold: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient::opt_f64")]
    goal_threshold_raw: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient::opt_string")]
    goal_threshold_unit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient::opt_f64")]
    goal_threshold_cap: Option<f64>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

impl From<NodeRecord> for Node {
    fn from(record: NodeRecord) -> Self {
        let mut extra = record.extra;
        let threshold = GoalThreshold {
            threshold: record.goal_threshold,
            raw: record.goal_threshold_raw,
            unit: record.goal_threshold_unit,
            cap: record.goal_threshold_cap,
        };

        let body = match record.kind {
            NodeKind::Goal => {
                stash(&mut extra, "category", record.category);
                stash(&mut extra, "data", record.data);
                NodeBody::Goal(threshold)
            }
            NodeKind::Option => {
                stash(&mut extra, "category", record.category);
                stash_threshold(&mut extra, &threshold);
                let data = match record.data {
                    Some(Value::Object(map)) => OptionData::from_map(map),
                    other => {
                        stash(&mut extra, "data", other);
                        OptionData::default()
                    }
                };
                NodeBody::Option(data)
            }
            NodeKind::Factor => {
                stash_threshold(&mut extra, &threshold);
                let category = match record.category {
                    Some(Value::String(raw)) => match FactorCategory::parse(&raw) {
                        Some(category) => Some(category),
                        None => {
                            extra.insert("category".into(), Value::String(raw));
                            None
                        }
                    },
                    other => {
                        stash(&mut extra, "category", other);
                        None
                    }
                };
                let data = match record.data {
                    Some(Value::Object(map)) => Some(FactorData::from_map(map)),
                    other => {
                        stash(&mut extra, "data", other);
                        None
                    }
                };
                NodeBody::Factor(FactorBody { category, data })
            }
            kind @ (NodeKind::Decision
            | NodeKind::Outcome
            | NodeKind::Risk
            | NodeKind::Action
            | NodeKind::Constraint) => {
                stash(&mut extra, "category", record.category);
                stash(&mut extra, "data", record.data);
                stash_threshold(&mut extra, &threshold);
                NodeBody::empty(kind)
            }
        };

        Self {
            id: record.id,
            label: record.label,
            body,
            observed_state: record.observed_state,
            extra,
        }
    }
}

impl From<Node> for NodeRecord {
    fn from(node: Node) -> Self {
        let kind = node.kind();
        let mut record = NodeRecord {
            id: node.id,
            kind,
            label: node.label,
            category: None,
            data: None,
            observed_state: node.observed_state,
            goal_threshold: None,
            goal_threshold_raw: None,
            goal_threshold_unit: None,
            goal_threshold_cap: None,
            extra: node.extra,
        };
        match node.body {
            NodeBody::Goal(threshold) => {
                record.goal_threshold = threshold.threshold;
                record.goal_threshold_raw = threshold.raw;
                record.goal_threshold_unit = threshold.unit;
                record.goal_threshold_cap = threshold.cap;
            }
            NodeBody::Option(data) => {
                if !data.is_empty() {
                    record.data = Some(Value::Object(data.to_map()));
                }
            }
            NodeBody::Factor(body) => {
                record.category = body.category.map(|c| Value::String(c.as_str().into()));
                record.data = body.data.map(|d| Value::Object(d.to_map()));
            }
            NodeBody::Decision
            | NodeBody::Outcome
            | NodeBody::Risk
            | NodeBody::Action
            | NodeBody::Constraint => {}
        }
        // A stashed key must not shadow a typed field written above.
        for key in ["category", "data"] {
            let typed = match key {
                "category" => record.category.is_some(),
                _ => record.data.is_some(),
            };
            if typed {
                record.extra.remove(key);
            }
        }
        record
    }
}

fn stash(extra: &mut Map<String, Value>, key: &str, value: Option<Value>) {
    if let Some(value) = value {
        extra.insert(key.to_string(), value);
    }
}

fn stash_threshold(extra: &mut Map<String, Value>, threshold: &GoalThreshold) {
    if let Some(v) = threshold.threshold {
        extra.insert("goal_threshold".into(), lenient::number_value(v));
    }
    if let Some(v) = threshold.raw {
        extra.insert("goal_threshold_raw".into(), lenient::number_value(v));
    }
    if let Some(u) = &threshold.unit {
        extra.insert("goal_threshold_unit".into(), Value::String(u.clone()));
    }
    if let Some(v) = threshold.cap {
        extra.insert("goal_threshold_cap".into(), lenient::number_value(v));
    }
}

// =============================================================================
// TESTS
// =============================================================================
