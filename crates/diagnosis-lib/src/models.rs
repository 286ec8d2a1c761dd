//! Core data models for the diagnosis service

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::predictor::DecisionPath;

/// Diagnostic category served by its own trained model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Condition {
    Diabetes,
    Heart,
    Parkinsons,
}

impl Condition {
    /// Every supported condition, in display order
    pub const ALL: [Condition; 3] = [Condition::Diabetes, Condition::Heart, Condition::Parkinsons];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Diabetes => "diabetes",
            Self::Heart => "heart",
            Self::Parkinsons => "parkinsons",
        }
    }

    /// Human-readable name of the condition
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Diabetes => "Diabetes",
            Self::Heart => "Heart Disease",
            Self::Parkinsons => "Parkinson's",
        }
    }

    /// Sentence shown to the person for a given outcome
    pub fn verdict(&self, positive: bool) -> &'static str {
        match (self, positive) {
            (Self::Diabetes, true) => "The person is diabetic",
            (Self::Diabetes, false) => "The person is not diabetic",
            (Self::Heart, true) => "The person is having heart disease",
            (Self::Heart, false) => "The person does not have any heart disease",
            (Self::Parkinsons, true) => "The person has Parkinson's disease",
            (Self::Parkinsons, false) => "The person does not have Parkinson's disease",
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Condition {
    type Err = UnknownCondition;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "diabetes" => Ok(Self::Diabetes),
            "heart" | "heart-disease" | "heart_disease" => Ok(Self::Heart),
            "parkinsons" | "parkinson" => Ok(Self::Parkinsons),
            _ => Err(UnknownCondition(s.to_string())),
        }
    }
}

/// Returned when a string does not name a supported condition
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown condition '{0}' (expected diabetes, heart or parkinsons)")]
pub struct UnknownCondition(pub String);

/// Ordered sequence of encoded feature values for one condition.
///
/// Produced only by the feature encoder, so every entry is finite and the
/// length matches the condition's feature spec.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EncodedVector(Vec<f64>);

impl EncodedVector {
    pub(crate) fn new(values: Vec<f64>) -> Self {
        Self(values)
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_inner(self) -> Vec<f64> {
        self.0
    }
}

/// Advisory record of intermediate values for a single inference.
///
/// Never consulted when deciding the outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosticTrace {
    pub raw: Vec<f64>,
    pub scaled: Vec<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub probabilities: Option<[f64; 2]>,
    pub final_class: i64,
    pub decision_path: DecisionPath,
    pub predictor: String,
}

/// Outcome of one inference call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub condition: Condition,
    pub diagnosis: bool,
    /// Probability of the positive class, only on the probability path
    #[serde(skip_serializing_if = "Option::is_none")]
    pub probability: Option<f64>,
    pub class: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace: Option<DiagnosticTrace>,
}

impl PredictionResult {
    pub fn verdict(&self) -> &'static str {
        self.condition.verdict(self.diagnosis)
    }
}

/// Transport-agnostic inference request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferenceRequest {
    pub condition: Condition,
    /// Raw form values; JSON numbers are accepted and kept as their text
    #[serde(deserialize_with = "field_values")]
    pub fields: BTreeMap<String, String>,
    #[serde(default)]
    pub trace: Option<bool>,
}

fn field_values<'de, D>(deserializer: D) -> Result<BTreeMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum FieldValue {
        Text(String),
        Number(serde_json::Number),
    }

    let raw = BTreeMap::<String, FieldValue>::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .map(|(name, value)| {
            let value = match value {
                FieldValue::Text(s) => s,
                FieldValue::Number(n) => n.to_string(),
            };
            (name, value)
        })
        .collect())
}

/// Kind of a per-request failure reported to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidInput,
    ModelFailure,
    Timeout,
}

/// Structured failure returned in place of a diagnosis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorDescriptor {
    pub kind: ErrorKind,
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<String>,
}

/// Transport-agnostic inference response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferenceResponse {
    pub condition: Condition,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnosis: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub probability: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace: Option<DiagnosticTrace>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorDescriptor>,
}

impl InferenceResponse {
    pub fn success(result: PredictionResult) -> Self {
        Self {
            condition: result.condition,
            diagnosis: Some(result.diagnosis),
            probability: result.probability,
            message: Some(result.verdict().to_string()),
            trace: result.trace,
            error: None,
        }
    }

    /// A failure never carries a diagnosis, probability or trace
    pub fn failure(condition: Condition, error: ErrorDescriptor) -> Self {
        Self {
            condition,
            diagnosis: None,
            probability: None,
            message: None,
            trace: None,
            error: Some(error),
        }
    }
}
