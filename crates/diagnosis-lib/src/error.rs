//! Error taxonomy for loading and inference
//!
//! - [`ArtifactLoadError`]: startup, fatal
//! - [`EncodingError`]: per request, recoverable
//! - [`InferenceError`]: per request, recoverable
//! - [`ModelError`]: failure inside a scaler or predictor, surfaced as
//!   [`InferenceError::ModelFailure`]

use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

use crate::models::{Condition, ErrorDescriptor, ErrorKind};

/// Message returned for any invalid-input failure
pub const INVALID_INPUT_MESSAGE: &str = "Please enter valid numerical values for all fields";

/// Message returned for any model failure; the cause is only logged
pub const MODEL_FAILURE_MESSAGE: &str = "The model could not produce a diagnosis for this input";

/// Which file of an artifact pair failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    Predictor,
    Scaler,
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Predictor => f.write_str("predictor"),
            Self::Scaler => f.write_str("scaler"),
        }
    }
}

/// Underlying reason an artifact could not be loaded
#[derive(Debug, thiserror::Error)]
pub enum ArtifactLoadCause {
    #[error("file not found: {}", .0.display())]
    Missing(PathBuf),

    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to deserialize {}: {source}", .path.display())]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to load ONNX model {}: {message}", .path.display())]
    Onnx { path: PathBuf, message: String },

    #[error("checksum mismatch for {}: expected {expected}, got {actual}", .path.display())]
    ChecksumMismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    #[error("invalid artifact {}: {reason}", .path.display())]
    Invalid { path: PathBuf, reason: String },

    #[error("no artifact was provided")]
    Incomplete,
}

/// A condition's predictor or scaler could not be loaded
#[derive(Debug, thiserror::Error)]
#[error("failed to load {artifact} artifact for {condition}: {cause}")]
pub struct ArtifactLoadError {
    pub condition: Condition,
    pub artifact: ArtifactKind,
    #[source]
    pub cause: ArtifactLoadCause,
}

impl ArtifactLoadError {
    pub fn new(condition: Condition, artifact: ArtifactKind, cause: ArtifactLoadCause) -> Self {
        Self {
            condition,
            artifact,
            cause,
        }
    }
}

/// Why a single field failed to encode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldProblem {
    Missing,
    NotANumber,
    NotFinite,
    UnknownLabel,
    UnexpectedField,
}

impl fmt::Display for FieldProblem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Missing => "missing",
            Self::NotANumber => "not a number",
            Self::NotFinite => "not a finite number",
            Self::UnknownLabel => "unrecognized option",
            Self::UnexpectedField => "not a field of this condition",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldIssue {
    pub field: String,
    pub problem: FieldProblem,
}

/// Aggregated encoding failure naming every offending field
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid input for {condition}: {}", describe_issues(.issues))]
pub struct EncodingError {
    pub condition: Condition,
    pub issues: Vec<FieldIssue>,
}

impl EncodingError {
    /// Names of the offending fields, in feature order
    pub fn field_names(&self) -> Vec<String> {
        self.issues.iter().map(|i| i.field.clone()).collect()
    }

    pub fn names_field(&self, field: &str) -> bool {
        self.issues.iter().any(|i| i.field == field)
    }
}

fn describe_issues(issues: &[FieldIssue]) -> String {
    issues
        .iter()
        .map(|i| format!("{} ({})", i.field, i.problem))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Failure raised by a scaler or predictor while computing
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ModelError {
    #[error("dimension mismatch: expected {expected} features, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("non-finite value produced by {stage}")]
    NonFinite { stage: &'static str },

    #[error("probability output is not supported by this predictor")]
    ProbabilityUnsupported,

    #[error("unexpected class label {0}")]
    UnexpectedClass(i64),

    #[error("predictor runtime error: {0}")]
    Runtime(String),

    #[error("predictor panicked: {0}")]
    Panicked(String),
}

/// Coarse classification of an inference failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InferenceErrorKind {
    InvalidInput,
    ModelFailure,
}

impl InferenceErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidInput => "invalid_input",
            Self::ModelFailure => "model_failure",
        }
    }
}

/// Per-request failure of the inference pipeline
#[derive(Debug, Clone, thiserror::Error)]
pub enum InferenceError {
    #[error(transparent)]
    InvalidInput(#[from] EncodingError),

    #[error("model failure for {condition}: {source}")]
    ModelFailure {
        condition: Condition,
        #[source]
        source: ModelError,
    },
}

impl InferenceError {
    pub fn kind(&self) -> InferenceErrorKind {
        match self {
            Self::InvalidInput(_) => InferenceErrorKind::InvalidInput,
            Self::ModelFailure { .. } => InferenceErrorKind::ModelFailure,
        }
    }

    /// Caller-facing descriptor; internal causes are not exposed
    pub fn descriptor(&self) -> ErrorDescriptor {
        match self {
            Self::InvalidInput(e) => ErrorDescriptor {
                kind: ErrorKind::InvalidInput,
                message: INVALID_INPUT_MESSAGE.to_string(),
                fields: e.field_names(),
            },
            Self::ModelFailure { .. } => ErrorDescriptor {
                kind: ErrorKind::ModelFailure,
                message: MODEL_FAILURE_MESSAGE.to_string(),
                fields: Vec::new(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encoding_error_lists_all_fields() {
        let err = EncodingError {
            condition: Condition::Diabetes,
            issues: vec![
                FieldIssue {
                    field: "Glucose".to_string(),
                    problem: FieldProblem::NotANumber,
                },
                FieldIssue {
                    field: "Age".to_string(),
                    problem: FieldProblem::Missing,
                },
            ],
        };
        let text = err.to_string();
        assert!(text.contains("Glucose (not a number)"));
        assert!(text.contains("Age (missing)"));
        assert_eq!(err.field_names(), vec!["Glucose", "Age"]);
        assert!(err.names_field("Glucose"));
        assert!(!err.names_field("BMI"));
    }

    #[test]
    fn test_inference_error_kind() {
        let invalid: InferenceError = EncodingError {
            condition: Condition::Heart,
            issues: vec![],
        }
        .into();
        assert_eq!(invalid.kind(), InferenceErrorKind::InvalidInput);

        let failure = InferenceError::ModelFailure {
            condition: Condition::Heart,
            source: ModelError::DimensionMismatch {
                expected: 13,
                actual: 12,
            },
        };
        assert_eq!(failure.kind(), InferenceErrorKind::ModelFailure);
        assert!(failure.to_string().contains("expected 13 features"));

        let descriptor = failure.descriptor();
        assert_eq!(descriptor.kind, ErrorKind::ModelFailure);
        assert!(!descriptor.message.contains("13"));
    }

    #[test]
    fn test_artifact_load_error_message() {
        let err = ArtifactLoadError::new(
            Condition::Parkinsons,
            ArtifactKind::Scaler,
            ArtifactLoadCause::Missing(PathBuf::from("models/parkinsons_scaler.json")),
        );
        let text = err.to_string();
        assert!(text.contains("scaler artifact for parkinsons"));
        assert!(text.contains("parkinsons_scaler.json"));
    }
}
