//! Predictors and the normalized handle the engine calls
//!
//! Trained predictors arrive in one of a closed set of shapes (see
//! [`PredictorArtifact`]) or as an exported ONNX graph. The normalizer turns
//! either into a [`PredictorHandle`] whose decision path is fixed up front.

mod normalize;
mod onnx;
mod shapes;
mod svm;
mod tree;


pub use normalize::{normalize, LoadedPredictor, EXTRACTION_RULES};
pub use onnx::OnnxClassifier;
#[cfg(test)]
pub(crate) use onnx::logistic_onnx;
pub use shapes::{LinearModel, PredictorArtifact, VotingKind};
pub use svm::{Kernel, SupportVectorClassifier};
pub use tree::DecisionTree;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::error::ModelError;

/// Threshold on the positive-class probability; ties count as positive
pub const POSITIVE_THRESHOLD: f64 = 0.5;

/// Trait for binary classifiers
pub trait Predictor: Send + Sync {
    /// Raw class label for a single scaled sample
    fn predict_class(&self, x: &[f64]) -> Result<i64, ModelError>;

    /// `[p0, p1]` for a single scaled sample
    fn predict_proba(&self, _x: &[f64]) -> Result<[f64; 2], ModelError> {
        Err(ModelError::ProbabilityUnsupported)
    }

    /// Whether `predict_proba` is available
    fn supports_proba(&self) -> bool;

    /// Input dimension, when the predictor knows it
    fn n_features(&self) -> Option<usize>;

    /// Short name of the predictor shape
    fn kind(&self) -> &'static str;
}

/// How a handle turns predictor output into a diagnosis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionPath {
    /// Positive iff `p1 >= 0.5`
    Probability,
    /// The predictor's class label is the outcome
    Class,
}

impl DecisionPath {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Probability => "probability",
            Self::Class => "class",
        }
    }
}

impl fmt::Display for DecisionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalized, immutable view over a loaded predictor.
///
/// The decision path is chosen once from the predictor's capabilities and
/// never re-checked, so one handle always decides the same way.
#[derive(Clone)]
pub struct PredictorHandle {
    inner: Arc<dyn Predictor>,
    path: DecisionPath,
    source: String,
    unwrapped_by: Option<&'static str>,
}

impl PredictorHandle {
    pub fn new(inner: Arc<dyn Predictor>) -> Self {
        let source = inner.kind().to_string();
        Self::with_origin(inner, source, None)
    }

    pub(crate) fn with_origin(
        inner: Arc<dyn Predictor>,
        source: String,
        unwrapped_by: Option<&'static str>,
    ) -> Self {
        let path = if inner.supports_proba() {
            DecisionPath::Probability
        } else {
            DecisionPath::Class
        };
        Self {
            inner,
            path,
            source,
            unwrapped_by,
        }
    }

    pub fn decision_path(&self) -> DecisionPath {
        self.path
    }

    /// Shape the handle was derived from, e.g. `random_forest -> decision_tree`
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Extraction rule that unwrapped the original predictor, if any
    pub fn unwrapped_by(&self) -> Option<&'static str> {
        self.unwrapped_by
    }

    pub fn kind(&self) -> &'static str {
        self.inner.kind()
    }

    pub fn n_features(&self) -> Option<usize> {
        self.inner.n_features()
    }

    pub fn predict_class(&self, x: &[f64]) -> Result<i64, ModelError> {
        self.inner.predict_class(x)
    }

    /// Only available on the probability path
    pub fn predict_probability(&self, x: &[f64]) -> Result<[f64; 2], ModelError> {
        if self.path != DecisionPath::Probability {
            return Err(ModelError::ProbabilityUnsupported);
        }
        let proba = self.inner.predict_proba(x)?;
        if proba.iter().any(|p| !p.is_finite() || *p < 0.0 || *p > 1.0) {
            return Err(ModelError::NonFinite {
                stage: "predict_proba",
            });
        }
        Ok(proba)
    }
}

impl fmt::Debug for PredictorHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PredictorHandle")
            .field("kind", &self.inner.kind())
            .field("path", &self.path)
            .field("source", &self.source)
            .field("unwrapped_by", &self.unwrapped_by)
            .finish()
    }
}

pub(crate) fn check_dimension(expected: usize, x: &[f64]) -> Result<(), ModelError> {
    if x.len() != expected {
        return Err(ModelError::DimensionMismatch {
            expected,
            actual: x.len(),
        });
    }
    Ok(())
}

pub(crate) fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}
