//! Predictor normalization
//!
//! Turns whatever was loaded from disk into a [`PredictorHandle`]. This is a
//! best-effort heuristic: the first matching extraction rule wins, unwrapping
//! happens one level deep only, and nothing here can fail.

use std::sync::Arc;

use tracing::debug;

use super::{OnnxClassifier, Predictor, PredictorArtifact, PredictorHandle};

/// A predictor as loaded from its artifact file
#[derive(Debug, Clone)]
pub enum LoadedPredictor {
    Json(PredictorArtifact),
    Onnx(Arc<OnnxClassifier>),
}

impl LoadedPredictor {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Json(artifact) => artifact.kind(),
            Self::Onnx(onnx) => onnx.kind(),
        }
    }
}

pub type ExtractionRule = fn(&PredictorArtifact) -> Option<&PredictorArtifact>;

/// Extraction rules, tried in order
pub const EXTRACTION_RULES: [(&str, ExtractionRule); 2] = [
    ("first_sub_estimator", first_sub_estimator as ExtractionRule),
    ("base_estimator", base_estimator as ExtractionRule),
];

fn first_sub_estimator(artifact: &PredictorArtifact) -> Option<&PredictorArtifact> {
    artifact.sub_estimators().first()
}

fn base_estimator(artifact: &PredictorArtifact) -> Option<&PredictorArtifact> {
    artifact.base_estimator()
}

/// Normalize a loaded predictor into a handle with a fixed decision path
pub fn normalize(raw: &LoadedPredictor) -> PredictorHandle {
    let artifact = match raw {
        LoadedPredictor::Onnx(onnx) => {
            let inner: Arc<dyn Predictor> = onnx.clone();
            return PredictorHandle::new(inner);
        }
        LoadedPredictor::Json(artifact) => artifact,
    };

    for (name, rule) in EXTRACTION_RULES {
        if let Some(extracted) = rule(artifact) {
            let source = format!("{} -> {}", artifact.kind(), extracted.kind());
            debug!(rule = name, source = %source, "Unwrapped predictor");
            return PredictorHandle::with_origin(Arc::new(extracted.clone()), source, Some(name));
        }
    }

    PredictorHandle::new(Arc::new(artifact.clone()))
}
