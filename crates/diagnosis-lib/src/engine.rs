//! Inference engine
//!
//! Runs the encode -> scale -> predict -> decide pipeline for one request
//! against the immutable artifact store.

use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use tracing::debug;

use crate::error::{InferenceError, ModelError};
use crate::features::FeatureEncoder;
use crate::models::{Condition, DiagnosticTrace, PredictionResult};
use crate::predictor::{DecisionPath, POSITIVE_THRESHOLD};
use crate::store::{ArtifactStore, ModelArtifact};

/// Stateless pipeline over a shared [`ArtifactStore`]
#[derive(Debug, Clone)]
pub struct InferenceEngine {
    store: Arc<ArtifactStore>,
    encoder: FeatureEncoder,
    trace_by_default: bool,
}

/// Everything computed after encoding
struct Decision {
    scaled: Vec<f64>,
    probabilities: Option<[f64; 2]>,
    class: i64,
    positive: bool,
}

impl InferenceEngine {
    pub fn new(store: Arc<ArtifactStore>) -> Self {
        Self {
            store,
            encoder: FeatureEncoder::new(),
            trace_by_default: false,
        }
    }

    /// Attach a diagnostic trace to every result unless overridden per call
    pub fn with_trace(mut self, enabled: bool) -> Self {
        self.trace_by_default = enabled;
        self
    }

    pub fn store(&self) -> &Arc<ArtifactStore> {
        &self.store
    }

    pub fn infer(
        &self,
        condition: Condition,
        fields: &BTreeMap<String, String>,
    ) -> Result<PredictionResult, InferenceError> {
        self.infer_with(condition, fields, self.trace_by_default)
    }

    /// Run inference, overriding the default trace setting
    pub fn infer_with(
        &self,
        condition: Condition,
        fields: &BTreeMap<String, String>,
        trace: bool,
    ) -> Result<PredictionResult, InferenceError> {
        let encoded = self.encoder.encode(condition, fields)?;
        let failure = |source: ModelError| InferenceError::ModelFailure { condition, source };

        let artifact = self
            .store
            .get(condition)
            .ok_or_else(|| failure(ModelError::Runtime(format!("no artifact loaded for {condition}"))))?;

        let raw = encoded.as_slice();
        let decision = panic::catch_unwind(AssertUnwindSafe(|| decide(artifact, raw)))
            .map_err(|payload| failure(ModelError::Panicked(panic_message(payload.as_ref()))))?
            .map_err(failure)?;

        debug!(
            condition = %condition,
            raw = ?raw,
            scaled = ?decision.scaled,
            probabilities = ?decision.probabilities,
            class = decision.class,
            decision_path = %artifact.handle.decision_path(),
            "Inference intermediates"
        );

        let trace = trace.then(|| DiagnosticTrace {
            raw: raw.to_vec(),
            scaled: decision.scaled.clone(),
            probabilities: decision.probabilities,
            final_class: decision.class,
            decision_path: artifact.handle.decision_path(),
            predictor: artifact.handle.source().to_string(),
        });

        Ok(PredictionResult {
            condition,
            diagnosis: decision.positive,
            probability: decision.probabilities.map(|[_, p1]| p1),
            class: decision.class,
            trace,
        })
    }
}

fn decide(artifact: &ModelArtifact, raw: &[f64]) -> Result<Decision, ModelError> {
    let scaled = artifact.scaler.transform(raw)?;
    let handle = &artifact.handle;

    match handle.decision_path() {
        DecisionPath::Probability => {
            let probabilities = handle.predict_probability(&scaled)?;
            let positive = probabilities[1] >= POSITIVE_THRESHOLD;
            Ok(Decision {
                scaled,
                probabilities: Some(probabilities),
                class: i64::from(positive),
                positive,
            })
        }
        DecisionPath::Class => {
            let class = handle.predict_class(&scaled)?;
            let positive = match class {
                0 => false,
                1 => true,
                other => return Err(ModelError::UnexpectedClass(other)),
            };
            Ok(Decision {
                scaled,
                probabilities: None,
                class,
                positive,
            })
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
