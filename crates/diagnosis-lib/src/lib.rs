//! Diagnosis library for multi-condition disease prediction
//!
//! This crate provides the core functionality for:
//! - Per-condition feature specs and encoding of raw form values
//! - Loading pre-trained scalers and predictors (JSON or ONNX)
//! - Normalizing predictors to a fixed decision path
//! - Running inference with structured, per-request errors
//! - Health checks and observability

pub mod engine;
pub mod error;
pub mod features;
pub mod health;
pub mod models;
pub mod observability;
pub mod predictor;
pub mod scaler;
pub mod store;

pub use engine::InferenceEngine;
pub use error::{
    ArtifactKind, ArtifactLoadCause, ArtifactLoadError, EncodingError, FieldIssue, FieldProblem,
    InferenceError, InferenceErrorKind, ModelError, INVALID_INPUT_MESSAGE, MODEL_FAILURE_MESSAGE,
};
pub use features::{feature_spec, FeatureEncoder, FeatureSpec, FieldKind, FieldSpec};
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use models::*;
pub use observability::{InferenceMetrics, StructuredLogger};
pub use predictor::{DecisionPath, PredictorHandle};
pub use scaler::Scaler;
pub use store::{ArtifactInfo, ArtifactLayout, ArtifactStore, ModelArtifact};
