//! Observability infrastructure for the diagnosis service
//!
//! Provides:
//! - Prometheus metrics (inference latency, outcomes, errors, loaded models)
//! - Structured JSON logging with tracing

use prometheus::{
    register_gauge_vec, register_histogram_vec, register_int_counter_vec, register_int_gauge,
    GaugeVec, HistogramVec, IntCounterVec, IntGauge,
};
use std::sync::OnceLock;
use tracing::{error, info, warn};

use crate::error::InferenceErrorKind;
use crate::models::Condition;
use crate::predictor::DecisionPath;

/// Default histogram buckets for latency measurements (in seconds)
const LATENCY_BUCKETS: &[f64] = &[
    0.00005, 0.0001, 0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.5, 2.0,
];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<InferenceMetricsInner> = OnceLock::new();

struct InferenceMetricsInner {
    inference_latency_seconds: HistogramVec,
    predictions_total: IntCounterVec,
    inference_errors_total: IntCounterVec,
    artifacts_loaded: IntGauge,
    model_info: GaugeVec,
}

impl InferenceMetricsInner {
    fn new() -> Self {
        Self {
            inference_latency_seconds: register_histogram_vec!(
                "diagnosis_inference_latency_seconds",
                "Time spent encoding, scaling and predicting one request",
                &["condition"],
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register inference_latency_seconds"),

            predictions_total: register_int_counter_vec!(
                "diagnosis_predictions_total",
                "Predictions served, by outcome",
                &["condition", "outcome"]
            )
            .expect("Failed to register predictions_total"),

            inference_errors_total: register_int_counter_vec!(
                "diagnosis_inference_errors_total",
                "Failed inference requests, by error kind",
                &["condition", "kind"]
            )
            .expect("Failed to register inference_errors_total"),

            artifacts_loaded: register_int_gauge!(
                "diagnosis_artifacts_loaded",
                "Number of conditions with loaded model artifacts"
            )
            .expect("Failed to register artifacts_loaded"),

            model_info: register_gauge_vec!(
                "diagnosis_model_info",
                "Information about the loaded predictor per condition",
                &["condition", "kind", "decision_path"]
            )
            .expect("Failed to register model_info"),
        }
    }
}

/// Inference metrics for Prometheus exposition
///
/// Lightweight handle to the global metrics instance; clones share it.
#[derive(Clone)]
pub struct InferenceMetrics {
    _private: (),
}

impl Default for InferenceMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl InferenceMetrics {
    /// Create a new metrics handle (initializes global metrics if needed)
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(InferenceMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &InferenceMetricsInner {
        GLOBAL_METRICS.get_or_init(InferenceMetricsInner::new)
    }

    pub fn observe_latency(&self, condition: Condition, duration_secs: f64) {
        self.inner()
            .inference_latency_seconds
            .with_label_values(&[condition.as_str()])
            .observe(duration_secs);
    }

    pub fn inc_prediction(&self, condition: Condition, positive: bool) {
        let outcome = if positive { "positive" } else { "negative" };
        self.inner()
            .predictions_total
            .with_label_values(&[condition.as_str(), outcome])
            .inc();
    }

    /// `kind` is an [`InferenceErrorKind`] name or `timeout`
    pub fn inc_error(&self, condition: Condition, kind: &str) {
        self.inner()
            .inference_errors_total
            .with_label_values(&[condition.as_str(), kind])
            .inc();
    }

    pub fn inc_inference_error(&self, condition: Condition, kind: InferenceErrorKind) {
        self.inc_error(condition, kind.as_str());
    }

    pub fn set_artifacts_loaded(&self, count: i64) {
        self.inner().artifacts_loaded.set(count);
    }

    pub fn set_model_info(&self, condition: Condition, kind: &str, path: DecisionPath) {
        self.inner()
            .model_info
            .with_label_values(&[condition.as_str(), kind, path.as_str()])
            .set(1.0);
    }
}

/// Structured logger for service events
#[derive(Clone)]
pub struct StructuredLogger {
    service: String,
}

impl StructuredLogger {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    pub fn log_startup(&self, version: &str, model_dir: &str, conditions: usize) {
        info!(
            event = "service_started",
            service = %self.service,
            version = %version,
            model_dir = %model_dir,
            conditions = conditions,
            "Diagnosis service started"
        );
    }

    pub fn log_startup_failure(&self, error: &str) {
        error!(
            event = "startup_failed",
            service = %self.service,
            error = %error,
            "Failed to load model artifacts"
        );
    }

    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "service_shutdown",
            service = %self.service,
            reason = %reason,
            "Diagnosis service shutting down"
        );
    }

    pub fn log_artifact(&self, condition: Condition, source: &str, decision_path: DecisionPath) {
        info!(
            event = "artifact_loaded",
            service = %self.service,
            condition = %condition,
            predictor = %source,
            decision_path = %decision_path,
            "Model artifact ready"
        );
    }

    pub fn log_prediction(
        &self,
        condition: Condition,
        diagnosis: bool,
        probability: Option<f64>,
        latency_ms: f64,
    ) {
        info!(
            event = "prediction_generated",
            service = %self.service,
            condition = %condition,
            diagnosis = diagnosis,
            probability = ?probability,
            latency_ms = latency_ms,
            generated_at = %chrono::Utc::now().to_rfc3339(),
            "Generated diagnosis"
        );
    }

    /// Input errors are routine; model failures and timeouts are not
    pub fn log_failure(&self, condition: Condition, kind: &str, detail: &str) {
        if kind == InferenceErrorKind::InvalidInput.as_str() {
            info!(
                event = "prediction_failed",
                service = %self.service,
                condition = %condition,
                kind = %kind,
                detail = %detail,
                "Rejected invalid input"
            );
        } else {
            warn!(
                event = "prediction_failed",
                service = %self.service,
                condition = %condition,
                kind = %kind,
                detail = %detail,
                "Inference failed"
            );
        }
    }
}
