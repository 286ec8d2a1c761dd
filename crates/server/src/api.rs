//! HTTP API for predictions, condition schemas, health checks and metrics

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use diagnosis_lib::{
    feature_spec,
    health::{ComponentStatus, HealthRegistry},
    observability::{InferenceMetrics, StructuredLogger},
    Condition, ErrorDescriptor, ErrorKind, FeatureSpec, InferenceEngine, InferenceError,
    InferenceErrorKind, InferenceRequest, InferenceResponse, INVALID_INPUT_MESSAGE,
};
use prometheus::{Encoder, TextEncoder};
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

pub const TIMEOUT_MESSAGE: &str = "The diagnosis took too long; please try again";

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub engine: InferenceEngine,
    pub health_registry: HealthRegistry,
    pub metrics: InferenceMetrics,
    pub logger: StructuredLogger,
    pub request_timeout: Duration,
}

impl AppState {
    pub fn new(
        engine: InferenceEngine,
        health_registry: HealthRegistry,
        metrics: InferenceMetrics,
        logger: StructuredLogger,
        request_timeout: Duration,
    ) -> Self {
        Self {
            engine,
            health_registry,
            metrics,
            logger,
            request_timeout,
        }
    }
}

#[derive(Debug, Serialize)]
struct NotFound {
    error: String,
}

/// Body returned when the request itself cannot be decoded, so no condition is known
#[derive(Debug, Serialize)]
pub struct RejectedRequest {
    pub error: ErrorDescriptor,
}

fn reject_request(rejection: JsonRejection) -> (StatusCode, Json<RejectedRequest>) {
    warn!(
        status = rejection.status().as_u16(),
        reason = %rejection.body_text(),
        "Rejected malformed prediction request"
    );
    let descriptor = ErrorDescriptor {
        kind: ErrorKind::InvalidInput,
        message: INVALID_INPUT_MESSAGE.to_string(),
        fields: Vec::new(),
    };
    (rejection.status(), Json(RejectedRequest { error: descriptor }))
}

/// Run one inference off the async runtime, bounded by the request timeout
async fn predict(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<InferenceRequest>, JsonRejection>,
) -> axum::response::Response {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => return reject_request(rejection).into_response(),
    };
    let condition = request.condition;
    let engine = state.engine.clone();
    let start = Instant::now();

    let task = tokio::task::spawn_blocking(move || match request.trace {
        Some(trace) => engine.infer_with(condition, &request.fields, trace),
        None => engine.infer(condition, &request.fields),
    });
    let outcome = tokio::time::timeout(state.request_timeout, task).await;

    let elapsed = start.elapsed();
    state.metrics.observe_latency(condition, elapsed.as_secs_f64());

    let (status, body) = match outcome {
        Ok(Ok(Ok(result))) => {
            state.metrics.inc_prediction(condition, result.diagnosis);
            state.health_registry.record_inference(true, "").await;
            state.logger.log_prediction(
                condition,
                result.diagnosis,
                result.probability,
                elapsed.as_secs_f64() * 1000.0,
            );
            (StatusCode::OK, Json(InferenceResponse::success(result)))
        }
        Ok(Ok(Err(err))) => inference_failure(&state, condition, err).await,
        Ok(Err(join_error)) => {
            let err = InferenceError::ModelFailure {
                condition,
                source: diagnosis_lib::ModelError::Runtime(join_error.to_string()),
            };
            inference_failure(&state, condition, err).await
        }
        Err(_) => {
            state.metrics.inc_error(condition, "timeout");
            let detail = format!("exceeded {}ms", state.request_timeout.as_millis());
            state.logger.log_failure(condition, "timeout", &detail);
            state.health_registry.record_inference(false, "inference timed out").await;
            let descriptor = ErrorDescriptor {
                kind: ErrorKind::Timeout,
                message: TIMEOUT_MESSAGE.to_string(),
                fields: Vec::new(),
            };
            (
                StatusCode::GATEWAY_TIMEOUT,
                Json(InferenceResponse::failure(condition, descriptor)),
            )
        }
    };
    (status, body).into_response()
}

async fn inference_failure(
    state: &AppState,
    condition: Condition,
    err: InferenceError,
) -> (StatusCode, Json<InferenceResponse>) {
    let kind = err.kind();
    state.metrics.inc_inference_error(condition, kind);
    state.logger.log_failure(condition, kind.as_str(), &err.to_string());

    let status = match kind {
        InferenceErrorKind::InvalidInput => StatusCode::UNPROCESSABLE_ENTITY,
        InferenceErrorKind::ModelFailure => {
            state.health_registry.record_inference(false, &err.to_string()).await;
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    (
        status,
        Json(InferenceResponse::failure(condition, err.descriptor())),
    )
}

async fn list_conditions() -> Json<Vec<FeatureSpec>> {
    Json(Condition::ALL.iter().map(|c| feature_spec(*c)).collect())
}

async fn get_condition(Path(name): Path<String>) -> impl IntoResponse {
    match name.parse::<Condition>() {
        Ok(condition) => (StatusCode::OK, Json(feature_spec(condition))).into_response(),
        Err(e) => (
            StatusCode::NOT_FOUND,
            Json(NotFound {
                error: e.to_string(),
            }),
        )
            .into_response(),
    }
}

async fn list_models(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.engine.store().infos())
}

/// Health check response - returns 200 if healthy, 503 if unhealthy
async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state.health_registry.health().await;

    let status_code = match health.status {
        ComponentStatus::Healthy | ComponentStatus::Degraded => StatusCode::OK,
        ComponentStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(health))
}

/// Readiness check response - returns 200 if ready, 503 if not ready
async fn readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let readiness = state.health_registry.readiness().await;

    let status_code = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(readiness))
}

/// Prometheus metrics endpoint
async fn metrics() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        error!(error = %e, "Failed to encode metrics");
        return (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response();
    }

    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        buffer,
    )
        .into_response()
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/v1/predict", post(predict))
        .route("/api/v1/conditions", get(list_conditions))
        .route("/api/v1/conditions/:condition", get(get_condition))
        .route("/api/v1/models", get(list_models))
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .with_state(state)
}

/// Start the API server and run until `shutdown` resolves
pub async fn serve<F>(addr: &str, state: Arc<AppState>, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = create_router(state);

    info!(addr = %addr, "Starting API server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}
