//! Diagnosis server - multi-condition disease prediction service
//!
//! Loads every condition's pre-trained artifacts at startup and serves
//! predictions, condition schemas, health and metrics over HTTP.

use anyhow::Result;
use diagnosis_lib::{
    health::{components, HealthRegistry},
    observability::{InferenceMetrics, StructuredLogger},
    ArtifactLayout, ArtifactStore, InferenceEngine,
};
use diagnosis_server::{api, config::ServerConfig};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const SERVICE_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting diagnosis-server");

    let config = ServerConfig::load()?;
    info!(
        model_dir = %config.model_dir.display(),
        addr = %config.listen_addr(),
        timeout_ms = config.request_timeout_ms,
        "Server configured"
    );

    let health_registry = HealthRegistry::new();
    health_registry.register(components::ARTIFACT_STORE).await;
    health_registry.register(components::INFERENCE_ENGINE).await;

    let metrics = InferenceMetrics::new();
    let logger = StructuredLogger::new(&config.service_name);

    // Every condition must load; a partial store is never served
    let layout = ArtifactLayout::new(&config.model_dir);
    let store = match ArtifactStore::load_all(&layout) {
        Ok(store) => store,
        Err(e) => {
            logger.log_startup_failure(&e.to_string());
            return Err(e.into());
        }
    };

    for info in store.infos() {
        metrics.set_model_info(info.condition, &info.predictor_kind, info.decision_path);
        logger.log_artifact(info.condition, &info.source, info.decision_path);
    }
    metrics.set_artifacts_loaded(store.len() as i64);

    let engine = InferenceEngine::new(Arc::new(store)).with_trace(config.trace_by_default);
    let app_state = Arc::new(api::AppState::new(
        engine,
        health_registry.clone(),
        metrics,
        logger.clone(),
        config.request_timeout(),
    ));

    health_registry.set_ready(true).await;
    logger.log_startup(
        SERVICE_VERSION,
        &config.model_dir.display().to_string(),
        app_state.engine.store().len(),
    );

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for shutdown signal");
        }
    };
    api::serve(&config.listen_addr(), app_state, shutdown).await?;

    logger.log_shutdown("SIGINT received");
    info!("Shutting down");

    Ok(())
}
