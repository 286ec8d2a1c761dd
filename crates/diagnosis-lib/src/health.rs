//! Health check infrastructure for the diagnosis service
//!
//! Tracks component health for liveness and readiness probes.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Health status of a component
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    /// Component is serving normally
    Healthy,
    /// Still serving, but recent requests have failed
    Degraded,
    /// Component cannot serve requests
    Unhealthy,
}

impl ComponentStatus {
    /// True for any status that still serves requests
    pub fn is_operational(&self) -> bool {
        matches!(self, ComponentStatus::Healthy | ComponentStatus::Degraded)
    }
}

/// Last reported health of one component
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub status: ComponentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub last_check_timestamp: i64,
}

impl ComponentHealth {
    fn with_status(status: ComponentStatus, message: Option<String>) -> Self {
        Self {
            status,
            message,
            last_check_timestamp: chrono::Utc::now().timestamp(),
        }
    }

    pub fn healthy() -> Self {
        Self::with_status(ComponentStatus::Healthy, None)
    }

    pub fn degraded(message: impl Into<String>) -> Self {
        Self::with_status(ComponentStatus::Degraded, Some(message.into()))
    }

    pub fn unhealthy(message: impl Into<String>) -> Self {
        Self::with_status(ComponentStatus::Unhealthy, Some(message.into()))
    }
}

/// Overall health response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: ComponentStatus,
    pub components: HashMap<String, ComponentHealth>,
}

impl HealthResponse {
    /// Worst status across all components
    pub fn compute_status(components: &HashMap<String, ComponentHealth>) -> ComponentStatus {
        components
            .values()
            .map(|c| c.status)
            .max_by_key(|status| match status {
                ComponentStatus::Healthy => 0,
                ComponentStatus::Degraded => 1,
                ComponentStatus::Unhealthy => 2,
            })
            .unwrap_or(ComponentStatus::Healthy)
    }
}

/// Readiness response; `reason` explains a not-ready answer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Component names for health tracking
pub mod components {
    pub const ARTIFACT_STORE: &str = "artifact_store";
    pub const INFERENCE_ENGINE: &str = "inference_engine";
}

/// Health registry shared between the server and its handlers
#[derive(Debug, Clone)]
pub struct HealthRegistry {
    components: Arc<RwLock<HashMap<String, ComponentHealth>>>,
    ready: Arc<RwLock<bool>>,
}

impl Default for HealthRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthRegistry {
    pub fn new() -> Self {
        Self {
            components: Arc::new(RwLock::new(HashMap::new())),
            ready: Arc::new(RwLock::new(false)),
        }
    }

    /// Register a component with initial healthy status
    pub async fn register(&self, name: &str) {
        self.update(name, ComponentHealth::healthy()).await;
    }

    /// Replace a component's health record
    pub async fn update(&self, name: &str, health: ComponentHealth) {
        self.components.write().await.insert(name.to_string(), health);
    }

    /// Mark component as healthy
    pub async fn set_healthy(&self, name: &str) {
        self.update(name, ComponentHealth::healthy()).await;
    }

    /// Mark component as degraded
    pub async fn set_degraded(&self, name: &str, message: impl Into<String>) {
        self.update(name, ComponentHealth::degraded(message)).await;
    }

    /// Mark component as unhealthy
    pub async fn set_unhealthy(&self, name: &str, message: impl Into<String>) {
        self.update(name, ComponentHealth::unhealthy(message)).await;
    }

    /// Current status of a registered component
    pub async fn status_of(&self, name: &str) -> Option<ComponentStatus> {
        self.components.read().await.get(name).map(|c| c.status)
    }

    /// Track the outcome of a model call on the inference engine component.
    ///
    /// Only writes when the status actually changes, so the hot path takes
    /// the read lock.
    pub async fn record_inference(&self, ok: bool, message: &str) {
        let current = self.status_of(components::INFERENCE_ENGINE).await;
        match (ok, current) {
            (true, Some(ComponentStatus::Healthy)) => {}
            (true, _) => self.set_healthy(components::INFERENCE_ENGINE).await,
            (false, Some(ComponentStatus::Degraded)) => {}
            (false, _) => {
                self.set_degraded(components::INFERENCE_ENGINE, message)
                    .await
            }
        }
    }

    /// Set readiness; the server flips this once every artifact has loaded
    pub async fn set_ready(&self, ready: bool) {
        *self.ready.write().await = ready;
    }

    /// Snapshot of every component plus the worst status among them
    pub async fn health(&self) -> HealthResponse {
        let components = self.components.read().await.clone();
        let status = HealthResponse::compute_status(&components);
        HealthResponse { status, components }
    }

    /// Get readiness response
    pub async fn readiness(&self) -> ReadinessResponse {
        let ready = *self.ready.read().await;
        let health = self.health().await;

        let (ready, reason) = if !ready {
            (false, Some("Model artifacts not yet loaded"))
        } else if health.status == ComponentStatus::Unhealthy {
            (false, Some("Critical component unhealthy"))
        } else {
            (true, None)
        };
        ReadinessResponse {
            ready,
            reason: reason.map(str::to_string),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_health_registry_initial_state() {
        let registry = HealthRegistry::new();
        let health = registry.health().await;

        assert_eq!(health.status, ComponentStatus::Healthy);
        assert!(health.components.is_empty());
    }

    #[tokio::test]
    async fn test_component_registration() {
        let registry = HealthRegistry::new();
        registry.register(components::ARTIFACT_STORE).await;

        let health = registry.health().await;
        assert_eq!(
            health.components[components::ARTIFACT_STORE].status,
            ComponentStatus::Healthy
        );
    }

    #[tokio::test]
    async fn test_worst_status_wins() {
        let registry = HealthRegistry::new();
        registry.register(components::ARTIFACT_STORE).await;
        registry.register(components::INFERENCE_ENGINE).await;

        registry
            .set_degraded(components::INFERENCE_ENGINE, "model failure")
            .await;
        assert_eq!(registry.health().await.status, ComponentStatus::Degraded);

        registry
            .set_unhealthy(components::ARTIFACT_STORE, "missing artifacts")
            .await;
        assert_eq!(registry.health().await.status, ComponentStatus::Unhealthy);
    }

    #[tokio::test]
    async fn test_record_inference_degrades_and_recovers() {
        let registry = HealthRegistry::new();
        registry.register(components::INFERENCE_ENGINE).await;

        registry.record_inference(false, "dimension mismatch").await;
        let health = registry.health().await;
        let engine = &health.components[components::INFERENCE_ENGINE];
        assert_eq!(engine.status, ComponentStatus::Degraded);
        assert_eq!(engine.message.as_deref(), Some("dimension mismatch"));

        registry.record_inference(true, "").await;
        assert_eq!(
            registry.status_of(components::INFERENCE_ENGINE).await,
            Some(ComponentStatus::Healthy)
        );
    }

    #[tokio::test]
    async fn test_readiness_not_ready_initially() {
        let registry = HealthRegistry::new();
        let readiness = registry.readiness().await;

        assert!(!readiness.ready);
        assert!(readiness.reason.is_some());
    }

    #[tokio::test]
    async fn test_readiness_ready_when_set() {
        let registry = HealthRegistry::new();
        registry.register(components::ARTIFACT_STORE).await;
        registry.set_ready(true).await;

        assert!(registry.readiness().await.ready);
    }

    #[tokio::test]
    async fn test_degraded_engine_stays_ready() {
        let registry = HealthRegistry::new();
        registry.register(components::INFERENCE_ENGINE).await;
        registry.set_ready(true).await;
        registry.record_inference(false, "panic").await;

        assert!(registry.readiness().await.ready);
    }
}
