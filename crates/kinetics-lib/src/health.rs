//! Health check infrastructure for the kinetics predictor
//!
//! Tracks component health and readiness for liveness and readiness probes.
//! The artifacts component follows the published snapshot.

use crate::artifacts::ArtifactSnapshot;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{watch, RwLock};
use tokio::task::JoinHandle;

/// Health status of a component
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    /// Component is functioning normally
    Healthy,
    /// Component is experiencing issues but still operational
    Degraded,
    /// Component has failed
    Unhealthy,
}

impl ComponentStatus {
    /// Returns true if the component is at least partially operational
    pub fn is_operational(&self) -> bool {
        matches!(self, ComponentStatus::Healthy | ComponentStatus::Degraded)
    }
}

/// Information about a component's health
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

    /// Artifacts health for a snapshot
    ///
    /// Unhealthy without a usable backend, degraded when any optional
    /// artifact is absent or corrupt.
    pub fn for_snapshot(snapshot: &ArtifactSnapshot, neural_fallback: bool) -> Self {
        if !snapshot.has_usable_backend(neural_fallback) {
            return Self::unhealthy("No trained models loaded");
        }

        let diagnostics = snapshot.diagnostics();
        if diagnostics.is_empty() {
            Self::healthy()
        } else {
            let summary: Vec<String> = diagnostics.iter().map(|d| d.to_string()).collect();
            Self::degraded(summary.join("; "))
        }
    }
}

/// Overall health response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: ComponentStatus,
    pub components: HashMap<String, ComponentHealth>,
}

impl HealthResponse {
    /// Worst status across components
    pub fn compute_status(components: &HashMap<String, ComponentHealth>) -> ComponentStatus {
        let mut has_degraded = false;

        for health in components.values() {
            match health.status {
                ComponentStatus::Unhealthy => return ComponentStatus::Unhealthy,
                ComponentStatus::Degraded => has_degraded = true,
                ComponentStatus::Healthy => {}
            }
        }

        if has_degraded {
            ComponentStatus::Degraded
        } else {
            ComponentStatus::Healthy
        }
    }
}

/// Readiness response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Component names for health tracking
pub mod components {
    pub const ARTIFACTS: &str = "artifacts";
    pub const DISPATCHER: &str = "dispatcher";
}

/// Health registry for tracking component health
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

    pub async fn update(&self, name: &str, health: ComponentHealth) {
        let mut components = self.components.write().await;
        components.insert(name.to_string(), health);
    }

    pub async fn set_healthy(&self, name: &str) {
        self.update(name, ComponentHealth::healthy()).await;
    }

    pub async fn set_degraded(&self, name: &str, message: impl Into<String>) {
        self.update(name, ComponentHealth::degraded(message)).await;
    }

    pub async fn set_unhealthy(&self, name: &str, message: impl Into<String>) {
        self.update(name, ComponentHealth::unhealthy(message)).await;
    }

    /// Set the artifacts component from a published snapshot
    pub async fn record_snapshot(&self, snapshot: &ArtifactSnapshot, neural_fallback: bool) {
        self.update(
            components::ARTIFACTS,
            ComponentHealth::for_snapshot(snapshot, neural_fallback),
        )
        .await;
    }

    /// Follow snapshot publications until the registry is dropped
    pub fn track_snapshots(
        &self,
        mut snapshots: watch::Receiver<Arc<ArtifactSnapshot>>,
        neural_fallback: bool,
    ) -> JoinHandle<()> {
        let health = self.clone();
        tokio::spawn(async move {
            while snapshots.changed().await.is_ok() {
                let snapshot = snapshots.borrow_and_update().clone();
                health.record_snapshot(&snapshot, neural_fallback).await;
            }
        })
    }

    pub async fn set_ready(&self, ready: bool) {
        let mut r = self.ready.write().await;
        *r = ready;
    }

    pub async fn health(&self) -> HealthResponse {
        let components = self.components.read().await.clone();
        let status = HealthResponse::compute_status(&components);
        HealthResponse { status, components }
    }

    pub async fn readiness(&self) -> ReadinessResponse {
        let ready = *self.ready.read().await;
        let health = self.health().await;

        if !ready {
            ReadinessResponse {
                ready: false,
                reason: Some("Service not yet initialized".to_string()),
            }
        } else if health.status == ComponentStatus::Unhealthy {
            ReadinessResponse {
                ready: false,
                reason: Some("Critical component unhealthy".to_string()),
            }
        } else {
            ReadinessResponse {
                ready: true,
                reason: None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LoadDiagnostic;
    use crate::models::{FeatureRow, FeatureSchema};
    use crate::predictor::Predictor;

    struct Stub;

    impl Predictor for Stub {
        fn predict(&self, _row: &FeatureRow) -> anyhow::Result<Vec<f64>> {
            Ok(vec![0.0; 3])
        }

        fn name(&self) -> &str {
            "stub"
        }
    }

    #[tokio::test]
    async fn test_health_registry_initial_state() {
        let registry = HealthRegistry::new();
        let health = registry.health().await;

        assert_eq!(health.status, ComponentStatus::Healthy);
        assert!(health.components.is_empty());
    }

    #[tokio::test]
    async fn test_snapshot_without_backends_is_unhealthy() {
        let registry = HealthRegistry::new();
        registry.record_snapshot(&ArtifactSnapshot::empty(), false).await;

        let health = registry.health().await;
        assert_eq!(health.status, ComponentStatus::Unhealthy);
        assert!(health.components[components::ARTIFACTS].message.is_some());
    }

    #[tokio::test]
    async fn test_snapshot_with_diagnostics_is_degraded() {
        let registry = HealthRegistry::new();
        let snapshot = ArtifactSnapshot::builder(FeatureSchema::new(["T"]))
            .primary(Arc::new(Stub))
            .diagnostic(LoadDiagnostic::absent("scaler", "/models/scaler.json"))
            .build();
        registry.record_snapshot(&snapshot, false).await;

        let health = registry.health().await;
        assert_eq!(health.status, ComponentStatus::Degraded);
        let message = health.components[components::ARTIFACTS].message.clone().unwrap();
        assert!(message.contains("scaler"));
    }

    #[tokio::test]
    async fn test_complete_snapshot_is_healthy() {
        let registry = HealthRegistry::new();
        let snapshot = ArtifactSnapshot::builder(FeatureSchema::new(["T"]))
            .ensemble_member(Arc::new(Stub))
            .build();
        registry.record_snapshot(&snapshot, false).await;
        assert_eq!(registry.health().await.status, ComponentStatus::Healthy);
    }

    #[tokio::test]
    async fn test_readiness_not_ready_initially() {
        let registry = HealthRegistry::new();
        let readiness = registry.readiness().await;

        assert!(!readiness.ready);
        assert!(readiness.reason.is_some());
    }

    #[tokio::test]
    async fn test_readiness_not_ready_when_unhealthy() {
        let registry = HealthRegistry::new();
        registry.set_ready(true).await;
        registry.set_unhealthy(components::DISPATCHER, "Failed").await;

        assert!(!registry.readiness().await.ready);
    }

    #[tokio::test]
    async fn test_track_snapshots_follows_publish() {
        let registry = HealthRegistry::new();
        let (tx, rx) = watch::channel(Arc::new(ArtifactSnapshot::empty()));
        let handle = registry.track_snapshots(rx, false);

        let snapshot = ArtifactSnapshot::builder(FeatureSchema::new(["T"]))
            .primary(Arc::new(Stub))
            .build();
        tx.send_replace(Arc::new(snapshot));
        drop(tx);
        handle.await.unwrap();

        assert_eq!(registry.health().await.status, ComponentStatus::Healthy);
    }
}
