//! Observability infrastructure for the kinetics predictor
//!
//! Provides:
//! - Prometheus metrics (prediction latency, backend usage, errors, reloads, snapshot shape)
//! - Structured JSON logging with tracing

use crate::artifacts::ArtifactSnapshot;
use crate::error::ArtifactError;
use crate::models::{BackendTier, PredictionResult};
use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, register_int_gauge,
    register_int_gauge_vec, Histogram, IntCounter, IntCounterVec, IntGauge, IntGaugeVec,
};
use std::path::Path;
use std::sync::OnceLock;
use tracing::{info, warn};

/// Service name attached to structured log events
pub const SERVICE_NAME: &str = "kinetics-predictor";

/// Default histogram buckets for latency measurements (in seconds)
const LATENCY_BUCKETS: &[f64] = &[
    0.0001, 0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0,
];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<ServiceMetricsInner> = OnceLock::new();

/// Inner metrics structure that holds the actual Prometheus metrics
struct ServiceMetricsInner {
    prediction_latency_seconds: Histogram,
    predictions_total: IntCounterVec,
    prediction_errors_total: IntCounterVec,
    scaler_skipped_total: IntCounter,
    reloads_total: IntCounterVec,
    backends_loaded: IntGaugeVec,
    artifacts_degraded: IntGauge,
    feature_count: IntGauge,
}

impl ServiceMetricsInner {
    fn new() -> Self {
        Self {
            prediction_latency_seconds: register_histogram!(
                "kinetics_prediction_latency_seconds",
                "Time spent vectorizing, scaling and running backends per prediction",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register prediction_latency_seconds"),

            predictions_total: register_int_counter_vec!(
                "kinetics_predictions_total",
                "Predictions served, by backend tier",
                &["model"]
            )
            .expect("Failed to register predictions_total"),

            prediction_errors_total: register_int_counter_vec!(
                "kinetics_prediction_errors_total",
                "Failed predictions, by error kind",
                &["kind"]
            )
            .expect("Failed to register prediction_errors_total"),

            scaler_skipped_total: register_int_counter!(
                "kinetics_scaler_skipped_total",
                "Predictions served without scaling because the scaler was incompatible or failed"
            )
            .expect("Failed to register scaler_skipped_total"),

            reloads_total: register_int_counter_vec!(
                "kinetics_artifact_reloads_total",
                "Artifact reload attempts, by outcome",
                &["outcome"]
            )
            .expect("Failed to register reloads_total"),

            backends_loaded: register_int_gauge_vec!(
                "kinetics_backends_loaded",
                "Backends in the published snapshot, by tier",
                &["tier"]
            )
            .expect("Failed to register backends_loaded"),

            artifacts_degraded: register_int_gauge!(
                "kinetics_artifacts_degraded",
                "Optional artifacts absent or corrupt in the published snapshot"
            )
            .expect("Failed to register artifacts_degraded"),

            feature_count: register_int_gauge!(
                "kinetics_feature_count",
                "Number of features in the published schema"
            )
            .expect("Failed to register feature_count"),
        }
    }
}

/// Service metrics for Prometheus exposition
///
/// This is a lightweight handle to the global metrics instance.
/// Multiple clones share the same underlying metrics.
#[derive(Clone)]
pub struct ServiceMetrics {
    _private: (),
}

impl Default for ServiceMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl ServiceMetrics {
    /// Create a new metrics handle (initializes global metrics if needed)
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(ServiceMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &ServiceMetricsInner {
        GLOBAL_METRICS.get_or_init(ServiceMetricsInner::new)
    }

    pub fn observe_prediction_latency(&self, duration_secs: f64) {
        self.inner().prediction_latency_seconds.observe(duration_secs);
    }

    pub fn inc_predictions(&self, model: &str) {
        self.inner().predictions_total.with_label_values(&[model]).inc();
    }

    pub fn inc_prediction_errors(&self, kind: &str) {
        self.inner().prediction_errors_total.with_label_values(&[kind]).inc();
    }

    pub fn inc_scaler_skipped(&self) {
        self.inner().scaler_skipped_total.inc();
    }

    pub fn inc_reloads(&self, outcome: &str) {
        self.inner().reloads_total.with_label_values(&[outcome]).inc();
    }

    /// Update snapshot gauges after a publish
    pub fn record_snapshot(&self, snapshot: &ArtifactSnapshot) {
        let inner = self.inner();
        for tier in BackendTier::ALL {
            inner
                .backends_loaded
                .with_label_values(&[tier.as_str()])
                .set(snapshot.backend_count(tier) as i64);
        }
        inner.artifacts_degraded.set(snapshot.diagnostics().len() as i64);
        inner.feature_count.set(snapshot.schema().len() as i64);
    }
}

/// Structured logger for service events
///
/// Provides consistent JSON-formatted logging for predictions, reloads and
/// lifecycle events.
#[derive(Clone)]
pub struct StructuredLogger {
    service: String,
}

impl Default for StructuredLogger {
    fn default() -> Self {
        Self::new(SERVICE_NAME)
    }
}

impl StructuredLogger {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    /// Log a served prediction
    pub fn log_prediction(&self, result: &PredictionResult, features: usize, elapsed_us: u128) {
        info!(
            event = "prediction_served",
            service = %self.service,
            model_used = %result.model_used,
            features = features,
            scaled = result.scaling.was_applied(),
            a = result.a,
            n = result.n,
            ea_kj_per_mol = result.ea_kj_per_mol,
            elapsed_us = elapsed_us,
            "Served kinetics prediction"
        );
    }

    /// Log a prediction that ran on raw features
    pub fn log_scaler_skipped(&self, reason: &str) {
        warn!(
            event = "scaler_skipped",
            service = %self.service,
            reason = %reason,
            "Scaler not applied, predicting on raw features"
        );
    }

    /// Log a newly published snapshot and its degraded artifacts
    pub fn log_snapshot_published(&self, snapshot: &ArtifactSnapshot, generation: u64) {
        info!(
            event = "snapshot_published",
            service = %self.service,
            generation = generation,
            features = snapshot.schema().len(),
            scaler = snapshot.scaler().is_some(),
            primary = snapshot.backend_count(BackendTier::Primary),
            ensemble = snapshot.backend_count(BackendTier::Ensemble),
            neural = snapshot.backend_count(BackendTier::Neural),
            degraded = snapshot.diagnostics().len(),
            "Artifact snapshot published"
        );

        for diagnostic in snapshot.diagnostics().iter().filter(|d| d.is_corrupt()) {
            warn!(
                event = "artifact_degraded",
                service = %self.service,
                artifact = %diagnostic.artifact,
                path = %diagnostic.path.display(),
                reason = %diagnostic.kind,
                "Artifact could not be loaded"
            );
        }
    }

    /// Log a rejected reload
    pub fn log_reload_failed(&self, dir: &Path, error: &ArtifactError) {
        warn!(
            event = "reload_failed",
            service = %self.service,
            dir = %dir.display(),
            error = %error,
            "Artifact reload failed, keeping previous snapshot"
        );
    }

    /// Log service startup
    pub fn log_startup(&self, version: &str, artifact_dir: &Path) {
        info!(
            event = "service_started",
            service = %self.service,
            version = %version,
            artifact_dir = %artifact_dir.display(),
            "Kinetics predictor started"
        );
    }

    /// Log service shutdown
    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "service_shutdown",
            service = %self.service,
            reason = %reason,
            "Kinetics predictor shutting down"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FeatureSchema;

    #[test]
    fn test_service_metrics_creation() {
        let metrics = ServiceMetrics::new();

        metrics.observe_prediction_latency(0.002);
        metrics.inc_predictions("Primary");
        metrics.inc_prediction_errors("no_model");
        metrics.inc_scaler_skipped();
        metrics.inc_reloads("success");
        metrics.record_snapshot(&ArtifactSnapshot::builder(FeatureSchema::new(["T"])).build());

        let families = prometheus::gather();
        assert!(families
            .iter()
            .any(|f| f.get_name() == "kinetics_predictions_total"));
    }

    #[test]
    fn test_structured_logger_creation() {
        let logger = StructuredLogger::new("test-service");
        assert_eq!(logger.service, "test-service");
        assert_eq!(StructuredLogger::default().service, SERVICE_NAME);
    }
}
