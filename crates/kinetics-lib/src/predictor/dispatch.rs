//! Inference dispatcher
//!
//! Takes the registry's current snapshot once per request, builds the feature
//! row, applies the scaler when it fits, and routes the row to the highest
//! available backend tier: Primary, then the Ensemble mean, then (only when
//! enabled) the Neural backend. A failing backend is reported, never demoted.

use super::features::FeatureVectorizer;
use super::output::{OutputFormatter, NUM_OUTPUTS};
use super::Predictor;
use crate::artifacts::{ArtifactRegistry, ArtifactSnapshot};
use crate::error::PredictError;
use crate::models::{BackendTier, FeatureInput, FeatureRow, PredictionResult, ScalingOutcome};
use crate::observability::{ServiceMetrics, StructuredLogger};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Instant;

/// Backend selection policy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct DispatchPolicy {
    /// Use the Neural backend when neither Primary nor Ensemble is loaded
    #[serde(default)]
    pub neural_fallback: bool,
}

/// Routes predictions to the backends of the current snapshot
pub struct InferenceDispatcher {
    registry: Arc<ArtifactRegistry>,
    policy: DispatchPolicy,
    formatter: OutputFormatter,
    metrics: ServiceMetrics,
    logger: StructuredLogger,
}

impl InferenceDispatcher {
    pub fn new(registry: Arc<ArtifactRegistry>, policy: DispatchPolicy) -> Self {
        Self {
            registry,
            policy,
            formatter: OutputFormatter::new(),
            metrics: ServiceMetrics::new(),
            logger: StructuredLogger::default(),
        }
    }

    pub fn policy(&self) -> DispatchPolicy {
        self.policy
    }

    pub fn registry(&self) -> &Arc<ArtifactRegistry> {
        &self.registry
    }

    /// Predict against the snapshot current at call time
    pub fn predict(&self, input: &FeatureInput) -> Result<PredictionResult, PredictError> {
        let snapshot = self.registry.current();
        self.predict_on(&snapshot, input)
    }

    /// Predict against a specific snapshot
    pub fn predict_on(
        &self,
        snapshot: &ArtifactSnapshot,
        input: &FeatureInput,
    ) -> Result<PredictionResult, PredictError> {
        let start = Instant::now();
        let result = self.run(snapshot, input);
        let elapsed = start.elapsed();
        self.metrics.observe_prediction_latency(elapsed.as_secs_f64());

        match &result {
            Ok(prediction) => {
                self.metrics.inc_predictions(&prediction.model_used);
                self.logger
                    .log_prediction(prediction, snapshot.schema().len(), elapsed.as_micros());
            }
            Err(e) => self.metrics.inc_prediction_errors(e.kind()),
        }
        result
    }

    fn run(
        &self,
        snapshot: &ArtifactSnapshot,
        input: &FeatureInput,
    ) -> Result<PredictionResult, PredictError> {
        let row = FeatureVectorizer::new(snapshot.schema()).vectorize(input)?;
        let (row, scaling) = self.scale(snapshot, row);

        let (tier, raw) = if let Some(primary) = snapshot.primary() {
            (BackendTier::Primary, invoke(primary, &row)?)
        } else if !snapshot.ensemble().is_empty() {
            let outputs = snapshot
                .ensemble()
                .iter()
                .map(|member| invoke(member, &row))
                .collect::<Result<Vec<_>, _>>()?;
            (BackendTier::Ensemble, OutputFormatter::mean(&outputs))
        } else if let Some(neural) = snapshot.neural().filter(|_| self.policy.neural_fallback) {
            (BackendTier::Neural, invoke(neural, &row)?)
        } else {
            return Err(PredictError::NoModelAvailable);
        };

        self.formatter
            .format(raw, tier, snapshot.metadata(), scaling)
            .map_err(|e| PredictError::BackendInvocation {
                backend: tier.to_string(),
                reason: format!("{:#}", e),
            })
    }

    fn scale(&self, snapshot: &ArtifactSnapshot, row: FeatureRow) -> (FeatureRow, ScalingOutcome) {
        let Some(scaler) = snapshot.scaler() else {
            return (row, ScalingOutcome::NotConfigured);
        };

        let outcome = if scaler.expected_width() != row.width() {
            ScalingOutcome::Incompatible {
                expected: scaler.expected_width(),
                actual: row.width(),
            }
        } else {
            match scaler.transform(&row) {
                Ok(scaled) => return (scaled, ScalingOutcome::Applied),
                Err(e) => ScalingOutcome::Failed(format!("{:#}", e)),
            }
        };

        if let Some(reason) = outcome.diagnostic() {
            self.metrics.inc_scaler_skipped();
            self.logger.log_scaler_skipped(&reason);
        }
        (row, outcome)
    }
}

fn invoke(
    backend: &Arc<dyn Predictor>,
    row: &FeatureRow,
) -> Result<[f64; NUM_OUTPUTS], PredictError> {
    backend
        .predict(row)
        .and_then(|values| OutputFormatter::raw_outputs(&values))
        .map_err(|e| PredictError::BackendInvocation {
            backend: backend.name().to_string(),
            reason: format!("{:#}", e),
        })
}
