//! Immutable artifact snapshot

use crate::error::LoadDiagnostic;
use crate::models::{BackendTier, FeatureSchema};
use crate::predictor::{Predictor, ScalerTransform};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

/// One internally consistent set of loaded artifacts
///
/// Never mutated after construction; reload builds a new snapshot.
pub struct ArtifactSnapshot {
    schema: FeatureSchema,
    scaler: Option<ScalerTransform>,
    primary: Option<Arc<dyn Predictor>>,
    ensemble: Vec<Arc<dyn Predictor>>,
    neural: Option<Arc<dyn Predictor>>,
    metadata: Map<String, Value>,
    diagnostics: Vec<LoadDiagnostic>,
    loaded_at: i64,
}

impl ArtifactSnapshot {
    pub fn builder(schema: FeatureSchema) -> SnapshotBuilder {
        SnapshotBuilder {
            snapshot: ArtifactSnapshot {
                schema,
                scaler: None,
                primary: None,
                ensemble: Vec::new(),
                neural: None,
                metadata: Map::new(),
                diagnostics: Vec::new(),
                loaded_at: chrono::Utc::now().timestamp(),
            },
        }
    }

    /// Snapshot with no schema and no backends, used before the first load
    pub fn empty() -> Self {
        Self::builder(FeatureSchema::default()).build()
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    pub fn scaler(&self) -> Option<&ScalerTransform> {
        self.scaler.as_ref()
    }

    pub fn primary(&self) -> Option<&Arc<dyn Predictor>> {
        self.primary.as_ref()
    }

    pub fn ensemble(&self) -> &[Arc<dyn Predictor>] {
        &self.ensemble
    }

    pub fn neural(&self) -> Option<&Arc<dyn Predictor>> {
        self.neural.as_ref()
    }

    pub fn metadata(&self) -> &Map<String, Value> {
        &self.metadata
    }

    pub fn diagnostics(&self) -> &[LoadDiagnostic] {
        &self.diagnostics
    }

    pub fn loaded_at(&self) -> i64 {
        self.loaded_at
    }

    /// Number of loaded backends in a tier
    pub fn backend_count(&self, tier: BackendTier) -> usize {
        match tier {
            BackendTier::Primary => usize::from(self.primary.is_some()),
            BackendTier::Ensemble => self.ensemble.len(),
            BackendTier::Neural => usize::from(self.neural.is_some()),
        }
    }

    /// Whether the dispatcher can serve predictions from this snapshot
    pub fn has_usable_backend(&self, neural_fallback: bool) -> bool {
        self.primary.is_some()
            || !self.ensemble.is_empty()
            || (neural_fallback && self.neural.is_some())
    }

    /// `meta.models` from the metadata document, or an empty object
    pub fn models_summary(&self) -> Value {
        self.metadata
            .get("models")
            .cloned()
            .unwrap_or_else(|| Value::Object(Map::new()))
    }
}

impl fmt::Debug for ArtifactSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = |ps: &[Arc<dyn Predictor>]| ps.iter().map(|p| p.name().to_string()).collect::<Vec<_>>();
        f.debug_struct("ArtifactSnapshot")
            .field("features", &self.schema.len())
            .field("scaler", &self.scaler.as_ref().map(|s| s.expected_width()))
            .field("primary", &self.primary.as_ref().map(|p| p.name().to_string()))
            .field("ensemble", &names(&self.ensemble))
            .field("neural", &self.neural.as_ref().map(|p| p.name().to_string()))
            .field("diagnostics", &self.diagnostics.len())
            .field("loaded_at", &self.loaded_at)
            .finish()
    }
}

/// Assembles an [`ArtifactSnapshot`]
pub struct SnapshotBuilder {
    snapshot: ArtifactSnapshot,
}

impl SnapshotBuilder {
    pub fn scaler(mut self, scaler: ScalerTransform) -> Self {
        self.snapshot.scaler = Some(scaler);
        self
    }

    pub fn primary(mut self, predictor: Arc<dyn Predictor>) -> Self {
        self.snapshot.primary = Some(predictor);
        self
    }

    pub fn ensemble_member(mut self, predictor: Arc<dyn Predictor>) -> Self {
        self.snapshot.ensemble.push(predictor);
        self
    }

    pub fn neural(mut self, predictor: Arc<dyn Predictor>) -> Self {
        self.snapshot.neural = Some(predictor);
        self
    }

    pub fn metadata(mut self, metadata: Map<String, Value>) -> Self {
        self.snapshot.metadata = metadata;
        self
    }

    pub fn diagnostic(mut self, diagnostic: LoadDiagnostic) -> Self {
        self.snapshot.diagnostics.push(diagnostic);
        self
    }

    pub fn build(self) -> ArtifactSnapshot {
        self.snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FeatureRow;
    use serde_json::json;

    struct Constant;

    impl Predictor for Constant {
        fn predict(&self, _row: &FeatureRow) -> anyhow::Result<Vec<f64>> {
            Ok(vec![0.0, 0.0, 0.0])
        }

        fn name(&self) -> &str {
            "constant"
        }
    }

    #[test]
    fn test_empty_snapshot() {
        let snapshot = ArtifactSnapshot::empty();
        assert!(snapshot.schema().is_empty());
        assert!(!snapshot.has_usable_backend(true));
        assert_eq!(snapshot.models_summary(), json!({}));
    }

    #[test]
    fn test_neural_only_usable_with_fallback() {
        let snapshot = ArtifactSnapshot::builder(FeatureSchema::new(["T"]))
            .neural(Arc::new(Constant))
            .build();
        assert!(!snapshot.has_usable_backend(false));
        assert!(snapshot.has_usable_backend(true));
        assert_eq!(snapshot.backend_count(BackendTier::Neural), 1);
        assert_eq!(snapshot.backend_count(BackendTier::Primary), 0);
    }

    #[test]
    fn test_models_summary_reads_metadata() {
        let mut meta = Map::new();
        meta.insert("models".to_string(), json!({"rf": {"r2": 0.91}}));
        let snapshot = ArtifactSnapshot::builder(FeatureSchema::new(["T"]))
            .metadata(meta)
            .build();
        assert_eq!(snapshot.models_summary()["rf"]["r2"], json!(0.91));
    }
}
