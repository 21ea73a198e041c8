//! Artifact directory loading
//!
//! Every optional artifact is loaded in isolation: a missing or corrupt file
//! degrades only its own field and is recorded as a [`LoadDiagnostic`]. The
//! feature schema is the one artifact a snapshot cannot exist without.

use super::fetch::{self, BundleFetcher, FetchOutcome};
use super::snapshot::ArtifactSnapshot;
use crate::error::{ArtifactError, LoadDiagnostic};
use crate::models::FeatureSchema;
use crate::predictor::{OnnxPredictor, Predictor, ScalerTransform};
use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Fixed artifact filenames within an artifact directory
pub mod manifest {
    pub const FEATURES: &str = "features.json";
    pub const SCALER: &str = "scaler.json";
    pub const METADATA: &str = "model_meta.json";
    pub const PRIMARY: &str = "model_rf.onnx";
    pub const NEURAL: &str = "model_nn.onnx";

    /// Ensemble member names and their model files, in member order
    pub const ENSEMBLE: &[(&str, &str)] = &[
        ("logA", "model_xgb_logA.onnx"),
        ("n", "model_xgb_n.onnx"),
        ("Ea_kJ_per_mol", "model_xgb_Ea_kJ_per_mol.onnx"),
    ];

    /// Every filename in the manifest
    pub fn all() -> Vec<&'static str> {
        let mut files = vec![FEATURES, SCALER, METADATA, PRIMARY, NEURAL];
        files.extend(ENSEMBLE.iter().map(|(_, file)| *file));
        files
    }

    pub fn contains(file_name: &str) -> bool {
        all().contains(&file_name)
    }
}

/// How the store reacts to a corrupt optional artifact or a failed fetch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadPolicy {
    /// Degrade the affected field and keep going
    #[default]
    FailOpen,
    /// Abort the load
    FailFast,
}

/// Loads a model file into a prediction backend
pub trait ModelLoader: Send + Sync {
    fn load(&self, name: &str, path: &Path, input_width: usize) -> Result<Arc<dyn Predictor>>;
}

/// Loads ONNX models with tract
#[derive(Debug, Clone, Copy, Default)]
pub struct OnnxModelLoader;

impl ModelLoader for OnnxModelLoader {
    fn load(&self, name: &str, path: &Path, input_width: usize) -> Result<Arc<dyn Predictor>> {
        Ok(Arc::new(OnnxPredictor::from_file(name, path, input_width)?))
    }
}

/// Resolves and loads artifact snapshots from a directory
pub struct ArtifactStore {
    policy: LoadPolicy,
    loader: Arc<dyn ModelLoader>,
    fetcher: Option<BundleFetcher>,
}

impl ArtifactStore {
    pub fn new(policy: LoadPolicy) -> Self {
        Self {
            policy,
            loader: Arc::new(OnnxModelLoader),
            fetcher: None,
        }
    }

    /// Replace the model loader (tests use non-ONNX stand-ins)
    pub fn with_loader(mut self, loader: Arc<dyn ModelLoader>) -> Self {
        self.loader = loader;
        self
    }

    /// Enable bundle download for missing artifacts
    pub fn with_fetcher(mut self, fetcher: BundleFetcher) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    pub fn policy(&self) -> LoadPolicy {
        self.policy
    }

    /// Make sure the manifest is on disk, downloading the bundle if needed
    ///
    /// Under [`LoadPolicy::FailOpen`] this never returns an error: a failed
    /// fetch is logged and reported as [`FetchOutcome::Failed`].
    pub async fn ensure_artifacts_present(&self, dir: &Path) -> Result<FetchOutcome, ArtifactError> {
        if let Err(e) = std::fs::create_dir_all(dir) {
            warn!(dir = %dir.display(), error = %e, "Failed to create artifact directory");
        }

        let missing = fetch::missing_artifacts(dir);
        if missing.is_empty() {
            debug!(dir = %dir.display(), "All artifacts present locally");
            return Ok(FetchOutcome::AlreadyPresent);
        }

        let Some(fetcher) = &self.fetcher else {
            warn!(
                dir = %dir.display(),
                missing = ?missing,
                "Artifacts missing and no bundle URL configured"
            );
            return Ok(FetchOutcome::Skipped);
        };

        info!(dir = %dir.display(), missing = missing.len(), "Artifacts missing, fetching bundle");
        match fetcher.fetch_into(dir).await {
            Ok(files) => {
                info!(dir = %dir.display(), files, "Artifact bundle extracted");
                Ok(FetchOutcome::Fetched { files })
            }
            Err(e) => {
                let reason = format!("{:#}", e);
                match self.policy {
                    LoadPolicy::FailOpen => {
                        warn!(
                            dir = %dir.display(),
                            error = %reason,
                            "Artifact bundle fetch failed, continuing with local artifacts"
                        );
                        Ok(FetchOutcome::Failed(reason))
                    }
                    LoadPolicy::FailFast => Err(ArtifactError::Fetch(reason)),
                }
            }
        }
    }

    /// Load a snapshot from `dir`
    pub fn load(&self, dir: &Path) -> Result<ArtifactSnapshot, ArtifactError> {
        let schema = load_schema(dir)?;
        let width = schema.len();
        let mut builder = ArtifactSnapshot::builder(schema);

        match self.isolate("metadata", &dir.join(manifest::METADATA), load_metadata)? {
            Ok(meta) => builder = builder.metadata(meta),
            Err(diag) => builder = builder.diagnostic(diag),
        }

        match self.isolate("scaler", &dir.join(manifest::SCALER), ScalerTransform::from_file)? {
            Ok(scaler) => builder = builder.scaler(scaler),
            Err(diag) => builder = builder.diagnostic(diag),
        }

        let primary = self.isolate("rf", &dir.join(manifest::PRIMARY), |p| {
            self.loader.load("rf", p, width)
        })?;
        match primary {
            Ok(model) => builder = builder.primary(model),
            Err(diag) => builder = builder.diagnostic(diag),
        }

        for (member, file) in manifest::ENSEMBLE {
            let name = format!("xgb_{}", member);
            match self.isolate(&name, &dir.join(file), |p| self.loader.load(&name, p, width))? {
                Ok(model) => builder = builder.ensemble_member(model),
                Err(diag) => builder = builder.diagnostic(diag),
            }
        }

        let neural = self.isolate("nn", &dir.join(manifest::NEURAL), |p| {
            self.loader.load("nn", p, width)
        })?;
        match neural {
            Ok(model) => builder = builder.neural(model),
            Err(diag) => builder = builder.diagnostic(diag),
        }

        let snapshot = builder.build();
        info!(
            dir = %dir.display(),
            features = snapshot.schema().len(),
            snapshot = ?snapshot,
            "Artifact snapshot loaded"
        );
        Ok(snapshot)
    }

    /// Load a fresh snapshot to replace the current one
    pub fn reload(&self, dir: &Path) -> Result<ArtifactSnapshot, ArtifactError> {
        self.load(dir)
    }

    /// Run one artifact load, turning its failure into a diagnostic
    ///
    /// The outer error is only produced under [`LoadPolicy::FailFast`] for a
    /// corrupt artifact.
    fn isolate<T>(
        &self,
        artifact: &str,
        path: &Path,
        load: impl FnOnce(&Path) -> Result<T>,
    ) -> Result<Result<T, LoadDiagnostic>, ArtifactError> {
        if !path.exists() {
            debug!(artifact, path = %path.display(), "Optional artifact absent");
            return Ok(Err(LoadDiagnostic::absent(artifact, path)));
        }

        match load(path) {
            Ok(value) => Ok(Ok(value)),
            Err(e) => {
                let diag = LoadDiagnostic::corrupt(artifact, path, format!("{:#}", e));
                if self.policy == LoadPolicy::FailFast {
                    return Err(ArtifactError::Degraded(diag));
                }
                warn!(
                    artifact,
                    path = %path.display(),
                    error = %e,
                    "Failed to load artifact, continuing without it"
                );
                Ok(Err(diag))
            }
        }
    }
}

fn load_schema(dir: &Path) -> Result<FeatureSchema, ArtifactError> {
    let path = dir.join(manifest::FEATURES);
    if !path.exists() {
        return Err(ArtifactError::Missing {
            artifact: manifest::FEATURES,
            path,
        });
    }

    let bytes = std::fs::read(&path).map_err(|e| ArtifactError::InvalidSchema {
        path: path.clone(),
        reason: e.to_string(),
    })?;
    let schema: FeatureSchema =
        serde_json::from_slice(&bytes).map_err(|e| ArtifactError::InvalidSchema {
            path: path.clone(),
            reason: e.to_string(),
        })?;

    if schema.is_empty() {
        return Err(ArtifactError::InvalidSchema {
            path,
            reason: "feature list is empty".to_string(),
        });
    }
    Ok(schema)
}

fn load_metadata(path: &Path) -> Result<Map<String, Value>> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("Failed to read metadata file {:?}", path))?;
    serde_json::from_slice(&bytes).context("Metadata is not a JSON object")
}
