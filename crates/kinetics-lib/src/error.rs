//! Error taxonomy for artifact loading and prediction

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Why an optional artifact is missing from a snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiagnosticKind {
    /// File not present in the artifact directory
    Absent,
    /// File present but could not be parsed or loaded
    Corrupt(String),
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiagnosticKind::Absent => f.write_str("absent"),
            DiagnosticKind::Corrupt(reason) => write!(f, "corrupt: {}", reason),
        }
    }
}

/// Non-fatal degradation of a single optional artifact
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{artifact} ({}) {kind}", .path.display())]
pub struct LoadDiagnostic {
    pub artifact: String,
    pub path: PathBuf,
    pub kind: DiagnosticKind,
}

impl LoadDiagnostic {
    pub fn absent(artifact: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            artifact: artifact.into(),
            path: path.into(),
            kind: DiagnosticKind::Absent,
        }
    }

    pub fn corrupt(
        artifact: impl Into<String>,
        path: impl Into<PathBuf>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            artifact: artifact.into(),
            path: path.into(),
            kind: DiagnosticKind::Corrupt(reason.into()),
        }
    }

    pub fn is_corrupt(&self) -> bool {
        matches!(self.kind, DiagnosticKind::Corrupt(_))
    }
}

/// Failure to produce a usable artifact snapshot
#[derive(Debug, Error)]
pub enum ArtifactError {
    /// A required artifact (the feature schema) is not present
    #[error("required artifact {artifact} not found at {}", .path.display())]
    Missing { artifact: &'static str, path: PathBuf },

    /// The feature schema exists but cannot be used
    #[error("feature schema {} is invalid: {reason}", .path.display())]
    InvalidSchema { path: PathBuf, reason: String },

    /// An optional artifact is corrupt and the store runs fail-fast
    #[error("artifact load aborted: {0}")]
    Degraded(LoadDiagnostic),

    /// Bundle download or unpacking failed and the store runs fail-fast
    #[error("artifact bundle fetch failed: {0}")]
    Fetch(String),
}

/// Failure to serve a single prediction
#[derive(Debug, Error)]
pub enum PredictError {
    /// Ordered input contained a value that is not numeric
    #[error("invalid feature input at index {index}: {reason}")]
    InvalidFeatureInput { index: usize, reason: String },

    /// Snapshot holds no backend the dispatch policy may use
    #[error("No trained models loaded.")]
    NoModelAvailable,

    /// The selected backend failed while predicting
    #[error("{backend} prediction failed: {reason}")]
    BackendInvocation { backend: String, reason: String },
}

impl PredictError {
    /// True when the caller caused the failure (maps to HTTP 400)
    pub fn is_client_error(&self) -> bool {
        matches!(self, PredictError::InvalidFeatureInput { .. })
    }

    /// Short label used for metrics
    pub fn kind(&self) -> &'static str {
        match self {
            PredictError::InvalidFeatureInput { .. } => "invalid_input",
            PredictError::NoModelAvailable => "no_model",
            PredictError::BackendInvocation { .. } => "backend_failure",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diagnostic_display() {
        let diag = LoadDiagnostic::corrupt("scaler", "/models/scaler.json", "bad json");
        let text = diag.to_string();
        assert!(text.contains("scaler"));
        assert!(text.contains("/models/scaler.json"));
        assert!(text.contains("corrupt: bad json"));
        assert!(diag.is_corrupt());
        assert!(!LoadDiagnostic::absent("meta", "/m").is_corrupt());
    }

    #[test]
    fn test_missing_names_schema_file() {
        let err = ArtifactError::Missing {
            artifact: "features.json",
            path: PathBuf::from("/models/features.json"),
        };
        assert!(err.to_string().contains("features.json"));
    }

    #[test]
    fn test_client_error_classification() {
        let invalid = PredictError::InvalidFeatureInput {
            index: 1,
            reason: "not a number".to_string(),
        };
        assert!(invalid.is_client_error());
        assert!(!PredictError::NoModelAvailable.is_client_error());
        assert!(!PredictError::BackendInvocation {
            backend: "rf".to_string(),
            reason: "shape".to_string()
        }
        .is_client_error());
    }
}
