//! Core data models for the kinetics predictor

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Ordered feature names defining the model input dimensionality
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureSchema {
    names: Vec<String>,
}

impl FeatureSchema {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// Caller-supplied feature input, resolved once at the API boundary
///
/// A JSON object deserializes as [`FeatureInput::Named`], a JSON array as
/// [`FeatureInput::Ordered`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FeatureInput {
    /// Feature name to value, assembled in schema order
    Named(Map<String, Value>),
    /// Raw ordered vector, used as given
    Ordered(Vec<Value>),
}

impl FeatureInput {
    /// Build a named input from `(name, value)` pairs
    pub fn named<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        FeatureInput::Named(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Build an ordered input from numeric values
    pub fn ordered<I>(values: I) -> Self
    where
        I: IntoIterator<Item = f64>,
    {
        FeatureInput::Ordered(values.into_iter().map(Value::from).collect())
    }
}

/// A single-row `[1 x D]` numeric feature matrix
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRow {
    values: Vec<f64>,
}

impl FeatureRow {
    pub fn new(values: Vec<f64>) -> Self {
        Self { values }
    }

    pub fn width(&self) -> usize {
        self.values.len()
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }
}

/// Prediction tier that produced a result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BackendTier {
    /// Single best model (random forest)
    Primary,
    /// Mean of several member models (boosted trees)
    Ensemble,
    /// Neural network, reachable only when neural fallback is enabled
    Neural,
}

impl BackendTier {
    pub const ALL: [BackendTier; 3] = [BackendTier::Primary, BackendTier::Ensemble, BackendTier::Neural];

    pub fn as_str(&self) -> &'static str {
        match self {
            BackendTier::Primary => "Primary",
            BackendTier::Ensemble => "Ensemble",
            BackendTier::Neural => "Neural",
        }
    }
}

impl fmt::Display for BackendTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What happened to the scaler for one prediction
#[derive(Debug, Clone, Default, PartialEq)]
pub enum ScalingOutcome {
    /// No scaler in the snapshot
    #[default]
    NotConfigured,
    /// Scaler applied to the feature row
    Applied,
    /// Scaler width did not match the row width, raw features used
    Incompatible { expected: usize, actual: usize },
    /// Scaler raised during transform, raw features used
    Failed(String),
}

impl ScalingOutcome {
    pub fn was_applied(&self) -> bool {
        matches!(self, ScalingOutcome::Applied)
    }

    /// Human-readable diagnostic when scaling was skipped
    pub fn diagnostic(&self) -> Option<String> {
        match self {
            ScalingOutcome::Incompatible { expected, actual } => Some(format!(
                "scaler skipped: expects {} features, input has {}",
                expected, actual
            )),
            ScalingOutcome::Failed(reason) => Some(format!("scaler skipped: {}", reason)),
            _ => None,
        }
    }
}

/// Kinetic parameters returned to callers
#[derive(Debug, Clone, Serialize)]
pub struct PredictionResult {
    /// Pre-exponential factor, already raised from its log10 form
    #[serde(rename = "A")]
    pub a: f64,
    /// Temperature exponent (reaction order)
    pub n: f64,
    /// Activation energy in kJ/mol
    #[serde(rename = "Ea_kJ_per_mol")]
    pub ea_kj_per_mol: f64,
    pub model_used: String,
    pub meta: Map<String, Value>,
    #[serde(skip)]
    pub scaling: ScalingOutcome,
}
