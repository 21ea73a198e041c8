//! Fitted feature scaling
//!
//! Scalers are exported by the training pipeline as a JSON document of fitted
//! parameters, e.g. `{"kind": "standard", "mean": [...], "scale": [...]}`.

use crate::models::FeatureRow;
use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::Path;

/// Fitted scaler parameters
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScalerKind {
    /// `(x - mean) / scale`
    Standard { mean: Vec<f64>, scale: Vec<f64> },
    /// `x * scale + min`
    MinMax { min: Vec<f64>, scale: Vec<f64> },
}

/// A fitted transform with a declared input width
#[derive(Debug, Clone, PartialEq)]
pub struct ScalerTransform {
    kind: ScalerKind,
}

impl ScalerTransform {
    pub fn new(kind: ScalerKind) -> Result<Self> {
        let (offsets, scale) = match &kind {
            ScalerKind::Standard { mean, scale } => (mean, scale),
            ScalerKind::MinMax { min, scale } => (min, scale),
        };
        if offsets.is_empty() {
            bail!("Scaler has no fitted parameters");
        }
        if offsets.len() != scale.len() {
            bail!(
                "Scaler parameter lengths differ ({} vs {})",
                offsets.len(),
                scale.len()
            );
        }
        if offsets.iter().chain(scale.iter()).any(|v| !v.is_finite()) {
            bail!("Scaler parameters contain non-finite values");
        }
        Ok(Self { kind })
    }

    pub fn standard(mean: Vec<f64>, scale: Vec<f64>) -> Result<Self> {
        Self::new(ScalerKind::Standard { mean, scale })
    }

    pub fn min_max(min: Vec<f64>, scale: Vec<f64>) -> Result<Self> {
        Self::new(ScalerKind::MinMax { min, scale })
    }

    /// Load a scaler document from disk
    pub fn from_file(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("Failed to read scaler file {:?}", path))?;
        let kind: ScalerKind =
            serde_json::from_slice(&bytes).context("Failed to parse scaler parameters")?;
        Self::new(kind)
    }

    /// Number of features the scaler was fitted on
    pub fn expected_width(&self) -> usize {
        match &self.kind {
            ScalerKind::Standard { mean, .. } => mean.len(),
            ScalerKind::MinMax { min, .. } => min.len(),
        }
    }

    pub fn kind(&self) -> &ScalerKind {
        &self.kind
    }

    /// Apply the transform; the row width must equal [`expected_width`](Self::expected_width)
    pub fn transform(&self, row: &FeatureRow) -> Result<FeatureRow> {
        if row.width() != self.expected_width() {
            bail!(
                "Scaler expects {} features, got {}",
                self.expected_width(),
                row.width()
            );
        }

        let values: Vec<f64> = match &self.kind {
            ScalerKind::Standard { mean, scale } => row
                .values()
                .iter()
                .zip(mean.iter().zip(scale.iter()))
                .map(|(x, (m, s))| {
                    // zero-variance features are fitted with scale 1
                    let s = if *s == 0.0 { 1.0 } else { *s };
                    (x - m) / s
                })
                .collect(),
            ScalerKind::MinMax { min, scale } => row
                .values()
                .iter()
                .zip(min.iter().zip(scale.iter()))
                .map(|(x, (m, s))| x * s + m)
                .collect(),
        };

        if let Some(pos) = values.iter().position(|v| !v.is_finite()) {
            bail!("Scaled feature {} is not finite", pos);
        }

        Ok(FeatureRow::new(values))
    }
}
