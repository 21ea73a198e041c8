//! Prediction output post-processing
//!
//! Converts raw model outputs `[log10(A), n, Ea]` into a [`PredictionResult`]
//! and aggregates ensemble member outputs.

use crate::models::{BackendTier, PredictionResult, ScalingOutcome};
use anyhow::{bail, Result};
use serde_json::{Map, Value};

/// Number of values every backend must produce
pub const NUM_OUTPUTS: usize = 3;

/// Formats raw model outputs into a [`PredictionResult`]
#[derive(Debug, Clone, Default)]
pub struct OutputFormatter;

impl OutputFormatter {
    pub fn new() -> Self {
        Self
    }

    /// Take the leading [`NUM_OUTPUTS`] values of a backend output
    pub fn raw_outputs(values: &[f64]) -> Result<[f64; NUM_OUTPUTS]> {
        if values.len() < NUM_OUTPUTS {
            bail!(
                "Model output has {} values, expected {}",
                values.len(),
                NUM_OUTPUTS
            );
        }
        let raw = [values[0], values[1], values[2]];
        if let Some(value) = raw.iter().find(|v| !v.is_finite()) {
            bail!("Model output contains non-finite value {}", value);
        }
        Ok(raw)
    }

    /// Element-wise arithmetic mean of member outputs
    pub fn mean(outputs: &[[f64; NUM_OUTPUTS]]) -> [f64; NUM_OUTPUTS] {
        let mut sum = [0.0; NUM_OUTPUTS];
        if outputs.is_empty() {
            return sum;
        }
        for output in outputs {
            for (acc, value) in sum.iter_mut().zip(output.iter()) {
                *acc += value;
            }
        }
        let count = outputs.len() as f64;
        sum.map(|v| v / count)
    }

    /// Build the caller-facing result
    ///
    /// # Arguments
    /// * `raw` - Raw outputs `[log10(A), n, Ea_kJ_per_mol]`
    /// * `tier` - Tier that produced the outputs
    /// * `meta` - Metadata of the snapshot that served the request
    ///
    /// Fails when `10^log10(A)` is not representable as a finite `f64`.
    pub fn format(
        &self,
        raw: [f64; NUM_OUTPUTS],
        tier: BackendTier,
        meta: &Map<String, Value>,
        scaling: ScalingOutcome,
    ) -> Result<PredictionResult> {
        let a = 10f64.powf(raw[0]);
        if !a.is_finite() {
            bail!("log10(A) = {} overflows the pre-exponential factor", raw[0]);
        }
        Ok(PredictionResult {
            a,
            n: raw[1],
            ea_kj_per_mol: raw[2],
            model_used: tier.to_string(),
            meta: meta.clone(),
            scaling,
        })
    }
}
