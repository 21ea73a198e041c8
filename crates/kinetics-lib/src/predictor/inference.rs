//! ONNX inference using tract
//!
//! The training pipeline exports the random forest, the per-target boosted
//! trees and the neural network to ONNX; tract runs them in-process without a
//! native runtime.

use super::Predictor;
use crate::models::FeatureRow;
use anyhow::{bail, Context, Result};
use std::path::Path;
use std::time::{Duration, Instant};
use tract_onnx::prelude::*;
use tracing::{debug, warn};

/// Inference latency above which a warning is logged
const SLOW_INFERENCE: Duration = Duration::from_millis(250);

type TractModel = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// ONNX regressor compiled for a fixed input width
pub struct OnnxPredictor {
    name: String,
    model: TractModel,
    input_width: usize,
}

impl OnnxPredictor {
    /// Load a model file, pinning its input to `[1, input_width]`
    pub fn from_file(name: impl Into<String>, path: &Path, input_width: usize) -> Result<Self> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("Failed to read model file {:?}", path))?;
        Self::from_bytes(name, &bytes, input_width)
    }

    pub fn from_bytes(name: impl Into<String>, model_bytes: &[u8], input_width: usize) -> Result<Self> {
        if input_width == 0 {
            bail!("Cannot compile a model for zero input features");
        }
        let model = Self::load_model(model_bytes, input_width)?;
        Ok(Self {
            name: name.into(),
            model,
            input_width,
        })
    }

    /// Load and optimize an ONNX model from bytes
    fn load_model(model_bytes: &[u8], input_width: usize) -> Result<TractModel> {
        let model = tract_onnx::onnx()
            .model_for_read(&mut std::io::Cursor::new(model_bytes))
            .context("Failed to parse ONNX model")?
            .with_input_fact(0, f32::fact([1, input_width]).into())
            .context("Failed to set input shape")?
            .into_optimized()
            .context("Failed to optimize model")?
            .into_runnable()
            .context("Failed to create runnable model")?;
        Ok(model)
    }

    /// Convert a feature row to a `[1, D]` f32 tensor
    fn row_to_tensor(&self, row: &FeatureRow) -> Result<Tensor> {
        if row.width() != self.input_width {
            bail!(
                "Model expects {} features, got {}",
                self.input_width,
                row.width()
            );
        }
        let data: Vec<f32> = row.values().iter().map(|v| *v as f32).collect();
        let array = tract_ndarray::Array2::from_shape_vec((1, self.input_width), data)
            .context("Failed to shape input tensor")?;
        Ok(array.into())
    }

    pub fn input_width(&self) -> usize {
        self.input_width
    }
}

fn is_slow(elapsed: Duration) -> bool {
    elapsed > SLOW_INFERENCE
}

impl Predictor for OnnxPredictor {
    fn predict(&self, row: &FeatureRow) -> Result<Vec<f64>> {
        let start = Instant::now();
        let input = self.row_to_tensor(row)?;

        let result = self.model.run(tvec!(input.into()))?;
        let output = result.first().context("No output from model")?;
        let output = output
            .cast_to::<f32>()
            .context("Model output is not numeric")?;
        let values: Vec<f64> = output
            .to_array_view::<f32>()?
            .iter()
            .map(|v| *v as f64)
            .collect();

        let elapsed = start.elapsed();
        if is_slow(elapsed) {
            warn!(
                model = %self.name,
                elapsed_ms = elapsed.as_millis(),
                "Inference exceeded {}ms target",
                SLOW_INFERENCE.as_millis()
            );
        } else {
            debug!(model = %self.name, elapsed_us = elapsed.as_micros(), "Inference completed");
        }

        Ok(values)
    }

    fn name(&self) -> &str {
        &self.name
    }
}
