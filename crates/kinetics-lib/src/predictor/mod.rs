//! ML prediction engine

mod dispatch;
mod features;
mod inference;
mod output;
mod scaler;

pub use dispatch::{DispatchPolicy, InferenceDispatcher};
pub use features::{coerce, FeatureVectorizer};
pub use inference::OnnxPredictor;
pub use output::{OutputFormatter, NUM_OUTPUTS};
pub use scaler::{ScalerKind, ScalerTransform};

use crate::models::FeatureRow;
use anyhow::Result;

/// Trait for prediction backends
pub trait Predictor: Send + Sync {
    /// Run the model on a single feature row, returning its raw outputs
    fn predict(&self, row: &FeatureRow) -> Result<Vec<f64>>;

    /// Backend name used in logs and error messages
    fn name(&self) -> &str;
}
