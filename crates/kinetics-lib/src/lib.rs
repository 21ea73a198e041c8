//! Kinetics prediction library
//!
//! This crate provides the core functionality for:
//! - Loading model artifacts into immutable, hot-swappable snapshots
//! - Feature vectorization and scaling
//! - Tiered inference dispatch over ONNX backends
//! - Health checks and observability

pub mod artifacts;
pub mod error;
pub mod health;
pub mod models;
pub mod observability;
pub mod predictor;

pub use artifacts::{ArtifactRegistry, ArtifactSnapshot, ArtifactStore, LoadPolicy};
pub use error::{ArtifactError, LoadDiagnostic, PredictError};
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use models::*;
pub use observability::{ServiceMetrics, StructuredLogger};
pub use predictor::{DispatchPolicy, InferenceDispatcher, Predictor};
