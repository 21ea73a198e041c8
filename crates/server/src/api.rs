//! HTTP API for predictions, artifact reload, health checks and Prometheus metrics

use axum::{
    extract::{rejection::JsonRejection, Request, State},
    http::{header, HeaderName, HeaderValue, Method, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use kinetics_lib::{
    health::{ComponentStatus, HealthRegistry},
    ArtifactRegistry, FeatureInput, InferenceDispatcher, PredictError, PredictionResult,
};
use prometheus::{Encoder, TextEncoder};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::future::Future;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing::{info, warn};

/// Header carrying the API key on protected routes
pub const API_KEY_HEADER: &str = "x-api-key";

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<ArtifactRegistry>,
    pub dispatcher: Arc<InferenceDispatcher>,
    pub health_registry: HealthRegistry,
    pub api_key: Option<String>,
    pub cors_origins: String,
}

impl AppState {
    pub fn new(dispatcher: Arc<InferenceDispatcher>, health_registry: HealthRegistry) -> Self {
        Self {
            registry: dispatcher.registry().clone(),
            dispatcher,
            health_registry,
            api_key: None,
            cors_origins: "*".to_string(),
        }
    }

    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key;
        self
    }

    pub fn with_cors_origins(mut self, cors_origins: impl Into<String>) -> Self {
        self.cors_origins = cors_origins.into();
        self
    }
}

/// Body of `POST /predict/features`
#[derive(Debug, Deserialize)]
pub struct PredictRequest {
    pub features: FeatureInput,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub models_loaded: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MetaResponse {
    pub expected_features: usize,
    pub models: serde_json::Value,
}

/// Error response with a `{"detail": ...}` body
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    detail: String,
}

impl ApiError {
    pub fn new(status: StatusCode, detail: impl Into<String>) -> Self {
        Self {
            status,
            detail: detail.into(),
        }
    }

    fn internal(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, detail)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "detail": self.detail }))).into_response()
    }
}

impl From<PredictError> for ApiError {
    fn from(err: PredictError) -> Self {
        let status = if err.is_client_error() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        Self::new(status, err.to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::new(StatusCode::BAD_REQUEST, rejection.body_text())
    }
}

/// Reject protected requests without the configured API key
async fn require_api_key(State(state): State<Arc<AppState>>, req: Request, next: Next) -> Response {
    if let Some(expected) = state.api_key.as_deref() {
        let provided = req
            .headers()
            .get(API_KEY_HEADER)
            .and_then(|v| v.to_str().ok());
        if provided != Some(expected) {
            return ApiError::new(StatusCode::UNAUTHORIZED, "Invalid API key").into_response();
        }
    }
    next.run(req).await
}

/// Predict kinetic parameters from a named or ordered feature input
async fn predict_features(
    State(state): State<Arc<AppState>>,
    body: Result<Json<PredictRequest>, JsonRejection>,
) -> Result<Json<PredictionResult>, ApiError> {
    let Json(request) = body?;
    let result = state.dispatcher.predict(&request.features).map_err(|e| {
        if !e.is_client_error() {
            warn!(error = %e, "Prediction failed");
        }
        ApiError::from(e)
    })?;
    Ok(Json(result))
}

/// Reload artifacts from disk and publish the new snapshot
async fn reload(State(state): State<Arc<AppState>>) -> Result<Json<StatusResponse>, ApiError> {
    let registry = state.registry.clone();
    tokio::task::spawn_blocking(move || registry.reload())
        .await
        .map_err(|e| ApiError::internal(format!("Reload task failed: {}", e)))?
        .map_err(|e| ApiError::internal(e.to_string()))?;

    Ok(Json(StatusResponse {
        status: "reloaded".to_string(),
        models_loaded: None,
    }))
}

/// Liveness summary, never fails when no models are loaded
async fn health(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    let snapshot = state.registry.current();
    Json(StatusResponse {
        status: "ok".to_string(),
        models_loaded: Some(snapshot.has_usable_backend(state.dispatcher.policy().neural_fallback)),
    })
}

/// Feature count and model metadata of the current snapshot
async fn meta(State(state): State<Arc<AppState>>) -> Json<MetaResponse> {
    let snapshot = state.registry.current();
    Json(MetaResponse {
        expected_features: snapshot.schema().len(),
        models: snapshot.models_summary(),
    })
}

/// Health check response - returns 200 if healthy or degraded, 503 if unhealthy
async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state.health_registry.health().await;

    let status_code = match health.status {
        ComponentStatus::Healthy => StatusCode::OK,
        ComponentStatus::Degraded => StatusCode::OK, // Still serving
        ComponentStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(health))
}

/// Readiness check response - returns 200 if ready, 503 if not ready
async fn readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let readiness = state.health_registry.readiness().await;

    let status_code = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(readiness))
}

/// Prometheus metrics endpoint
async fn metrics() -> Response {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        return ApiError::internal(format!("Failed to encode metrics: {}", e)).into_response();
    }

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, encoder.format_type().to_string())],
        buffer,
    )
        .into_response()
}

/// CORS policy for `*` or a comma-separated origin list
pub fn cors_layer(origins: &str) -> CorsLayer {
    let cors = if origins.trim() == "*" {
        CorsLayer::new().allow_origin(Any)
    } else {
        let origins = origins
            .split(',')
            .filter_map(|origin| origin.trim().parse::<HeaderValue>().ok())
            .collect::<Vec<_>>();
        CorsLayer::new().allow_origin(AllowOrigin::list(origins))
    };

    cors.allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            header::ACCEPT,
            HeaderName::from_static(API_KEY_HEADER),
        ])
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    let protected = Router::new()
        .route("/predict/features", post(predict_features))
        .route("/reload", post(reload))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_api_key));

    Router::new()
        .route("/health", get(health))
        .route("/meta", get(meta))
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .merge(protected)
        .layer(cors_layer(&state.cors_origins))
        .with_state(state)
}

/// Start the API server and run until `shutdown` resolves
pub async fn serve(
    addr: &str,
    state: Arc<AppState>,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let app = create_router(state);

    info!(addr = %addr, "Starting API server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}
