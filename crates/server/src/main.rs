//! Kinetics prediction server
//!
//! Loads the model artifacts, serves predictions over HTTP and hot-reloads
//! the artifacts on request or when the artifact directory changes.

use anyhow::{Context, Result};
use kinetics_lib::{
    artifacts::{ArtifactWatcher, BundleFetcher, DEFAULT_DEBOUNCE},
    health::{components, HealthRegistry},
    observability::StructuredLogger,
    ArtifactRegistry, ArtifactStore, InferenceDispatcher, LoadPolicy,
};
use kinetics_server::{api, config::ServerConfig};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting kinetics-server");

    let config = ServerConfig::load()?;
    info!(
        artifact_dir = %config.artifact_dir.display(),
        load_policy = ?config.load_policy,
        neural_fallback = config.neural_fallback,
        auth = config.api_key.is_some(),
        "Server configured"
    );

    let logger = StructuredLogger::default();

    // Make sure artifacts are on disk before the first load
    let mut store = ArtifactStore::new(config.load_policy);
    if let Some(bundle) = config.bundle_config()? {
        store = store.with_fetcher(BundleFetcher::new(bundle)?);
    }
    let fetched = store
        .ensure_artifacts_present(&config.artifact_dir)
        .await
        .context("Artifact bundle fetch failed")?;
    info!(outcome = ?fetched, "Artifact presence checked");

    let registry = Arc::new(ArtifactRegistry::new(store, &config.artifact_dir));
    let policy = config.dispatch_policy();

    // Health follows every published snapshot
    let health_registry = HealthRegistry::new();
    health_registry.register(components::DISPATCHER).await;
    health_registry
        .record_snapshot(&registry.current(), policy.neural_fallback)
        .await;
    let health_tracker = health_registry.track_snapshots(registry.subscribe(), policy.neural_fallback);

    let initial = registry.clone();
    match tokio::task::spawn_blocking(move || initial.reload()).await? {
        Ok(_) => {}
        Err(e) if config.load_policy == LoadPolicy::FailFast => {
            return Err(e).context("Initial artifact load failed");
        }
        Err(e) => warn!(error = %e, "Initial artifact load failed, serving without models"),
    }

    let _watcher = if config.watch_artifacts {
        Some(ArtifactWatcher::spawn(registry.clone(), DEFAULT_DEBOUNCE)?)
    } else {
        None
    };

    let dispatcher = Arc::new(InferenceDispatcher::new(registry.clone(), policy));
    let app_state = Arc::new(
        api::AppState::new(dispatcher, health_registry.clone())
            .with_api_key(config.api_key.clone())
            .with_cors_origins(config.cors_origins.clone()),
    );

    health_registry.set_ready(true).await;
    logger.log_startup(SERVER_VERSION, &config.artifact_dir);

    api::serve(&config.bind_address(), app_state, shutdown_signal()).await?;

    logger.log_shutdown("SIGINT received");
    health_tracker.abort();
    info!("Shutting down");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
