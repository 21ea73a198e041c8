//! Artifact directory watcher
//!
//! Watches the artifact directory and reloads the registry when a manifest
//! file is created or replaced. A rejected reload is logged and the current
//! snapshot stays published. File events are debounced so a bundle that
//! lands as several writes triggers one reload.

use super::registry::ArtifactRegistry;
use super::store::manifest;
use anyhow::{Context, Result};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Quiet period before a burst of file events triggers a reload
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(500);

/// Keeps the file watcher and its reload task alive
pub struct ArtifactWatcher {
    _watcher: RecommendedWatcher,
    task: JoinHandle<()>,
}

impl ArtifactWatcher {
    /// Start watching the registry's artifact directory
    pub fn spawn(registry: Arc<ArtifactRegistry>, debounce: Duration) -> Result<Self> {
        let (event_tx, mut event_rx) = tokio::sync::mpsc::unbounded_channel();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| {
                if let Ok(event) = res {
                    let _ = event_tx.send(event);
                }
            },
            notify::Config::default(),
        )
        .context("Failed to create artifact watcher")?;

        let dir = registry.artifact_dir().to_path_buf();
        watcher
            .watch(&dir, RecursiveMode::NonRecursive)
            .with_context(|| format!("Failed to watch artifact directory {:?}", dir))?;
        info!(dir = %dir.display(), "Watching artifact directory for changes");

        let task = tokio::spawn(async move {
            while let Some(event) = event_rx.recv().await {
                if !is_manifest_change(&event) {
                    continue;
                }

                // drain the burst
                let mut quiet_since = Instant::now();
                while quiet_since.elapsed() < debounce {
                    match tokio::time::timeout(debounce, event_rx.recv()).await {
                        Ok(Some(_)) => quiet_since = Instant::now(),
                        Ok(None) => return,
                        Err(_) => break,
                    }
                }

                debug!("Artifact change detected, reloading");
                let registry = registry.clone();
                match tokio::task::spawn_blocking(move || registry.reload()).await {
                    Ok(Ok(_)) => {}
                    Ok(Err(e)) => warn!(error = %e, "Artifact reload rejected, keeping current snapshot"),
                    Err(e) => warn!(error = %e, "Artifact reload task failed"),
                }
            }
        });

        Ok(Self {
            _watcher: watcher,
            task,
        })
    }
}

impl Drop for ArtifactWatcher {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Whether a file event touches a manifest file
pub fn is_manifest_change(event: &Event) -> bool {
    matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_))
        && event.paths.iter().any(|path| {
            path.file_name()
                .and_then(|name| name.to_str())
                .map(manifest::contains)
                .unwrap_or(false)
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::store::{ArtifactStore, LoadPolicy};
    use notify::event::{CreateKind, ModifyKind, RemoveKind};
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn event(kind: EventKind, path: &str) -> Event {
        Event::new(kind).add_path(PathBuf::from(path))
    }

    #[test]
    fn test_manifest_changes_detected() {
        assert!(is_manifest_change(&event(
            EventKind::Create(CreateKind::File),
            "/models/model_rf.onnx"
        )));
        assert!(is_manifest_change(&event(
            EventKind::Modify(ModifyKind::Any),
            "/models/features.json"
        )));
    }

    #[test]
    fn test_unrelated_changes_ignored() {
        assert!(!is_manifest_change(&event(
            EventKind::Create(CreateKind::File),
            "/models/features.tmp"
        )));
        assert!(!is_manifest_change(&event(
            EventKind::Remove(RemoveKind::File),
            "/models/model_rf.onnx"
        )));
    }

    #[tokio::test]
    async fn test_watcher_reloads_on_schema_write() {
        let dir = TempDir::new().unwrap();
        let registry = Arc::new(ArtifactRegistry::new(
            ArtifactStore::new(LoadPolicy::FailOpen),
            dir.path(),
        ));
        let mut rx = registry.subscribe();
        let _watcher = ArtifactWatcher::spawn(registry.clone(), Duration::from_millis(50)).unwrap();

        std::fs::write(dir.path().join(manifest::FEATURES), r#"["T", "P"]"#).unwrap();

        tokio::time::timeout(Duration::from_secs(10), rx.changed())
            .await
            .expect("reload not triggered")
            .unwrap();
        assert_eq!(registry.current().schema().len(), 2);
    }
}
