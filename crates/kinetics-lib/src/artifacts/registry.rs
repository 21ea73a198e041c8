//! Current-snapshot registry with atomic hot reload
//!
//! Readers clone the current `Arc<ArtifactSnapshot>` and keep it for the
//! whole request. Reload builds the replacement completely before swapping
//! the pointer, so a half-built snapshot is never visible and in-flight
//! requests finish on the snapshot they started with. Reloads are serialized:
//! a load that read the directory earlier never publishes over a later one.

use super::snapshot::ArtifactSnapshot;
use super::store::ArtifactStore;
use crate::error::ArtifactError;
use crate::observability::{ServiceMetrics, StructuredLogger};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::watch;

/// Holds the published artifact snapshot
pub struct ArtifactRegistry {
    store: ArtifactStore,
    artifact_dir: PathBuf,
    current: watch::Sender<Arc<ArtifactSnapshot>>,
    generation: AtomicU64,
    reload_lock: Mutex<()>,
    metrics: ServiceMetrics,
    logger: StructuredLogger,
}

impl ArtifactRegistry {
    /// Create a registry holding an empty snapshot
    pub fn new(store: ArtifactStore, artifact_dir: impl Into<PathBuf>) -> Self {
        Self::with_snapshot(store, artifact_dir, ArtifactSnapshot::empty())
    }

    pub fn with_snapshot(
        store: ArtifactStore,
        artifact_dir: impl Into<PathBuf>,
        snapshot: ArtifactSnapshot,
    ) -> Self {
        let (current, _) = watch::channel(Arc::new(snapshot));
        Self {
            store,
            artifact_dir: artifact_dir.into(),
            current,
            generation: AtomicU64::new(0),
            reload_lock: Mutex::new(()),
            metrics: ServiceMetrics::new(),
            logger: StructuredLogger::default(),
        }
    }

    /// The snapshot new requests should use
    pub fn current(&self) -> Arc<ArtifactSnapshot> {
        self.current.borrow().clone()
    }

    /// Number of snapshots published since construction
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    pub fn artifact_dir(&self) -> &Path {
        &self.artifact_dir
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    /// Receive every newly published snapshot
    pub fn subscribe(&self) -> watch::Receiver<Arc<ArtifactSnapshot>> {
        self.current.subscribe()
    }

    /// Swap in a fully built snapshot
    pub fn publish(&self, snapshot: ArtifactSnapshot) -> Arc<ArtifactSnapshot> {
        let snapshot = Arc::new(snapshot);
        self.current.send_replace(snapshot.clone());
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;

        self.metrics.record_snapshot(&snapshot);
        self.logger.log_snapshot_published(&snapshot, generation);
        snapshot
    }

    /// Load the artifact directory again and publish the result
    ///
    /// Blocking; async callers run it on the blocking pool. On failure the
    /// current snapshot stays in place. Concurrent callers load and publish
    /// one at a time.
    pub fn reload(&self) -> Result<Arc<ArtifactSnapshot>, ArtifactError> {
        let _guard = self
            .reload_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        match self.store.reload(&self.artifact_dir) {
            Ok(snapshot) => {
                self.metrics.inc_reloads("success");
                Ok(self.publish(snapshot))
            }
            Err(e) => {
                self.metrics.inc_reloads("failure");
                self.logger.log_reload_failed(&self.artifact_dir, &e);
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::store::{manifest, LoadPolicy, ModelLoader};
    use crate::models::{FeatureRow, FeatureSchema};
    use crate::predictor::Predictor;
    use std::fs;
    use std::sync::atomic::AtomicUsize;
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;
    use tempfile::TempDir;

    struct Idle(String);

    impl Predictor for Idle {
        fn predict(&self, _row: &FeatureRow) -> anyhow::Result<Vec<f64>> {
            Ok(vec![0.0, 0.0, 0.0])
        }

        fn name(&self) -> &str {
            &self.0
        }
    }

    /// Blocks the first model load until released
    struct GatedLoader {
        calls: AtomicUsize,
        entered: Mutex<mpsc::Sender<()>>,
        release: Mutex<mpsc::Receiver<()>>,
    }

    impl ModelLoader for GatedLoader {
        fn load(
            &self,
            name: &str,
            _path: &Path,
            _input_width: usize,
        ) -> anyhow::Result<Arc<dyn Predictor>> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                self.entered.lock().unwrap().send(()).unwrap();
                self.release.lock().unwrap().recv().unwrap();
            }
            Ok(Arc::new(Idle(name.to_string())))
        }
    }

    #[test]
    fn test_starts_empty() {
        let dir = TempDir::new().unwrap();
        let registry = ArtifactRegistry::new(ArtifactStore::new(LoadPolicy::FailOpen), dir.path());
        assert!(registry.current().schema().is_empty());
        assert_eq!(registry.generation(), 0);
    }

    #[test]
    fn test_publish_swaps_pointer() {
        let dir = TempDir::new().unwrap();
        let registry = ArtifactRegistry::new(ArtifactStore::new(LoadPolicy::FailOpen), dir.path());
        let before = registry.current();

        registry.publish(ArtifactSnapshot::builder(FeatureSchema::new(["T", "P"])).build());

        let after = registry.current();
        assert!(!Arc::ptr_eq(&before, &after));
        assert!(before.schema().is_empty());
        assert_eq!(after.schema().len(), 2);
        assert_eq!(registry.generation(), 1);
    }

    #[test]
    fn test_failed_reload_keeps_current() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(manifest::FEATURES), r#"["T"]"#).unwrap();
        let registry = ArtifactRegistry::new(ArtifactStore::new(LoadPolicy::FailOpen), dir.path());

        let loaded = registry.reload().unwrap();
        assert_eq!(loaded.schema().len(), 1);

        fs::remove_file(dir.path().join(manifest::FEATURES)).unwrap();
        assert!(registry.reload().is_err());
        assert!(Arc::ptr_eq(&loaded, &registry.current()));
        assert_eq!(registry.generation(), 1);
    }

    #[tokio::test]
    async fn test_subscribers_see_publish() {
        let dir = TempDir::new().unwrap();
        let registry = ArtifactRegistry::new(ArtifactStore::new(LoadPolicy::FailOpen), dir.path());
        let mut rx = registry.subscribe();

        registry.publish(ArtifactSnapshot::builder(FeatureSchema::new(["T"])).build());

        rx.changed().await.unwrap();
        assert_eq!(rx.borrow().schema().len(), 1);
    }

    #[test]
    fn test_concurrent_reloads_publish_latest_directory() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(manifest::FEATURES), r#"["T"]"#).unwrap();
        fs::write(dir.path().join(manifest::PRIMARY), b"rf").unwrap();

        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        let loader = GatedLoader {
            calls: AtomicUsize::new(0),
            entered: Mutex::new(entered_tx),
            release: Mutex::new(release_rx),
        };
        let store = ArtifactStore::new(LoadPolicy::FailOpen).with_loader(Arc::new(loader));
        let registry = Arc::new(ArtifactRegistry::new(store, dir.path()));

        // First reload reads the one-feature schema, then stalls in the loader
        let first = {
            let registry = registry.clone();
            thread::spawn(move || registry.reload())
        };
        entered_rx.recv().unwrap();

        fs::write(dir.path().join(manifest::FEATURES), r#"["T", "P"]"#).unwrap();
        let second = {
            let registry = registry.clone();
            thread::spawn(move || registry.reload())
        };
        thread::sleep(Duration::from_millis(50));
        release_tx.send(()).unwrap();

        assert_eq!(first.join().unwrap().unwrap().schema().len(), 1);
        assert_eq!(second.join().unwrap().unwrap().schema().len(), 2);
        assert_eq!(registry.current().schema().len(), 2);
        assert_eq!(registry.generation(), 2);
    }
}
