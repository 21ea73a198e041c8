//! Model artifact registry
//!
//! Loads the artifact directory into immutable snapshots, publishes them
//! through a swappable pointer, and optionally fetches missing artifacts and
//! watches the directory for changes.

mod fetch;
mod registry;
mod snapshot;
mod store;
mod watcher;

pub use fetch::{compute_checksum, extract_bundle, missing_artifacts, BundleConfig, BundleFetcher, FetchOutcome};
pub use registry::ArtifactRegistry;
pub use snapshot::{ArtifactSnapshot, SnapshotBuilder};
pub use store::{manifest, ArtifactStore, LoadPolicy, ModelLoader, OnnxModelLoader};
pub use watcher::{is_manifest_change, ArtifactWatcher, DEFAULT_DEBOUNCE};
