//! Artifact bundle download
//!
//! This module provides:
//! - Detection of manifest files missing from the artifact directory
//! - Bounded-time download of the zipped bundle
//! - Checksum validation before unpacking
//! - Extraction confined to the artifact directory

use super::store::manifest;
use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::{Cursor, Read, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};
use url::Url;
use zip::ZipArchive;

/// Configuration for bundle downloads
#[derive(Debug, Clone)]
pub struct BundleConfig {
    /// Location of the zipped artifact bundle
    pub url: Url,
    /// Expected SHA-256 of the bundle, hex encoded
    pub sha256: Option<String>,
    /// Upper bound on the whole download
    pub timeout: Duration,
    /// Maximum size in bytes of the bundle and of each unpacked file
    pub max_bytes: usize,
}

impl BundleConfig {
    pub fn new(url: Url) -> Self {
        Self {
            url,
            sha256: None,
            timeout: Duration::from_secs(120),
            max_bytes: 512 * 1024 * 1024,
        }
    }
}

/// Result of making sure artifacts are on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Every manifest file was already present
    AlreadyPresent,
    /// The bundle was downloaded and this many files were written
    Fetched { files: usize },
    /// Files were missing but no bundle URL is configured
    Skipped,
    /// The download or extraction failed; startup continues
    Failed(String),
}

/// Downloads and unpacks artifact bundles
pub struct BundleFetcher {
    config: BundleConfig,
    client: reqwest::Client,
}

impl BundleFetcher {
    pub fn new(config: BundleConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self { config, client })
    }

    pub fn config(&self) -> &BundleConfig {
        &self.config
    }

    /// Download the bundle and unpack it into `dir`, returning the file count
    pub async fn fetch_into(&self, dir: &Path) -> Result<usize> {
        let bytes = tokio::time::timeout(self.config.timeout, self.download())
            .await
            .with_context(|| format!("Bundle download timed out after {:?}", self.config.timeout))??;

        if let Some(expected) = &self.config.sha256 {
            let computed = compute_checksum(&bytes);
            if !computed.eq_ignore_ascii_case(expected.trim()) {
                anyhow::bail!("Checksum mismatch: expected {}, got {}", expected, computed);
            }
            info!(checksum = %computed, "Artifact bundle checksum validated");
        }

        let dir = dir.to_path_buf();
        let max_bytes = self.config.max_bytes;
        tokio::task::spawn_blocking(move || extract_bundle(&bytes, &dir, max_bytes))
            .await
            .context("Bundle extraction task failed")?
    }

    async fn download(&self) -> Result<Vec<u8>> {
        debug!(url = %self.config.url, "Downloading artifact bundle");
        let response = self
            .client
            .get(self.config.url.clone())
            .send()
            .await
            .context("Failed to request artifact bundle")?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("Failed to download artifact bundle (HTTP {})", status);
        }

        if let Some(len) = response.content_length() {
            if len as usize > self.config.max_bytes {
                anyhow::bail!(
                    "Bundle size {} exceeds maximum {}",
                    len,
                    self.config.max_bytes
                );
            }
        }

        let bytes = response
            .bytes()
            .await
            .context("Failed to read artifact bundle body")?;
        if bytes.len() > self.config.max_bytes {
            anyhow::bail!(
                "Bundle size {} exceeds maximum {}",
                bytes.len(),
                self.config.max_bytes
            );
        }
        Ok(bytes.to_vec())
    }
}

/// Manifest files not present in `dir`
pub fn missing_artifacts(dir: &Path) -> Vec<&'static str> {
    manifest::all()
        .into_iter()
        .filter(|file| !dir.join(file).exists())
        .collect()
}

/// Unpack a zip bundle into `dir`
///
/// Manifest files are written at the top of `dir` wherever they sit in the
/// archive; other entries keep their relative path. Entries whose path would
/// escape `dir` are skipped. An entry that decompresses past
/// `max_entry_bytes` fails the extraction.
pub fn extract_bundle(bytes: &[u8], dir: &Path, max_entry_bytes: usize) -> Result<usize> {
    let mut archive = ZipArchive::new(Cursor::new(bytes)).context("Bundle is not a zip archive")?;
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create artifact directory {:?}", dir))?;

    let mut written = 0;
    for index in 0..archive.len() {
        let mut entry = archive
            .by_index(index)
            .with_context(|| format!("Failed to read bundle entry {}", index))?;
        if entry.is_dir() {
            continue;
        }

        let Some(relative) = entry.enclosed_name().map(Path::to_path_buf) else {
            debug!(entry = %entry.name(), "Skipping bundle entry outside artifact directory");
            continue;
        };
        let target = target_path(dir, &relative);

        let declared = usize::try_from(entry.size()).unwrap_or(usize::MAX);
        let mut contents = Vec::with_capacity(declared.min(max_entry_bytes));
        entry
            .by_ref()
            .take(max_entry_bytes as u64 + 1)
            .read_to_end(&mut contents)
            .with_context(|| format!("Failed to decompress {:?}", relative))?;
        if contents.len() > max_entry_bytes {
            anyhow::bail!(
                "Bundle entry {:?} exceeds maximum {} bytes",
                relative,
                max_entry_bytes
            );
        }
        write_atomic(&target, &contents)?;
        written += 1;
    }

    Ok(written)
}

fn target_path(dir: &Path, relative: &Path) -> PathBuf {
    match relative.file_name().and_then(|n| n.to_str()) {
        Some(name) if manifest::contains(name) => dir.join(name),
        _ => dir.join(relative),
    }
}

/// Write to a temp file first, then rename over the final path
fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {:?}", parent))?;
    }

    let temp_path = path.with_extension("tmp");
    let mut file = File::create(&temp_path)
        .with_context(|| format!("Failed to create temp file {:?}", temp_path))?;
    file.write_all(contents)
        .context("Failed to write artifact")?;
    file.sync_all().context("Failed to sync artifact file")?;

    fs::rename(&temp_path, path)
        .with_context(|| format!("Failed to rename {:?} to {:?}", temp_path, path))?;
    Ok(())
}

/// Compute SHA256 checksum of data
pub fn compute_checksum(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}
