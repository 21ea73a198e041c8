//! Server configuration

use anyhow::{Context, Result};
use kinetics_lib::artifacts::BundleConfig;
use kinetics_lib::{DispatchPolicy, LoadPolicy};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

/// Optional configuration file, looked up in the working directory
const CONFIG_FILE: &str = "kinetics";

/// Environment prefix, e.g. `KINETICS_PORT`
const ENV_PREFIX: &str = "KINETICS";

/// Server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind address
    #[serde(default = "default_host")]
    pub host: String,

    /// HTTP port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Directory holding the artifact manifest
    #[serde(default = "default_artifact_dir")]
    pub artifact_dir: PathBuf,

    /// Zipped artifact bundle, downloaded when manifest files are missing
    #[serde(default)]
    pub bundle_url: Option<String>,

    /// Expected SHA-256 of the bundle
    #[serde(default)]
    pub bundle_sha256: Option<String>,

    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout_secs: u64,

    #[serde(default = "default_max_bundle_bytes")]
    pub max_bundle_bytes: usize,

    #[serde(default)]
    pub load_policy: LoadPolicy,

    /// Allow the neural network tier when no tree model is loaded
    #[serde(default)]
    pub neural_fallback: bool,

    /// Reload automatically when artifact files change
    #[serde(default)]
    pub watch_artifacts: bool,

    /// Key required in `X-API-Key` on protected routes; unset allows all
    #[serde(default = "default_api_key")]
    pub api_key: Option<String>,

    /// `*` or a comma-separated origin list
    #[serde(default = "default_cors_origins")]
    pub cors_origins: String,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_artifact_dir() -> PathBuf {
    PathBuf::from("models")
}

fn default_fetch_timeout() -> u64 {
    120
}

fn default_max_bundle_bytes() -> usize {
    512 * 1024 * 1024
}

fn default_api_key() -> Option<String> {
    std::env::var("API_KEY").ok().filter(|key| !key.is_empty())
}

fn default_cors_origins() -> String {
    std::env::var("CORS_ORIGINS").unwrap_or_else(|_| "*".to_string())
}

impl ServerConfig {
    /// Load configuration from `kinetics.toml` (if present) and environment
    pub fn load() -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::File::with_name(CONFIG_FILE).required(false))
            .add_source(config::Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()
            .context("Failed to read configuration")?;

        config
            .try_deserialize()
            .context("Invalid server configuration")
    }

    /// Load configuration from a specific file, without environment overrides
    pub fn from_file(path: &Path) -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::File::from(path))
            .build()
            .with_context(|| format!("Failed to read configuration file {:?}", path))?;

        config
            .try_deserialize()
            .context("Invalid server configuration")
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Bundle download settings, when a bundle URL is configured
    pub fn bundle_config(&self) -> Result<Option<BundleConfig>> {
        let Some(raw) = self.bundle_url.as_deref().filter(|u| !u.trim().is_empty()) else {
            return Ok(None);
        };

        let url = Url::parse(raw.trim()).with_context(|| format!("Invalid bundle URL {:?}", raw))?;
        let mut bundle = BundleConfig::new(url);
        bundle.sha256 = self.bundle_sha256.clone();
        bundle.timeout = Duration::from_secs(self.fetch_timeout_secs);
        bundle.max_bytes = self.max_bundle_bytes;
        Ok(Some(bundle))
    }

    pub fn dispatch_policy(&self) -> DispatchPolicy {
        DispatchPolicy {
            neural_fallback: self.neural_fallback,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_config(contents: &str) -> (TempDir, PathBuf) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("kinetics.toml");
        fs::write(&path, contents).unwrap();
        (dir, path)
    }

    #[test]
    fn test_defaults() {
        let (_dir, path) = write_config("");
        let config = ServerConfig::from_file(&path).unwrap();

        assert_eq!(config.port, 8000);
        assert_eq!(config.artifact_dir, PathBuf::from("models"));
        assert_eq!(config.load_policy, LoadPolicy::FailOpen);
        assert!(!config.neural_fallback);
        assert!(config.bundle_config().unwrap().is_none());
        assert_eq!(config.bind_address(), "0.0.0.0:8000");
    }

    #[test]
    fn test_file_values() {
        let (_dir, path) = write_config(
            r#"
            port = 9100
            artifact_dir = "/srv/models"
            bundle_url = "https://artifacts.example.com/models.zip"
            bundle_sha256 = "abc123"
            fetch_timeout_secs = 30
            load_policy = "fail_fast"
            neural_fallback = true
            api_key = "secret"
            cors_origins = "https://a.example.com,https://b.example.com"
            "#,
        );
        let config = ServerConfig::from_file(&path).unwrap();

        assert_eq!(config.port, 9100);
        assert_eq!(config.load_policy, LoadPolicy::FailFast);
        assert!(config.dispatch_policy().neural_fallback);
        assert_eq!(config.api_key.as_deref(), Some("secret"));

        let bundle = config.bundle_config().unwrap().unwrap();
        assert_eq!(bundle.url.host_str(), Some("artifacts.example.com"));
        assert_eq!(bundle.sha256.as_deref(), Some("abc123"));
        assert_eq!(bundle.timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_invalid_bundle_url() {
        let (_dir, path) = write_config(r#"bundle_url = "not a url""#);
        let config = ServerConfig::from_file(&path).unwrap();
        assert!(config.bundle_config().is_err());
    }
}
