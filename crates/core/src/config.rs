//! Configuration management
//!
//! Configuration is stored in TOML at `~/.config/sitepush/config.toml` (or
//! under `SITEPUSH_CONFIG_DIR`), and every field that matters for a CI run can
//! be overridden from the environment.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::classify::CacheControlConfig;
use crate::error::{Error, Result};
use crate::upload::DEFAULT_MAX_IN_FLIGHT;
use crate::walk::WalkOptions;

const CONFIG_DIR_ENV: &str = "SITEPUSH_CONFIG_DIR";
const CONFIG_FILE: &str = "config.toml";

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub bucket: BucketConfig,
    pub upload: UploadConfig,
    pub cache_control: CacheControlConfig,
}

/// Target bucket and connection settings
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BucketConfig {
    /// Bucket name
    pub name: String,
    /// S3 endpoint URL; empty means the SDK's default resolution
    pub endpoint: String,
    pub region: String,
    pub access_key: String,
    pub secret_key: String,
    /// Bucket lookup style: auto, path, or dns
    pub bucket_lookup: String,
}

impl Default for BucketConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            endpoint: String::new(),
            region: "us-east-1".to_string(),
            access_key: String::new(),
            secret_key: String::new(),
            bucket_lookup: "auto".to_string(),
        }
    }
}

impl std::fmt::Debug for BucketConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BucketConfig")
            .field("name", &self.name)
            .field("endpoint", &self.endpoint)
            .field("region", &self.region)
            .field("access_key", &self.access_key)
            .field("secret_key", &"<redacted>")
            .field("bucket_lookup", &self.bucket_lookup)
            .finish()
    }
}

impl BucketConfig {
    /// Static credentials, if both halves are configured
    pub fn credentials(&self) -> Option<(&str, &str)> {
        if self.access_key.is_empty() || self.secret_key.is_empty() {
            None
        } else {
            Some((&self.access_key, &self.secret_key))
        }
    }

    /// Whether requests should use path-style addressing
    pub fn force_path_style(&self) -> bool {
        self.bucket_lookup == "path" || self.bucket_lookup == "auto"
    }
}

/// What to upload and how
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    /// Local folder to publish
    pub folder: String,
    /// Maximum simultaneous uploads
    pub concurrency: usize,
    /// Extra attempts for transient failures
    pub retries: u32,
    /// Glob patterns (relative to the folder) to leave out
    pub exclude: Vec<String>,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            folder: "dist".to_string(),
            concurrency: DEFAULT_MAX_IN_FLIGHT,
            retries: 0,
            exclude: Vec::new(),
        }
    }
}

impl Config {
    /// Apply `SITEPUSH_*` environment overrides
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary lookup; empty values are ignored
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let fields: [(&str, &mut String); 9] = [
            ("SITEPUSH_BUCKET", &mut self.bucket.name),
            ("SITEPUSH_ENDPOINT", &mut self.bucket.endpoint),
            ("SITEPUSH_REGION", &mut self.bucket.region),
            ("SITEPUSH_ACCESS_KEY", &mut self.bucket.access_key),
            ("SITEPUSH_SECRET_KEY", &mut self.bucket.secret_key),
            ("SITEPUSH_FOLDER", &mut self.upload.folder),
            ("SITEPUSH_HTML_CACHE_CONTROL", &mut self.cache_control.html),
            ("SITEPUSH_IMAGE_CACHE_CONTROL", &mut self.cache_control.image),
            ("SITEPUSH_OTHER_CACHE_CONTROL", &mut self.cache_control.other),
        ];

        for (key, field) in fields {
            if let Some(value) = lookup(key).filter(|v| !v.is_empty()) {
                tracing::debug!(key = key, "Applying environment override");
                *field = value;
            }
        }
    }

    /// Check that the configuration can drive an upload
    pub fn validate(&self) -> Result<()> {
        if self.bucket.name.trim().is_empty() {
            return Err(Error::Config("Bucket name is required".to_string()));
        }

        if !self.bucket.endpoint.is_empty() {
            let url = url::Url::parse(&self.bucket.endpoint).map_err(|e| {
                Error::Config(format!("Invalid endpoint '{}': {e}", self.bucket.endpoint))
            })?;
            if url.scheme() != "http" && url.scheme() != "https" {
                return Err(Error::Config(format!(
                    "Endpoint must use http or https: {}",
                    self.bucket.endpoint
                )));
            }
        }

        if self.bucket.access_key.is_empty() != self.bucket.secret_key.is_empty() {
            return Err(Error::Config(
                "Access key and secret key must be set together".to_string(),
            ));
        }

        if !matches!(self.bucket.bucket_lookup.as_str(), "auto" | "path" | "dns") {
            return Err(Error::Config(format!(
                "Invalid bucket lookup '{}': expected auto, path, or dns",
                self.bucket.bucket_lookup
            )));
        }

        if self.upload.concurrency == 0 {
            return Err(Error::Config(
                "Upload concurrency must be at least 1".to_string(),
            ));
        }

        self.walk_options()?;
        Ok(())
    }

    /// Walker options built from the exclude list
    pub fn walk_options(&self) -> Result<WalkOptions> {
        WalkOptions::with_excludes(&self.upload.exclude)
    }
}

/// Loads and saves the configuration file
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// Use the default location
    pub fn new() -> Result<Self> {
        let dir = match std::env::var_os(CONFIG_DIR_ENV) {
            Some(dir) => PathBuf::from(dir),
            None => dirs::config_dir()
                .ok_or_else(|| Error::Config("Cannot determine config directory".to_string()))?
                .join("sitepush"),
        };
        Ok(Self::with_path(dir.join(CONFIG_FILE)))
    }

    /// Use an explicit file
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: path.into(),
        }
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Load the file; a missing file yields the defaults
    pub fn load(&self) -> Result<Config> {
        if !self.config_path.exists() {
            tracing::debug!(path = %self.config_path.display(), "No config file, using defaults");
            return Ok(Config::default());
        }

        let content = std::fs::read_to_string(&self.config_path)?;
        toml::from_str(&content).map_err(|e| {
            Error::Config(format!(
                "Failed to parse {}: {e}",
                self.config_path.display()
            ))
        })
    }

    pub fn save(&self, config: &Config) -> Result<()> {
        if let Some(parent) = self.config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(config)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {e}")))?;
        std::fs::write(&self.config_path, content)?;
        Ok(())
    }
}
