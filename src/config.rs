//! Configuration from environment variables and YAML files.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Errors loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The config file exists but could not be read.
    #[error("failed to read config file {path}: {source}")]
    Read {
        /// Config file path.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The config file is not valid YAML for this schema.
    #[error("invalid config file {path}: {source}")]
    Parse {
        /// Config file path.
        path: PathBuf,
        /// Underlying YAML error.
        source: serde_yaml::Error,
    },
}

/// OpenSearch connection and export settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenSearchConfig {
    /// Cluster base URL.
    pub url: String,
    /// Index for summary documents.
    pub summary_index: String,
    /// Index for timeseries documents.
    pub timeseries_index: String,
    /// Basic-auth user.
    pub username: Option<String>,
    /// Basic-auth password.
    pub password: Option<String>,
    /// Verify TLS certificates.
    pub verify_ssl: bool,
    /// Per-request timeout.
    pub timeout_secs: u64,
    /// Attempts on 5xx or transport errors.
    pub max_retries: u32,
    /// Fixed delay between attempts.
    pub retry_delay_secs: u64,
    /// Timeseries documents per bulk request.
    pub bulk_batch_size: usize,
}

impl Default for OpenSearchConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:9200".to_string(),
            summary_index: "zathras-results".to_string(),
            timeseries_index: "zathras-timeseries".to_string(),
            username: None,
            password: None,
            verify_ssl: true,
            timeout_secs: 30,
            max_retries: 3,
            retry_delay_secs: 5,
            bulk_batch_size: 500,
        }
    }
}

impl OpenSearchConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            url: std::env::var("OPENSEARCH_URL").unwrap_or(defaults.url),
            summary_index: std::env::var("OPENSEARCH_SUMMARY_INDEX")
                .unwrap_or(defaults.summary_index),
            timeseries_index: std::env::var("OPENSEARCH_TIMESERIES_INDEX")
                .unwrap_or(defaults.timeseries_index),
            username: std::env::var("OPENSEARCH_USERNAME").ok(),
            password: std::env::var("OPENSEARCH_PASSWORD").ok(),
            verify_ssl: std::env::var("OPENSEARCH_VERIFY_SSL")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.verify_ssl),
            timeout_secs: std::env::var("OPENSEARCH_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.timeout_secs),
            max_retries: std::env::var("OPENSEARCH_MAX_RETRIES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_retries),
            retry_delay_secs: std::env::var("OPENSEARCH_RETRY_DELAY_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.retry_delay_secs),
            bulk_batch_size: std::env::var("OPENSEARCH_BULK_BATCH_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.bulk_batch_size),
        }
    }
}

/// Top-level pipeline configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// OpenSearch export settings.
    pub opensearch: OpenSearchConfig,
}

impl PipelineConfig {
    /// Parse configuration from YAML text. Missing sections use defaults.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, serde_yaml::Error> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(yaml)
    }

    /// Load a YAML config file. A missing file yields the defaults.
    pub fn from_yaml_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            debug!(path = %path.display(), "Config file not found, using defaults");
            return Ok(Self::default());
        }

        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}
