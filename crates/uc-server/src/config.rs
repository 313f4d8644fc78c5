use std::path::Path;

use serde::Deserialize;
use uc_core::core::ThresholdSet;

use crate::jobs::DEFAULT_RETAINED_JOBS;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub thresholds: ThresholdSet,
    #[serde(default)]
    pub storage: StorageConfig,
}

impl AppConfig {
    pub fn from_file(path: &Path) -> Result<Self, anyhow::Error> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen: String,
    /// Finished evaluation jobs kept in memory for `GET /api/v1/evaluations`.
    pub max_finished_jobs: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: "0.0.0.0:8080".to_owned(),
            max_finished_jobs: DEFAULT_RETAINED_JOBS,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
            format: "json".to_owned(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub source: MetricsSourceConfig,
    pub synthetic: SyntheticConfig,
    pub remote: Option<RemoteConfig>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum MetricsSourceConfig {
    #[default]
    Synthetic,
    Remote,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SyntheticConfig {
    /// Fixed RNG seed for reproducible demo data.
    pub seed: Option<u64>,
    pub pii_rate: f64,
    pub include_tool_calls: bool,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            seed: None,
            pii_rate: 0.05,
            include_tool_calls: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RemoteConfig {
    pub base_url: String,
    #[serde(default = "default_metrics_path")]
    pub metrics_path: String,
    pub api_key: Option<String>,
    #[serde(default = "default_remote_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_metrics_path() -> String {
    "/api/v1/conversations/{conversation_id}/metrics".to_owned()
}

fn default_remote_timeout_ms() -> u64 {
    10_000
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackendConfig,
    pub path: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum StorageBackendConfig {
    #[default]
    Memory,
    Sqlite,
}
