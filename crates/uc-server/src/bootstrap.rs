use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{ensure, Context};
use uc_core::core::{
    InMemoryReportStore, MetricsSource, ReportStore, SystemClock, ThresholdSet,
};
use uc_store::SqliteReportStore;

use crate::config::{AppConfig, MetricsSourceConfig, StorageBackendConfig};
use crate::handler::AppState;
use crate::jobs::JobRegistry;
use crate::logging::LogFormat;
use crate::sources::{RemoteMetricsSource, SyntheticMetricsSource};

// ---------------------------------------------------------------------------
// RuntimeConfig — fully validated runtime configuration
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq)]
pub struct SyntheticSettings {
    pub seed: Option<u64>,
    pub pii_rate: f64,
    pub include_tool_calls: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct RemoteSettings {
    pub base_url: String,
    pub metrics_path: String,
    pub api_key: Option<String>,
    pub timeout: Duration,
}

#[derive(Clone, Debug, PartialEq)]
pub enum SourceSettings {
    Synthetic(SyntheticSettings),
    Remote(RemoteSettings),
}

#[derive(Clone, Debug, PartialEq)]
pub enum StorageSettings {
    Memory,
    Sqlite { path: PathBuf },
}

pub struct RuntimeConfig {
    pub thresholds: ThresholdSet,
    pub source: SourceSettings,
    pub storage: StorageSettings,
    pub listen_addr: String,
    pub max_finished_jobs: usize,
    pub log_level: String,
    pub log_format: LogFormat,
}

// ---------------------------------------------------------------------------
// into_runtime — converts raw AppConfig into validated RuntimeConfig
// ---------------------------------------------------------------------------

pub fn into_runtime(config: AppConfig) -> Result<RuntimeConfig, anyhow::Error> {
    config
        .thresholds
        .validate()
        .context("invalid quality thresholds")?;

    let log_format = match config.logging.format.as_str() {
        "json" => LogFormat::Json,
        "pretty" => LogFormat::Pretty,
        other => anyhow::bail!("unknown log format: {other} (expected json or pretty)"),
    };

    let synthetic = &config.metrics.synthetic;
    ensure!(
        (0.0..=1.0).contains(&synthetic.pii_rate),
        "metrics.synthetic.pii_rate must be within [0, 1], got {}",
        synthetic.pii_rate
    );

    let source = match config.metrics.source {
        MetricsSourceConfig::Synthetic => SourceSettings::Synthetic(SyntheticSettings {
            seed: synthetic.seed,
            pii_rate: synthetic.pii_rate,
            include_tool_calls: synthetic.include_tool_calls,
        }),
        MetricsSourceConfig::Remote => {
            let remote = config
                .metrics
                .remote
                .context("metrics.source = \"remote\" requires a [metrics.remote] section")?;
            ensure!(
                remote.base_url.starts_with("http://") || remote.base_url.starts_with("https://"),
                "metrics.remote.base_url must be an http(s) URL, got {}",
                remote.base_url
            );
            ensure!(
                remote.metrics_path.starts_with('/'),
                "metrics.remote.metrics_path must start with '/'"
            );
            ensure!(
                remote.metrics_path.contains("{conversation_id}"),
                "metrics.remote.metrics_path must contain {{conversation_id}}"
            );
            ensure!(
                remote.timeout_ms > 0,
                "metrics.remote.timeout_ms must be positive"
            );
            SourceSettings::Remote(RemoteSettings {
                base_url: remote.base_url.trim_end_matches('/').to_owned(),
                metrics_path: remote.metrics_path,
                api_key: remote.api_key,
                timeout: Duration::from_millis(remote.timeout_ms),
            })
        }
    };

    ensure!(
        config.server.max_finished_jobs > 0,
        "server.max_finished_jobs must be at least 1"
    );

    let storage = match config.storage.backend {
        StorageBackendConfig::Memory => StorageSettings::Memory,
        StorageBackendConfig::Sqlite => {
            let path = config
                .storage
                .path
                .filter(|p| !p.is_empty())
                .context("storage.backend = \"sqlite\" requires storage.path")?;
            StorageSettings::Sqlite {
                path: PathBuf::from(path),
            }
        }
    };

    Ok(RuntimeConfig {
        thresholds: config.thresholds,
        source,
        storage,
        listen_addr: config.server.listen,
        max_finished_jobs: config.server.max_finished_jobs,
        log_level: config.logging.level,
        log_format,
    })
}

// ---------------------------------------------------------------------------
// build_state — wires the validated runtime into shared handler state
// ---------------------------------------------------------------------------

pub fn build_source(settings: &SourceSettings) -> Result<Arc<dyn MetricsSource>, anyhow::Error> {
    let source: Arc<dyn MetricsSource> = match settings {
        SourceSettings::Synthetic(s) => Arc::new(SyntheticMetricsSource::new(s)),
        SourceSettings::Remote(r) => Arc::new(
            RemoteMetricsSource::new(r).context("failed to build remote metrics client")?,
        ),
    };
    Ok(source)
}

pub fn build_store(settings: &StorageSettings) -> Result<Arc<dyn ReportStore>, anyhow::Error> {
    let store: Arc<dyn ReportStore> = match settings {
        StorageSettings::Memory => Arc::new(InMemoryReportStore::new()),
        StorageSettings::Sqlite { path } => {
            let store = SqliteReportStore::new(path)
                .with_context(|| format!("failed to open report database {}", path.display()))?;
            store.init().context("failed to initialize report schema")?;
            Arc::new(store)
        }
    };
    Ok(store)
}

pub fn build_state(runtime: &RuntimeConfig) -> Result<Arc<AppState>, anyhow::Error> {
    let source = build_source(&runtime.source)?;
    let store = build_store(&runtime.storage)?;

    Ok(Arc::new(AppState {
        thresholds: Arc::new(runtime.thresholds.clone()),
        source,
        store,
        clock: Arc::new(SystemClock),
        jobs: JobRegistry::with_retention(runtime.max_finished_jobs),
    }))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
