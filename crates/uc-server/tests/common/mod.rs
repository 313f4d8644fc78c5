#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;

use uc_server::config::{AppConfig, MetricsSourceConfig, RemoteConfig, ServerConfig};

// ---------------------------------------------------------------------------
// MockMetricsServer — stands in for the upstream metrics service
// ---------------------------------------------------------------------------

struct MockConfig {
    responses: HashMap<String, (u16, String)>,
    delay_ms: u64,
}

pub struct MockMetricsServer {
    addr: SocketAddr,
    _handle: tokio::task::JoinHandle<()>,
}

impl MockMetricsServer {
    /// Unknown conversation ids answer 404.
    pub async fn start(responses: &[(&str, u16, String)]) -> Self {
        Self::start_with_delay(responses, 0).await
    }

    pub async fn start_with_delay(responses: &[(&str, u16, String)], delay_ms: u64) -> Self {
        let config = Arc::new(MockConfig {
            responses: responses
                .iter()
                .map(|(id, status, body)| ((*id).to_owned(), (*status, body.clone())))
                .collect(),
            delay_ms,
        });

        let app = axum::Router::new()
            .route(
                "/api/v1/conversations/{conversation_id}/metrics",
                get(mock_metrics_handler),
            )
            .with_state(config);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind mock server");
        let addr = listener.local_addr().unwrap();

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        Self {
            addr,
            _handle: handle,
        }
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }
}

impl Drop for MockMetricsServer {
    fn drop(&mut self) {
        self._handle.abort();
    }
}

async fn mock_metrics_handler(
    State(config): State<Arc<MockConfig>>,
    Path(conversation_id): Path<String>,
) -> Response {
    if config.delay_ms > 0 {
        tokio::time::sleep(Duration::from_millis(config.delay_ms)).await;
    }

    match config.responses.get(&conversation_id) {
        Some((status, body)) => {
            let status = StatusCode::from_u16(*status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            (
                status,
                [(axum::http::header::CONTENT_TYPE, "application/json")],
                body.clone(),
            )
                .into_response()
        }
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

// ---------------------------------------------------------------------------
// TestServer — runs the real router on an ephemeral port
// ---------------------------------------------------------------------------

pub struct TestServer {
    pub addr: SocketAddr,
    _handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    /// Seeded synthetic source, in-memory store, default thresholds.
    pub async fn start_synthetic() -> Self {
        let mut config = base_config();
        config.metrics.synthetic.seed = Some(TEST_SEED);
        Self::start(config).await
    }

    pub async fn start_remote(mock_url: &str) -> Self {
        let mut config = base_config();
        config.metrics.source = MetricsSourceConfig::Remote;
        config.metrics.remote = Some(RemoteConfig {
            base_url: mock_url.to_owned(),
            metrics_path: "/api/v1/conversations/{conversation_id}/metrics".to_owned(),
            api_key: None,
            timeout_ms: 2000,
        });
        Self::start(config).await
    }

    pub async fn start(config: AppConfig) -> Self {
        let runtime =
            uc_server::bootstrap::into_runtime(config).expect("test config should be valid");
        let state = uc_server::bootstrap::build_state(&runtime).expect("state should build");
        let app = uc_server::handler::router(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind server");
        let addr = listener.local_addr().unwrap();

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        Self {
            addr,
            _handle: handle,
        }
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Poll a job until it leaves `running`.
    pub async fn wait_for_job(&self, client: &reqwest::Client, job_id: &str) -> serde_json::Value {
        for _ in 0..300 {
            let job: serde_json::Value = client
                .get(format!("{}/api/v1/evaluations/{job_id}", self.url()))
                .send()
                .await
                .expect("request should succeed")
                .json()
                .await
                .expect("valid JSON");
            if job["status"] != "running" {
                return job;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("job {job_id} did not finish in time");
    }

    /// Submit targets and return the job id.
    pub async fn submit(&self, client: &reqwest::Client, targets: &[(&str, &str)]) -> String {
        let resp = client
            .post(format!("{}/api/v1/evaluations", self.url()))
            .json(&evaluation_body(targets))
            .send()
            .await
            .expect("request should succeed");
        assert_eq!(resp.status(), 202);

        let body: serde_json::Value = resp.json().await.expect("valid JSON");
        body["job_id"].as_str().expect("job_id string").to_owned()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self._handle.abort();
    }
}

// ---------------------------------------------------------------------------
// Test fixtures
// ---------------------------------------------------------------------------

pub const TEST_SEED: u64 = 20_240_601;

pub fn base_config() -> AppConfig {
    AppConfig {
        server: ServerConfig {
            listen: "127.0.0.1:0".to_owned(),
            ..ServerConfig::default()
        },
        ..AppConfig::default()
    }
}

pub fn evaluation_body(targets: &[(&str, &str)]) -> serde_json::Value {
    let targets: Vec<serde_json::Value> = targets
        .iter()
        .map(|(conversation_id, seed_id)| {
            serde_json::json!({ "conversation_id": conversation_id, "seed_id": seed_id })
        })
        .collect();
    serde_json::json!({ "targets": targets })
}

pub fn metrics_json(
    rouge_l: f64,
    fidelidad_factual: f64,
    diversidad_lexica: f64,
    coherencia_dialogica: f64,
    privacy_score: f64,
    memorizacion: f64,
) -> String {
    serde_json::json!({
        "rouge_l": rouge_l,
        "fidelidad_factual": fidelidad_factual,
        "diversidad_lexica": diversidad_lexica,
        "coherencia_dialogica": coherencia_dialogica,
        "privacy_score": privacy_score,
        "memorizacion": memorizacion
    })
    .to_string()
}

/// Passing example: composite 0.70.
pub fn passing_metrics() -> String {
    metrics_json(0.80, 0.95, 0.70, 0.85, 0.0, 0.003)
}

/// Same graded values with detected PII: composite 0.0.
pub fn pii_metrics() -> String {
    metrics_json(0.80, 0.95, 0.70, 0.85, 0.02, 0.003)
}
