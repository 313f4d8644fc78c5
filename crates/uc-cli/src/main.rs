mod render;

use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use uc_core::core::{QualityMetrics, QualityReport, QualitySummary, ScoreOutcome};
use uuid::Uuid;

use render::JobView;

const POLL_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Debug, Parser)]
#[command(name = "uc-eval", about = "Command-line client for the UNCASE quality evaluation service")]
struct Args {
    #[arg(long, default_value = "http://localhost:8080", global = true)]
    api_base: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Score one set of metrics without storing a report.
    Score {
        #[arg(long)]
        rouge_l: f64,
        #[arg(long)]
        fidelidad_factual: f64,
        #[arg(long)]
        diversidad_lexica: f64,
        #[arg(long)]
        coherencia_dialogica: f64,
        #[arg(long, default_value_t = 0.0)]
        privacy_score: f64,
        #[arg(long, default_value_t = 0.0)]
        memorizacion: f64,
        #[arg(long)]
        tool_call_validity: Option<f64>,
    },
    /// Start an evaluation job. Targets are `conversation_id[:seed_id]`.
    Evaluate {
        #[arg(required = true)]
        targets: Vec<String>,
        /// Seed id for targets that do not name one.
        #[arg(long, default_value = "default")]
        seed_id: String,
        /// Poll until the job finishes.
        #[arg(long)]
        wait: bool,
    },
    /// List evaluation jobs.
    Jobs,
    /// Show one evaluation job.
    Job { job_id: Uuid },
    /// Cancel a running evaluation job.
    Cancel { job_id: Uuid },
    /// List stored reports.
    Reports {
        /// Only reports that failed.
        #[arg(long, conflicts_with = "passed")]
        failed: bool,
        /// Only reports that passed.
        #[arg(long)]
        passed: bool,
        #[arg(long)]
        seed_id: Option<String>,
    },
    /// Show one stored report.
    Report { conversation_id: String },
    /// Dashboard summary over all stored reports.
    Summary,
    /// Print all reports in an export format.
    Export {
        #[arg(long, value_enum, default_value_t = Format::Json)]
        format: Format,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Format {
    Json,
    Jsonl,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
}

#[derive(Debug, Deserialize)]
struct JobAccepted {
    job_id: String,
    total: usize,
}

// ---------------------------------------------------------------------------
// ApiClient — thin wrapper that turns error envelopes into messages
// ---------------------------------------------------------------------------

struct ApiClient {
    client: reqwest::Client,
    base: String,
}

impl ApiClient {
    fn new(api_base: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base: api_base.trim_end_matches('/').to_owned(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base)
    }

    /// `collection` plus `id` as one percent-encoded path segment.
    fn resource_url(&self, collection: &str, id: &str) -> Result<reqwest::Url, String> {
        if matches!(id, "" | "." | "..") {
            return Err(format!("invalid identifier '{id}'"));
        }
        let mut url = reqwest::Url::parse(&self.url(collection))
            .map_err(|err| format!("Invalid --api-base '{}': {err}", self.base))?;
        url.path_segments_mut()
            .map_err(|()| format!("Invalid --api-base '{}'", self.base))?
            .push(id);
        Ok(url)
    }

    async fn send(&self, req: reqwest::RequestBuilder) -> Result<reqwest::Response, String> {
        let response = req.send().await.map_err(|err| {
            format!("Connection error: {err}. Please check --api-base and server status.")
        })?;

        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorEnvelope>(&body)
            .map(|v| v.error.message)
            .unwrap_or_else(|_| body);
        Err(format!("Request failed ({status}): {message}"))
    }

    async fn json<T: DeserializeOwned>(&self, req: reqwest::RequestBuilder) -> Result<T, String> {
        self.send(req)
            .await?
            .json::<T>()
            .await
            .map_err(|err| format!("Invalid response from server: {err}"))
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, String> {
        self.json(self.client.get(self.url(path))).await
    }
}

/// `conversation_id[:seed_id]`; a missing or empty seed falls back to `default_seed`.
fn parse_target(raw: &str, default_seed: &str) -> Result<serde_json::Value, String> {
    let (conversation_id, seed_id) = match raw.split_once(':') {
        Some((id, seed)) if !seed.is_empty() => (id, seed),
        Some((id, _)) => (id, default_seed),
        None => (raw, default_seed),
    };
    if conversation_id.is_empty() {
        return Err(format!("invalid target '{raw}': empty conversation id"));
    }
    Ok(serde_json::json!({ "conversation_id": conversation_id, "seed_id": seed_id }))
}

async fn run(args: Args) -> Result<(), String> {
    let api = ApiClient::new(&args.api_base);

    match args.command {
        Command::Score {
            rouge_l,
            fidelidad_factual,
            diversidad_lexica,
            coherencia_dialogica,
            privacy_score,
            memorizacion,
            tool_call_validity,
        } => {
            let metrics = QualityMetrics {
                rouge_l,
                fidelidad_factual,
                diversidad_lexica,
                coherencia_dialogica,
                privacy_score,
                memorizacion,
                tool_call_validity,
            };
            let outcome: ScoreOutcome = api
                .json(api.client.post(api.url("/api/v1/score")).json(&metrics))
                .await?;
            render::print_score(&outcome);
        }
        Command::Evaluate {
            targets,
            seed_id,
            wait,
        } => {
            let targets = targets
                .iter()
                .map(|raw| parse_target(raw, &seed_id))
                .collect::<Result<Vec<_>, _>>()?;
            let body = serde_json::json!({ "targets": targets });

            let accepted: JobAccepted = api
                .json(api.client.post(api.url("/api/v1/evaluations")).json(&body))
                .await?;
            println!(
                "{}",
                format!(
                    "Started job {} for {} conversation(s).",
                    accepted.job_id, accepted.total
                )
                .bright_green()
            );

            if wait {
                let url = api.resource_url("/api/v1/evaluations", &accepted.job_id)?;
                let job = loop {
                    let job: JobView = api.json(api.client.get(url.clone())).await?;
                    if job.status != "running" {
                        break job;
                    }
                    tokio::time::sleep(POLL_INTERVAL).await;
                };
                render::print_job(&job);
            }
        }
        Command::Jobs => {
            let jobs: Vec<JobView> = api.get("/api/v1/evaluations").await?;
            if jobs.is_empty() {
                println!("No evaluation jobs.");
            }
            for job in &jobs {
                render::print_job(job);
            }
        }
        Command::Job { job_id } => {
            let url = api.resource_url("/api/v1/evaluations", &job_id.to_string())?;
            let job: JobView = api.json(api.client.get(url)).await?;
            render::print_job(&job);
        }
        Command::Cancel { job_id } => {
            let url = api.resource_url("/api/v1/evaluations", &job_id.to_string())?;
            let job: JobView = api.json(api.client.delete(url)).await?;
            println!("{}", "Cancellation requested.".bright_green());
            render::print_job(&job);
        }
        Command::Reports {
            failed,
            passed,
            seed_id,
        } => {
            let mut query: Vec<(&str, String)> = Vec::new();
            if failed {
                query.push(("passed", "false".to_owned()));
            } else if passed {
                query.push(("passed", "true".to_owned()));
            }
            if let Some(seed_id) = seed_id {
                query.push(("seed_id", seed_id));
            }

            let reports: Vec<QualityReport> = api
                .json(api.client.get(api.url("/api/v1/reports")).query(&query))
                .await?;
            render::print_reports(&reports);
        }
        Command::Report { conversation_id } => {
            let url = api.resource_url("/api/v1/reports", &conversation_id)?;
            let report: QualityReport = api.json(api.client.get(url)).await?;
            render::print_reports(std::slice::from_ref(&report));
            println!(
                "  evaluated at {}",
                report.evaluated_at.format("%Y-%m-%d %H:%M:%S UTC")
            );
        }
        Command::Summary => {
            let summary: QualitySummary = api.get("/api/v1/reports/summary").await?;
            render::print_summary(&summary);
        }
        Command::Export { format } => {
            let format = match format {
                Format::Json => "json",
                Format::Jsonl => "jsonl",
            };
            let body = api
                .send(
                    api.client
                        .get(api.url("/api/v1/reports/export"))
                        .query(&[("format", format)]),
                )
                .await?
                .text()
                .await
                .map_err(|err| format!("Failed to read export: {err}"))?;
            print!("{body}");
            if format == "json" {
                println!();
            }
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    if let Err(message) = run(args).await {
        eprintln!("{}", message.red());
        std::process::exit(1);
    }
}
