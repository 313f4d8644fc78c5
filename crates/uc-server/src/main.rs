use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use uc_server::bootstrap::{self, RuntimeConfig, SourceSettings, StorageSettings};
use uc_server::config::AppConfig;
use uc_server::handler;
use uc_server::logging::init_tracing;

#[derive(Parser)]
#[command(name = "uncase", about = "UNCASE conversation quality evaluation service")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to the configuration file.
    #[arg(short, long, default_value = "config.toml", global = true)]
    config: PathBuf,
}

#[derive(Subcommand)]
enum Command {
    /// Start the HTTP service (default).
    Serve,
    /// Validate configuration file and exit.
    Validate,
}

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Some(Command::Validate) => {
            run_validate(&cli.config);
        }
        Some(Command::Serve) | None => {
            let runtime = load_runtime(&cli.config);
            if let Err(e) = serve(runtime) {
                eprintln!("Service error: {e:#}");
                std::process::exit(1);
            }
        }
    }
}

fn load_runtime(path: &Path) -> RuntimeConfig {
    let config = match AppConfig::from_file(path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error reading config: {e}");
            std::process::exit(1);
        }
    };

    match bootstrap::into_runtime(config) {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Config invalid: {e:#}");
            std::process::exit(1);
        }
    }
}

fn run_validate(path: &Path) {
    let _runtime = load_runtime(path);
    println!("Config valid: {}", path.display());
}

fn serve(runtime: RuntimeConfig) -> Result<(), anyhow::Error> {
    let rt = tokio::runtime::Runtime::new().context("failed to start tokio runtime")?;
    rt.block_on(run_server(runtime))
}

async fn run_server(runtime: RuntimeConfig) -> Result<(), anyhow::Error> {
    init_tracing(&runtime.log_level, runtime.log_format)?;

    let state = bootstrap::build_state(&runtime)?;

    let storage = match &runtime.storage {
        StorageSettings::Memory => "memory".to_owned(),
        StorageSettings::Sqlite { path } => format!("sqlite:{}", path.display()),
    };
    let seeded = matches!(&runtime.source, SourceSettings::Synthetic(s) if s.seed.is_some());
    tracing::info!(
        listen = %runtime.listen_addr,
        source = state.source.name(),
        seeded,
        storage = %storage,
        "starting evaluation service"
    );

    let listener = tokio::net::TcpListener::bind(&runtime.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", runtime.listen_addr))?;

    axum::serve(listener, handler::router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("evaluation service stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
