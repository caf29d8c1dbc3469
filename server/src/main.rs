use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use directories::ProjectDirs;
use loackin_core::agents::ProviderChain;
use loackin_core::api::{router, ApiState};
use loackin_core::config::AppConfig;
use loackin_core::db::init_db;
use tracing_subscriber::EnvFilter;

/// LoackIn study companion API server
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Host address to bind to
    #[arg(short = 'H', long, env = "LOACKIN_HOST", default_value = "127.0.0.1")]
    host: String,

    /// Port to listen on
    #[arg(short, long, env = "LOACKIN_PORT", default_value_t = 8000)]
    port: u16,

    /// Directory holding the SQLite database
    #[arg(long, env = "LOACKIN_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Log level used when RUST_LOG is unset (error, warn, info, debug, trace)
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

fn default_data_dir() -> PathBuf {
    if let Some(proj) = ProjectDirs::from("com", "LoackIn", "LoackIn") {
        proj.data_dir().to_path_buf()
    } else {
        std::env::temp_dir().join("LoackIn")
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {err}");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env file is normal outside development.
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = AppConfig::from_env().context("invalid configuration")?;
    if config.uses_default_secret() {
        tracing::warn!("SECRET_KEY is not set, signing tokens with the development key");
    }
    let configured = config.configured_providers();
    if configured.is_empty() {
        tracing::warn!("no AI provider credentials found, chat will use fallback rules only");
    } else {
        let labels: Vec<&str> = configured.iter().map(|name| name.label()).collect();
        tracing::info!("AI providers in order: {}", labels.join(" -> "));
    }

    let data_dir = cli.data_dir.unwrap_or_else(default_data_dir);
    let db = init_db(data_dir)?;
    let chain = ProviderChain::from_configs(&config.providers)?;
    let state = ApiState::new(db, chain, &config.auth);
    let app = router(state, &config.cors_origin);

    let addr: SocketAddr = format!("{}:{}", cli.host, cli.port)
        .parse()
        .with_context(|| format!("invalid listen address {}:{}", cli.host, cli.port))?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!("LoackIn API listening on http://{addr}");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;
    Ok(())
}
