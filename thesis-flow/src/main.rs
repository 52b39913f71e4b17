//! thesis-flow - thesis advising workflow service
//!
//! Startup order: command line, configuration file, logging, root folder,
//! database, blob store, then the HTTP server.

use anyhow::{Context, Result};
use clap::Parser;
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use thesis_common::config::{
    RootFolderInitializer, RootFolderResolver, TomlConfig, DEFAULT_BIND_ADDR,
};
use thesis_common::EventBus;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use thesis_flow::blob::FsBlobStore;
use thesis_flow::workflow::WorkflowEngine;
use thesis_flow::{build_router, AppState};

/// Command-line arguments for thesis-flow
#[derive(Parser, Debug)]
#[command(name = "thesis-flow")]
#[command(about = "Thesis advising workflow service")]
#[command(version)]
struct Args {
    /// Root folder holding the database and uploads
    #[arg(short, long, env = "THESIS_ROOT_FOLDER")]
    root_folder: Option<PathBuf>,

    /// Configuration file (defaults to the platform config directory)
    #[arg(short, long, env = "THESIS_CONFIG")]
    config: Option<PathBuf>,

    /// Address to listen on, overriding the configuration file
    #[arg(short, long, env = "THESIS_BIND_ADDR")]
    bind: Option<String>,
}

/// RUST_LOG wins over the configured level
fn init_tracing(config: &TomlConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{},tower_http=info", config.logging.level)));

    match &config.logging.file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .init();
        }
        None => {
            tracing_subscriber::fmt().with_env_filter(filter).init();
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let resolver = RootFolderResolver::new("thesis-flow")
        .with_cli_arg(args.root_folder.clone())
        .with_config_path(args.config.clone());
    let config = resolver.load_config();

    init_tracing(&config)?;

    // Build identification first, before any database work
    info!(
        "Starting thesis-flow v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let root_folder = resolver.resolve_with(&config);
    let initializer = RootFolderInitializer::new(root_folder);
    initializer
        .ensure_directory_exists()
        .context("Failed to initialize root folder")?;

    let db_path = initializer.database_path();
    info!("Database: {}", db_path.display());
    let pool = match thesis_common::db::init_database(&db_path).await {
        Ok(pool) => {
            info!("✓ Database ready");
            pool
        }
        Err(e) => {
            error!("Failed to open database: {}", e);
            return Err(e.into());
        }
    };

    let uploads = initializer.uploads_path(&config.workflow);
    info!("Uploads: {}", uploads.display());
    let blobs = Arc::new(FsBlobStore::new(uploads));

    let events = Arc::new(EventBus::new(config.workflow.event_capacity));
    let engine = WorkflowEngine::new(pool, blobs, events.clone(), config.workflow.clone());
    let app = build_router(AppState::new(engine, events));

    let bind_addr = args
        .bind
        .or_else(|| config.bind_addr.clone())
        .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", bind_addr))?;
    info!("thesis-flow listening on http://{}", bind_addr);
    info!("Health check: http://{}/health", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}
