//! Folio Cache - offline caching layer for the Folio document reader

use anyhow::{Context, Result};
use clap::Parser;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio_util::task::TaskTracker;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod config;

use config::{Config, StorageBackendKind};
use folio_api::{AppState, create_router};
use folio_core::{EventHandler, Worker, spawn_eviction_task};
use folio_proxy::{HttpFetcher, HttpFetcherConfig};
use folio_storage::{CacheStore, LocalStorage, MemoryStorage, StorageBackend};

/// Folio Cache - offline caching layer for the Folio document reader
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "config/default.toml")]
    config: String,

    /// Bind address
    #[arg(long, env = "FOLIO_CACHE_BIND")]
    bind: Option<String>,

    /// Port
    #[arg(short, long, env = "FOLIO_CACHE_PORT")]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Load configuration
    let config = Config::load(&args.config)?;

    // Initialize logging
    init_logging(&config.logging.level, &config.logging.format);

    info!("Starting Folio Cache v{}", env!("CARGO_PKG_VERSION"));

    // Initialize storage backend
    let storage: Arc<dyn StorageBackend> = match config.storage.backend {
        StorageBackendKind::Local => {
            tokio::fs::create_dir_all(&config.storage.local.path)
                .await
                .with_context(|| {
                    format!("Failed to create {}", config.storage.local.path)
                })?;
            info!("Using local storage at {}", config.storage.local.path);
            Arc::new(LocalStorage::new(&config.storage.local.path).await?)
        }
        StorageBackendKind::Memory => {
            info!("Using in-memory storage");
            Arc::new(MemoryStorage::new())
        }
    };

    // Initialize network client
    let mut fetcher_config = HttpFetcherConfig {
        base_url: config.origin.url.clone(),
        skip_tls_verify: config.origin.skip_tls_verify,
        ..HttpFetcherConfig::default()
    };
    if let Some(user_agent) = &config.origin.user_agent {
        fetcher_config.user_agent = user_agent.clone();
    }
    let fetcher = Arc::new(HttpFetcher::new(fetcher_config)?);
    let origin = fetcher.base_url().clone();

    // Install the Prometheus recorder before anything records
    let metrics_handle = if config.metrics.enabled {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .context("Failed to install Prometheus recorder")?;
        Some(Arc::new(handle))
    } else {
        None
    };

    // Initialize worker
    let worker = Arc::new(Worker::new(
        config.worker.clone(),
        CacheStore::new(storage),
        fetcher.clone(),
    )?);

    // Install and activate; a failed install leaves every request passing through
    if let Err(e) = worker.on_install().await {
        error!("Install failed, requests will pass through: {}", e);
    }

    // Start background eviction task
    let eviction = spawn_eviction_task(worker.clone(), config.worker.eviction_interval());

    // Create application state
    let tracker = TaskTracker::new();
    let state = AppState::new(worker, fetcher, Some(origin.clone()), tracker.clone());

    // Create router
    let app = create_router(state, metrics_handle);

    // Determine bind address
    let bind_addr = args.bind.unwrap_or(config.server.bind_address);
    let port = args.port.unwrap_or(config.server.port);
    let addr: SocketAddr = format!("{}:{}", bind_addr, port).parse()?;

    info!("Listening on {}", addr);
    info!("Origin: {}", origin);

    // Start server
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    eviction.abort();

    // Let pending cache writes finish
    tracker.close();
    if !tracker.is_empty() {
        info!("Waiting for {} pending cache writes", tracker.len());
    }
    tracker.wait().await;

    info!("Server stopped");
    Ok(())
}

/// Initialize logging
fn init_logging(level: &str, format: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let registry = tracing_subscriber::registry().with(filter);

    if format == "json" {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }
}

/// Wait for shutdown signal
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
