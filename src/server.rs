//! HTTP server initialization and runtime setup.
//!
//! Handles storage setup, engine bootstrap, worker and scheduler spawning,
//! and the Axum server lifecycle.

use crate::application::services::Engine;
use crate::config::Config;
use crate::domain::repositories::KeyValueStore;
use crate::domain::visit_worker::run_visit_worker;
use crate::infrastructure::bookmarks::InMemoryBookmarks;
use crate::infrastructure::notify::LogNotifier;
use crate::infrastructure::storage::{FileStore, MemoryStore};
use crate::routes::app_router;
use crate::scheduler::run_scheduler;
use crate::state::AppState;

use anyhow::{Context, Result};
use axum::ServiceExt;
use axum::extract::Request;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};

/// How long in-flight visits may take to finish after the server stops.
const WORKER_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Opens the key-value store described by `config`.
///
/// # Errors
///
/// Returns an error if the storage file exists but cannot be read or parsed.
pub async fn open_storage(config: &Config) -> Result<Arc<dyn KeyValueStore>> {
    match config.storage_path {
        Some(ref path) => {
            let store = FileStore::open(path, config.storage_quota_bytes)
                .await
                .with_context(|| format!("Failed to open storage file {}", path.display()))?;
            tracing::info!(path = %path.display(), "File storage opened");
            Ok(Arc::new(store))
        }
        None => {
            tracing::warn!("STORAGE_PATH not set, state will not survive a restart");
            Ok(Arc::new(MemoryStore::new(config.storage_quota_bytes)))
        }
    }
}

/// Bootstraps the engine over the configured storage and the in-process
/// bookmark tree and notifier.
///
/// # Errors
///
/// Returns an error if storage cannot be opened or persisted state cannot be loaded.
pub async fn build_engine(config: &Config) -> Result<Arc<Engine>> {
    let storage = open_storage(config).await?;
    let engine = Engine::bootstrap(
        storage,
        Arc::new(InMemoryBookmarks::new()),
        Arc::new(LogNotifier),
        config.engine_options(),
    )
    .await
    .context("Failed to bootstrap engine")?;
    Ok(Arc::new(engine))
}

/// Runs the HTTP server with the given configuration.
///
/// Initializes:
/// - Key-value storage (file or in-memory)
/// - The engine (seeds default settings on first start)
/// - Background visit worker
/// - Alarm scheduler
/// - Axum HTTP server with graceful shutdown on Ctrl+C
///
/// # Errors
///
/// Returns an error if:
/// - Storage cannot be opened or loaded
/// - Server bind fails
/// - Server runtime error occurs
pub async fn run(config: Config) -> Result<()> {
    let engine = build_engine(&config).await?;

    let (visit_tx, visit_rx) = mpsc::channel(config.visit_queue_capacity);
    let worker = tokio::spawn(run_visit_worker(
        visit_rx,
        engine.clone(),
        config.visit_worker_concurrency,
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let scheduler = tokio::spawn(run_scheduler(
        engine.clone(),
        config.alarm_intervals(),
        shutdown_rx,
    ));

    let state = AppState::new(engine, visit_tx);

    let app = app_router(state);

    let addr: SocketAddr = config
        .listen_addr
        .parse()
        .with_context(|| format!("Invalid LISTEN address '{}'", config.listen_addr))?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Listening on http://{addr}");

    axum::serve(
        listener,
        ServiceExt::<Request>::into_make_service_with_connect_info::<SocketAddr>(app),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("Server stopped, draining background tasks");
    let _ = shutdown_tx.send(true);

    if tokio::time::timeout(WORKER_DRAIN_TIMEOUT, worker).await.is_err() {
        tracing::warn!("Visit worker did not finish in time, pending visits lost");
    }
    if let Err(e) = scheduler.await {
        tracing::error!(error = %e, "Scheduler task failed");
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
