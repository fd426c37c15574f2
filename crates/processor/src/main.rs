use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{error, info, warn};

use processor::config::{LogFormat, ProcessorConfig};
use processor::pool::WorkerPool;
use processor::receiver::Receiver;
use processor::server::{self, AppState};
use processor::storage::InMemoryStorage;

#[tokio::main]
async fn main() -> Result<()> {
    // Phase 1: basic tracing so config loading can log.
    // set_default is thread-local, so phase 2 can install the global
    // subscriber afterwards.
    let basic_tracing = init_tracing_basic();

    info!("Starting streamlog processor v{}", env!("CARGO_PKG_VERSION"));

    let config = ProcessorConfig::load().context("Failed to load configuration")?;
    config
        .validate()
        .context("Configuration validation failed")?;

    // Phase 2: re-initialize tracing with configured format and level
    drop(basic_tracing);
    init_tracing_from_config(&config);

    info!("Configuration loaded successfully");

    let token = CancellationToken::new();
    let storage = Arc::new(InMemoryStorage::new());
    let pool = Arc::new(WorkerPool::start(
        &token,
        config.pool.workers,
        config.pool.queue_capacity,
        storage.clone(),
    ));
    info!(
        "✓ Worker pool started ({} workers, queue capacity {})",
        config.pool.workers, config.pool.queue_capacity
    );

    // One receiver per source. A receiver that returns is logged and
    // not restarted; reconnect policy is deliberately out of scope.
    let receivers = TaskTracker::new();
    for url in &config.sources.urls {
        let receiver = Receiver::new(url.clone(), pool.clone(), config.connection.clone());
        let url = url.clone();
        let token = token.clone();
        receivers.spawn(async move {
            match receiver.run(token).await {
                Ok(()) => info!(url = %url, "receiver stopped: shutdown requested"),
                Err(e) => error!(url = %url, "receiver stopped: {}", e),
            }
        });
    }
    receivers.close();
    info!("✓ {} receiver(s) started", config.sources.urls.len());

    let closing = Arc::new(AtomicBool::new(false));
    let app = server::router(AppState {
        pool: pool.clone(),
        storage,
        closing: closing.clone(),
    });

    let addr: SocketAddr = config
        .server
        .bind_address
        .parse()
        .context("Invalid bind address")?;
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("Failed to bind to address")?;

    info!("✓ Stats API listening on http://{}", addr);
    info!("  - Health check: http://{}/health", addr);
    info!("  - Aggregates:   http://{}/stats", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(closing))
        .await
        .context("Server error")?;

    // Wind down in order: stop the receivers, then drain the pool so
    // every accepted entry still reaches storage.
    token.cancel();
    receivers.wait().await;
    pool.close().await;

    info!("Shut down gracefully");
    Ok(())
}

/// Phase 1: basic tracing init with RUST_LOG or a sensible default.
fn init_tracing_basic() -> tracing::subscriber::DefaultGuard {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,processor=debug"));

    let subscriber = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .finish();

    tracing::subscriber::set_default(subscriber)
}

/// Phase 2: install the global subscriber with configured values.
fn init_tracing_from_config(config: &ProcessorConfig) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    // Prefer RUST_LOG, fall back to the configured level
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format {
        LogFormat::Json => {
            let layer = fmt::layer().json().with_target(true).with_thread_ids(true);
            tracing_subscriber::registry().with(filter).with(layer).init();
        }
        LogFormat::Pretty => {
            let layer = fmt::layer()
                .with_target(true)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false);
            tracing_subscriber::registry().with(filter).with(layer).init();
        }
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal(closing: Arc<AtomicBool>) {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            warn!("Received Ctrl+C, initiating graceful shutdown...");
        },
        _ = terminate => {
            warn!("Received SIGTERM, initiating graceful shutdown...");
        },
    }

    closing.store(true, Ordering::Relaxed);
}
