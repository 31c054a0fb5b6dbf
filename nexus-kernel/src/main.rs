/**
 * NEXUS KERNEL - Entry point of the live jobs dashboard server
 *
 * ROLE: load configuration once, install logging and signal handling, then
 * serve the dashboard API until SIGINT/SIGTERM.
 *
 * Configuration is read-only after this point; every request and every
 * stream subscriber works from the same `Arc<DashboardConfig>`.
 */

use std::sync::Arc;

use anyhow::{Context, Result};
use nexus_kernel::config::load_config;
use nexus_kernel::http::{build_router, AppState};
use nexus_kernel::{logging, shutdown};
use tokio::net::TcpListener;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    // .env is optional
    dotenvy::dotenv().ok();
    logging::init_logging();

    let config = Arc::new(load_config().await.context("invalid configuration")?);
    info!(
        log_path = %config.log_path.display(),
        max_lines = config.max_lines,
        bucket_minutes = config.bucket_minutes,
        window_hours = config.window_hours,
        poll_interval_ms = config.poll_interval.as_millis() as u64,
        "configuration loaded"
    );
    if !config.log_path.exists() {
        warn!(log_path = %config.log_path.display(), "log file not found yet, serving empty stats");
    }

    let shutdown = shutdown::install_shutdown_handler();
    let app = build_router(AppState::new(config.clone(), shutdown.clone()));

    let addr = config.socket_addr();
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("listening on http://{addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .context("server error")?;

    info!("kernel stopped");
    Ok(())
}
