/*!
 * ForgeHook Admin API entry point
 *
 * Wires the delivery engine onto the configured database, installs the
 * process-wide event router, starts the retention sweeps, and serves the
 * REST surface until Ctrl+C. On shutdown the shards drain: in-flight
 * deliveries complete, anything still marked processing is re-pended on
 * the next start.
 */

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};

use forgehook_admin_api::create_router;
use forgehook_config::Config;
use forgehook_dispatch::router::global;

#[tokio::main]
async fn main() -> Result<()> {
    forgehook_common::init_tracing();

    info!("🚀 Starting ForgeHook Admin API");

    let config = Config::load().context("Failed to load configuration")?;

    info!("📋 Configuration loaded:");
    info!("   - Database: {}", config.database.url);
    info!("   - Bind: {}:{}", config.api.host, config.api.port);
    info!("   - Delivery timeout: {}ms", config.delivery.default_timeout_ms);
    info!("   - Max retries: {}", config.delivery.max_retries);
    info!("   - Retry delays: {:?}ms", config.delivery.retry_delays_ms);

    let pool = forgehook_common::create_pool(&config.database.url, config.database.max_connections)
        .await
        .context("Failed to create database pool")?;
    info!("✅ Database connected");

    let router = forgehook_dispatch::build_engine(pool, config.delivery.clone())
        .await
        .context("Failed to build delivery engine")?;

    global::init(Arc::clone(&router));

    // Retention sweeps: terminal jobs (7 d) and old log rows (30 d)
    let sweeper = Arc::clone(&router);
    let sweep_interval = config.delivery.retention_sweep_interval;
    let job_retention = config.delivery.job_retention_ms;
    let log_retention = config.delivery.log_retention_ms;
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(sweep_interval);
        loop {
            interval.tick().await;
            if let Err(e) = sweeper.shards().cleanup_terminal_jobs(job_retention).await {
                error!("Job retention sweep failed: {e}");
            }
            if let Err(e) = sweeper.store().prune_logs(log_retention).await {
                error!("Log retention sweep failed: {e}");
            }
        }
    });

    let app = create_router(Arc::clone(&router));

    let addr = format!("{}:{}", config.api.host, config.api.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    info!("✅ Admin API listening on http://{addr}");
    info!("   - Press Ctrl+C to shutdown gracefully");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = signal::ctrl_c().await;
            info!("📡 Received Ctrl+C signal");
        })
        .await
        .context("Server failed")?;

    info!("🛑 Draining delivery shards...");
    global::shutdown().await;

    info!("👋 ForgeHook Admin API stopped");
    Ok(())
}
