//! Daily SLA Sweep Daemon
//!
//! Runs the at-risk scan once per day at a fixed UTC hour and escalates
//! breaches until Ctrl+C.
//!
//! ## Usage
//!
//! ```bash
//! # In-memory (no database)
//! SWEEP_HOUR_UTC=9 cargo run --bin sla_sweeper
//!
//! # Against Postgres
//! DATABASE_URL=postgresql://localhost/ats cargo run --bin sla_sweeper --features database
//! ```

use std::sync::Arc;

use tokio::sync::watch;
use tracing::info;

use ats_poc::config::AppConfig;
use ats_poc::services::NotificationCenter;
use ats_workflow::clock::{Clock, SystemClock};
use ats_workflow::escalation::EscalationNotifier;
use ats_workflow::notify::Notifier;
use ats_workflow::store::WorkflowStore;
use ats_workflow::sweep::{SlaMonitor, SweepScheduler};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = AppConfig::from_env();
    info!(
        hour_utc = config.sweep_hour_utc,
        delivery_concurrency = config.delivery_concurrency,
        "Starting SLA sweeper"
    );

    let store = build_store(&config).await?;
    let notifier: Arc<dyn Notifier> = Arc::new(NotificationCenter::new());
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let escalation = EscalationNotifier::new(store.clone(), notifier, clock.clone())
        .with_delivery_concurrency(config.delivery_concurrency);
    let monitor = Arc::new(SlaMonitor::new(store, escalation, clock));
    let scheduler = SweepScheduler::new(monitor, config.sweep_hour_utc);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown signal received");
            let _ = shutdown_tx.send(true);
        }
    });

    scheduler.run(shutdown_rx).await;
    info!("SLA sweeper stopped");
    Ok(())
}

#[cfg(feature = "database")]
async fn build_store(config: &AppConfig) -> anyhow::Result<Arc<dyn WorkflowStore>> {
    use ats_workflow::repository::PgWorkflowStore;
    use sqlx::postgres::PgPoolOptions;

    let database_url = config
        .database_url
        .clone()
        .unwrap_or_else(|| "postgresql://localhost:5432/ats".to_string());

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&database_url)
        .await?;
    info!("Database connection established");

    Ok(Arc::new(PgWorkflowStore::new(pool)))
}

#[cfg(not(feature = "database"))]
async fn build_store(_config: &AppConfig) -> anyhow::Result<Arc<dyn WorkflowStore>> {
    use ats_workflow::store::InMemoryStore;

    info!("No database feature enabled; running with the in-memory store");
    Ok(Arc::new(InMemoryStore::new()))
}
