mod api;
mod catalog;
mod config;
mod db;
mod error;
mod fetcher;
mod normalizer;
mod scheduler;
mod state;
mod sweep;
mod types;

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::api::health::HealthState;
use crate::api::routes::{router, ApiState};
use crate::config::{Config, ReadinessBackend};
use crate::db::{FlowWriter, SweepLedger};
use crate::error::Result;
use crate::fetcher::Fetcher;
use crate::scheduler::Scheduler;
use crate::state::{KvStore, ReadinessFlag};
use crate::sweep::Sweeper;

#[tokio::main]
async fn main() {
    let cfg = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {e}");
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&cfg.log_level))
        .init();

    if let Err(e) = run(cfg).await {
        error!("Fatal error: {e}");
        std::process::exit(1);
    }
}

async fn run(cfg: Config) -> Result<()> {
    // --- Database setup ---
    let pool = db::open(&cfg.db_path).await?;

    // --- Readiness flag ---
    let store = match cfg.readiness_backend {
        ReadinessBackend::Sqlite => KvStore::sqlite(pool.clone()),
        ReadinessBackend::Memory => KvStore::memory(),
    };
    let readiness = ReadinessFlag::new(store, cfg.readiness_key.clone(), cfg.readiness_ttl());
    info!(
        key = %cfg.readiness_key,
        backend = ?cfg.readiness_backend,
        ttl_secs = cfg.readiness_ttl_secs,
        "Readiness flag configured",
    );

    // --- Sweeper ---
    let catalog = catalog::enumerate();
    let health = Arc::new(HealthState::new());
    let ledger = SweepLedger::new(pool.clone());
    let sweeper = Sweeper::new(
        Fetcher::new(&cfg)?,
        FlowWriter::new(pool.clone()),
        ledger.clone(),
        readiness.clone(),
        Arc::clone(&health),
    )
    .with_concurrency(cfg.sweep_concurrency)
    .with_pages(cfg.pages_per_combination);
    info!(
        combinations = catalog.len(),
        concurrency = cfg.sweep_concurrency,
        pages = cfg.pages_per_combination,
        page_size = cfg.page_size,
        upstream = %cfg.upstream_url,
        "Harvester configured",
    );

    // Startup sweep, then every SWEEP_INTERVAL_SECS
    let scheduler = Scheduler::new(
        Arc::new(sweeper),
        catalog,
        Duration::from_secs(cfg.sweep_interval_secs),
    );
    tokio::spawn(async move { scheduler.run().await });

    // HTTP health surface
    let api_state = ApiState {
        health,
        readiness,
        ledger,
    };
    let app = router(api_state);
    let bind_addr = format!("0.0.0.0:{}", cfg.api_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("HTTP API listening on {bind_addr}");

    axum::serve(listener, app).await?;

    Ok(())
}
