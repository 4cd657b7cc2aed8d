//! PumpGrid coordination server entry point.
//!
//! Wires together persistence, the radio scanner, and the two role
//! listeners, then hands control to the orchestrator until the keep-running
//! signal clears.
//!
//! # Architecture
//!
//! ```text
//! main()
//!  └─ config bootstrap     -- pumpgrid.toml, created with defaults if missing
//!  └─ SqlitePool           -- schema init + per-session store connections
//!  └─ AppState             -- registry, port inventory, shutdown flag
//!  └─ background threads
//!       ├─ radio-scanner
//!       ├─ edge-listener   -- externally reachable address
//!       └─ web-listener    -- loopback only
//!  └─ Orchestrator::run    -- drain dispatch queue, spawn sessions
//!  └─ Orchestrator::shutdown -- flag + bounded joins
//! ```

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use pumpgrid_server::application::dispatch::{DispatchQueue, Role};
use pumpgrid_server::application::orchestrator::{Orchestrator, WorkerSet};
use pumpgrid_server::application::state::AppState;
use pumpgrid_server::infrastructure::network::listener::{spawn_listener, Listener};
use pumpgrid_server::infrastructure::radio::link::{RadioLink, UsbRadio};
use pumpgrid_server::infrastructure::radio::scanner::spawn_scanner;
use pumpgrid_server::infrastructure::storage::config::{self, AppConfig};
use pumpgrid_server::infrastructure::storage::store::{SqlitePool, StorePool};

#[derive(Debug, Parser)]
#[command(name = "pumpgrid-server", about = "PumpGrid fleet-coordination server")]
struct Args {
    /// Path to the TOML configuration file (created with defaults if missing).
    #[arg(long, env = "PUMPGRID_CONFIG", default_value = "pumpgrid.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    if !args.config.exists() {
        config::save_config(&args.config, &AppConfig::default()).with_context(|| {
            format!("failed to write initial config to {}", args.config.display())
        })?;
    }
    let config = config::load_config(&args.config)
        .with_context(|| format!("failed to load config from {}", args.config.display()))?;

    // Initialise structured logging. Level is overridden by `RUST_LOG`.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.server.log_level.clone())),
        )
        .init();

    info!("PumpGrid server starting");

    let pool: Arc<dyn StorePool> =
        SqlitePool::new(&config.database.path, config.server.max_edge_clients)
            .context("failed to open telemetry store")?;
    let radio: Arc<dyn RadioLink> = Arc::new(UsbRadio::new(&config.radio));

    let state = Arc::new(AppState::new(config));

    // The coordinator's own co-located device reports through the registry too.
    state
        .registry
        .lock()
        .mark_connected(&state.config.server.device_serial);

    let queue = Arc::new(DispatchQueue::new());
    let mut workers = WorkerSet::new();

    workers.push(
        "radio-scanner",
        spawn_scanner(Arc::clone(&state)).context("failed to spawn radio scanner")?,
    );

    // An unbindable listener is fatal: without it the process serves nothing.
    let accept_timeout = state.config.server.accept_timeout();
    let edge_listener = Listener::bind(
        &state.config.server.edge_address,
        state.config.server.edge_port,
        state.config.server.max_edge_clients,
        Role::Edge,
        accept_timeout,
    )
    .context("failed to bind edge listener")?;
    let web_listener = Listener::bind(
        "127.0.0.1",
        state.config.server.web_port,
        state.config.server.max_web_clients,
        Role::Web,
        accept_timeout,
    )
    .context("failed to bind web listener")?;

    workers.push(
        "edge-listener",
        spawn_listener(edge_listener, Arc::clone(&queue), state.shutdown.clone())
            .context("failed to spawn edge listener")?,
    );
    workers.push(
        "web-listener",
        spawn_listener(web_listener, Arc::clone(&queue), state.shutdown.clone())
            .context("failed to spawn web listener")?,
    );

    // Keep-running flag, cleared by Ctrl-C; re-read once per orchestrator
    // iteration.
    let running = Arc::new(AtomicBool::new(true));
    let running_clone = Arc::clone(&running);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown signal received");
            running_clone.store(false, Ordering::Relaxed);
        }
    });

    info!("PumpGrid server ready.  Press Ctrl-C to exit.");

    let mut orchestrator = Orchestrator::new(Arc::clone(&state), queue, pool, radio, workers);
    orchestrator.run(&running).await;
    orchestrator.shutdown();

    info!("PumpGrid server stopped");
    Ok(())
}
