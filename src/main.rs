//! Settings server.
//!
//! Serves runtime settings over an authenticated HTTP API and applies writes
//! live.
//!
//! # Architecture Overview
//!
//! ```text
//!                   ┌──────────────────────────────────────────────────────┐
//!                   │                   SETTINGS SERVER                     │
//!   Admin client    │  ┌────────┐   ┌─────────┐   ┌────────────────────┐   │
//!   ────────────────┼─▶│  http  │──▶│  admin  │──▶│ settings pipeline  │   │
//!   (bearer token)  │  │ server │   │ auth +  │   │ validate → persist │   │
//!                   │  └────────┘   │protocol │   │ → reload → logging │   │
//!                   │               └─────────┘   └─────────┬──────────┘   │
//!                   │                                       │              │
//!                   │                      ┌────────────────┴───────┐      │
//!                   │                      ▼                        ▼      │
//!                   │               ┌─────────────┐         ┌────────────┐ │
//!                   │               │ store: file │         │ ArcSwap    │ │
//!                   │               │ or sqlite   │         │ <Settings> │ │
//!                   │               └─────────────┘         └────────────┘ │
//!                   │                                                      │
//!                   │  restart requested → drain → exit 75 → supervisor    │
//!                   └──────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;

use settings_server::admin::AdminService;
use settings_server::config::{load_config, StoreWatcher};
use settings_server::http::{AppState, HttpServer};
use settings_server::lifecycle::{RestartSignal, RESTART_EXIT_CODE};
use settings_server::observability::{logging, LogReconfigure};
use settings_server::settings::{capture_env, SettingsHandle, UpdatePipeline};
use settings_server::store;

#[derive(Parser)]
#[command(name = "settings-server", version)]
#[command(about = "Runtime settings service", long_about = None)]
struct Args {
    /// Boot configuration file (TOML).
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let boot = load_config(args.config.as_deref())?;

    let store = store::open(&boot.store).await?;
    let handle = Arc::new(SettingsHandle::load(store, capture_env()).await?);
    let settings = handle.snapshot();

    let (log_handle, log_guard) = logging::init(&settings)?;
    let logging: Arc<dyn LogReconfigure> = Arc::new(log_handle);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        store = %handle.store().describe(),
        "settings-server starting"
    );

    let restart = Arc::new(RestartSignal::new());
    let pipeline = UpdatePipeline::new(handle.clone(), Some(logging.clone()), restart.clone());
    let state = AppState {
        admin: Arc::new(AdminService::new(pipeline)),
        settings: handle.clone(),
        restart,
    };

    let watcher = if settings.reload && !boot.store.use_db {
        match StoreWatcher::new(&boot.store.env_path, handle.clone(), Some(logging)).run() {
            Ok(watcher) => Some(watcher),
            Err(e) => {
                tracing::warn!(error = %e, "Store watcher unavailable, hot reload disabled");
                None
            }
        }
    } else {
        None
    };

    let bind_address = boot
        .server
        .bind_override
        .clone()
        .unwrap_or_else(|| settings.bind_address());
    let listener = TcpListener::bind(&bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let restart_requested = HttpServer::new(state, &boot.server).run(listener).await?;
    drop(watcher);

    if restart_requested {
        tracing::info!(exit_code = RESTART_EXIT_CODE, "Exiting for restart");
        drop(log_guard);
        std::process::exit(RESTART_EXIT_CODE);
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
