//! AkashaServer - 3D occupancy mapping daemon
//!
//! Runs the map server with its worker threads until SIGINT or SIGTERM,
//! then saves the global map if persistence is enabled.
//!
//! Usage: `akasha-server [config.toml]`. Without an argument, `akasha.toml`
//! in the working directory is used if present, otherwise defaults.

use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use akasha_server::threads::spawn_threads;
use akasha_server::{MapServer, Result, ServerConfig, ServerError, SharedMapState};
use signal_hook::consts::{SIGINT, SIGTERM};
use signal_hook::iterator::Signals;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("akasha_server=info")),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();
    let config = if let Some(path) = args.get(1) {
        info!("Loading configuration from {}", path);
        ServerConfig::load(Path::new(path))?
    } else if Path::new("akasha.toml").exists() {
        info!("Loading configuration from akasha.toml");
        ServerConfig::load(Path::new("akasha.toml"))?
    } else {
        info!("Using default configuration");
        ServerConfig::default()
    };

    info!("AkashaServer v{}", env!("CARGO_PKG_VERSION"));

    let server = MapServer::new(config)?;
    setup_signal_handler(Arc::clone(server.state()))?;

    // Measurement producers are attached by the embedding process; the
    // daemon keeps the sender alive so the ingest thread stays up.
    let (_measurement_tx, measurement_rx) = crossbeam_channel::bounded(16);
    let handles = spawn_threads(&server, measurement_rx, None)?;

    let check_interval = Duration::from_millis(500);
    while !server.state().should_shutdown() {
        thread::sleep(check_interval);
        if handles.any_finished() {
            warn!("A worker thread exited unexpectedly");
            break;
        }
    }

    server.state().signal_shutdown();
    info!("Waiting for threads to finish...");
    handles.join();

    if server.config().persistence.enabled {
        info!("Saving map...");
        match server.save() {
            Ok(path) => info!("Map saved to {:?}", path),
            Err(e) => error!("Final map save failed: {}", e),
        }
    }

    info!("AkashaServer finished");
    Ok(())
}

/// Flag shutdown on SIGINT or SIGTERM.
fn setup_signal_handler(state: Arc<SharedMapState>) -> Result<()> {
    let mut signals = Signals::new([SIGINT, SIGTERM])?;
    thread::Builder::new()
        .name("signal-handler".into())
        .spawn(move || {
            if let Some(sig) = signals.forever().next() {
                info!("Received signal {}, initiating shutdown...", sig);
                state.signal_shutdown();
            }
        })
        .map_err(|e| ServerError::Thread(format!("Failed to spawn signal handler: {}", e)))?;
    Ok(())
}
