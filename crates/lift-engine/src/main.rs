//! Engine binary for the Lift elevator bank.
//!
//! This is the main entry point that wires together the car controllers,
//! the dispatcher, the random demand generator, and the Observer API. It
//! loads configuration, starts every task, and runs until Ctrl-C.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `lift-config.yaml` (or `LIFT_CONFIG`)
//! 2. Initialize structured logging (tracing)
//! 3. Build the shared building from the configured size
//! 4. Spawn one task per car plus the dispatcher
//! 5. Spawn the demand generator if enabled
//! 6. Start the Observer API server and the snapshot publisher
//! 7. Wait for Ctrl-C, then abort every task

mod error;
mod publisher;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use lift_core::demand::DemandGenerator;
use lift_core::{Building, SharedState, SimulationConfig, TokioTime};
use lift_observer::ServerConfig;
use lift_observer::state::AppState;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::error::EngineError;
use crate::publisher::SnapshotPublisher;

/// Default configuration file, relative to the working directory.
const DEFAULT_CONFIG_PATH: &str = "lift-config.yaml";

/// Application entry point for the engine.
///
/// # Errors
///
/// Returns an error if the configuration is invalid or the observer
/// address cannot be parsed.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Load configuration. Logging is not up yet, so remember where
    //    it came from and report after init.
    let (config, source) = load_config()?;

    // 2. Initialize structured logging. RUST_LOG wins over the config.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.level)),
        )
        .with_target(true)
        .init();

    info!("lift-engine starting");
    info!(
        source = %source,
        cars = config.building.cars,
        floors = config.building.floors,
        floor_travel_ms = config.timing.floor_travel_ms,
        door_transition_ms = config.timing.door_transition_ms,
        door_hold_ms = config.timing.door_hold_ms,
        "Configuration loaded"
    );

    // 3. Build the building.
    let building = SharedState::new(Building::from_config(&config.building));

    // 4. Car tasks and dispatcher.
    let time = TokioTime;
    let mut simulation = lift_core::spawn_simulation(&building, &config.timing, &time);

    // 5. Background demand.
    if config.demand.enabled {
        let generator = DemandGenerator::new(
            config.demand.seed,
            config.building.cars,
            config.building.floors,
        );
        simulation.spawn_demand(generator, &time, config.demand.clone());
    } else {
        info!("Random demand disabled");
    }

    // 6. Observer API and snapshot publisher. The API's generator gets its
    //    own stream so manual bursts do not shift the background sequence.
    let api_generator = DemandGenerator::new(
        config.demand.seed.wrapping_add(1),
        config.building.cars,
        config.building.floors,
    );
    let app_state = Arc::new(AppState::new(building, api_generator));
    let server_config = ServerConfig {
        host: config.observer.host.clone(),
        port: config.observer.port,
    };
    let observer_handle = lift_observer::spawn_observer(server_config, Arc::clone(&app_state))
        .map_err(EngineError::from)?;

    let publisher = SnapshotPublisher::new(app_state);
    let publisher_handle = tokio::spawn(publisher.run(
        time,
        Duration::from_millis(config.observer.snapshot_interval_ms),
    ));

    info!(
        host = %config.observer.host,
        port = config.observer.port,
        "lift-engine running, press Ctrl-C to stop"
    );

    // 7. Run until interrupted.
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for Ctrl-C, shutting down");
    }

    publisher_handle.abort();
    observer_handle.abort();
    simulation.shutdown().await;

    info!("lift-engine shutdown complete");

    Ok(())
}

/// Load the simulation configuration.
///
/// Reads `LIFT_CONFIG` if set, otherwise `lift-config.yaml` in the working
/// directory. A missing file yields the defaults (with environment
/// overrides applied). Returns the config and a description of its source.
fn load_config() -> Result<(SimulationConfig, String), EngineError> {
    let config_path = std::env::var("LIFT_CONFIG")
        .map_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH), PathBuf::from);
    if config_path.exists() {
        let config = SimulationConfig::from_file(&config_path)?;
        Ok((config, config_path.display().to_string()))
    } else {
        let mut config = SimulationConfig::default();
        config.apply_env_overrides();
        config.validate()?;
        Ok((config, String::from("defaults")))
    }
}
