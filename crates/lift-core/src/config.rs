//! Configuration loading and typed config structures for the Lift simulation.
//!
//! The canonical configuration lives in `lift-config.yaml` at the project
//! root. This module defines strongly-typed structs that mirror the YAML
//! structure, and provides a loader that reads and validates the file.
//!
//! Everything here is fixed at startup. Nothing is reloaded while the
//! cars are running.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// A value parsed but is outside its legal range.
    #[error("invalid config value for {field}: {reason}")]
    Invalid {
        /// Dotted path of the offending field.
        field: &'static str,
        /// What is wrong with it.
        reason: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level simulation configuration.
///
/// Mirrors the structure of `lift-config.yaml`. All fields have defaults
/// matching the reference building: five cars, twenty floors.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SimulationConfig {
    /// Size of the bank.
    #[serde(default)]
    pub building: BuildingConfig,

    /// Step durations and polling intervals.
    #[serde(default)]
    pub timing: TimingConfig,

    /// Random demand generation.
    #[serde(default)]
    pub demand: DemandConfig,

    /// Observer HTTP server.
    #[serde(default)]
    pub observer: ObserverConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl SimulationConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// Environment variables override YAML values:
    /// - `LIFT_OBSERVER_PORT` overrides `observer.port`
    /// - `LIFT_LOG_LEVEL` overrides `logging.level`
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Yaml`] if the content is not valid YAML, or
    /// [`ConfigError::Invalid`] if a value is out of range.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse and validate configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML, or
    /// [`ConfigError::Invalid`] if a value is out of range.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let mut config: Self = serde_yml::from_str(yaml)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Override selected values with environment variables when set.
    ///
    /// Unparseable values are ignored and the YAML value is kept.
    pub fn apply_env_overrides(&mut self) {
        if let Some(port) = std::env::var("LIFT_OBSERVER_PORT")
            .ok()
            .and_then(|val| val.parse::<u16>().ok())
        {
            self.observer.port = port;
        }
        if let Ok(level) = std::env::var("LIFT_LOG_LEVEL") {
            self.logging.level = level;
        }
    }

    /// Check that every value is usable by the simulation.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first bad field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.building.cars == 0 {
            return Err(invalid("building.cars", "at least one car is required"));
        }
        if self.building.floors < 2 {
            return Err(invalid("building.floors", "at least two floors are required"));
        }
        let tick = self.timing.tick_ms;
        if tick == 0 {
            return Err(invalid("timing.tick_ms", "must be greater than zero"));
        }
        for (field, value) in [
            ("timing.floor_travel_ms", self.timing.floor_travel_ms),
            ("timing.door_transition_ms", self.timing.door_transition_ms),
            ("timing.door_hold_ms", self.timing.door_hold_ms),
            ("timing.dispatch_interval_ms", self.timing.dispatch_interval_ms),
        ] {
            if value < tick {
                return Err(invalid(field, format!("{value}ms is shorter than one {tick}ms tick")));
            }
        }
        if self.demand.enabled && self.demand.interval_ms == 0 {
            return Err(invalid("demand.interval_ms", "must be greater than zero"));
        }
        if self.observer.snapshot_interval_ms == 0 {
            return Err(invalid("observer.snapshot_interval_ms", "must be greater than zero"));
        }
        Ok(())
    }
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.into(),
    }
}

/// Size of the elevator bank.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BuildingConfig {
    /// Number of cars, addressed `0..cars`.
    #[serde(default = "default_cars")]
    pub cars: u16,

    /// Number of floors, numbered `1..=floors`.
    #[serde(default = "default_floors")]
    pub floors: u16,
}

impl Default for BuildingConfig {
    fn default() -> Self {
        Self {
            cars: default_cars(),
            floors: default_floors(),
        }
    }
}

/// Durations of the discrete steps a car performs.
///
/// Every wait is split into `tick_ms` slices; faults and cabin buttons are
/// observed between slices.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TimingConfig {
    /// Time to travel one floor.
    #[serde(default = "default_floor_travel_ms")]
    pub floor_travel_ms: u64,

    /// Time for the doors to go from closed to fully open (and back).
    #[serde(default = "default_door_transition_ms")]
    pub door_transition_ms: u64,

    /// Time the doors stay fully open.
    #[serde(default = "default_door_hold_ms")]
    pub door_hold_ms: u64,

    /// Sub-interval at which in-flight work re-checks shared state.
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,

    /// Polling interval of the dispatcher loop.
    #[serde(default = "default_dispatch_interval_ms")]
    pub dispatch_interval_ms: u64,
}

impl TimingConfig {
    /// One sub-interval as a [`Duration`].
    pub const fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }

    /// Dispatcher polling interval as a [`Duration`].
    pub const fn dispatch_interval(&self) -> Duration {
        Duration::from_millis(self.dispatch_interval_ms)
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            floor_travel_ms: default_floor_travel_ms(),
            door_transition_ms: default_door_transition_ms(),
            door_hold_ms: default_door_hold_ms(),
            tick_ms: default_tick_ms(),
            dispatch_interval_ms: default_dispatch_interval_ms(),
        }
    }
}

/// Random demand generation settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DemandConfig {
    /// Whether the engine injects random requests on its own.
    #[serde(default)]
    pub enabled: bool,

    /// Requests generated per burst.
    #[serde(default = "default_burst_size")]
    pub burst_size: u32,

    /// Time between bursts.
    #[serde(default = "default_demand_interval_ms")]
    pub interval_ms: u64,

    /// Seed for reproducible demand.
    #[serde(default = "default_seed")]
    pub seed: u64,
}

impl Default for DemandConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            burst_size: default_burst_size(),
            interval_ms: default_demand_interval_ms(),
            seed: default_seed(),
        }
    }
}

/// Observer HTTP server configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ObserverConfig {
    /// Address to bind.
    #[serde(default = "default_observer_host")]
    pub host: String,

    /// TCP port to listen on.
    #[serde(default = "default_observer_port")]
    pub port: u16,

    /// How often a building snapshot is pushed to `WebSocket` clients.
    #[serde(default = "default_snapshot_interval_ms")]
    pub snapshot_interval_ms: u64,
}

impl Default for ObserverConfig {
    fn default() -> Self {
        Self {
            host: default_observer_host(),
            port: default_observer_port(),
            snapshot_interval_ms: default_snapshot_interval_ms(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error). `RUST_LOG` wins when set.
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

// ---------------------------------------------------------------------------
// Default value functions (serde default requires named functions)
// ---------------------------------------------------------------------------

const fn default_cars() -> u16 {
    5
}

const fn default_floors() -> u16 {
    20
}

const fn default_floor_travel_ms() -> u64 {
    1500
}

const fn default_door_transition_ms() -> u64 {
    800
}

const fn default_door_hold_ms() -> u64 {
    1500
}

const fn default_tick_ms() -> u64 {
    10
}

const fn default_dispatch_interval_ms() -> u64 {
    10
}

const fn default_burst_size() -> u32 {
    4
}

const fn default_demand_interval_ms() -> u64 {
    5000
}

const fn default_seed() -> u64 {
    42
}

fn default_observer_host() -> String {
    "0.0.0.0".to_owned()
}

const fn default_observer_port() -> u16 {
    8080
}

const fn default_snapshot_interval_ms() -> u64 {
    250
}

fn default_log_level() -> String {
    "info".to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_reference_building() {
        let config = SimulationConfig::default();
        assert_eq!(config.building.cars, 5);
        assert_eq!(config.building.floors, 20);
        assert_eq!(config.timing.floor_travel_ms, 1500);
        assert_eq!(config.timing.door_transition_ms, 800);
        assert_eq!(config.timing.door_hold_ms, 1500);
        assert_eq!(config.timing.tick(), Duration::from_millis(10));
        assert!(!config.demand.enabled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn parse_full_yaml() {
        let yaml = r#"
building:
  cars: 2
  floors: 12

timing:
  floor_travel_ms: 600
  door_transition_ms: 300
  door_hold_ms: 900
  tick_ms: 20
  dispatch_interval_ms: 40

demand:
  enabled: true
  burst_size: 10
  interval_ms: 2000
  seed: 7

observer:
  host: "127.0.0.1"
  port: 9090
  snapshot_interval_ms: 100

logging:
  level: "debug"
"#;

        let config = SimulationConfig::parse(yaml);
        assert!(config.is_ok(), "{config:?}");
        let config = config.ok().unwrap_or_default();

        assert_eq!(config.building.cars, 2);
        assert_eq!(config.building.floors, 12);
        assert_eq!(config.timing.tick_ms, 20);
        assert_eq!(config.timing.dispatch_interval(), Duration::from_millis(40));
        assert!(config.demand.enabled);
        assert_eq!(config.demand.seed, 7);
        assert_eq!(config.observer.host, "127.0.0.1");
    }

    #[test]
    fn parse_minimal_yaml() {
        let yaml = "building:\n  floors: 8\n";
        let config = SimulationConfig::parse(yaml);
        assert!(config.is_ok());
        let config = config.ok().unwrap_or_default();

        assert_eq!(config.building.floors, 8);
        assert_eq!(config.building.cars, 5);
        assert_eq!(config.timing.floor_travel_ms, 1500);
    }

    #[test]
    fn parse_empty_yaml() {
        assert!(SimulationConfig::parse("").is_ok());
    }

    #[test]
    fn rejects_zero_cars() {
        let result = SimulationConfig::parse("building:\n  cars: 0\n");
        assert!(matches!(
            result,
            Err(ConfigError::Invalid { field: "building.cars", .. })
        ));
    }

    #[test]
    fn rejects_single_floor() {
        let result = SimulationConfig::parse("building:\n  floors: 1\n");
        assert!(matches!(
            result,
            Err(ConfigError::Invalid { field: "building.floors", .. })
        ));
    }

    #[test]
    fn rejects_zero_tick() {
        let result = SimulationConfig::parse("timing:\n  tick_ms: 0\n");
        assert!(matches!(
            result,
            Err(ConfigError::Invalid { field: "timing.tick_ms", .. })
        ));
    }

    #[test]
    fn rejects_duration_shorter_than_tick() {
        let result = SimulationConfig::parse("timing:\n  tick_ms: 50\n  door_transition_ms: 20\n");
        assert!(matches!(
            result,
            Err(ConfigError::Invalid { field: "timing.door_transition_ms", .. })
        ));
    }

    #[test]
    fn rejects_malformed_yaml() {
        let result = SimulationConfig::parse("building: [unclosed");
        assert!(matches!(result, Err(ConfigError::Yaml { .. })));
    }

    #[test]
    fn load_project_config_file() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("..")
            .join("..")
            .join("lift-config.yaml");
        if path.exists() {
            let config = SimulationConfig::from_file(&path);
            assert!(config.is_ok(), "Failed to load project config: {config:?}");
        }
    }
}
