//! Car state machines, SCAN dispatcher, and simulation driver for the Lift
//! elevator bank.
//!
//! All live state sits in one [`Building`] behind a single lock
//! ([`SharedState`]). Every car runs its own task, and one dispatcher task
//! assigns hall calls; none of them holds the lock while sleeping.
//!
//! # Modules
//!
//! - [`building`] -- Cars, floor requests, and the shared lock.
//! - [`car`] -- Per-car state machine and [`CarController`] loop.
//! - [`config`] -- Configuration loading from `lift-config.yaml` into
//!   strongly-typed structs.
//! - [`controls`] -- Cabin and hall buttons with [`CommandRejection`]
//!   notices.
//! - [`demand`] -- Seeded random passenger demand.
//! - [`dispatcher`] -- Cost function and the assignment/cleanup cycle.
//! - [`runner`] -- Spawns the tasks and owns their handles.
//! - [`time`] -- [`TimeSource`] abstraction over tokio's timer.
//!
//! [`Building`]: building::Building
//! [`SharedState`]: building::SharedState
//! [`CarController`]: car::CarController
//! [`CommandRejection`]: controls::CommandRejection
//! [`TimeSource`]: time::TimeSource

pub mod building;
pub mod car;
pub mod config;
pub mod controls;
pub mod demand;
pub mod dispatcher;
pub mod runner;
pub mod time;

pub use building::{Building, Car, FloorRequest, SharedState};
pub use config::SimulationConfig;
pub use controls::{CommandRejection, FloorCallOutcome};
pub use runner::{SimulationHandle, spawn_simulation};
pub use time::{TimeSource, TokioTime};
