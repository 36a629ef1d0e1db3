//! Random passenger demand.
//!
//! Half of the generated presses are hall calls, half are cabin buttons in
//! a random car. Hall calls only ever use buttons that exist: the ground
//! floor always calls up and the top floor always calls down. A seeded
//! generator produces the same sequence every run.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::Duration;
use tracing::{debug, info};

use lift_types::{CarId, Direction};

use crate::building::{GROUND_FLOOR, SharedState};
use crate::config::DemandConfig;
use crate::time::TimeSource;

/// One simulated button press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeneratedRequest {
    /// A hall button.
    FloorCall {
        /// Floor the passenger is waiting on.
        floor: u16,
        /// Direction they want to go.
        direction: Direction,
    },
    /// A floor button inside a car.
    CabinFloor {
        /// The car.
        car: CarId,
        /// Destination floor.
        floor: u16,
    },
}

/// Outcome of injecting a batch of presses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DemandReport {
    /// Presses the building accepted.
    pub accepted: u32,
    /// Presses refused (broken car, already at floor).
    pub rejected: u32,
}

/// Seeded source of random button presses.
#[derive(Debug, Clone)]
pub struct DemandGenerator {
    rng: StdRng,
    cars: u16,
    floors: u16,
}

impl DemandGenerator {
    /// A generator for a building of `cars` cars and `floors` floors.
    pub fn new(seed: u64, cars: u16, floors: u16) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            cars,
            floors,
        }
    }

    /// Draw the next press.
    pub fn next_request(&mut self) -> GeneratedRequest {
        let floors = self.floors.max(GROUND_FLOOR);
        if self.cars == 0 || self.rng.random_bool(0.5) {
            let floor = self.rng.random_range(GROUND_FLOOR..=floors);
            let direction = if floor == GROUND_FLOOR {
                Direction::Up
            } else if floor == floors {
                Direction::Down
            } else if self.rng.random_bool(0.5) {
                Direction::Up
            } else {
                Direction::Down
            };
            GeneratedRequest::FloorCall { floor, direction }
        } else {
            let car = CarId(self.rng.random_range(0..self.cars));
            let floor = self.rng.random_range(GROUND_FLOOR..=floors);
            GeneratedRequest::CabinFloor { car, floor }
        }
    }

    /// Press `count` random buttons.
    pub fn inject(&mut self, shared: &SharedState, count: u32) -> DemandReport {
        let mut report = DemandReport::default();
        for _ in 0..count {
            let accepted = match self.next_request() {
                GeneratedRequest::FloorCall { floor, direction } => {
                    shared.press_floor_call(floor, direction).is_ok()
                }
                GeneratedRequest::CabinFloor { car, floor } => {
                    shared.press_cabin_floor(car, floor).is_ok()
                }
            };
            if accepted {
                report.accepted = report.accepted.saturating_add(1);
            } else {
                report.rejected = report.rejected.saturating_add(1);
            }
        }
        report
    }
}

/// Inject a burst of random presses every `config.interval_ms`.
pub async fn run_demand<T: TimeSource>(
    mut generator: DemandGenerator,
    shared: SharedState,
    time: T,
    config: DemandConfig,
) {
    info!(
        burst = config.burst_size,
        interval_ms = config.interval_ms,
        seed = config.seed,
        "demand generator started"
    );
    let interval = Duration::from_millis(config.interval_ms);
    loop {
        time.sleep(interval).await;
        let report = generator.inject(&shared, config.burst_size);
        debug!(
            accepted = report.accepted,
            rejected = report.rejected,
            "demand burst"
        );
    }
}
