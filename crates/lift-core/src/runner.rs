//! Simulation driver.
//!
//! [`spawn_simulation`] starts one task per car plus the dispatcher over a
//! shared building and returns a [`SimulationHandle`] that owns their
//! join handles. The tasks never finish on their own; shutting the
//! handle down aborts them.

use tokio::task::JoinHandle;
use tracing::info;

use lift_types::CarId;

use crate::building::{Car, SharedState};
use crate::car::CarController;
use crate::config::{DemandConfig, TimingConfig};
use crate::demand::{DemandGenerator, run_demand};
use crate::dispatcher::run_dispatcher;
use crate::time::TimeSource;

/// Running simulation tasks.
#[derive(Debug)]
pub struct SimulationHandle {
    shared: SharedState,
    tasks: Vec<JoinHandle<()>>,
}

/// Spawn a controller for every car in `shared` and the dispatcher.
pub fn spawn_simulation<T: TimeSource>(
    shared: &SharedState,
    timing: &TimingConfig,
    time: &T,
) -> SimulationHandle {
    let car_ids: Vec<CarId> = shared.with(|building| building.cars().iter().map(Car::id).collect());
    let mut tasks = Vec::with_capacity(car_ids.len().saturating_add(1));

    for id in &car_ids {
        let controller = CarController::new(*id, shared.clone(), time.clone(), timing.clone());
        tasks.push(tokio::spawn(controller.run()));
    }
    tasks.push(tokio::spawn(run_dispatcher(
        shared.clone(),
        time.clone(),
        timing.dispatch_interval(),
    )));

    info!(
        cars = car_ids.len(),
        floor_travel_ms = timing.floor_travel_ms,
        tick_ms = timing.tick_ms,
        "simulation started"
    );

    SimulationHandle {
        shared: shared.clone(),
        tasks,
    }
}

impl SimulationHandle {
    /// The building the tasks operate on.
    pub const fn shared(&self) -> &SharedState {
        &self.shared
    }

    /// Number of spawned tasks.
    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    /// Whether every task is still running.
    pub fn is_running(&self) -> bool {
        self.tasks.iter().all(|task| !task.is_finished())
    }

    /// Add a random demand task to the simulation.
    pub fn spawn_demand<T: TimeSource>(
        &mut self,
        generator: DemandGenerator,
        time: &T,
        config: DemandConfig,
    ) {
        self.tasks.push(tokio::spawn(run_demand(
            generator,
            self.shared.clone(),
            time.clone(),
            config,
        )));
    }

    /// Abort every task and wait for them to stop.
    pub async fn shutdown(self) {
        let count = self.tasks.len();
        for task in &self.tasks {
            task.abort();
        }
        for task in self.tasks {
            // Aborted tasks resolve to a cancellation error.
            let _ = task.await;
        }
        info!(tasks = count, "simulation stopped");
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use std::time::Duration;

    use lift_types::{CarStatus, Direction};

    use super::*;
    use crate::building::Building;
    use crate::time::TokioTime;

    fn start(cars: u16) -> (SharedState, SimulationHandle) {
        let shared = SharedState::new(Building::new(cars, 20));
        let handle = spawn_simulation(&shared, &TimingConfig::default(), &TokioTime);
        (shared, handle)
    }

    #[tokio::test(start_paused = true)]
    async fn spawns_one_task_per_car_plus_dispatcher() {
        let (_shared, handle) = start(5);
        assert_eq!(handle.task_count(), 6);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(handle.is_running());
        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn floor_call_is_served_and_retired() {
        let (shared, handle) = start(2);
        shared.press_floor_call(6, Direction::Up).unwrap();

        tokio::time::sleep(Duration::from_secs(20)).await;
        handle.shutdown().await;

        let snapshot = shared.snapshot();
        assert!(snapshot.requests.is_empty());
        assert_eq!(snapshot.cars[0].current_floor, 6);
        assert_eq!(snapshot.cars[1].current_floor, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn breakdown_hands_call_to_another_car() {
        let (shared, handle) = start(2);
        shared.press_floor_call(10, Direction::Down).unwrap();

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(shared.requests()[0].assigned_car, Some(CarId(0)));
        shared.toggle_fault(CarId(0)).unwrap();

        tokio::time::sleep(Duration::from_secs(30)).await;
        handle.shutdown().await;

        let snapshot = shared.snapshot();
        assert!(snapshot.requests.is_empty());
        assert_eq!(snapshot.cars[0].status, CarStatus::BreakDown);
        assert!(snapshot.cars[0].current_floor < 10);
        assert_eq!(snapshot.cars[1].current_floor, 10);
    }

    #[tokio::test(start_paused = true)]
    async fn nothing_moves_after_shutdown() {
        let (shared, handle) = start(1);
        shared.press_cabin_floor(CarId(0), 15).unwrap();
        tokio::time::sleep(Duration::from_secs(4)).await;
        handle.shutdown().await;

        let before = shared.car(CarId(0)).unwrap();
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(shared.car(CarId(0)).unwrap(), before);
    }
}
