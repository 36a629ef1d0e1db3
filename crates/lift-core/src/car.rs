//! Per-car state machine and its driving loop.
//!
//! Each car runs as its own task. A step is planned under the building
//! lock, then carried out as a series of short sleeps with the lock
//! released; after every sleep the car reacquires the lock and checks
//! whether a fault has interrupted it before doing any more work.

use lift_types::{CarId, CarStatus, Direction};
use tracing::{debug, info};

use crate::building::{Building, Car, SharedState};
use crate::config::TimingConfig;
use crate::time::TimeSource;

// ---------------------------------------------------------------------------
// Step planning
// ---------------------------------------------------------------------------

/// What a car decided to do from rest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CarStep {
    /// Broken down (or unknown); nothing to do this tick.
    OutOfService,
    /// Both queues empty; nothing to do this tick.
    Idle,
    /// The active queue ran dry and the car switched sweeps.
    Reversed(Direction),
    /// Travel one floor.
    Travel(Direction),
    /// Run a door cycle at this floor.
    ServeStop(u16),
}

impl Car {
    /// Decide the next step from rest.
    ///
    /// A head stop behind the car (assigned while it was leaving that
    /// floor) is reached by stepping back rather than waiting.
    fn plan_step(&mut self) -> CarStep {
        let scan = self.scan_direction;
        if let Some(head) = self.next_stop(scan) {
            return match head.cmp(&self.current_floor) {
                std::cmp::Ordering::Equal => CarStep::ServeStop(head),
                std::cmp::Ordering::Greater => CarStep::Travel(Direction::Up),
                std::cmp::Ordering::Less => CarStep::Travel(Direction::Down),
            };
        }
        let other = scan.opposite();
        if self.queue_is_empty(other) {
            return CarStep::Idle;
        }
        self.scan_direction = other;
        CarStep::Reversed(other)
    }
}

impl Building {
    pub(crate) fn plan_step(&mut self, id: CarId) -> CarStep {
        match self.car(id).map(Car::status) {
            None => return CarStep::OutOfService,
            Some(CarStatus::BreakDown) => {
                self.hold_breakdown(id);
                return CarStep::OutOfService;
            }
            Some(_) => {}
        }
        self.car_mut(id)
            .map_or(CarStep::OutOfService, Car::plan_step)
    }

    /// Whether the step started at `epoch` must be abandoned. A broken car
    /// has its breakdown actions reapplied.
    pub(crate) fn step_interrupted(&mut self, id: CarId, epoch: u64) -> bool {
        let Some(car) = self.car(id) else {
            return true;
        };
        if car.is_out_of_service() {
            self.hold_breakdown(id);
            return true;
        }
        car.fault_epoch != epoch
    }

    fn begin_travel(&mut self, id: CarId, direction: Direction) -> Option<u64> {
        let car = self.car_mut(id)?;
        car.status = CarStatus::moving(direction);
        Some(car.fault_epoch)
    }

    /// Land on the next floor unless a fault got there first. Returns the
    /// new floor.
    fn finish_travel(&mut self, id: CarId, direction: Direction, epoch: u64) -> Option<u16> {
        if self.step_interrupted(id, epoch) {
            return None;
        }
        let floors = self.floors();
        let car = self.car_mut(id)?;
        car.current_floor = match direction {
            Direction::Up => car.current_floor.saturating_add(1).min(floors),
            Direction::Down => car.current_floor.saturating_sub(1).max(1),
        };
        car.status = CarStatus::Normal;
        Some(car.current_floor)
    }
}

// ---------------------------------------------------------------------------
// Doors
// ---------------------------------------------------------------------------

/// Timers of one door cycle, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct DoorCycle {
    opened_ms: u64,
    held_ms: u64,
    epoch: u64,
}

/// Where a door cycle stands after a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DoorPhase {
    Cycling,
    Closed,
    Interrupted,
}

/// `part / whole`, clamped to `[0, 1]`.
fn ratio(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        return 1.0;
    }
    // Door timings are a few thousand milliseconds at most.
    #[allow(clippy::cast_precision_loss)]
    let progress = part as f64 / whole as f64;
    progress.clamp(0.0, 1.0)
}

impl Car {
    /// Consume the cabin buttons. Open reverses a closing door or restarts
    /// the hold; close cuts the cycle short from wherever the door is.
    fn apply_door_latches(&mut self, cycle: &mut DoorCycle) {
        if self.open_requested {
            match self.status {
                CarStatus::DoorClosing => self.status = CarStatus::DoorOpening,
                CarStatus::DoorOpen => cycle.held_ms = 0,
                _ => {}
            }
            self.open_requested = false;
        }
        if self.close_requested {
            self.status = CarStatus::DoorClosing;
            cycle.held_ms = 0;
            self.close_requested = false;
        }
    }

    /// Move the doors on by one tick.
    fn advance_door(&mut self, cycle: &mut DoorCycle, timing: &TimingConfig) -> DoorPhase {
        let transition = timing.door_transition_ms;
        match self.status {
            CarStatus::DoorOpening => {
                cycle.opened_ms = cycle.opened_ms.saturating_add(timing.tick_ms).min(transition);
                self.door_progress = ratio(cycle.opened_ms, transition);
                if cycle.opened_ms >= transition {
                    self.status = CarStatus::DoorOpen;
                    cycle.held_ms = 0;
                }
                DoorPhase::Cycling
            }
            CarStatus::DoorOpen => {
                cycle.held_ms = cycle.held_ms.saturating_add(timing.tick_ms);
                if cycle.held_ms >= timing.door_hold_ms {
                    self.status = CarStatus::DoorClosing;
                }
                DoorPhase::Cycling
            }
            CarStatus::DoorClosing => {
                cycle.opened_ms = cycle.opened_ms.saturating_sub(timing.tick_ms);
                self.door_progress = ratio(cycle.opened_ms, transition);
                if cycle.opened_ms == 0 {
                    self.status = CarStatus::Normal;
                    DoorPhase::Closed
                } else {
                    DoorPhase::Cycling
                }
            }
            _ => DoorPhase::Interrupted,
        }
    }
}

impl Building {
    pub(crate) fn begin_door_cycle(&mut self, id: CarId) -> Option<DoorCycle> {
        let car = self.car_mut(id)?;
        car.status = CarStatus::DoorOpening;
        car.door_progress = 0.0;
        Some(DoorCycle {
            opened_ms: 0,
            held_ms: 0,
            epoch: car.fault_epoch,
        })
    }

    pub(crate) fn advance_door(
        &mut self,
        id: CarId,
        cycle: &mut DoorCycle,
        timing: &TimingConfig,
    ) -> DoorPhase {
        if self.step_interrupted(id, cycle.epoch) {
            return DoorPhase::Interrupted;
        }
        let Some(car) = self.car_mut(id) else {
            return DoorPhase::Interrupted;
        };
        car.apply_door_latches(cycle);
        car.advance_door(cycle, timing)
    }
}

// ---------------------------------------------------------------------------
// Controller
// ---------------------------------------------------------------------------

/// Drives one car forever.
#[derive(Debug, Clone)]
pub struct CarController<T> {
    id: CarId,
    shared: SharedState,
    time: T,
    timing: TimingConfig,
}

impl<T: TimeSource> CarController<T> {
    /// A controller for car `id`.
    pub const fn new(id: CarId, shared: SharedState, time: T, timing: TimingConfig) -> Self {
        Self {
            id,
            shared,
            time,
            timing,
        }
    }

    /// Run until the task is aborted.
    pub async fn run(self) {
        info!(car = %self.id, "car started");
        loop {
            self.step().await;
        }
    }

    /// Plan and carry out one step. Returns what was planned.
    pub async fn step(&self) -> CarStep {
        let step = self.shared.with(|building| building.plan_step(self.id));
        match step {
            CarStep::OutOfService | CarStep::Idle => self.time.sleep(self.timing.tick()).await,
            CarStep::Reversed(direction) => {
                debug!(car = %self.id, %direction, "sweep reversed");
            }
            CarStep::Travel(direction) => {
                self.travel(direction).await;
            }
            CarStep::ServeStop(floor) => {
                self.serve_stop(floor).await;
            }
        }
        step
    }

    /// Move one floor, checking for faults every tick. A step cut short by
    /// a fault leaves the car where it started.
    async fn travel(&self, direction: Direction) -> bool {
        let id = self.id;
        let Some(epoch) = self.shared.with(|building| building.begin_travel(id, direction)) else {
            return false;
        };

        let mut elapsed = 0_u64;
        while elapsed < self.timing.floor_travel_ms {
            self.time.sleep(self.timing.tick()).await;
            elapsed = elapsed.saturating_add(self.timing.tick_ms);
            if self.shared.with(|building| building.step_interrupted(id, epoch)) {
                debug!(car = %id, %direction, "travel interrupted");
                return false;
            }
        }

        match self
            .shared
            .with(|building| building.finish_travel(id, direction, epoch))
        {
            Some(floor) => {
                debug!(car = %id, floor, "arrived");
                true
            }
            None => false,
        }
    }

    /// Open, hold, and close the doors at `floor`, then retire the stop.
    async fn serve_stop(&self, floor: u16) -> bool {
        let id = self.id;
        let Some(mut cycle) = self.shared.with(|building| building.begin_door_cycle(id)) else {
            return false;
        };
        debug!(car = %id, floor, "doors opening");

        loop {
            self.time.sleep(self.timing.tick()).await;
            let (phase, finished) = self.shared.with(|building| {
                let phase = building.advance_door(id, &mut cycle, &self.timing);
                let finished = if phase == DoorPhase::Closed {
                    building.complete_stop(id, floor)
                } else {
                    0
                };
                (phase, finished)
            });
            match phase {
                DoorPhase::Cycling => {}
                DoorPhase::Closed => {
                    debug!(car = %id, floor, finished, "stop served");
                    return true;
                }
                DoorPhase::Interrupted => {
                    debug!(car = %id, floor, "door cycle interrupted");
                    return false;
                }
            }
        }
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::indexing_slicing,
    clippy::float_cmp,
    clippy::arithmetic_side_effects
)]
mod tests {
    use std::future::Future;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use lift_types::RequestState;

    use super::*;
    use crate::building::FloorRequest;

    /// What the probe saw at one suspension point.
    #[derive(Debug, Clone, Copy, PartialEq)]
    struct Observation {
        status: CarStatus,
        floor: u16,
        door: f64,
    }

    /// Tokio time that inspects the building at every sleep. A `None`
    /// entry means the lock was held when the sleep began.
    #[derive(Clone)]
    struct Probe {
        shared: SharedState,
        car: CarId,
        seen: Arc<Mutex<Vec<Option<Observation>>>>,
    }

    impl Probe {
        fn new(shared: &SharedState, car: CarId) -> Self {
            Self {
                shared: shared.clone(),
                car,
                seen: Arc::new(Mutex::new(Vec::new())),
            }
        }

        fn lock_was_always_free(&self) -> bool {
            let seen = self.seen.lock().unwrap();
            !seen.is_empty() && seen.iter().all(Option::is_some)
        }

        fn observations(&self) -> Vec<Observation> {
            self.seen.lock().unwrap().iter().flatten().copied().collect()
        }

        /// Observations with consecutive repeats of `(status, floor)`
        /// collapsed.
        fn transitions(&self) -> Vec<(CarStatus, u16)> {
            let mut out: Vec<(CarStatus, u16)> = Vec::new();
            for seen in self.observations() {
                let key = (seen.status, seen.floor);
                if out.last() != Some(&key) {
                    out.push(key);
                }
            }
            out
        }
    }

    impl TimeSource for Probe {
        fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send {
            let seen = self.shared.try_with(|building| {
                building.car(self.car).map(|car| Observation {
                    status: car.status(),
                    floor: car.current_floor(),
                    door: car.door_progress(),
                })
            });
            self.seen.lock().unwrap().push(seen.flatten());
            tokio::time::sleep(duration)
        }
    }

    fn spawn_car(shared: &SharedState, id: CarId) -> (Probe, tokio::task::JoinHandle<()>) {
        let probe = Probe::new(shared, id);
        let controller = CarController::new(id, shared.clone(), probe.clone(), TimingConfig::default());
        (probe, tokio::spawn(controller.run()))
    }

    fn cycle_car(floor: u16) -> (Car, DoorCycle) {
        let mut building = Building::new(1, 20);
        building.cars[0].current_floor = floor;
        let cycle = building.begin_door_cycle(CarId(0)).unwrap();
        (building.cars[0].clone(), cycle)
    }

    #[test]
    fn plan_serves_head_at_current_floor() {
        let mut car = Car::new(CarId(0));
        car.current_floor = 4;
        car.enqueue(4, Direction::Up);
        assert_eq!(car.plan_step(), CarStep::ServeStop(4));
    }

    #[test]
    fn plan_steps_back_to_head_behind_the_car() {
        let mut car = Car::new(CarId(0));
        car.current_floor = 6;
        car.up_queue.insert(5);
        assert_eq!(car.plan_step(), CarStep::Travel(Direction::Down));
    }

    #[test]
    fn plan_reverses_only_when_other_queue_has_work() {
        let mut car = Car::new(CarId(0));
        car.current_floor = 9;
        assert_eq!(car.plan_step(), CarStep::Idle);
        assert_eq!(car.scan_direction(), Direction::Up);

        car.enqueue(2, Direction::Down);
        assert_eq!(car.plan_step(), CarStep::Reversed(Direction::Down));
        assert_eq!(car.scan_direction(), Direction::Down);
        assert_eq!(car.plan_step(), CarStep::Travel(Direction::Down));
    }

    #[test]
    fn broken_car_plans_nothing_and_stays_cleared() {
        let mut building = Building::new(1, 20);
        building.enter_breakdown(CarId(0));
        // Work sneaking into a broken car's queue is dropped again.
        building.cars[0].up_queue.insert(8);
        assert_eq!(building.plan_step(CarId(0)), CarStep::OutOfService);
        assert!(building.cars[0].queue_is_empty(Direction::Up));
        assert_eq!(building.plan_step(CarId(9)), CarStep::OutOfService);
    }

    #[test]
    fn door_progress_is_monotonic_and_bounded() {
        let timing = TimingConfig::default();
        let (mut car, mut cycle) = cycle_car(3);
        let mut last = (car.status(), car.door_progress());
        let mut phase = DoorPhase::Cycling;
        let mut ticks = 0;
        while phase == DoorPhase::Cycling {
            phase = car.advance_door(&mut cycle, &timing);
            let progress = car.door_progress();
            assert!((0.0..=1.0).contains(&progress));
            match last.0 {
                CarStatus::DoorOpening => assert!(progress >= last.1),
                CarStatus::DoorClosing => assert!(progress <= last.1),
                _ => {}
            }
            last = (car.status(), progress);
            ticks += 1;
        }
        assert_eq!(phase, DoorPhase::Closed);
        assert_eq!(car.status(), CarStatus::Normal);
        assert_eq!(car.door_progress(), 0.0);
        // 80 ticks opening, 150 held, 80 closing.
        assert_eq!(ticks, 310);
    }

    #[test]
    fn open_latch_reverses_closing_door() {
        let timing = TimingConfig::default();
        let (mut car, mut cycle) = cycle_car(3);
        while car.status() != CarStatus::DoorClosing {
            car.advance_door(&mut cycle, &timing);
        }
        for _ in 0..20 {
            car.advance_door(&mut cycle, &timing);
        }
        let partly_closed = car.door_progress();
        assert!(partly_closed < 1.0);

        car.open_requested = true;
        car.apply_door_latches(&mut cycle);
        assert_eq!(car.status(), CarStatus::DoorOpening);
        assert!(!car.open_requested());
        car.advance_door(&mut cycle, &timing);
        assert!(car.door_progress() > partly_closed);
    }

    #[test]
    fn open_latch_restarts_hold() {
        let timing = TimingConfig::default();
        let (mut car, mut cycle) = cycle_car(3);
        while car.status() != CarStatus::DoorOpen {
            car.advance_door(&mut cycle, &timing);
        }
        for _ in 0..100 {
            car.advance_door(&mut cycle, &timing);
        }
        car.open_requested = true;
        car.apply_door_latches(&mut cycle);
        assert_eq!(cycle.held_ms, 0);
        // A full hold is needed again before closing.
        for _ in 0..149 {
            car.advance_door(&mut cycle, &timing);
        }
        assert_eq!(car.status(), CarStatus::DoorOpen);
        car.advance_door(&mut cycle, &timing);
        assert_eq!(car.status(), CarStatus::DoorClosing);
    }

    #[test]
    fn close_latch_cuts_opening_short() {
        let timing = TimingConfig::default();
        let (mut car, mut cycle) = cycle_car(3);
        for _ in 0..40 {
            car.advance_door(&mut cycle, &timing);
        }
        car.close_requested = true;
        car.apply_door_latches(&mut cycle);
        assert_eq!(car.status(), CarStatus::DoorClosing);
        let mut ticks = 0;
        while car.advance_door(&mut cycle, &timing) == DoorPhase::Cycling {
            ticks += 1;
        }
        // Closes from half open in half the transition time.
        assert_eq!(ticks, 39);
        assert_eq!(car.status(), CarStatus::Normal);
    }

    #[tokio::test(start_paused = true)]
    async fn single_car_travels_to_cabin_floor() {
        let shared = SharedState::new(Building::new(1, 20));
        shared.press_cabin_floor(CarId(0), 5).unwrap();
        let (probe, task) = spawn_car(&shared, CarId(0));

        tokio::time::sleep(Duration::from_secs(20)).await;
        assert!(!task.is_finished());
        task.abort();

        assert!(probe.lock_was_always_free());
        assert_eq!(
            probe.transitions(),
            vec![
                (CarStatus::MovingUp, 1),
                (CarStatus::MovingUp, 2),
                (CarStatus::MovingUp, 3),
                (CarStatus::MovingUp, 4),
                (CarStatus::DoorOpening, 5),
                (CarStatus::DoorOpen, 5),
                (CarStatus::DoorClosing, 5),
                (CarStatus::Normal, 5),
            ]
        );
        let car = shared.car(CarId(0)).unwrap();
        assert_eq!(car.current_floor, 5);
        assert!(car.up_queue.is_empty() && car.down_queue.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn door_progress_observed_monotonic_while_running() {
        let shared = SharedState::new(Building::new(1, 20));
        shared.press_cabin_floor(CarId(0), 2).unwrap();
        let (probe, task) = spawn_car(&shared, CarId(0));

        tokio::time::sleep(Duration::from_secs(10)).await;
        task.abort();

        assert!(probe.lock_was_always_free());
        let seen = probe.observations();
        assert!(seen.iter().any(|o| o.status == CarStatus::DoorOpen));
        for pair in seen.windows(2) {
            let (before, after) = (pair[0], pair[1]);
            assert!((0.0..=1.0).contains(&after.door));
            if before.status == CarStatus::DoorOpening && after.status == CarStatus::DoorOpening {
                assert!(after.door >= before.door);
            }
            if before.status == CarStatus::DoorClosing && after.status == CarStatus::DoorClosing {
                assert!(after.door <= before.door);
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn fault_mid_step_does_not_advance_the_car() {
        let mut building = Building::new(2, 20);
        building.cars[0].current_floor = 3;
        for floor in [7, 9] {
            building.requests.push(FloorRequest::new(floor, Direction::Up));
            let index = building.requests.len().saturating_sub(1);
            building.assign(index, CarId(0));
        }
        let shared = SharedState::new(building);
        let (_probe, task) = spawn_car(&shared, CarId(0));

        tokio::time::sleep(Duration::from_millis(700)).await;
        assert_eq!(shared.car(CarId(0)).unwrap().status, CarStatus::MovingUp);
        shared.toggle_fault(CarId(0)).unwrap();

        tokio::time::sleep(Duration::from_secs(3)).await;
        task.abort();

        let car = shared.car(CarId(0)).unwrap();
        assert_eq!(car.status, CarStatus::BreakDown);
        assert_eq!(car.current_floor, 3);
        assert!(car.up_queue.is_empty() && car.down_queue.is_empty());
        assert!(!car.open_requested && !car.close_requested);
        assert!(shared
            .requests()
            .iter()
            .all(|r| r.state == RequestState::Unassigned && r.assigned_car.is_none()));
    }

    #[tokio::test(start_paused = true)]
    async fn fault_toggled_twice_within_a_tick_still_abandons_step() {
        let shared = SharedState::new(Building::new(1, 20));
        shared.press_cabin_floor(CarId(0), 8).unwrap();
        let (_probe, task) = spawn_car(&shared, CarId(0));

        tokio::time::sleep(Duration::from_millis(505)).await;
        shared.toggle_fault(CarId(0)).unwrap();
        shared.toggle_fault(CarId(0)).unwrap();

        tokio::time::sleep(Duration::from_secs(5)).await;
        task.abort();

        let car = shared.car(CarId(0)).unwrap();
        assert_eq!(car.status, CarStatus::Normal);
        assert_eq!(car.current_floor, 1);
        assert!(car.up_queue.is_empty() && car.down_queue.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn fault_during_door_cycle_leaves_stop_unserved() {
        let mut building = Building::new(1, 20);
        building.requests.push(FloorRequest::new(1, Direction::Up));
        building.assign(0, CarId(0));
        let shared = SharedState::new(building);
        let (_probe, task) = spawn_car(&shared, CarId(0));

        tokio::time::sleep(Duration::from_millis(1200)).await;
        assert_eq!(shared.car(CarId(0)).unwrap().status, CarStatus::DoorOpen);
        shared.toggle_fault(CarId(0)).unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        task.abort();

        let car = shared.car(CarId(0)).unwrap();
        assert_eq!(car.status, CarStatus::BreakDown);
        assert_eq!(car.door_progress, 0.0);
        assert_eq!(shared.requests()[0].state, RequestState::Unassigned);
    }
}
