//! The building: every car, every active floor request, and the single
//! lock that guards them.
//!
//! [`Building`] is plain data plus the transitions that must happen
//! atomically (breakdown entry, stop completion, dispatch assignment).
//! [`SharedState`] wraps it in an `Arc<Mutex<_>>` and only hands out
//! closure-scoped access, so a guard can never be carried across an
//! `.await`.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, PoisonError, TryLockError};

use chrono::{DateTime, Utc};
use lift_types::{
    BuildingSnapshot, CarId, CarStatus, CarView, Direction, FloorRequestView, RequestId,
    RequestState,
};
use tracing::{debug, warn};

use crate::config::BuildingConfig;

/// The floor every car starts at.
pub const GROUND_FLOOR: u16 = 1;

// ---------------------------------------------------------------------------
// Car
// ---------------------------------------------------------------------------

/// Live state of one car.
///
/// Both queues are ordered sets: the up queue is drained from its lowest
/// floor, the down queue from its highest. A floor appears in at most one
/// of the two.
#[derive(Debug, Clone)]
pub struct Car {
    pub(crate) id: CarId,
    pub(crate) status: CarStatus,
    pub(crate) current_floor: u16,
    pub(crate) scan_direction: Direction,
    pub(crate) up_queue: BTreeSet<u16>,
    pub(crate) down_queue: BTreeSet<u16>,
    pub(crate) door_progress: f64,
    pub(crate) open_requested: bool,
    pub(crate) close_requested: bool,
    /// Bumped on every fault toggle so a car loop can tell that its
    /// in-flight step was interrupted even if the fault is already cleared.
    pub(crate) fault_epoch: u64,
}

impl Car {
    /// A car parked on the ground floor with empty queues, sweeping up.
    pub const fn new(id: CarId) -> Self {
        Self {
            id,
            status: CarStatus::Normal,
            current_floor: GROUND_FLOOR,
            scan_direction: Direction::Up,
            up_queue: BTreeSet::new(),
            down_queue: BTreeSet::new(),
            door_progress: 0.0,
            open_requested: false,
            close_requested: false,
            fault_epoch: 0,
        }
    }

    /// The car's index in the bank.
    pub const fn id(&self) -> CarId {
        self.id
    }

    /// Current status.
    pub const fn status(&self) -> CarStatus {
        self.status
    }

    /// Floor the car is at, or departing from while moving.
    pub const fn current_floor(&self) -> u16 {
        self.current_floor
    }

    /// Which queue is being drained.
    pub const fn scan_direction(&self) -> Direction {
        self.scan_direction
    }

    /// Door opening in `[0, 1]`.
    pub const fn door_progress(&self) -> f64 {
        self.door_progress
    }

    /// Whether the cabin open button is latched.
    pub const fn open_requested(&self) -> bool {
        self.open_requested
    }

    /// Whether the cabin close button is latched.
    pub const fn close_requested(&self) -> bool {
        self.close_requested
    }

    /// Whether the car is broken down.
    pub fn is_out_of_service(&self) -> bool {
        self.status == CarStatus::BreakDown
    }

    /// Stops queued for `direction`, in the order they will be served.
    pub fn stops(&self, direction: Direction) -> Vec<u16> {
        match direction {
            Direction::Up => self.up_queue.iter().copied().collect(),
            Direction::Down => self.down_queue.iter().rev().copied().collect(),
        }
    }

    /// The next stop the `direction` queue will serve.
    pub fn next_stop(&self, direction: Direction) -> Option<u16> {
        match direction {
            Direction::Up => self.up_queue.first().copied(),
            Direction::Down => self.down_queue.last().copied(),
        }
    }

    /// The final stop of the `direction` sweep.
    pub fn last_stop(&self, direction: Direction) -> Option<u16> {
        match direction {
            Direction::Up => self.up_queue.last().copied(),
            Direction::Down => self.down_queue.first().copied(),
        }
    }

    /// Whether the queue for `direction` is empty.
    pub fn queue_is_empty(&self, direction: Direction) -> bool {
        match direction {
            Direction::Up => self.up_queue.is_empty(),
            Direction::Down => self.down_queue.is_empty(),
        }
    }

    /// Whether `floor` is queued in either direction.
    pub fn is_queued(&self, floor: u16) -> bool {
        self.up_queue.contains(&floor) || self.down_queue.contains(&floor)
    }

    /// Where the car will effectively be by the time it can act on a new
    /// assignment: one floor ahead while moving, otherwise where it stands.
    pub fn virtual_position(&self) -> i32 {
        let floor = i32::from(self.current_floor);
        match self.status.moving_direction() {
            Some(Direction::Up) => floor.saturating_add(1),
            Some(Direction::Down) => floor.saturating_sub(1),
            None => floor,
        }
    }

    /// Queue `floor` for the `direction` sweep. Returns `false` if it was
    /// already queued in either direction.
    pub(crate) fn enqueue(&mut self, floor: u16, direction: Direction) -> bool {
        if self.is_queued(floor) {
            return false;
        }
        match direction {
            Direction::Up => self.up_queue.insert(floor),
            Direction::Down => self.down_queue.insert(floor),
        }
    }

    /// Detached view for display.
    pub fn view(&self) -> CarView {
        CarView {
            id: self.id,
            status: self.status,
            current_floor: self.current_floor,
            scan_direction: self.scan_direction,
            up_queue: self.stops(Direction::Up),
            down_queue: self.stops(Direction::Down),
            door_progress: self.door_progress,
            open_requested: self.open_requested,
            close_requested: self.close_requested,
        }
    }
}

// ---------------------------------------------------------------------------
// Floor request
// ---------------------------------------------------------------------------

/// One outstanding hall call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FloorRequest {
    pub(crate) id: RequestId,
    pub(crate) target_floor: u16,
    pub(crate) requested_direction: Direction,
    pub(crate) state: RequestState,
    pub(crate) assigned_car: Option<CarId>,
    pub(crate) created_at: DateTime<Utc>,
}

impl FloorRequest {
    /// A fresh, unassigned call.
    pub fn new(target_floor: u16, requested_direction: Direction) -> Self {
        Self {
            id: RequestId::new(),
            target_floor,
            requested_direction,
            state: RequestState::Unassigned,
            assigned_car: None,
            created_at: Utc::now(),
        }
    }

    /// Unique identifier.
    pub const fn id(&self) -> RequestId {
        self.id
    }

    /// Floor the call was made from.
    pub const fn target_floor(&self) -> u16 {
        self.target_floor
    }

    /// Direction the passenger asked for.
    pub const fn requested_direction(&self) -> Direction {
        self.requested_direction
    }

    /// Lifecycle state.
    pub const fn state(&self) -> RequestState {
        self.state
    }

    /// Car holding the request, while `Waiting`.
    pub const fn assigned_car(&self) -> Option<CarId> {
        self.assigned_car
    }

    /// Whether this is a not-yet-served call for the same button.
    pub fn is_pending_for(&self, floor: u16, direction: Direction) -> bool {
        self.state != RequestState::Finished
            && self.target_floor == floor
            && self.requested_direction == direction
    }

    /// Detached view for display.
    pub const fn view(&self) -> FloorRequestView {
        FloorRequestView {
            id: self.id,
            target_floor: self.target_floor,
            requested_direction: self.requested_direction,
            state: self.state,
            assigned_car: self.assigned_car,
            created_at: self.created_at,
        }
    }
}

// ---------------------------------------------------------------------------
// Building
// ---------------------------------------------------------------------------

/// Every car and the working set of floor requests.
#[derive(Debug, Clone)]
pub struct Building {
    pub(crate) floors: u16,
    pub(crate) cars: Vec<Car>,
    pub(crate) requests: Vec<FloorRequest>,
}

impl Building {
    /// A bank of `cars` cars serving floors `1..=floors`.
    pub fn new(cars: u16, floors: u16) -> Self {
        Self {
            floors,
            cars: (0..cars).map(|id| Car::new(CarId(id))).collect(),
            requests: Vec::new(),
        }
    }

    /// Build from the `building` section of the configuration.
    pub fn from_config(config: &BuildingConfig) -> Self {
        Self::new(config.cars, config.floors)
    }

    /// Number of floors served.
    pub const fn floors(&self) -> u16 {
        self.floors
    }

    /// All cars in id order.
    pub fn cars(&self) -> &[Car] {
        &self.cars
    }

    /// Look up a car.
    pub fn car(&self, id: CarId) -> Option<&Car> {
        self.cars.get(id.index())
    }

    pub(crate) fn car_mut(&mut self, id: CarId) -> Option<&mut Car> {
        self.cars.get_mut(id.index())
    }

    /// The active floor requests in creation order.
    pub fn requests(&self) -> &[FloorRequest] {
        &self.requests
    }

    /// Whether `floor` lies within `1..=floors`.
    pub const fn has_floor(&self, floor: u16) -> bool {
        floor >= GROUND_FLOOR && floor <= self.floors
    }

    /// Whether no car can currently take work.
    pub fn all_out_of_service(&self) -> bool {
        self.cars.iter().all(Car::is_out_of_service)
    }

    /// Consistent detached copy of everything.
    pub fn snapshot(&self) -> BuildingSnapshot {
        BuildingSnapshot {
            floors: self.floors,
            cars: self.cars.iter().map(Car::view).collect(),
            requests: self.requests.iter().map(FloorRequest::view).collect(),
            captured_at: Utc::now(),
        }
    }

    /// Put a car out of service: record the fault and apply the breakdown
    /// actions. Returns how many requests were handed back to dispatch.
    pub(crate) fn enter_breakdown(&mut self, id: CarId) -> usize {
        if let Some(car) = self.car_mut(id) {
            car.fault_epoch = car.fault_epoch.wrapping_add(1);
        }
        self.hold_breakdown(id)
    }

    /// Breakdown actions. Idempotent: repeated calls on a broken car change
    /// nothing.
    pub(crate) fn hold_breakdown(&mut self, id: CarId) -> usize {
        let Some(car) = self.car_mut(id) else {
            return 0;
        };
        car.status = CarStatus::BreakDown;
        car.door_progress = 0.0;
        car.open_requested = false;
        car.close_requested = false;
        car.up_queue.clear();
        car.down_queue.clear();

        let mut orphaned = 0_usize;
        for request in &mut self.requests {
            if request.state == RequestState::Waiting && request.assigned_car == Some(id) {
                request.state = RequestState::Unassigned;
                request.assigned_car = None;
                orphaned = orphaned.saturating_add(1);
            }
        }
        if orphaned > 0 {
            debug!(car = %id, orphaned, "returned requests to dispatch");
        }
        orphaned
    }

    /// Queue `request_index` on car `id` and mark it `Waiting`.
    ///
    /// The queue is chosen by where the target lies relative to the car:
    /// above goes up, below goes down, and the car's own floor follows the
    /// passenger's requested direction.
    pub(crate) fn assign(&mut self, request_index: usize, id: CarId) -> bool {
        let Some(request) = self.requests.get_mut(request_index) else {
            return false;
        };
        let Some(car) = self.cars.get_mut(id.index()) else {
            return false;
        };
        let target = request.target_floor;
        let queue = match target.cmp(&car.current_floor) {
            std::cmp::Ordering::Greater => Direction::Up,
            std::cmp::Ordering::Less => Direction::Down,
            std::cmp::Ordering::Equal => request.requested_direction,
        };
        car.enqueue(target, queue);
        request.state = RequestState::Waiting;
        request.assigned_car = Some(id);
        true
    }

    /// The door cycle at `floor` finished: drop the stop from this car and
    /// finish every waiting request for that floor, whichever car it was
    /// assigned to. Other cars' queues are left alone. Returns how many
    /// finished.
    pub(crate) fn complete_stop(&mut self, id: CarId, floor: u16) -> usize {
        let Some(car) = self.car_mut(id) else {
            return 0;
        };
        car.up_queue.remove(&floor);
        car.down_queue.remove(&floor);

        let mut finished = 0_usize;
        for request in &mut self.requests {
            if request.state == RequestState::Waiting && request.target_floor == floor {
                request.state = RequestState::Finished;
                finished = finished.saturating_add(1);
            }
        }
        finished
    }

    /// Drop finished requests from the working set. Returns how many.
    pub(crate) fn retire_finished(&mut self) -> usize {
        let before = self.requests.len();
        self.requests
            .retain(|request| request.state != RequestState::Finished);
        before.saturating_sub(self.requests.len())
    }
}

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

/// The building behind one exclusive lock, shared by every task.
///
/// Access is closure-scoped. The closures are synchronous, so the lock is
/// always released before the caller can reach a suspension point.
#[derive(Debug, Clone)]
pub struct SharedState {
    inner: Arc<Mutex<Building>>,
}

impl SharedState {
    /// Wrap a building for sharing.
    pub fn new(building: Building) -> Self {
        Self {
            inner: Arc::new(Mutex::new(building)),
        }
    }

    /// Run `f` with exclusive access, blocking until the lock is free.
    ///
    /// A lock poisoned by a panicking task is recovered: every transition
    /// leaves the building consistent before it can panic.
    pub fn with<R>(&self, f: impl FnOnce(&mut Building) -> R) -> R {
        let mut guard = self.inner.lock().unwrap_or_else(|poisoned| {
            warn!("building lock was poisoned, recovering");
            PoisonError::into_inner(poisoned)
        });
        f(&mut guard)
    }

    /// Run `f` only if the lock is free right now.
    pub fn try_with<R>(&self, f: impl FnOnce(&mut Building) -> R) -> Option<R> {
        match self.inner.try_lock() {
            Ok(mut guard) => Some(f(&mut guard)),
            Err(TryLockError::Poisoned(poisoned)) => {
                warn!("building lock was poisoned, recovering");
                let mut guard = poisoned.into_inner();
                Some(f(&mut guard))
            }
            Err(TryLockError::WouldBlock) => None,
        }
    }

    /// Consistent snapshot of every car and request.
    pub fn snapshot(&self) -> BuildingSnapshot {
        self.with(|building| building.snapshot())
    }

    /// Display state of one car.
    pub fn car(&self, id: CarId) -> Option<CarView> {
        self.with(|building| building.car(id).map(Car::view))
    }

    /// The active floor requests.
    pub fn requests(&self) -> Vec<FloorRequestView> {
        self.with(|building| building.requests.iter().map(FloorRequest::view).collect())
    }

    /// Number of floors served.
    pub fn floors(&self) -> u16 {
        self.with(|building| building.floors)
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::indexing_slicing,
    clippy::arithmetic_side_effects,
    clippy::panic
)]
mod tests {
    use super::*;

    fn waiting_on(building: &mut Building, floor: u16, direction: Direction, car: CarId) {
        building.requests.push(FloorRequest::new(floor, direction));
        let index = building.requests.len() - 1;
        assert!(building.assign(index, car));
    }

    #[test]
    fn new_building_parks_cars_on_ground_floor() {
        let building = Building::new(5, 20);
        assert_eq!(building.cars().len(), 5);
        assert_eq!(building.floors(), 20);
        for (index, car) in building.cars().iter().enumerate() {
            assert_eq!(car.id().index(), index);
            assert_eq!(car.current_floor(), GROUND_FLOOR);
            assert_eq!(car.status(), CarStatus::Normal);
            assert_eq!(car.scan_direction(), Direction::Up);
        }
    }

    #[test]
    fn queues_serve_in_sweep_order() {
        let mut car = Car::new(CarId(0));
        car.current_floor = 10;
        for floor in [14, 12, 18] {
            car.enqueue(floor, Direction::Up);
        }
        for floor in [3, 8, 5] {
            car.enqueue(floor, Direction::Down);
        }
        assert_eq!(car.stops(Direction::Up), vec![12, 14, 18]);
        assert_eq!(car.stops(Direction::Down), vec![8, 5, 3]);
        assert_eq!(car.next_stop(Direction::Up), Some(12));
        assert_eq!(car.next_stop(Direction::Down), Some(8));
        assert_eq!(car.last_stop(Direction::Up), Some(18));
        assert_eq!(car.last_stop(Direction::Down), Some(3));
    }

    #[test]
    fn enqueue_never_duplicates_across_queues() {
        let mut car = Car::new(CarId(0));
        assert!(car.enqueue(7, Direction::Up));
        assert!(!car.enqueue(7, Direction::Up));
        assert!(!car.enqueue(7, Direction::Down));
        assert_eq!(car.stops(Direction::Up), vec![7]);
        assert!(car.stops(Direction::Down).is_empty());
    }

    #[test]
    fn virtual_position_leads_moving_cars() {
        let mut car = Car::new(CarId(0));
        car.current_floor = 5;
        assert_eq!(car.virtual_position(), 5);
        car.status = CarStatus::MovingUp;
        assert_eq!(car.virtual_position(), 6);
        car.status = CarStatus::MovingDown;
        assert_eq!(car.virtual_position(), 4);
        car.status = CarStatus::DoorOpen;
        assert_eq!(car.virtual_position(), 5);
    }

    #[test]
    fn assign_picks_queue_by_relative_position() {
        let mut building = Building::new(1, 20);
        building.cars[0].current_floor = 10;

        waiting_on(&mut building, 15, Direction::Down, CarId(0));
        waiting_on(&mut building, 4, Direction::Up, CarId(0));
        waiting_on(&mut building, 10, Direction::Down, CarId(0));

        let car = &building.cars[0];
        assert_eq!(car.stops(Direction::Up), vec![15]);
        assert_eq!(car.stops(Direction::Down), vec![10, 4]);
        assert!(building
            .requests()
            .iter()
            .all(|r| r.state() == RequestState::Waiting && r.assigned_car() == Some(CarId(0))));
    }

    #[test]
    fn breakdown_clears_car_and_orphans_its_requests() {
        let mut building = Building::new(2, 20);
        building.cars[0].current_floor = 3;
        building.cars[0].status = CarStatus::MovingUp;
        building.cars[0].open_requested = true;
        waiting_on(&mut building, 7, Direction::Up, CarId(0));
        waiting_on(&mut building, 9, Direction::Down, CarId(0));
        waiting_on(&mut building, 12, Direction::Up, CarId(1));

        let orphaned = building.enter_breakdown(CarId(0));
        assert_eq!(orphaned, 2);

        let car = &building.cars[0];
        assert_eq!(car.status(), CarStatus::BreakDown);
        assert_eq!(car.current_floor(), 3);
        assert!(car.queue_is_empty(Direction::Up) && car.queue_is_empty(Direction::Down));
        assert!(!car.open_requested() && !car.close_requested());
        assert!(car.door_progress().abs() < f64::EPSILON);
        assert_eq!(car.fault_epoch, 1);

        let states: Vec<_> = building.requests().iter().map(FloorRequest::state).collect();
        assert_eq!(
            states,
            vec![RequestState::Unassigned, RequestState::Unassigned, RequestState::Waiting]
        );
        assert_eq!(building.requests()[0].assigned_car(), None);
        assert_eq!(building.cars[1].stops(Direction::Up), vec![12]);
    }

    #[test]
    fn hold_breakdown_is_idempotent() {
        let mut building = Building::new(1, 20);
        waiting_on(&mut building, 6, Direction::Up, CarId(0));
        assert_eq!(building.enter_breakdown(CarId(0)), 1);
        assert_eq!(building.hold_breakdown(CarId(0)), 0);
        assert_eq!(building.cars[0].fault_epoch, 1);
        assert_eq!(building.requests()[0].state(), RequestState::Unassigned);
    }

    #[test]
    fn complete_stop_finishes_waiting_requests_for_the_floor() {
        let mut building = Building::new(2, 20);
        waiting_on(&mut building, 5, Direction::Up, CarId(0));
        waiting_on(&mut building, 5, Direction::Down, CarId(0));
        waiting_on(&mut building, 7, Direction::Up, CarId(0));
        building.requests.push(FloorRequest::new(5, Direction::Up));

        let finished = building.complete_stop(CarId(0), 5);
        assert_eq!(finished, 2);
        assert!(!building.cars[0].is_queued(5));
        assert!(building.cars[0].is_queued(7));

        let states: Vec<_> = building.requests().iter().map(FloorRequest::state).collect();
        assert_eq!(
            states,
            vec![
                RequestState::Finished,
                RequestState::Finished,
                RequestState::Waiting,
                RequestState::Unassigned,
            ]
        );

        assert_eq!(building.retire_finished(), 2);
        assert_eq!(building.requests().len(), 2);
    }

    #[test]
    fn stop_by_one_car_finishes_call_waiting_on_another() {
        let mut building = Building::new(2, 20);
        waiting_on(&mut building, 10, Direction::Up, CarId(1));

        assert_eq!(building.complete_stop(CarId(0), 10), 1);
        assert_eq!(building.requests()[0].state(), RequestState::Finished);
        // The other car keeps its stop; its cabin may still want floor 10.
        assert!(building.cars[1].is_queued(10));

        assert_eq!(building.retire_finished(), 1);
        assert!(building.requests().is_empty());
    }

    #[test]
    fn snapshot_copies_cars_and_requests() {
        let mut building = Building::new(3, 12);
        waiting_on(&mut building, 8, Direction::Down, CarId(2));
        let snapshot = building.snapshot();
        assert_eq!(snapshot.floors, 12);
        assert_eq!(snapshot.cars.len(), 3);
        assert_eq!(snapshot.car(CarId(2)).unwrap().up_queue, vec![8]);
        assert_eq!(snapshot.requests.len(), 1);
        assert_eq!(snapshot.requests[0].assigned_car, Some(CarId(2)));
    }

    #[test]
    fn has_floor_bounds() {
        let building = Building::new(1, 20);
        assert!(!building.has_floor(0));
        assert!(building.has_floor(1));
        assert!(building.has_floor(20));
        assert!(!building.has_floor(21));
    }

    #[test]
    fn try_with_reports_contention() {
        let shared = SharedState::new(Building::new(1, 5));
        let nested = shared.with(|_| shared.try_with(|_| ()));
        assert!(nested.is_none());
        assert_eq!(shared.try_with(|building| building.floors()), Some(5));
    }

    #[test]
    fn poisoned_lock_is_recovered() {
        let shared = SharedState::new(Building::new(1, 5));
        let clone = shared.clone();
        let result = std::thread::spawn(move || {
            clone.with(|_| panic!("boom"));
        })
        .join();
        assert!(result.is_err());
        assert_eq!(shared.floors(), 5);
        assert!(shared.try_with(|_| ()).is_some());
    }
}
