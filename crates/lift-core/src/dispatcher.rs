//! SCAN dispatcher: assigns hall calls to cars and retires served calls.
//!
//! Each cycle walks the unassigned requests in creation order, prices every
//! working car, and queues the call on the cheapest one. Served requests are
//! dropped from the working set at the end of the cycle. The loop polls on a
//! short interval and never blocks waiting for new calls.

use std::time::Duration;

use lift_types::{CarId, Direction, RequestState};
use tracing::{debug, info};

use crate::building::{Building, Car, SharedState};
use crate::time::TimeSource;

/// What one dispatch cycle did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Requests queued on a car this cycle.
    pub assigned: usize,
    /// Unassigned requests left over because no car is in service.
    pub starved: usize,
    /// Finished requests removed from the working set.
    pub retired: usize,
}

/// Cost of sending `car` to a call at `target` going `direction`.
///
/// A car with nothing left on its current sweep, or one already sweeping
/// the caller's way with the target still ahead, pays the straight
/// distance. Anything else pays for finishing its sweep first and then
/// coming back from the last stop.
pub fn dispatch_cost(car: &Car, target: u16, direction: Direction) -> u32 {
    let position = car.virtual_position();
    let target = i32::from(target);
    let scan = car.scan_direction();

    let Some(last_stop) = car.last_stop(scan) else {
        return position.abs_diff(target);
    };

    let ahead = match direction {
        Direction::Up => target >= position,
        Direction::Down => target <= position,
    };
    if scan == direction && ahead {
        return position.abs_diff(target);
    }

    let last_stop = i32::from(last_stop);
    position
        .abs_diff(last_stop)
        .saturating_add(target.abs_diff(last_stop))
}

/// The cheapest in-service car for a call, lowest id on ties.
pub fn choose_car(cars: &[Car], target: u16, direction: Direction) -> Option<CarId> {
    cars.iter()
        .filter(|car| !car.is_out_of_service())
        .min_by_key(|car| dispatch_cost(car, target, direction))
        .map(Car::id)
}

/// One assignment and cleanup pass over the building.
pub fn dispatch_cycle(building: &mut Building) -> DispatchReport {
    let mut report = DispatchReport::default();

    for index in 0..building.requests.len() {
        let Some(request) = building.requests.get(index) else {
            continue;
        };
        if request.state() != RequestState::Unassigned {
            continue;
        }
        let target = request.target_floor();
        let direction = request.requested_direction();
        let request_id = request.id();

        match choose_car(building.cars(), target, direction) {
            Some(car) => {
                if building.assign(index, car) {
                    debug!(request = %request_id, %car, target, %direction, "request assigned");
                    report.assigned = report.assigned.saturating_add(1);
                }
            }
            None => report.starved = report.starved.saturating_add(1),
        }
    }

    report.retired = building.retire_finished();
    report
}

/// Run [`dispatch_cycle`] forever, once per `interval`.
pub async fn run_dispatcher<T: TimeSource>(shared: SharedState, time: T, interval: Duration) {
    info!(interval_ms = interval.as_millis(), "dispatcher started");
    let mut starving = false;
    loop {
        let report = shared.with(dispatch_cycle);
        if report.assigned > 0 || report.retired > 0 {
            debug!(
                assigned = report.assigned,
                retired = report.retired,
                "dispatch cycle"
            );
        }
        let now_starving = report.starved > 0;
        if now_starving && !starving {
            info!(pending = report.starved, "no car in service, requests waiting");
        }
        starving = now_starving;
        time.sleep(interval).await;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use std::future::Future;
    use std::sync::{Arc, Mutex};

    use lift_types::CarStatus;

    use super::*;
    use crate::building::FloorRequest;
    use crate::time::TokioTime;

    fn car_at(id: u16, floor: u16) -> Car {
        let mut car = Car::new(CarId(id));
        car.current_floor = floor;
        car
    }

    #[test]
    fn idle_car_pays_straight_distance() {
        let car = car_at(0, 20);
        assert_eq!(dispatch_cost(&car, 15, Direction::Up), 5);
        assert_eq!(dispatch_cost(&car, 15, Direction::Down), 5);
    }

    #[test]
    fn same_direction_ahead_pays_straight_distance() {
        let mut car = car_at(0, 1);
        car.status = CarStatus::MovingUp;
        car.enqueue(10, Direction::Up);
        // Virtual position is 2.
        assert_eq!(dispatch_cost(&car, 15, Direction::Up), 13);
        assert_eq!(dispatch_cost(&car, 2, Direction::Up), 0);
    }

    #[test]
    fn opposite_or_behind_pays_round_trip_via_last_stop() {
        let mut car = car_at(0, 5);
        car.enqueue(10, Direction::Up);
        car.enqueue(12, Direction::Up);
        // Down call at 8: 5 -> 12 -> 8.
        assert_eq!(dispatch_cost(&car, 8, Direction::Down), 7 + 4);
        // Up call at 3 is behind: 5 -> 12 -> 3.
        assert_eq!(dispatch_cost(&car, 3, Direction::Up), 7 + 9);
    }

    #[test]
    fn inactive_queue_does_not_count_as_work() {
        let mut car = car_at(0, 10);
        car.enqueue(4, Direction::Down);
        // Scanning up with an empty up queue.
        assert_eq!(dispatch_cost(&car, 14, Direction::Down), 4);
    }

    #[test]
    fn idle_car_beats_busy_car_for_far_call() {
        let mut building = Building::new(2, 20);
        building.cars[0].status = CarStatus::MovingUp;
        building.cars[0].enqueue(10, Direction::Up);
        building.cars[1].current_floor = 20;
        building.requests.push(FloorRequest::new(15, Direction::Up));

        let report = dispatch_cycle(&mut building);
        assert_eq!(report.assigned, 1);
        let request = &building.requests()[0];
        assert_eq!(request.state(), RequestState::Waiting);
        assert_eq!(request.assigned_car(), Some(CarId(1)));
        assert_eq!(building.cars[1].stops(Direction::Down), vec![15]);
        assert_eq!(building.cars[0].stops(Direction::Up), vec![10]);
    }

    #[test]
    fn ties_go_to_lowest_id() {
        let cars = vec![car_at(0, 5), car_at(1, 5), car_at(2, 5)];
        assert_eq!(choose_car(&cars, 9, Direction::Up), Some(CarId(0)));
    }

    #[test]
    fn broken_cars_are_skipped() {
        let mut cars = vec![car_at(0, 9), car_at(1, 1)];
        cars[0].status = CarStatus::BreakDown;
        assert_eq!(choose_car(&cars, 9, Direction::Up), Some(CarId(1)));
        cars[1].status = CarStatus::BreakDown;
        assert_eq!(choose_car(&cars, 9, Direction::Up), None);
    }

    #[test]
    fn starved_requests_stay_unassigned() {
        let mut building = Building::new(1, 20);
        building.enter_breakdown(CarId(0));
        building.requests.push(FloorRequest::new(5, Direction::Up));
        let report = dispatch_cycle(&mut building);
        assert_eq!(report.starved, 1);
        assert_eq!(report.assigned, 0);
        assert_eq!(building.requests()[0].state(), RequestState::Unassigned);
    }

    #[test]
    fn call_at_cars_floor_follows_requested_direction() {
        let mut building = Building::new(1, 20);
        building.cars[0].current_floor = 7;
        building.requests.push(FloorRequest::new(7, Direction::Down));
        dispatch_cycle(&mut building);
        assert_eq!(building.cars[0].stops(Direction::Down), vec![7]);
    }

    #[test]
    fn already_queued_floor_is_not_inserted_twice() {
        let mut building = Building::new(1, 20);
        building.cars[0].enqueue(9, Direction::Up);
        building.requests.push(FloorRequest::new(9, Direction::Down));
        dispatch_cycle(&mut building);
        assert_eq!(building.cars[0].stops(Direction::Up), vec![9]);
        assert!(building.cars[0].queue_is_empty(Direction::Down));
        assert_eq!(building.requests()[0].assigned_car(), Some(CarId(0)));
    }

    #[test]
    fn finished_requests_are_retired_in_one_cycle() {
        let mut building = Building::new(1, 20);
        building.requests.push(FloorRequest::new(5, Direction::Up));
        dispatch_cycle(&mut building);
        building.complete_stop(CarId(0), 5);
        let report = dispatch_cycle(&mut building);
        assert_eq!(report.retired, 1);
        assert!(building.requests().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn dispatcher_loop_assigns_pending_calls() {
        let shared = SharedState::new(Building::new(2, 20));
        shared.press_floor_call(12, Direction::Down).unwrap();

        let task = tokio::spawn(run_dispatcher(
            shared.clone(),
            TokioTime,
            Duration::from_millis(10),
        ));
        tokio::time::sleep(Duration::from_millis(25)).await;
        task.abort();

        let requests = shared.requests();
        assert_eq!(requests[0].state, RequestState::Waiting);
        assert_eq!(requests[0].assigned_car, Some(CarId(0)));
    }

    /// Tokio time that records, at every sleep, whether the building lock
    /// was free.
    #[derive(Clone)]
    struct LockCheck {
        shared: SharedState,
        free: Arc<Mutex<Vec<bool>>>,
    }

    impl TimeSource for LockCheck {
        fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send {
            let free = self.shared.try_with(|_| ()).is_some();
            self.free.lock().unwrap().push(free);
            tokio::time::sleep(duration)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn dispatcher_loop_never_sleeps_holding_the_lock() {
        let shared = SharedState::new(Building::new(3, 20));
        shared.press_floor_call(4, Direction::Up).unwrap();
        shared.press_floor_call(17, Direction::Down).unwrap();
        let time = LockCheck {
            shared: shared.clone(),
            free: Arc::new(Mutex::new(Vec::new())),
        };

        let task = tokio::spawn(run_dispatcher(
            shared.clone(),
            time.clone(),
            Duration::from_millis(10),
        ));
        tokio::time::sleep(Duration::from_millis(35)).await;
        shared.press_floor_call(9, Direction::Up).unwrap();
        tokio::time::sleep(Duration::from_millis(35)).await;
        task.abort();

        let free = time.free.lock().unwrap().clone();
        assert!(free.len() >= 5);
        assert!(free.iter().all(|was_free| *was_free));
        assert!(
            shared
                .requests()
                .iter()
                .all(|r| r.state == RequestState::Waiting)
        );
    }
}
