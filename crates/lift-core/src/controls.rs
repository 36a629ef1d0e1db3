//! Cabin and hall buttons.
//!
//! Commands validate their arguments and either mutate the building or
//! return a [`CommandRejection`]. A rejection is a notice for whoever
//! pressed the button; it never changes car state and never propagates as
//! a fault.

use lift_types::{CarId, CarStatus, Direction, RequestId};
use tracing::{info, warn};

use crate::building::{Building, Car, FloorRequest, GROUND_FLOOR, SharedState};

/// Why a button press was refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandRejection {
    /// No car has this id.
    #[error("{car} does not exist")]
    UnknownCar {
        /// The id that was pressed.
        car: CarId,
    },

    /// The floor is outside the building.
    #[error("floor {floor} is outside 1..={floors}")]
    FloorOutOfRange {
        /// The requested floor.
        floor: u16,
        /// Top floor of the building.
        floors: u16,
    },

    /// There is no such hall button (down on the ground floor, up on the
    /// top floor).
    #[error("floor {floor} has no {direction} button")]
    InvalidDirection {
        /// The floor the call was made from.
        floor: u16,
        /// The direction that does not exist there.
        direction: Direction,
    },

    /// The car is broken down.
    #[error("{car} is out of service")]
    OutOfService {
        /// The broken car.
        car: CarId,
    },

    /// The cabin was asked to go where it already is.
    #[error("{car} is already at floor {floor}")]
    AlreadyAtFloor {
        /// The car.
        car: CarId,
        /// Its current floor.
        floor: u16,
    },
}

/// Result of a hall button press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FloorCallOutcome {
    /// A new request entered the working set.
    Registered(RequestId),
    /// An identical call was already pending; nothing was added.
    AlreadyPending(RequestId),
}

impl FloorCallOutcome {
    /// The request that will serve this call.
    pub const fn request_id(self) -> RequestId {
        match self {
            Self::Registered(id) | Self::AlreadyPending(id) => id,
        }
    }
}

// ---------------------------------------------------------------------------
// Building commands
// ---------------------------------------------------------------------------

impl Building {
    fn in_service_car(&mut self, car: CarId) -> Result<&mut Car, CommandRejection> {
        let found = self
            .car_mut(car)
            .ok_or(CommandRejection::UnknownCar { car })?;
        if found.is_out_of_service() {
            return Err(CommandRejection::OutOfService { car });
        }
        Ok(found)
    }

    fn check_floor(&self, floor: u16) -> Result<(), CommandRejection> {
        if self.has_floor(floor) {
            Ok(())
        } else {
            Err(CommandRejection::FloorOutOfRange {
                floor,
                floors: self.floors(),
            })
        }
    }

    /// Cabin "go to floor" button: queue the floor on this car directly,
    /// on the side of the car it lies.
    pub fn press_cabin_floor(&mut self, car: CarId, floor: u16) -> Result<(), CommandRejection> {
        self.check_floor(floor)?;
        let cabin = self.in_service_car(car)?;
        let current = cabin.current_floor();
        if floor == current {
            return Err(CommandRejection::AlreadyAtFloor { car, floor });
        }
        let direction = if floor > current {
            Direction::Up
        } else {
            Direction::Down
        };
        cabin.enqueue(floor, direction);
        Ok(())
    }

    /// Cabin open button. Latches only while the doors are open or closing.
    pub fn press_cabin_open(&mut self, car: CarId) -> Result<(), CommandRejection> {
        let cabin = self.in_service_car(car)?;
        if matches!(cabin.status, CarStatus::DoorOpen | CarStatus::DoorClosing) {
            cabin.open_requested = true;
            cabin.close_requested = false;
        }
        Ok(())
    }

    /// Cabin close button. Latches only while the doors are opening or open.
    pub fn press_cabin_close(&mut self, car: CarId) -> Result<(), CommandRejection> {
        let cabin = self.in_service_car(car)?;
        if matches!(cabin.status, CarStatus::DoorOpening | CarStatus::DoorOpen) {
            cabin.close_requested = true;
            cabin.open_requested = false;
        }
        Ok(())
    }

    /// Fault switch. Breaks a working car down (applying the breakdown
    /// actions immediately) or returns a broken car to service. Returns the
    /// car's new status.
    pub fn toggle_fault(&mut self, car: CarId) -> Result<CarStatus, CommandRejection> {
        let cabin = self
            .car_mut(car)
            .ok_or(CommandRejection::UnknownCar { car })?;
        if cabin.is_out_of_service() {
            cabin.fault_epoch = cabin.fault_epoch.wrapping_add(1);
            cabin.status = CarStatus::Normal;
            cabin.door_progress = 0.0;
            return Ok(CarStatus::Normal);
        }
        self.enter_breakdown(car);
        Ok(CarStatus::BreakDown)
    }

    /// Hall button. Records an unassigned request for the dispatcher unless
    /// the same button is already pending.
    pub fn press_floor_call(
        &mut self,
        floor: u16,
        direction: Direction,
    ) -> Result<FloorCallOutcome, CommandRejection> {
        self.check_floor(floor)?;
        let missing_button = match direction {
            Direction::Up => floor == self.floors(),
            Direction::Down => floor == GROUND_FLOOR,
        };
        if missing_button {
            return Err(CommandRejection::InvalidDirection { floor, direction });
        }
        if let Some(existing) = self
            .requests
            .iter()
            .find(|request| request.is_pending_for(floor, direction))
        {
            return Ok(FloorCallOutcome::AlreadyPending(existing.id()));
        }
        let request = FloorRequest::new(floor, direction);
        let id = request.id();
        self.requests.push(request);
        Ok(FloorCallOutcome::Registered(id))
    }
}

// ---------------------------------------------------------------------------
// Locked, logged entry points
// ---------------------------------------------------------------------------

fn log_rejection<T>(result: Result<T, CommandRejection>) -> Result<T, CommandRejection> {
    if let Err(rejection) = &result {
        info!(notice = %rejection, "command rejected");
    }
    result
}

impl SharedState {
    /// See [`Building::press_cabin_floor`].
    pub fn press_cabin_floor(&self, car: CarId, floor: u16) -> Result<(), CommandRejection> {
        let result = self.with(|building| building.press_cabin_floor(car, floor));
        if result.is_ok() {
            info!(car = %car, floor, "cabin floor pressed");
        }
        log_rejection(result)
    }

    /// See [`Building::press_cabin_open`].
    pub fn press_cabin_open(&self, car: CarId) -> Result<(), CommandRejection> {
        let result = self.with(|building| building.press_cabin_open(car));
        if result.is_ok() {
            info!(car = %car, "cabin open pressed");
        }
        log_rejection(result)
    }

    /// See [`Building::press_cabin_close`].
    pub fn press_cabin_close(&self, car: CarId) -> Result<(), CommandRejection> {
        let result = self.with(|building| building.press_cabin_close(car));
        if result.is_ok() {
            info!(car = %car, "cabin close pressed");
        }
        log_rejection(result)
    }

    /// See [`Building::toggle_fault`].
    pub fn toggle_fault(&self, car: CarId) -> Result<CarStatus, CommandRejection> {
        let result = self.with(|building| building.toggle_fault(car));
        match &result {
            Ok(CarStatus::BreakDown) => warn!(car = %car, "car broke down"),
            Ok(status) => info!(car = %car, ?status, "car back in service"),
            Err(_) => {}
        }
        log_rejection(result)
    }

    /// See [`Building::press_floor_call`].
    pub fn press_floor_call(
        &self,
        floor: u16,
        direction: Direction,
    ) -> Result<FloorCallOutcome, CommandRejection> {
        let (result, stranded) = self.with(|building| {
            let result = building.press_floor_call(floor, direction);
            (result, building.all_out_of_service())
        });
        if let Ok(outcome) = &result {
            info!(floor, %direction, request = %outcome.request_id(), "floor call pressed");
            if stranded {
                warn!(floor, %direction, "all cars out of service, call will wait");
            }
        }
        log_rejection(result)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use lift_types::RequestState;

    use super::*;

    #[test]
    fn cabin_floor_goes_to_the_side_it_lies_on() {
        let mut building = Building::new(1, 20);
        building.cars[0].current_floor = 8;
        building.press_cabin_floor(CarId(0), 12).unwrap();
        building.press_cabin_floor(CarId(0), 3).unwrap();
        building.press_cabin_floor(CarId(0), 12).unwrap();
        let car = &building.cars[0];
        assert_eq!(car.stops(Direction::Up), vec![12]);
        assert_eq!(car.stops(Direction::Down), vec![3]);
    }

    #[test]
    fn cabin_floor_rejections() {
        let mut building = Building::new(2, 20);
        assert_eq!(
            building.press_cabin_floor(CarId(0), 1),
            Err(CommandRejection::AlreadyAtFloor {
                car: CarId(0),
                floor: 1
            })
        );
        assert_eq!(
            building.press_cabin_floor(CarId(0), 21),
            Err(CommandRejection::FloorOutOfRange {
                floor: 21,
                floors: 20
            })
        );
        assert_eq!(
            building.press_cabin_floor(CarId(7), 5),
            Err(CommandRejection::UnknownCar { car: CarId(7) })
        );
        building.toggle_fault(CarId(1)).unwrap();
        assert_eq!(
            building.press_cabin_floor(CarId(1), 5),
            Err(CommandRejection::OutOfService { car: CarId(1) })
        );
        assert!(building.cars[1].queue_is_empty(Direction::Up));
    }

    #[test]
    fn open_latch_only_while_open_or_closing() {
        let mut building = Building::new(1, 20);
        building.press_cabin_open(CarId(0)).unwrap();
        assert!(!building.cars[0].open_requested());

        building.cars[0].status = CarStatus::DoorClosing;
        building.cars[0].close_requested = true;
        building.press_cabin_open(CarId(0)).unwrap();
        assert!(building.cars[0].open_requested());
        assert!(!building.cars[0].close_requested());
    }

    #[test]
    fn close_latch_only_while_opening_or_open() {
        let mut building = Building::new(1, 20);
        building.cars[0].status = CarStatus::DoorClosing;
        building.press_cabin_close(CarId(0)).unwrap();
        assert!(!building.cars[0].close_requested());

        building.cars[0].status = CarStatus::DoorOpen;
        building.cars[0].open_requested = true;
        building.press_cabin_close(CarId(0)).unwrap();
        assert!(building.cars[0].close_requested());
        assert!(!building.cars[0].open_requested());
    }

    #[test]
    fn latches_rejected_while_broken() {
        let mut building = Building::new(1, 20);
        building.toggle_fault(CarId(0)).unwrap();
        assert!(building.press_cabin_open(CarId(0)).is_err());
        assert!(building.press_cabin_close(CarId(0)).is_err());
    }

    #[test]
    fn fault_toggles_twice_back_to_normal_with_empty_queues() {
        let mut building = Building::new(1, 20);
        building.press_cabin_floor(CarId(0), 9).unwrap();
        assert_eq!(building.toggle_fault(CarId(0)), Ok(CarStatus::BreakDown));
        assert!(building.cars[0].queue_is_empty(Direction::Up));
        assert_eq!(building.toggle_fault(CarId(0)), Ok(CarStatus::Normal));
        let car = &building.cars[0];
        assert_eq!(car.status(), CarStatus::Normal);
        assert!(car.queue_is_empty(Direction::Up) && car.queue_is_empty(Direction::Down));
        assert_eq!(car.fault_epoch, 2);
    }

    #[test]
    fn floor_call_is_idempotent_while_pending() {
        let mut building = Building::new(1, 20);
        let first = building.press_floor_call(6, Direction::Up).unwrap();
        let second = building.press_floor_call(6, Direction::Up).unwrap();
        assert!(matches!(first, FloorCallOutcome::Registered(_)));
        assert_eq!(second, FloorCallOutcome::AlreadyPending(first.request_id()));
        assert_eq!(building.requests().len(), 1);

        // The other button on the same floor is a separate call.
        building.press_floor_call(6, Direction::Down).unwrap();
        assert_eq!(building.requests().len(), 2);
    }

    #[test]
    fn finished_call_can_be_pressed_again() {
        let mut building = Building::new(1, 20);
        building.press_floor_call(6, Direction::Up).unwrap();
        building.requests[0].state = RequestState::Finished;
        let again = building.press_floor_call(6, Direction::Up).unwrap();
        assert!(matches!(again, FloorCallOutcome::Registered(_)));
        assert_eq!(building.requests().len(), 2);
    }

    #[test]
    fn floor_call_rejects_missing_buttons() {
        let mut building = Building::new(1, 20);
        assert_eq!(
            building.press_floor_call(1, Direction::Down),
            Err(CommandRejection::InvalidDirection {
                floor: 1,
                direction: Direction::Down
            })
        );
        assert!(building.press_floor_call(20, Direction::Up).is_err());
        assert!(building.press_floor_call(0, Direction::Up).is_err());
        assert!(building.press_floor_call(1, Direction::Up).is_ok());
        assert!(building.press_floor_call(20, Direction::Down).is_ok());
    }

    #[test]
    fn floor_call_recorded_when_every_car_is_broken() {
        let shared = SharedState::new(Building::new(1, 20));
        shared.toggle_fault(CarId(0)).unwrap();
        let outcome = shared.press_floor_call(4, Direction::Up).unwrap();
        let requests = shared.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].id, outcome.request_id());
        assert_eq!(requests[0].state, RequestState::Unassigned);
    }

    #[test]
    fn rejection_messages_read_as_notices() {
        let notice = CommandRejection::OutOfService { car: CarId(3) }.to_string();
        assert_eq!(notice, "car-3 is out of service");
        let notice = CommandRejection::InvalidDirection {
            floor: 1,
            direction: Direction::Down,
        }
        .to_string();
        assert_eq!(notice, "floor 1 has no down button");
    }
}
