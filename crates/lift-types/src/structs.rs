//! Read-only views of the simulation handed to the presentation layer.
//!
//! The core keeps its live state behind a single lock; these structs are
//! detached copies taken while holding it, so a display can render them
//! at leisure without ever touching the shared store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::enums::{CarStatus, Direction, RequestState};
use crate::ids::{CarId, RequestId};

// ---------------------------------------------------------------------------
// Car
// ---------------------------------------------------------------------------

/// Display state of one car.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct CarView {
    /// The car's index in the bank.
    pub id: CarId,
    /// Current state machine status.
    pub status: CarStatus,
    /// Floor the car is at (or departing from while moving).
    pub current_floor: u16,
    /// Which queue the car is draining.
    pub scan_direction: Direction,
    /// Pending stops for the upward sweep, ascending.
    pub up_queue: Vec<u16>,
    /// Pending stops for the downward sweep, descending.
    pub down_queue: Vec<u16>,
    /// Door opening in `[0, 1]`; 0 is closed, 1 fully open.
    pub door_progress: f64,
    /// Cabin "open" button latched and not yet consumed.
    pub open_requested: bool,
    /// Cabin "close" button latched and not yet consumed.
    pub close_requested: bool,
}

// ---------------------------------------------------------------------------
// Floor request
// ---------------------------------------------------------------------------

/// Display state of one hall call in the active set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct FloorRequestView {
    /// Unique request identifier.
    pub id: RequestId,
    /// Floor the call was made from.
    pub target_floor: u16,
    /// Direction the passenger wants to travel.
    pub requested_direction: Direction,
    /// Lifecycle state.
    pub state: RequestState,
    /// Car holding this request in its queue, while `Waiting`.
    pub assigned_car: Option<CarId>,
    /// When the hall button was pressed.
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Building
// ---------------------------------------------------------------------------

/// Consistent copy of every car and every active request, taken under a
/// single acquisition of the shared lock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct BuildingSnapshot {
    /// Number of floors served (floors are numbered `1..=floors`).
    pub floors: u16,
    /// All cars in id order.
    pub cars: Vec<CarView>,
    /// Active floor requests in creation order.
    pub requests: Vec<FloorRequestView>,
    /// When the snapshot was taken.
    pub captured_at: DateTime<Utc>,
}

impl BuildingSnapshot {
    /// Look up a car by id.
    pub fn car(&self, id: CarId) -> Option<&CarView> {
        self.cars.iter().find(|car| car.id == id)
    }

    /// Count of active requests in the given state.
    pub fn count_in_state(&self, state: RequestState) -> usize {
        self.requests.iter().filter(|r| r.state == state).count()
    }
}
