//! Enumeration types for the Lift simulation.
//!
//! Each state machine gets its own closed enum so that illegal
//! combinations (a request that is "half assigned", a car that is both
//! moving and opening its doors) cannot be represented.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

// ---------------------------------------------------------------------------
// Direction
// ---------------------------------------------------------------------------

/// Vertical travel direction.
///
/// Used both for a car's SCAN sweep and for the direction a passenger
/// asks for when pressing a hall button.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub enum Direction {
    /// Towards higher floor numbers.
    Up,
    /// Towards lower floor numbers.
    Down,
}

impl Direction {
    /// The other direction.
    #[must_use]
    pub const fn opposite(self) -> Self {
        match self {
            Self::Up => Self::Down,
            Self::Down => Self::Up,
        }
    }
}

impl core::fmt::Display for Direction {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Up => f.write_str("up"),
            Self::Down => f.write_str("down"),
        }
    }
}

// ---------------------------------------------------------------------------
// Car status
// ---------------------------------------------------------------------------

/// What a car is doing right now.
///
/// `Normal` is the resting state between steps: the car is stopped with
/// its doors closed and is about to inspect its queues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub enum CarStatus {
    /// Stopped, doors closed, ready for the next step.
    Normal,
    /// Out of service after a fault signal. Does no work until toggled back.
    BreakDown,
    /// Doors moving from closed to open.
    DoorOpening,
    /// Doors fully open and held.
    DoorOpen,
    /// Doors moving from open to closed.
    DoorClosing,
    /// Travelling one floor up.
    MovingUp,
    /// Travelling one floor down.
    MovingDown,
}

impl CarStatus {
    /// Whether the car is somewhere inside a door cycle.
    pub const fn is_door_cycle(self) -> bool {
        matches!(self, Self::DoorOpening | Self::DoorOpen | Self::DoorClosing)
    }

    /// The direction of travel if the car is between floors.
    pub const fn moving_direction(self) -> Option<Direction> {
        match self {
            Self::MovingUp => Some(Direction::Up),
            Self::MovingDown => Some(Direction::Down),
            _ => None,
        }
    }

    /// The moving status for a given direction.
    pub const fn moving(direction: Direction) -> Self {
        match direction {
            Direction::Up => Self::MovingUp,
            Direction::Down => Self::MovingDown,
        }
    }
}

// ---------------------------------------------------------------------------
// Floor request state
// ---------------------------------------------------------------------------

/// Lifecycle of a hall call.
///
/// Legal transitions are `Unassigned -> Waiting -> Finished`, plus
/// `Waiting -> Unassigned` when the serving car breaks down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub enum RequestState {
    /// Waiting for the dispatcher to pick a car.
    Unassigned,
    /// Queued on a car that has not yet stopped at the floor.
    Waiting,
    /// Served. Removed from the active set on the next dispatch cycle.
    Finished,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opposite_direction() {
        assert_eq!(Direction::Up.opposite(), Direction::Down);
        assert_eq!(Direction::Down.opposite(), Direction::Up);
    }

    #[test]
    fn door_cycle_states() {
        assert!(CarStatus::DoorOpening.is_door_cycle());
        assert!(CarStatus::DoorOpen.is_door_cycle());
        assert!(CarStatus::DoorClosing.is_door_cycle());
        assert!(!CarStatus::Normal.is_door_cycle());
        assert!(!CarStatus::BreakDown.is_door_cycle());
        assert!(!CarStatus::MovingUp.is_door_cycle());
    }

    #[test]
    fn moving_direction_roundtrip() {
        for direction in [Direction::Up, Direction::Down] {
            assert_eq!(CarStatus::moving(direction).moving_direction(), Some(direction));
        }
        assert_eq!(CarStatus::Normal.moving_direction(), None);
    }

    #[test]
    fn direction_deserializes_from_variant_name() {
        let parsed: Result<Direction, _> = serde_json::from_str("\"Down\"");
        assert!(matches!(parsed, Ok(Direction::Down)));
    }
}
