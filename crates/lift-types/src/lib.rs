//! Shared type definitions for the Lift elevator bank simulation.
//!
//! This crate is the single source of truth for the types that cross the
//! boundary between the simulation core and whatever renders it. Types
//! defined here flow downstream to `TypeScript` via `ts-rs` for a
//! dashboard.
//!
//! # Modules
//!
//! - [`ids`] -- Car indices and UUID-backed request identifiers
//! - [`enums`] -- Car status, request lifecycle, and travel direction
//! - [`structs`] -- Detached snapshots of cars, requests, and the building

pub mod enums;
pub mod ids;
pub mod structs;

// Re-export all public types at crate root for convenience.
pub use enums::{CarStatus, Direction, RequestState};
pub use ids::{CarId, RequestId};
pub use structs::{BuildingSnapshot, CarView, FloorRequestView};
