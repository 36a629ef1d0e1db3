//! Observer API server for the Lift elevator bank.
//!
//! This crate provides an Axum HTTP server that exposes:
//!
//! - **`WebSocket` endpoint** (`/ws/building`) streaming building
//!   snapshots via [`tokio::sync::broadcast`]
//! - **REST endpoints** for querying cars and floor requests
//! - **Command endpoints** for the cabin buttons, hall buttons, the fault
//!   switch, and random demand
//! - **Minimal HTML status page** (`GET /`) with one row per car
//!
//! # Architecture
//!
//! Handlers go straight to the core's [`SharedState`]. Every read is a
//! single consistent snapshot taken under the building lock, and every
//! command is one locked transition, so the observer never holds the lock
//! across an `.await`. `WebSocket` clients receive snapshots published by
//! the engine on a broadcast channel with automatic lag handling.
//!
//! [`SharedState`]: lift_core::SharedState

pub mod commands;
pub mod error;
pub mod handlers;
pub mod router;
pub mod server;
pub mod startup;
pub mod state;
pub mod ws;

// Re-export primary types for convenience.
pub use router::build_router;
pub use server::{ServerConfig, ServerError, start_server};
pub use startup::spawn_observer;
pub use state::AppState;
