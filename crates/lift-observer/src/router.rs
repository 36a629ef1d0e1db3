//! Axum router construction for the Observer API.
//!
//! Assembles all routes (REST + `WebSocket`) into a single [`Router`]
//! with CORS middleware enabled for cross-origin dashboard access.

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::commands;
use crate::handlers;
use crate::state::AppState;
use crate::ws;

/// Build the complete Axum router for the Observer server.
///
/// The router includes:
/// - `GET /` -- minimal HTML status page
/// - `GET /ws/building` -- `WebSocket` snapshot stream
/// - `GET /api/building` -- full snapshot
/// - `GET /api/cars` -- list cars
/// - `GET /api/cars/{id}` -- single car
/// - `GET /api/requests` -- active floor requests
/// - `POST /api/cars/{id}/floor|open|close|fault` -- cabin buttons and fault switch
/// - `POST /api/floors/{floor}/call` -- hall button
/// - `POST /api/demand` -- random presses
///
/// CORS is configured to allow any origin for development. In
/// production this should be restricted.
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Status page
        .route("/", get(handlers::index))
        // WebSocket
        .route("/ws/building", get(ws::ws_building))
        // Queries
        .route("/api/building", get(handlers::get_building))
        .route("/api/cars", get(handlers::list_cars))
        .route("/api/cars/{id}", get(handlers::get_car))
        .route("/api/requests", get(handlers::list_requests))
        // Commands
        .route("/api/cars/{id}/floor", post(commands::press_cabin_floor))
        .route("/api/cars/{id}/open", post(commands::press_cabin_open))
        .route("/api/cars/{id}/close", post(commands::press_cabin_close))
        .route("/api/cars/{id}/fault", post(commands::toggle_fault))
        .route("/api/floors/{floor}/call", post(commands::press_floor_call))
        .route("/api/demand", post(commands::generate_demand))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
