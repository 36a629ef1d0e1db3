//! Button and switch handlers.
//!
//! Each endpoint is one locked command on the building. Rejections come
//! back as [`ObserverError::Rejected`] and carry the notice text.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/api/cars/{id}/floor` | Cabin floor button |
//! | `POST` | `/api/cars/{id}/open` | Cabin open button |
//! | `POST` | `/api/cars/{id}/close` | Cabin close button |
//! | `POST` | `/api/cars/{id}/fault` | Toggle the fault switch |
//! | `POST` | `/api/floors/{floor}/call` | Hall button |
//! | `POST` | `/api/demand` | Random presses |

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use lift_core::FloorCallOutcome;
use lift_types::Direction;
use tracing::info;

use crate::error::ObserverError;
use crate::handlers::parse_car_id;
use crate::state::AppState;

/// Upper bound on presses per `POST /api/demand`.
const MAX_DEMAND_BURST: u32 = 1000;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

/// Request body for `POST /api/cars/{id}/floor`.
#[derive(Debug, serde::Deserialize)]
pub struct CabinFloorRequest {
    /// Destination floor.
    pub floor: u16,
}

/// Request body for `POST /api/floors/{floor}/call`.
#[derive(Debug, serde::Deserialize)]
pub struct FloorCallRequest {
    /// `Up` or `Down`.
    pub direction: Direction,
}

/// Request body for `POST /api/demand`.
#[derive(Debug, serde::Deserialize)]
pub struct DemandRequest {
    /// Number of random presses (default 10, at most 1000).
    #[serde(default = "default_demand_count")]
    pub count: u32,
}

const fn default_demand_count() -> u32 {
    10
}

/// Generic success response.
#[derive(Debug, serde::Serialize)]
struct CommandResponse {
    /// Whether the press was accepted.
    ok: bool,
    /// Human-readable message.
    message: String,
}

impl CommandResponse {
    fn accepted(message: String) -> Json<Self> {
        Json(Self { ok: true, message })
    }
}

// ---------------------------------------------------------------------------
// Cabin buttons
// ---------------------------------------------------------------------------

/// Press a floor button inside a car.
pub async fn press_cabin_floor(
    State(state): State<Arc<AppState>>,
    Path(id_str): Path<String>,
    Json(body): Json<CabinFloorRequest>,
) -> Result<impl IntoResponse, ObserverError> {
    let car = parse_car_id(&id_str)?;
    state.building.press_cabin_floor(car, body.floor)?;
    Ok(CommandResponse::accepted(format!(
        "{car} will stop at floor {}",
        body.floor
    )))
}

/// Press the door open button inside a car.
pub async fn press_cabin_open(
    State(state): State<Arc<AppState>>,
    Path(id_str): Path<String>,
) -> Result<impl IntoResponse, ObserverError> {
    let car = parse_car_id(&id_str)?;
    state.building.press_cabin_open(car)?;
    Ok(CommandResponse::accepted(format!("{car} open pressed")))
}

/// Press the door close button inside a car.
pub async fn press_cabin_close(
    State(state): State<Arc<AppState>>,
    Path(id_str): Path<String>,
) -> Result<impl IntoResponse, ObserverError> {
    let car = parse_car_id(&id_str)?;
    state.building.press_cabin_close(car)?;
    Ok(CommandResponse::accepted(format!("{car} close pressed")))
}

// ---------------------------------------------------------------------------
// Fault switch
// ---------------------------------------------------------------------------

/// Flip a car's fault switch.
pub async fn toggle_fault(
    State(state): State<Arc<AppState>>,
    Path(id_str): Path<String>,
) -> Result<impl IntoResponse, ObserverError> {
    let car = parse_car_id(&id_str)?;
    let status = state.building.toggle_fault(car)?;
    Ok(Json(serde_json::json!({
        "ok": true,
        "car": car,
        "status": status,
    })))
}

// ---------------------------------------------------------------------------
// Hall buttons
// ---------------------------------------------------------------------------

/// Press a hall button.
pub async fn press_floor_call(
    State(state): State<Arc<AppState>>,
    Path(floor_str): Path<String>,
    Json(body): Json<FloorCallRequest>,
) -> Result<impl IntoResponse, ObserverError> {
    let floor = floor_str
        .parse::<u16>()
        .map_err(|e| ObserverError::InvalidQuery(format!("floor {floor_str}: {e}")))?;
    let outcome = state.building.press_floor_call(floor, body.direction)?;
    Ok(Json(serde_json::json!({
        "ok": true,
        "request_id": outcome.request_id(),
        "already_pending": matches!(outcome, FloorCallOutcome::AlreadyPending(_)),
    })))
}

// ---------------------------------------------------------------------------
// Random demand
// ---------------------------------------------------------------------------

/// Press `count` random buttons.
pub async fn generate_demand(
    State(state): State<Arc<AppState>>,
    Json(body): Json<DemandRequest>,
) -> Result<impl IntoResponse, ObserverError> {
    if body.count > MAX_DEMAND_BURST {
        return Err(ObserverError::InvalidQuery(format!(
            "count must be at most {MAX_DEMAND_BURST}"
        )));
    }
    let report = state
        .demand
        .lock()
        .await
        .inject(&state.building, body.count);
    info!(
        requested = body.count,
        accepted = report.accepted,
        rejected = report.rejected,
        "random demand injected"
    );
    Ok(Json(serde_json::json!({
        "ok": true,
        "accepted": report.accepted,
        "rejected": report.rejected,
    })))
}
