//! REST query handlers for the Observer server.
//!
//! Every handler takes one snapshot of the building under its lock and
//! renders from that copy.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET` | `/` | Minimal HTML status page |
//! | `GET` | `/api/building` | Full snapshot (cars + requests) |
//! | `GET` | `/api/cars` | All cars |
//! | `GET` | `/api/cars/{id}` | One car |
//! | `GET` | `/api/requests` | Active floor requests (`?state=`) |

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::response::{Html, IntoResponse};
use lift_types::{CarId, RequestState};

use crate::error::ObserverError;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Query parameter structs
// ---------------------------------------------------------------------------

/// Query parameters for the `GET /api/requests` endpoint.
#[derive(Debug, serde::Deserialize)]
pub struct RequestsQuery {
    /// Filter by lifecycle state: `unassigned`, `waiting`, or `finished`.
    pub state: Option<String>,
}

// ---------------------------------------------------------------------------
// GET / -- minimal HTML status page
// ---------------------------------------------------------------------------

/// Serve a minimal HTML page with one row per car and the API links.
pub async fn index(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let snapshot = state.building.snapshot();
    let floors = snapshot.floors;
    let car_count = snapshot.cars.len();
    let pending = snapshot.count_in_state(RequestState::Unassigned);
    let waiting = snapshot.count_in_state(RequestState::Waiting);

    let mut rows = String::new();
    for car in &snapshot.cars {
        let row = format!(
            "<tr><td>{}</td><td>{:?}</td><td>{}</td><td>{}</td><td>{:?}</td><td>{:?}</td><td>{:.2}</td></tr>",
            car.id,
            car.status,
            car.current_floor,
            car.scan_direction,
            car.up_queue,
            car.down_queue,
            car.door_progress,
        );
        rows.push_str(&row);
    }

    Html(format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="utf-8">
    <title>Lift Observer</title>
    <style>
        body {{
            background: #0d1117;
            color: #c9d1d9;
            font-family: 'Cascadia Code', 'Fira Code', 'Consolas', monospace;
            padding: 2rem;
            max-width: 900px;
            margin: 0 auto;
        }}
        h1 {{ color: #58a6ff; margin-bottom: 0.25rem; }}
        .subtitle {{ color: #8b949e; margin-top: 0; }}
        .metric {{
            display: inline-block;
            background: #161b22;
            border: 1px solid #30363d;
            border-radius: 6px;
            padding: 1rem 1.5rem;
            margin: 0.5rem 0.5rem 0.5rem 0;
            min-width: 120px;
        }}
        .metric .label {{ color: #8b949e; font-size: 0.85rem; }}
        .metric .value {{ color: #58a6ff; font-size: 1.5rem; font-weight: bold; }}
        table {{ border-collapse: collapse; width: 100%; }}
        th, td {{ border-bottom: 1px solid #30363d; padding: 0.4rem; text-align: left; }}
        th {{ color: #8b949e; }}
        a {{ color: #58a6ff; text-decoration: none; }}
        a:hover {{ text-decoration: underline; }}
        ul {{ list-style: none; padding: 0; }}
        li {{ padding: 0.3rem 0; }}
        hr {{ border: none; border-top: 1px solid #30363d; margin: 1.5rem 0; }}
    </style>
</head>
<body>
    <h1>Lift Observer</h1>
    <p class="subtitle">Elevator bank monitoring server</p>

    <div>
        <div class="metric">
            <div class="label">Floors</div>
            <div class="value">{floors}</div>
        </div>
        <div class="metric">
            <div class="label">Cars</div>
            <div class="value">{car_count}</div>
        </div>
        <div class="metric">
            <div class="label">Unassigned</div>
            <div class="value">{pending}</div>
        </div>
        <div class="metric">
            <div class="label">Waiting</div>
            <div class="value">{waiting}</div>
        </div>
    </div>

    <table>
        <tr><th>Car</th><th>Status</th><th>Floor</th><th>Sweep</th><th>Up</th><th>Down</th><th>Door</th></tr>
        {rows}
    </table>

    <hr>

    <h2>API Endpoints</h2>
    <ul>
        <li>GET <a href="/api/building">/api/building</a> -- Full snapshot</li>
        <li>GET <a href="/api/cars">/api/cars</a> -- All cars</li>
        <li>GET /api/cars/{{id}} -- One car</li>
        <li>GET <a href="/api/requests">/api/requests</a> -- Floor requests (?state=waiting)</li>
        <li>POST /api/cars/{{id}}/floor -- Cabin floor button ({{"floor": n}})</li>
        <li>POST /api/cars/{{id}}/open -- Cabin open button</li>
        <li>POST /api/cars/{{id}}/close -- Cabin close button</li>
        <li>POST /api/cars/{{id}}/fault -- Toggle fault</li>
        <li>POST /api/floors/{{floor}}/call -- Hall button ({{"direction": "Up"}})</li>
        <li>POST /api/demand -- Random presses ({{"count": n}})</li>
    </ul>

    <h2>WebSocket</h2>
    <ul>
        <li><code>ws://host:port/ws/building</code> -- Live snapshot stream</li>
    </ul>
</body>
</html>"#
    ))
}

// ---------------------------------------------------------------------------
// GET /api/building
// ---------------------------------------------------------------------------

/// Return a full consistent snapshot of every car and request.
pub async fn get_building(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.building.snapshot())
}

// ---------------------------------------------------------------------------
// GET /api/cars
// ---------------------------------------------------------------------------

/// List every car.
pub async fn list_cars(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let cars = state.building.snapshot().cars;
    Json(serde_json::json!({
        "count": cars.len(),
        "cars": cars,
    }))
}

// ---------------------------------------------------------------------------
// GET /api/cars/{id}
// ---------------------------------------------------------------------------

/// Return the display state of one car.
pub async fn get_car(
    State(state): State<Arc<AppState>>,
    Path(id_str): Path<String>,
) -> Result<impl IntoResponse, ObserverError> {
    let id = parse_car_id(&id_str)?;
    let car = state
        .building
        .car(id)
        .ok_or_else(|| ObserverError::NotFound(format!("{id}")))?;
    Ok(Json(car))
}

// ---------------------------------------------------------------------------
// GET /api/requests
// ---------------------------------------------------------------------------

/// List active floor requests, optionally filtered by state.
///
/// # Query Parameters
///
/// - `state`: `unassigned` | `waiting` | `finished` (default: all)
pub async fn list_requests(
    State(state): State<Arc<AppState>>,
    Query(params): Query<RequestsQuery>,
) -> Result<impl IntoResponse, ObserverError> {
    let filter = params.state.as_deref().map(parse_request_state).transpose()?;

    let requests: Vec<_> = state
        .building
        .requests()
        .into_iter()
        .filter(|request| filter.is_none_or(|wanted| request.state == wanted))
        .collect();

    Ok(Json(serde_json::json!({
        "count": requests.len(),
        "requests": requests,
    })))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Parse a car index from a path segment.
pub(crate) fn parse_car_id(s: &str) -> Result<CarId, ObserverError> {
    s.parse::<u16>()
        .map(CarId)
        .map_err(|e| ObserverError::InvalidQuery(format!("car id {s}: {e}")))
}

fn parse_request_state(s: &str) -> Result<RequestState, ObserverError> {
    match s.to_ascii_lowercase().as_str() {
        "unassigned" => Ok(RequestState::Unassigned),
        "waiting" => Ok(RequestState::Waiting),
        "finished" => Ok(RequestState::Finished),
        other => Err(ObserverError::InvalidQuery(format!(
            "unknown request state {other}"
        ))),
    }
}
