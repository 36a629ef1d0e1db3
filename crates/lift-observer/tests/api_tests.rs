//! Integration tests for the Observer API endpoints.
//!
//! Tests use Axum's `Router` directly via `tower::ServiceExt` without
//! starting a TCP server. No car tasks run, so every command's effect is
//! visible in the very next query.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use lift_core::demand::DemandGenerator;
use lift_core::{Building, SharedState};
use lift_observer::router::build_router;
use lift_observer::state::AppState;
use serde_json::Value;
use tower::ServiceExt;

fn make_test_state() -> Arc<AppState> {
    let building = SharedState::new(Building::new(2, 20));
    Arc::new(AppState::new(building, DemandGenerator::new(42, 2, 20)))
}

async fn body_to_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn get(state: &Arc<AppState>, path: &str) -> (StatusCode, Value) {
    let response = build_router(Arc::clone(state))
        .oneshot(Request::get(path).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    (status, body_to_json(response.into_body()).await)
}

async fn post(state: &Arc<AppState>, path: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = match body {
        Some(json) => Request::post(path)
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => Request::post(path).body(Body::empty()).unwrap(),
    };
    let response = build_router(Arc::clone(state))
        .oneshot(request)
        .await
        .unwrap();
    let status = response.status();
    (status, body_to_json(response.into_body()).await)
}

// =========================================================================
// Queries
// =========================================================================

#[tokio::test]
async fn test_index_returns_html() {
    let state = make_test_state();
    let response = build_router(state)
        .oneshot(Request::get("/").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response
        .headers()
        .get("content-type")
        .unwrap()
        .to_str()
        .unwrap();
    assert!(content_type.contains("text/html"));
}

#[tokio::test]
async fn test_index_lists_every_car() {
    let state = make_test_state();
    post(
        &state,
        "/api/cars/1/floor",
        Some(serde_json::json!({"floor": 6})),
    )
    .await;

    let response = build_router(state)
        .oneshot(Request::get("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let html = String::from_utf8(bytes.to_vec()).unwrap();

    assert_eq!(html.matches("<tr><td>car-").count(), 2);
    assert!(html.contains("<tr><td>car-0</td><td>Normal</td><td>1</td>"));
    assert!(html.contains("<td>car-1</td><td>Normal</td><td>1</td><td>up</td><td>[6]</td>"));
}

#[tokio::test]
async fn test_get_building() {
    let state = make_test_state();
    let (status, json) = get(&state, "/api/building").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["floors"], 20);
    assert_eq!(json["cars"].as_array().unwrap().len(), 2);
    assert_eq!(json["requests"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_list_cars() {
    let state = make_test_state();
    let (status, json) = get(&state, "/api/cars").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["count"], 2);
    assert_eq!(json["cars"][1]["id"], 1);
    assert_eq!(json["cars"][1]["status"], "Normal");
}

#[tokio::test]
async fn test_get_car_by_id() {
    let state = make_test_state();
    let (status, json) = get(&state, "/api/cars/1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["id"], 1);
    assert_eq!(json["current_floor"], 1);
    assert_eq!(json["scan_direction"], "Up");
}

#[tokio::test]
async fn test_get_car_not_found() {
    let state = make_test_state();
    let (status, json) = get(&state, "/api/cars/9").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["status"], 404);
}

#[tokio::test]
async fn test_get_car_invalid_id() {
    let state = make_test_state();
    let (status, _) = get(&state, "/api/cars/lobby").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_list_requests_with_state_filter() {
    let state = make_test_state();
    post(&state, "/api/floors/7/call", Some(serde_json::json!({"direction": "Up"}))).await;

    let (_, all) = get(&state, "/api/requests").await;
    assert_eq!(all["count"], 1);
    assert_eq!(all["requests"][0]["target_floor"], 7);

    let (_, unassigned) = get(&state, "/api/requests?state=unassigned").await;
    assert_eq!(unassigned["count"], 1);

    let (_, waiting) = get(&state, "/api/requests?state=waiting").await;
    assert_eq!(waiting["count"], 0);

    let (status, _) = get(&state, "/api/requests?state=served").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// =========================================================================
// Cabin buttons
// =========================================================================

#[tokio::test]
async fn test_cabin_floor_queues_stop() {
    let state = make_test_state();
    let (status, json) = post(
        &state,
        "/api/cars/0/floor",
        Some(serde_json::json!({"floor": 5})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["ok"], true);

    let (_, car) = get(&state, "/api/cars/0").await;
    assert_eq!(car["up_queue"], serde_json::json!([5]));
}

#[tokio::test]
async fn test_cabin_floor_rejections() {
    let state = make_test_state();

    let (status, json) = post(
        &state,
        "/api/cars/0/floor",
        Some(serde_json::json!({"floor": 1})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["error"], "car-0 is already at floor 1");

    let (status, _) = post(
        &state,
        "/api/cars/0/floor",
        Some(serde_json::json!({"floor": 25})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = post(
        &state,
        "/api/cars/4/floor",
        Some(serde_json::json!({"floor": 5})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_door_buttons_accepted() {
    let state = make_test_state();
    let (status, _) = post(&state, "/api/cars/0/open", None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = post(&state, "/api/cars/0/close", None).await;
    assert_eq!(status, StatusCode::OK);
}

// =========================================================================
// Fault switch
// =========================================================================

#[tokio::test]
async fn test_fault_toggle_round_trip() {
    let state = make_test_state();
    post(
        &state,
        "/api/cars/1/floor",
        Some(serde_json::json!({"floor": 9})),
    )
    .await;

    let (status, json) = post(&state, "/api/cars/1/fault", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "BreakDown");

    let (_, car) = get(&state, "/api/cars/1").await;
    assert_eq!(car["up_queue"], serde_json::json!([]));

    let (status, _) = post(
        &state,
        "/api/cars/1/floor",
        Some(serde_json::json!({"floor": 9})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = post(&state, "/api/cars/1/open", None).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, json) = post(&state, "/api/cars/1/fault", None).await;
    assert_eq!(json["status"], "Normal");
}

// =========================================================================
// Hall buttons
// =========================================================================

#[tokio::test]
async fn test_floor_call_is_idempotent() {
    let state = make_test_state();
    let body = serde_json::json!({"direction": "Down"});

    let (status, first) = post(&state, "/api/floors/12/call", Some(body.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["already_pending"], false);

    let (_, second) = post(&state, "/api/floors/12/call", Some(body)).await;
    assert_eq!(second["already_pending"], true);
    assert_eq!(second["request_id"], first["request_id"]);

    let (_, requests) = get(&state, "/api/requests").await;
    assert_eq!(requests["count"], 1);
}

#[tokio::test]
async fn test_floor_call_missing_button() {
    let state = make_test_state();
    let (status, json) = post(
        &state,
        "/api/floors/1/call",
        Some(serde_json::json!({"direction": "Down"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "floor 1 has no down button");

    let (status, _) = post(
        &state,
        "/api/floors/0/call",
        Some(serde_json::json!({"direction": "Up"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// =========================================================================
// Random demand
// =========================================================================

#[tokio::test]
async fn test_demand_counts_presses() {
    let state = make_test_state();
    let (status, json) = post(&state, "/api/demand", Some(serde_json::json!({"count": 8}))).await;
    assert_eq!(status, StatusCode::OK);
    let accepted = json["accepted"].as_u64().unwrap();
    let rejected = json["rejected"].as_u64().unwrap();
    assert_eq!(accepted.saturating_add(rejected), 8);
}

#[tokio::test]
async fn test_demand_rejects_huge_burst() {
    let state = make_test_state();
    let (status, _) = post(
        &state,
        "/api/demand",
        Some(serde_json::json!({"count": 5000})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
