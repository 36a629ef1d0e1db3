//! Shared application state for the Observer API server.
//!
//! [`AppState`] holds a handle to the live building, the broadcast
//! channel that carries snapshots to `WebSocket` clients, and the demand
//! generator behind `POST /api/demand`.

use std::sync::Arc;

use lift_core::SharedState;
use lift_core::demand::DemandGenerator;
use lift_types::BuildingSnapshot;
use tokio::sync::{Mutex, broadcast};

/// Capacity of the broadcast channel for building snapshots.
///
/// If a subscriber falls behind by more than this many messages it will
/// receive a [`broadcast::error::RecvError::Lagged`] and skip to the
/// newest message.
const BROADCAST_CAPACITY: usize = 64;

/// Shared state for the Axum application.
///
/// Wrapped in [`Arc`] and injected via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    /// Broadcast sender for building snapshots.
    pub tx: broadcast::Sender<BuildingSnapshot>,
    /// The live building.
    pub building: SharedState,
    /// Random press generator for `POST /api/demand`.
    pub demand: Arc<Mutex<DemandGenerator>>,
}

impl AppState {
    /// Create application state over a running building.
    pub fn new(building: SharedState, demand: DemandGenerator) -> Self {
        let (tx, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self {
            tx,
            building,
            demand: Arc::new(Mutex::new(demand)),
        }
    }

    /// Subscribe to the snapshot broadcast channel.
    pub fn subscribe(&self) -> broadcast::Receiver<BuildingSnapshot> {
        self.tx.subscribe()
    }

    /// Publish a snapshot to all connected clients.
    ///
    /// Returns the number of receivers that received the message.
    /// Returns 0 if no clients are connected (this is not an error).
    pub fn broadcast(&self, snapshot: &BuildingSnapshot) -> usize {
        // send returns Err only when there are zero receivers,
        // which is normal when no WebSocket clients are connected.
        self.tx.send(snapshot.clone()).unwrap_or(0)
    }
}
