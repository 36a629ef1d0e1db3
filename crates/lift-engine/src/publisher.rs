//! Periodic snapshot publisher for `WebSocket` clients.
//!
//! Every interval the publisher takes one consistent snapshot of the
//! building and broadcasts it through the observer's channel. If a car
//! task or handler holds the building lock at that moment the frame is
//! skipped; the next interval catches up.

use std::sync::Arc;
use std::time::Duration;

use lift_core::TimeSource;
use lift_observer::state::AppState;
use tracing::{debug, info};

/// Bridges the live building to the observer's broadcast channel.
pub struct SnapshotPublisher {
    state: Arc<AppState>,
}

impl SnapshotPublisher {
    /// Create a publisher backed by the given app state.
    pub const fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }

    /// Publish one frame.
    ///
    /// Returns the number of receivers, or `None` when the lock was busy
    /// and the frame was skipped.
    pub fn publish_once(&self) -> Option<usize> {
        let snapshot = self.state.building.try_with(|building| building.snapshot())?;
        Some(self.state.broadcast(&snapshot))
    }

    /// Publish a frame every `interval` until the task is aborted.
    pub async fn run<T: TimeSource>(self, time: T, interval: Duration) {
        info!(interval_ms = interval.as_millis(), "snapshot publisher started");
        loop {
            time.sleep(interval).await;
            match self.publish_once() {
                Some(receivers) => debug!(receivers, "snapshot broadcast sent"),
                None => debug!("building busy, snapshot skipped"),
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use lift_core::demand::DemandGenerator;
    use lift_core::{Building, SharedState, TokioTime};

    use super::*;

    fn app_state() -> Arc<AppState> {
        let building = SharedState::new(Building::new(3, 12));
        Arc::new(AppState::new(building, DemandGenerator::new(7, 3, 12)))
    }

    #[test]
    fn publishes_to_subscribers() {
        let state = app_state();
        let mut rx = state.subscribe();
        let publisher = SnapshotPublisher::new(Arc::clone(&state));

        assert_eq!(publisher.publish_once(), Some(1));
        let snapshot = rx.try_recv().unwrap();
        assert_eq!(snapshot.cars.len(), 3);
        assert_eq!(snapshot.floors, 12);
    }

    #[test]
    fn skips_frame_while_building_is_locked() {
        let state = app_state();
        let publisher = SnapshotPublisher::new(Arc::clone(&state));

        let skipped = state.building.with(|_| publisher.publish_once());
        assert_eq!(skipped, None);
        assert_eq!(publisher.publish_once(), Some(0));
    }

    #[tokio::test(start_paused = true)]
    async fn run_publishes_on_interval() {
        let state = app_state();
        let mut rx = state.subscribe();
        let publisher = SnapshotPublisher::new(Arc::clone(&state));
        let task = tokio::spawn(publisher.run(TokioTime, Duration::from_millis(250)));

        tokio::time::sleep(Duration::from_millis(1100)).await;
        let mut frames = 0_u32;
        while rx.try_recv().is_ok() {
            frames = frames.saturating_add(1);
        }
        assert_eq!(frames, 4);

        task.abort();
    }
}
