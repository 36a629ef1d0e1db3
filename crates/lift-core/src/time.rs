//! Injectable time source for the simulation loops.
//!
//! Every suspension point in the core goes through [`TimeSource::sleep`].
//! Production uses [`TokioTime`]; tests either run on a paused tokio clock
//! or wrap the tokio clock to observe the building at each suspension.

use std::future::Future;
use std::time::Duration;

/// Something that can suspend the calling task for a duration.
pub trait TimeSource: Clone + Send + Sync + 'static {
    /// Suspend for `duration`.
    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send;
}

/// Real (or tokio-paused) time.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioTime;

impl TimeSource for TokioTime {
    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send {
        tokio::time::sleep(duration)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn tokio_time_advances_paused_clock() {
        let start = tokio::time::Instant::now();
        TokioTime.sleep(Duration::from_millis(1500)).await;
        assert!(start.elapsed() >= Duration::from_millis(1500));
    }
}
