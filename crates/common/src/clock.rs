//! Clock and timing utilities for recordings.
//!
//! Every recording is anchored to a monotonic epoch captured when its
//! capture process starts. Duration arithmetic (minimum-length enforcement,
//! stuck-recording detection) always uses the monotonic epoch; the wall-clock
//! timestamp is only reported to clients.
//!
//! The monotonic side uses `tokio::time::Instant`, so tests running on a
//! paused tokio clock observe simulated time.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::Instant;

/// A recording clock that provides monotonic elapsed time relative to
/// a fixed epoch (the moment recording started).
#[derive(Debug, Clone, Copy)]
pub struct RecordingClock {
    /// The instant recording started.
    epoch: Instant,

    /// Wall-clock time at epoch.
    epoch_wall: DateTime<Utc>,
}

impl RecordingClock {
    /// Create a new recording clock anchored to now.
    pub fn start() -> Self {
        Self {
            epoch: Instant::now(),
            epoch_wall: Utc::now(),
        }
    }

    /// Time elapsed since recording start.
    pub fn elapsed(&self) -> Duration {
        self.epoch.elapsed()
    }

    /// Wall-clock time at recording start.
    pub fn epoch_wall(&self) -> DateTime<Utc> {
        self.epoch_wall
    }
}

/// Time still missing for `elapsed` to reach `minimum`, zero if reached.
pub fn shortfall(elapsed: Duration, minimum: Duration) -> Duration {
    minimum.saturating_sub(elapsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_clock_follows_tokio_time() {
        let clock = RecordingClock::start();
        assert_eq!(clock.elapsed(), Duration::ZERO);

        tokio::time::advance(Duration::from_millis(1500)).await;
        assert_eq!(clock.elapsed(), Duration::from_millis(1500));
    }

    #[test]
    fn test_shortfall_saturates() {
        assert_eq!(
            shortfall(Duration::from_millis(500), Duration::from_secs(3)),
            Duration::from_millis(2500)
        );
        assert_eq!(
            shortfall(Duration::from_secs(10), Duration::from_secs(3)),
            Duration::ZERO
        );
    }

    proptest::proptest! {
        #[test]
        fn prop_shortfall_reaches_minimum(elapsed_ms in 0u64..100_000, minimum_ms in 0u64..100_000) {
            let elapsed = Duration::from_millis(elapsed_ms);
            let minimum = Duration::from_millis(minimum_ms);
            let wait = shortfall(elapsed, minimum);
            proptest::prop_assert!(elapsed + wait >= minimum);
            proptest::prop_assert!(wait <= minimum);
        }
    }
}
