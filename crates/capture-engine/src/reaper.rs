//! Background stop of recordings that ran past the maximum duration.

use std::time::Duration;

use cameraman_common::config::PolicyConfig;
use cameraman_common::error::CameramanError;
use tokio::sync::watch;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{Instant, MissedTickBehavior};

use crate::manager::RecordingLifecycleManager;

/// Periodically stops recordings older than `max_duration`.
#[derive(Debug, Clone)]
pub struct StuckRecordingReaper {
    manager: RecordingLifecycleManager,
    interval: Duration,
    max_duration: Duration,
}

impl StuckRecordingReaper {
    pub fn new(manager: RecordingLifecycleManager, interval: Duration, max_duration: Duration) -> Self {
        Self {
            manager,
            interval,
            max_duration,
        }
    }

    pub fn from_config(manager: RecordingLifecycleManager, policy: &PolicyConfig) -> Self {
        Self::new(manager, policy.reaper_interval(), policy.max_duration())
    }

    /// Run one scan and stop every overdue recording.
    ///
    /// Failures are logged and never abort the scan. Returns the number of
    /// recordings stopped.
    pub async fn tick(&self) -> usize {
        let overdue = self.manager.ledger().running_longer_than(self.max_duration);
        if overdue.is_empty() {
            tracing::trace!("No recordings over the maximum duration");
            return 0;
        }

        let mut stops = JoinSet::new();
        for (id, elapsed) in overdue {
            tracing::warn!(
                recording_id = %id,
                duration_secs = elapsed.as_secs_f64(),
                max_duration_secs = self.max_duration.as_secs_f64(),
                "Recording exceeded the maximum duration, stopping it"
            );
            let manager = self.manager.clone();
            stops.spawn(async move { (id, manager.stop_recording(id).await) });
        }

        let mut stopped = 0;
        while let Some(joined) = stops.join_next().await {
            match joined {
                Ok((_, Ok(_))) => stopped += 1,
                // Someone else stopped it between the scan and the claim.
                Ok((id, Err(CameramanError::NotRunning { .. }))) => {
                    tracing::debug!(recording_id = %id, "Overdue recording already stopping");
                }
                Ok((id, Err(e))) => {
                    tracing::error!(recording_id = %id, error = %e, "Failed to stop overdue recording");
                }
                Err(e) => tracing::error!(error = %e, "Reaper stop task failed"),
            }
        }
        stopped
    }

    /// Run the reaper on a background task.
    ///
    /// The first scan happens one interval after spawning. Dropping the
    /// returned handle also ends the loop.
    pub fn spawn(self) -> ReaperHandle {
        let (shutdown, mut shutdown_rx) = watch::channel(false);

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + self.interval, self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            tracing::info!(
                interval_secs = self.interval.as_secs_f64(),
                max_duration_secs = self.max_duration.as_secs_f64(),
                "Reaper started"
            );

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        self.tick().await;
                    }
                    _ = shutdown_rx.changed() => break,
                }
            }

            tracing::info!("Reaper stopped");
        });

        ReaperHandle { shutdown, task }
    }
}

/// Control handle for a spawned reaper.
#[derive(Debug)]
pub struct ReaperHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl ReaperHandle {
    /// Ask the reaper to stop and wait for it. A scan in progress is
    /// allowed to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            tracing::error!(error = %e, "Reaper task failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::camera::{Camera, CameraRegistry};
    use crate::ledger::RecordingLedger;
    use crate::manager::LifecyclePolicy;
    use crate::recording::RecordingStatus;
    use crate::testing::{FakeBehavior, FakeLauncher, FakeProbe};

    fn manager() -> RecordingLifecycleManager {
        let registry = CameraRegistry::with_probe(
            vec![Camera {
                number: 1,
                address: "10.0.0.1:554".to_string(),
                stream_uri: "rtsp://10.0.0.1/live".to_string(),
            }],
            Arc::new(FakeProbe::reachable([1])),
        )
        .unwrap();
        RecordingLifecycleManager::new(
            Arc::new(registry),
            Arc::new(RecordingLedger::new()),
            Arc::new(FakeLauncher::new(FakeBehavior::ExitCode(0))),
            LifecyclePolicy {
                output_dir: std::env::temp_dir().join("cameraman-reaper-tests"),
                output_extension: "mp4".to_string(),
                min_duration: Duration::from_secs(3),
                graceful_stop_timeout: Duration::from_secs(10),
            },
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_tick_stops_only_overdue() {
        let manager = manager();
        let old = manager.start_recording(1).await.unwrap();
        tokio::time::advance(Duration::from_secs(100)).await;
        let young = manager.start_recording(1).await.unwrap();
        tokio::time::advance(Duration::from_secs(60)).await;

        let reaper = StuckRecordingReaper::new(
            manager.clone(),
            Duration::from_secs(60),
            Duration::from_secs(120),
        );
        assert_eq!(reaper.tick().await, 1);

        assert_eq!(manager.get_recording(old).unwrap().status, RecordingStatus::Stopped);
        assert_eq!(manager.get_recording(young).unwrap().status, RecordingStatus::Running);
        assert_eq!(reaper.tick().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exactly_max_is_not_overdue() {
        let manager = manager();
        let id = manager.start_recording(1).await.unwrap();
        tokio::time::advance(Duration::from_secs(120)).await;

        let reaper = StuckRecordingReaper::new(
            manager.clone(),
            Duration::from_secs(60),
            Duration::from_secs(120),
        );
        assert_eq!(reaper.tick().await, 0);
        assert_eq!(manager.get_recording(id).unwrap().status, RecordingStatus::Running);
    }

    #[tokio::test(start_paused = true)]
    async fn test_spawned_reaper_stops_on_schedule() {
        let manager = manager();
        let id = manager.start_recording(1).await.unwrap();

        let handle = StuckRecordingReaper::new(
            manager.clone(),
            Duration::from_secs(60),
            Duration::from_secs(120),
        )
        .spawn();

        // Scans at 60s and 120s find nothing strictly over the limit.
        tokio::time::sleep(Duration::from_secs(150)).await;
        assert_eq!(manager.get_recording(id).unwrap().status, RecordingStatus::Running);

        tokio::time::sleep(Duration::from_secs(40)).await;
        assert_eq!(manager.get_recording(id).unwrap().status, RecordingStatus::Stopped);

        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_ends_the_loop() {
        let manager = manager();
        let handle = StuckRecordingReaper::new(
            manager.clone(),
            Duration::from_secs(60),
            Duration::from_secs(120),
        )
        .spawn();
        handle.shutdown().await;

        let id = manager.start_recording(1).await.unwrap();
        tokio::time::sleep(Duration::from_secs(600)).await;
        assert_eq!(manager.get_recording(id).unwrap().status, RecordingStatus::Running);
    }
}
