//! Recording lifecycle orchestration.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use cameraman_common::config::ServiceConfig;
use cameraman_common::error::{CameramanError, CameramanResult};
use serde::Serialize;
use tokio::task::JoinSet;

use crate::camera::{CameraRegistry, CameraStatus};
use crate::ledger::RecordingLedger;
use crate::process::{CaptureProcessHandle, ProcessLauncher, StopOutcome};
use crate::recording::{Recording, RecordingId, RecordingSnapshot};

/// Where recordings go and how they are torn down.
#[derive(Debug, Clone)]
pub struct LifecyclePolicy {
    /// Directory receiving one artifact per recording.
    pub output_dir: PathBuf,

    /// Artifact file extension.
    pub output_extension: String,

    /// Recordings are never torn down before reaching this length.
    pub min_duration: Duration,

    /// Graceful quit timeout before a capture process is killed.
    pub graceful_stop_timeout: Duration,
}

impl LifecyclePolicy {
    pub fn from_config(config: &ServiceConfig) -> Self {
        Self {
            output_dir: config.output_dir.clone(),
            output_extension: config.output_extension.clone(),
            min_duration: config.policy.min_duration(),
            graceful_stop_timeout: config.capture.graceful_stop_timeout(),
        }
    }
}

impl Default for LifecyclePolicy {
    fn default() -> Self {
        Self::from_config(&ServiceConfig::default())
    }
}

/// Recordings partitioned by status.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RecordingList {
    pub ongoing: Vec<RecordingSnapshot>,
    pub ended: Vec<RecordingSnapshot>,
}

/// Starts and stops recordings.
///
/// Cheap to clone; clones share the same registry, ledger, and launcher.
#[derive(Clone)]
pub struct RecordingLifecycleManager {
    registry: Arc<CameraRegistry>,
    ledger: Arc<RecordingLedger>,
    launcher: Arc<dyn ProcessLauncher>,
    policy: LifecyclePolicy,
}

impl RecordingLifecycleManager {
    pub fn new(
        registry: Arc<CameraRegistry>,
        ledger: Arc<RecordingLedger>,
        launcher: Arc<dyn ProcessLauncher>,
        policy: LifecyclePolicy,
    ) -> Self {
        Self {
            registry,
            ledger,
            launcher,
            policy,
        }
    }

    pub fn registry(&self) -> &CameraRegistry {
        &self.registry
    }

    pub fn ledger(&self) -> &RecordingLedger {
        &self.ledger
    }

    pub fn policy(&self) -> &LifecyclePolicy {
        &self.policy
    }

    /// Start recording from a camera and return the new recording's id.
    ///
    /// Nothing is added to the ledger unless the capture process started.
    pub async fn start_recording(&self, camera_number: u32) -> CameramanResult<RecordingId> {
        let camera = self.registry.lookup(camera_number)?;

        if !self.registry.probe(camera).await {
            return Err(CameramanError::CameraUnreachable {
                number: camera.number,
                address: camera.address.clone(),
            });
        }

        let id = RecordingId::generate();
        let mut recording = Recording::new(
            id,
            camera,
            &self.policy.output_dir,
            &self.policy.output_extension,
        );
        let mut handle = CaptureProcessHandle::new(
            id.to_string(),
            self.policy.min_duration,
            self.policy.graceful_stop_timeout,
        );

        let source_uri = recording.source_uri().to_string();
        let output_path = recording.output_path().to_path_buf();
        if let Err(e) = handle
            .start(self.launcher.as_ref(), &source_uri, &output_path)
            .await
        {
            tracing::error!(recording_id = %id, camera = camera_number, error = %e, "Failed to start recording");
            return Err(e);
        }

        recording.mark_running(handle);
        self.ledger.insert(recording)?;

        tracing::info!(recording_id = %id, camera = camera_number, "Started recording");
        Ok(id)
    }

    /// Stop a running recording and return its output path.
    ///
    /// Exactly one concurrent caller wins; the others get `NotRunning`.
    /// The recording ends up `Stopped` even when teardown fails, in which
    /// case the failure is returned after finalizing.
    pub async fn stop_recording(&self, id: RecordingId) -> CameramanResult<PathBuf> {
        let (mut handle, elapsed) = self.ledger.mutate(id, Recording::claim_stop)??;

        // Teardown runs on its own task: once claimed, the recording is
        // finalized even if this caller goes away.
        let ledger = Arc::clone(&self.ledger);
        let teardown = tokio::spawn(async move {
            let outcome = handle.stop(elapsed).await;
            let finished = ledger.mutate(id, |rec| {
                rec.finish();
                rec.snapshot()
            });
            (outcome, finished)
        });

        let (outcome, finished) = teardown
            .await
            .map_err(|e| CameramanError::teardown(format!("stop task for {id} failed: {e}")))?;
        let snapshot = finished?;

        match outcome {
            Ok(StopOutcome::Exited(info)) => {
                tracing::info!(
                    recording_id = %id,
                    duration_secs = snapshot.duration_secs.unwrap_or_default(),
                    exit_code = ?info.code,
                    forced = info.forced,
                    "Stopped recording"
                );
                Ok(snapshot.output_path)
            }
            Ok(StopOutcome::NothingToStop) => {
                tracing::warn!(recording_id = %id, "Recording had no capture process attached");
                Ok(snapshot.output_path)
            }
            Err(e) => {
                tracing::error!(recording_id = %id, error = %e, "Recording finalized after failed teardown");
                Err(e)
            }
        }
    }

    /// Probe every camera.
    pub async fn list_cameras(&self) -> Vec<CameraStatus> {
        self.registry.probe_all().await
    }

    /// All recordings, split into ongoing and ended.
    pub fn list_recordings(&self) -> RecordingList {
        let (ongoing, ended) = self.ledger.partition();
        RecordingList { ongoing, ended }
    }

    pub fn get_recording(&self, id: RecordingId) -> CameramanResult<RecordingSnapshot> {
        self.ledger.get(id)
    }

    /// Stop every running recording, logging failures. Returns how many
    /// were stopped successfully.
    pub async fn shutdown(&self) -> usize {
        let ongoing = self.ledger.list_ongoing();
        if ongoing.is_empty() {
            return 0;
        }
        tracing::info!(recordings = ongoing.len(), "Stopping ongoing recordings for shutdown");

        let mut stops = JoinSet::new();
        for snapshot in ongoing {
            let manager = self.clone();
            stops.spawn(async move { (snapshot.id, manager.stop_recording(snapshot.id).await) });
        }

        let mut stopped = 0;
        while let Some(joined) = stops.join_next().await {
            match joined {
                Ok((id, Ok(_))) => {
                    stopped += 1;
                    tracing::warn!(recording_id = %id, "Recording was stopped due to server shutdown");
                }
                Ok((id, Err(e))) => {
                    tracing::warn!(recording_id = %id, error = %e, "Failed to stop recording during shutdown");
                }
                Err(e) => tracing::warn!(error = %e, "Shutdown stop task failed"),
            }
        }
        stopped
    }
}

impl std::fmt::Debug for RecordingLifecycleManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordingLifecycleManager")
            .field("registry", &self.registry)
            .field("recordings", &self.ledger.len())
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::Camera;
    use crate::recording::RecordingStatus;
    use crate::testing::{FakeBehavior, FakeLauncher, FakeProbe};

    struct Fixture {
        manager: RecordingLifecycleManager,
        launcher: FakeLauncher,
        probe: FakeProbe,
        _dir: tempfile::TempDir,
    }

    fn fixture(behavior: FakeBehavior) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let probe = FakeProbe::reachable([222]);
        let registry = CameraRegistry::with_probe(
            vec![
                Camera {
                    number: 222,
                    address: "10.0.0.2:554".to_string(),
                    stream_uri: "rtsp://10.0.0.2/live".to_string(),
                },
                Camera {
                    number: 333,
                    address: "10.0.0.3:554".to_string(),
                    stream_uri: "rtsp://10.0.0.3/live".to_string(),
                },
            ],
            Arc::new(probe.clone()),
        )
        .unwrap();
        let launcher = FakeLauncher::new(behavior);
        let policy = LifecyclePolicy {
            output_dir: dir.path().join("video"),
            output_extension: "mp4".to_string(),
            min_duration: Duration::from_secs(3),
            graceful_stop_timeout: Duration::from_secs(10),
        };
        let manager = RecordingLifecycleManager::new(
            Arc::new(registry),
            Arc::new(RecordingLedger::new()),
            Arc::new(launcher.clone()),
            policy,
        );
        Fixture {
            manager,
            launcher,
            probe,
            _dir: dir,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_camera() {
        let fx = fixture(FakeBehavior::ExitCode(0));
        let err = fx.manager.start_recording(7).await.unwrap_err();
        assert!(matches!(err, CameramanError::UnknownCamera { ref number } if number == "7"));
        assert!(fx.manager.ledger().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_unreachable_camera_creates_no_entry() {
        let fx = fixture(FakeBehavior::ExitCode(0));
        let err = fx.manager.start_recording(333).await.unwrap_err();
        assert!(matches!(err, CameramanError::CameraUnreachable { number: 333, .. }));
        assert!(fx.manager.ledger().is_empty());
        assert_eq!(fx.launcher.launches(), 0);

        fx.probe.set_up(333, true);
        fx.manager.start_recording(333).await.unwrap();
        assert_eq!(fx.manager.ledger().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_spawn_failure_creates_no_entry() {
        let fx = fixture(FakeBehavior::SpawnFails);
        let err = fx.manager.start_recording(222).await.unwrap_err();
        assert!(matches!(err, CameramanError::Spawn { .. }));
        assert!(fx.manager.ledger().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_uses_camera_source_and_derived_path() {
        let fx = fixture(FakeBehavior::ExitCode(0));
        let id = fx.manager.start_recording(222).await.unwrap();

        let launched = fx.launcher.launched();
        assert_eq!(launched.len(), 1);
        assert_eq!(launched[0].0, "rtsp://10.0.0.2/live");
        assert_eq!(
            launched[0].1,
            fx.manager.policy().output_dir.join(format!("{id}.mp4"))
        );

        let snapshot = fx.manager.get_recording(id).unwrap();
        assert_eq!(snapshot.status, RecordingStatus::Running);
        assert_eq!(snapshot.camera_number, 222);
        assert!(snapshot.started_at.is_some());
        assert!(snapshot.ended_at.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_early_stop_still_reaches_minimum_duration() {
        let fx = fixture(FakeBehavior::ExitCode(0));
        let id = fx.manager.start_recording(222).await.unwrap();

        tokio::time::advance(Duration::from_millis(200)).await;
        let path = fx.manager.stop_recording(id).await.unwrap();

        let snapshot = fx.manager.get_recording(id).unwrap();
        assert_eq!(snapshot.output_path, path);
        assert_eq!(snapshot.status, RecordingStatus::Stopped);
        assert!(snapshot.duration_secs.unwrap() >= 3.0);
        assert!(snapshot.ended_at.unwrap() >= snapshot.started_at.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_nonzero_exit_still_succeeds() {
        let fx = fixture(FakeBehavior::ExitCode(255));
        let id = fx.manager.start_recording(222).await.unwrap();
        assert!(fx.manager.stop_recording(id).await.is_ok());
        assert_eq!(fx.manager.list_recordings().ended.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_teardown_failure_still_finalizes() {
        let fx = fixture(FakeBehavior::Unkillable);
        let id = fx.manager.start_recording(222).await.unwrap();

        let err = fx.manager.stop_recording(id).await.unwrap_err();
        assert!(matches!(err, CameramanError::Teardown { .. }));

        let snapshot = fx.manager.get_recording(id).unwrap();
        assert_eq!(snapshot.status, RecordingStatus::Stopped);
        assert!(snapshot.timestamps_consistent());
        assert!(matches!(
            fx.manager.stop_recording(id).await,
            Err(CameramanError::NotRunning { .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_recording() {
        let fx = fixture(FakeBehavior::ExitCode(0));
        let err = fx
            .manager
            .stop_recording(RecordingId::generate())
            .await
            .unwrap_err();
        assert!(matches!(err, CameramanError::UnknownRecording { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_stops_everything_running() {
        let fx = fixture(FakeBehavior::ExitCode(0));
        let first = fx.manager.start_recording(222).await.unwrap();
        fx.manager.start_recording(222).await.unwrap();
        fx.manager.start_recording(222).await.unwrap();
        fx.manager.stop_recording(first).await.unwrap();

        assert_eq!(fx.manager.shutdown().await, 2);
        let list = fx.manager.list_recordings();
        assert!(list.ongoing.is_empty());
        assert_eq!(list.ended.len(), 3);
        assert_eq!(fx.manager.shutdown().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_list_cameras_reports_liveness() {
        let fx = fixture(FakeBehavior::ExitCode(0));
        let cameras = fx.manager.list_cameras().await;
        let summary: Vec<(u32, bool)> = cameras.iter().map(|c| (c.number, c.is_up)).collect();
        assert_eq!(summary, vec![(222, true), (333, false)]);
    }
}
