use std::sync::Arc;
use std::time::Duration;

use cameraman_capture_engine::testing::{FakeBehavior, FakeLauncher, FakeProbe};
use cameraman_capture_engine::{
    Camera, CameraRegistry, LifecyclePolicy, RecordingId, RecordingLedger,
    RecordingLifecycleManager, RecordingStatus,
};
use cameraman_common::error::CameramanError;
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Op {
    Start(u32),
    Stop(usize),
    Advance(u64),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        prop::sample::select(vec![1u32, 2, 3]).prop_map(Op::Start),
        (0usize..8).prop_map(Op::Stop),
        (0u64..10).prop_map(Op::Advance),
    ]
}

fn manager(output: &std::path::Path) -> RecordingLifecycleManager {
    let cameras = (1..=3)
        .map(|n| Camera {
            number: n,
            address: format!("10.0.0.{n}:554"),
            stream_uri: format!("rtsp://10.0.0.{n}/live"),
        })
        .collect();
    // Camera 3 is offline.
    let registry = CameraRegistry::with_probe(cameras, Arc::new(FakeProbe::reachable([1, 2])))
        .expect("catalog should be valid");
    RecordingLifecycleManager::new(
        Arc::new(registry),
        Arc::new(RecordingLedger::new()),
        Arc::new(FakeLauncher::new(FakeBehavior::ExitCode(0))),
        LifecyclePolicy {
            output_dir: output.to_path_buf(),
            output_extension: "mp4".to_string(),
            min_duration: Duration::from_secs(3),
            graceful_stop_timeout: Duration::from_secs(10),
        },
    )
}

async fn run(ops: Vec<Op>, output: &std::path::Path) -> Result<(), TestCaseError> {
    let manager = manager(output);
    let mut started: Vec<RecordingId> = Vec::new();
    let mut stopped = 0usize;

    for op in ops {
        match op {
            Op::Start(camera) => match manager.start_recording(camera).await {
                Ok(id) => {
                    prop_assert!(camera != 3);
                    prop_assert!(!started.contains(&id));
                    started.push(id);
                }
                Err(CameramanError::CameraUnreachable { .. }) => prop_assert_eq!(camera, 3),
                Err(e) => return Err(TestCaseError::fail(format!("unexpected start error: {e}"))),
            },
            Op::Stop(index) => {
                let Some(&id) = started.get(index) else {
                    continue;
                };
                let was_running =
                    manager.get_recording(id).map_err(|e| TestCaseError::fail(e.to_string()))?.status
                        == RecordingStatus::Running;
                match manager.stop_recording(id).await {
                    Ok(_) => {
                        prop_assert!(was_running);
                        stopped += 1;
                        let snapshot = manager
                            .get_recording(id)
                            .map_err(|e| TestCaseError::fail(e.to_string()))?;
                        prop_assert!(snapshot.duration_secs.unwrap_or_default() >= 3.0);
                    }
                    Err(CameramanError::NotRunning { .. }) => prop_assert!(!was_running),
                    Err(e) => return Err(TestCaseError::fail(format!("unexpected stop error: {e}"))),
                }
            }
            Op::Advance(secs) => tokio::time::advance(Duration::from_secs(secs)).await,
        }

        let list = manager.list_recordings();
        prop_assert_eq!(list.ongoing.len(), started.len() - stopped);
        prop_assert_eq!(list.ended.len(), stopped);
        for snapshot in list.ongoing.iter().chain(list.ended.iter()) {
            prop_assert!(snapshot.timestamps_consistent(), "{:?}", snapshot);
            if let (Some(start), Some(end)) = (snapshot.started_at, snapshot.ended_at) {
                prop_assert!(end >= start);
            }
        }
    }
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn timestamps_match_status_for_any_sequence(ops in prop::collection::vec(op(), 1..40)) {
        let output = tempfile::tempdir().expect("tempdir should be created");
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .start_paused(true)
            .build()
            .expect("runtime should build");
        runtime.block_on(run(ops, output.path()))?;
    }
}
