//! Cameraman Capture Engine
//!
//! Starts and stops recordings of network camera streams. Each recording is
//! backed by one external capture process writing a single media file.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────┐
//! │            RecordingLifecycleManager             │
//! │  ┌────────────────┐        ┌──────────────────┐  │
//! │  │ CameraRegistry │        │ RecordingLedger  │◄─┼── StuckRecordingReaper
//! │  │  (+ liveness)  │        │  id -> Recording │  │
//! │  └────────────────┘        └────────┬─────────┘  │
//! │                                     │            │
//! │                                     ▼            │
//! │                          ┌──────────────────────┐│
//! │                          │ CaptureProcessHandle ││
//! │                          │   (ffmpeg process)   ││
//! │                          └──────────────────────┘│
//! └──────────────────────────────────────────────────┘
//! ```

pub mod camera;
pub mod ledger;
pub mod manager;
pub mod process;
pub mod reaper;
pub mod recording;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use camera::{Camera, CameraRegistry, CameraStatus, LivenessProbe, TcpProbe};
pub use ledger::RecordingLedger;
pub use manager::{LifecyclePolicy, RecordingLifecycleManager, RecordingList};
pub use process::{
    CaptureProcess, CaptureProcessHandle, ExitInfo, FfmpegLauncher, ProcessLauncher, StopOutcome,
};
pub use reaper::{ReaperHandle, StuckRecordingReaper};
pub use recording::{Recording, RecordingId, RecordingSnapshot, RecordingStatus};
