//! Recording model.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use cameraman_common::clock::RecordingClock;
use cameraman_common::error::{CameramanError, CameramanResult};
use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use uuid::Uuid;

use crate::camera::Camera;
use crate::process::CaptureProcessHandle;

/// Globally unique recording identifier.
///
/// Time-ordered (UUIDv7), so sorting by id sorts by creation. Rendered as
/// 32 lowercase hex digits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordingId(Uuid);

impl RecordingId {
    pub fn generate() -> Self {
        Self(Uuid::now_v7())
    }
}

impl std::fmt::Display for RecordingId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

impl FromStr for RecordingId {
    type Err = CameramanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|_| CameramanError::unknown_recording(s))
    }
}

impl Serialize for RecordingId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Lifecycle status of a recording.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordingStatus {
    /// Created, capture process not yet running.
    Idle,
    /// Capture process running.
    Running,
    /// Capture process gone, artifact finalized. Terminal.
    Stopped,
}

/// One capture attempt. Owned by the ledger.
#[derive(Debug)]
pub struct Recording {
    id: RecordingId,
    camera_number: u32,
    source_uri: String,
    output_path: PathBuf,
    status: RecordingStatus,
    clock: Option<RecordingClock>,
    ended_at: Option<DateTime<Utc>>,
    duration: Option<Duration>,
    handle: Option<CaptureProcessHandle>,
}

impl Recording {
    /// Create an idle recording for `camera`, writing to
    /// `<output_dir>/<id>.<extension>`.
    pub fn new(id: RecordingId, camera: &Camera, output_dir: &Path, extension: &str) -> Self {
        Self {
            id,
            camera_number: camera.number,
            source_uri: camera.stream_uri.clone(),
            output_path: output_dir.join(format!("{id}.{extension}")),
            status: RecordingStatus::Idle,
            clock: None,
            ended_at: None,
            duration: None,
            handle: None,
        }
    }

    pub fn id(&self) -> RecordingId {
        self.id
    }

    pub fn status(&self) -> RecordingStatus {
        self.status
    }

    pub fn source_uri(&self) -> &str {
        &self.source_uri
    }

    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    /// Attach the started capture process and begin timing.
    pub fn mark_running(&mut self, handle: CaptureProcessHandle) {
        debug_assert_eq!(self.status, RecordingStatus::Idle);
        self.clock = Some(RecordingClock::start());
        self.handle = Some(handle);
        self.status = RecordingStatus::Running;
    }

    /// Take the capture process out for stopping.
    ///
    /// Only one caller can claim a running recording; everyone else gets
    /// `NotRunning`. The recording stays `Running` until [`finish`] is
    /// called.
    ///
    /// [`finish`]: Recording::finish
    pub fn claim_stop(&mut self) -> CameramanResult<(CaptureProcessHandle, Duration)> {
        if self.status != RecordingStatus::Running {
            return Err(CameramanError::not_running(self.id));
        }
        let handle = self
            .handle
            .take()
            .ok_or_else(|| CameramanError::not_running(self.id))?;
        Ok((handle, self.elapsed().unwrap_or_default()))
    }

    /// Whether a stop has been claimed but not finished yet.
    pub fn is_stopping(&self) -> bool {
        self.status == RecordingStatus::Running && self.handle.is_none()
    }

    /// Transition to `Stopped`. No-op if already stopped.
    pub fn finish(&mut self) {
        if self.status == RecordingStatus::Stopped {
            return;
        }
        self.duration = Some(self.elapsed().unwrap_or_default());
        self.ended_at = Some(Utc::now());
        self.status = RecordingStatus::Stopped;
        self.handle = None;
    }

    /// Running time so far, or total length once stopped.
    pub fn elapsed(&self) -> Option<Duration> {
        match self.status {
            RecordingStatus::Idle => None,
            RecordingStatus::Running => self.clock.map(|c| c.elapsed()),
            RecordingStatus::Stopped => self.duration,
        }
    }

    pub fn snapshot(&self) -> RecordingSnapshot {
        RecordingSnapshot {
            id: self.id,
            camera_number: self.camera_number,
            source_uri: self.source_uri.clone(),
            output_path: self.output_path.clone(),
            status: self.status,
            started_at: self.clock.map(|c| c.epoch_wall()),
            ended_at: self.ended_at,
            duration_secs: self.elapsed().map(|d| d.as_secs_f64()),
        }
    }
}

/// Read-only copy of a recording handed out by the ledger.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordingSnapshot {
    pub id: RecordingId,
    pub camera_number: u32,
    pub source_uri: String,
    pub output_path: PathBuf,
    pub status: RecordingStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub duration_secs: Option<f64>,
}

impl RecordingSnapshot {
    /// `ended_at` is set iff stopped; `started_at` iff running or stopped.
    pub fn timestamps_consistent(&self) -> bool {
        let started_ok =
            self.started_at.is_some() == matches!(self.status, RecordingStatus::Running | RecordingStatus::Stopped);
        let ended_ok = self.ended_at.is_some() == (self.status == RecordingStatus::Stopped);
        started_ok && ended_ok
    }
}
