//! Response bodies.

use cameraman_capture_engine::{CameraStatus, RecordingSnapshot};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Response to a successful start.
#[derive(Debug, Serialize)]
pub struct StartRecordResponse {
    /// HTTP status code, repeated in the body.
    pub status: u16,
    pub details: String,
    pub record_id: String,
}

/// Response to a successful stop.
#[derive(Debug, Serialize)]
pub struct StopRecordResponse {
    pub status: u16,
    pub details: String,
    /// Path of the finished artifact.
    pub filename: String,
}

#[derive(Debug, Serialize)]
pub struct CameraModel {
    pub number: u32,
    pub host: String,
    pub is_up: bool,
}

impl From<CameraStatus> for CameraModel {
    fn from(status: CameraStatus) -> Self {
        Self {
            number: status.number,
            host: status.address,
            is_up: status.is_up,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CameraList {
    pub status: u16,
    pub details: String,
    pub cameras: Vec<CameraModel>,
}

#[derive(Debug, Serialize)]
pub struct RecordData {
    pub record_id: String,
    pub camera_number: u32,
    pub filename: String,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
}

impl From<RecordingSnapshot> for RecordData {
    fn from(snapshot: RecordingSnapshot) -> Self {
        Self {
            record_id: snapshot.id.to_string(),
            camera_number: snapshot.camera_number,
            filename: snapshot.output_path.display().to_string(),
            start_time: snapshot.started_at,
            end_time: snapshot.ended_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RecordList {
    pub status: u16,
    pub details: String,
    pub ongoing_records: Vec<RecordData>,
    pub ended_records: Vec<RecordData>,
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}
