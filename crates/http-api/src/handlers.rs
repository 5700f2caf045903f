//! Request handlers.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use cameraman_capture_engine::RecordingId;
use cameraman_common::error::CameramanError;

use crate::auth::Identity;
use crate::error::ApiError;
use crate::models::{
    CameraList, CameraModel, HealthResponse, RecordData, RecordList, StartRecordResponse,
    StopRecordResponse,
};
use crate::AppState;

const OK: u16 = StatusCode::OK.as_u16();

/// POST /camera/{number}/start
pub async fn start_recording(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(camera): Path<String>,
) -> Result<Json<StartRecordResponse>, ApiError> {
    let camera_number: u32 = camera
        .parse()
        .map_err(|_| CameramanError::unknown_camera(&camera))?;
    let id = state.manager.start_recording(camera_number).await?;

    let details = format!("Started recording video for recording {id}");
    tracing::info!(identity = %identity.name, recording_id = %id, camera = camera_number, "{details}");

    Ok(Json(StartRecordResponse {
        status: OK,
        details,
        record_id: id.to_string(),
    }))
}

/// POST /record/{id}/stop
pub async fn stop_recording(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(record_id): Path<String>,
) -> Result<Json<StopRecordResponse>, ApiError> {
    let id: RecordingId = record_id.parse()?;
    let path = state.manager.stop_recording(id).await?;

    let details = format!("Stopped recording video for recording {id}");
    tracing::info!(identity = %identity.name, recording_id = %id, "{details}");

    Ok(Json(StopRecordResponse {
        status: OK,
        details,
        filename: path.display().to_string(),
    }))
}

/// GET /cameras
pub async fn list_cameras(State(state): State<AppState>) -> Json<CameraList> {
    let cameras: Vec<CameraModel> = state
        .manager
        .list_cameras()
        .await
        .into_iter()
        .map(CameraModel::from)
        .collect();

    let details = format!("Collected {} cameras", cameras.len());
    tracing::debug!("{details}");

    Json(CameraList {
        status: OK,
        details,
        cameras,
    })
}

/// GET /records
pub async fn list_records(State(state): State<AppState>) -> Json<RecordList> {
    let list = state.manager.list_recordings();
    let ongoing_records: Vec<RecordData> = list.ongoing.into_iter().map(RecordData::from).collect();
    let ended_records: Vec<RecordData> = list.ended.into_iter().map(RecordData::from).collect();

    let details = format!(
        "Collected {} ongoing and {} ended records",
        ongoing_records.len(),
        ended_records.len()
    );
    tracing::debug!("{details}");

    Json(RecordList {
        status: OK,
        details,
        ongoing_records,
        ended_records,
    })
}

/// GET /health
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}
