//! API Error Rendering

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use cameraman_common::error::CameramanError;

/// Error returned by request handlers.
#[derive(Debug, thiserror::Error)]
#[error(transparent)]
pub struct ApiError(#[from] pub CameramanError);

impl ApiError {
    /// HTTP status and machine-readable code for this error.
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match &self.0 {
            CameramanError::UnknownCamera { .. } => (StatusCode::NOT_FOUND, "UNKNOWN_CAMERA"),
            CameramanError::CameraUnreachable { .. } => {
                (StatusCode::SERVICE_UNAVAILABLE, "CAMERA_UNREACHABLE")
            }
            CameramanError::Spawn { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "SPAWN_FAILED"),
            CameramanError::UnknownRecording { .. } => {
                (StatusCode::NOT_FOUND, "UNKNOWN_RECORDING")
            }
            CameramanError::NotRunning { .. } => (StatusCode::CONFLICT, "NOT_RUNNING"),
            CameramanError::Teardown { .. } => {
                (StatusCode::INTERNAL_SERVER_ERROR, "TEARDOWN_FAILED")
            }
            CameramanError::DuplicateId { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "DUPLICATE_ID"),
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        let message = match code {
            "INTERNAL_ERROR" => {
                tracing::error!(error = %self.0, "Internal error while handling request");
                "Internal server error".to_string()
            }
            _ => self.0.to_string(),
        };

        let body = Json(serde_json::json!({
            "error": message,
            "code": code,
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mapping() {
        let cases = [
            (CameramanError::unknown_camera(5), 404, "UNKNOWN_CAMERA"),
            (
                CameramanError::CameraUnreachable {
                    number: 5,
                    address: "h:1".to_string(),
                },
                503,
                "CAMERA_UNREACHABLE",
            ),
            (CameramanError::spawn("x"), 500, "SPAWN_FAILED"),
            (CameramanError::unknown_recording("x"), 404, "UNKNOWN_RECORDING"),
            (CameramanError::not_running("x"), 409, "NOT_RUNNING"),
            (CameramanError::teardown("x"), 500, "TEARDOWN_FAILED"),
            (CameramanError::config("x"), 500, "INTERNAL_ERROR"),
        ];
        for (err, status, code) in cases {
            let (s, c) = ApiError(err).status_and_code();
            assert_eq!((s.as_u16(), c), (status, code));
        }
    }
}
