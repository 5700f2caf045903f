//! Error types shared across Cameraman crates.

use std::path::PathBuf;

/// Top-level error type for Cameraman operations.
#[derive(Debug, thiserror::Error)]
pub enum CameramanError {
    #[error("No such camera: {number}")]
    UnknownCamera { number: String },

    #[error("Camera no.{number} at {address} is unreachable")]
    CameraUnreachable { number: u32, address: String },

    #[error("Failed to spawn capture process: {message}")]
    Spawn { message: String },

    #[error("No such recording: {id}")]
    UnknownRecording { id: String },

    #[error("Recording {id} is not currently ongoing thus cannot be stopped")]
    NotRunning { id: String },

    #[error("Failed to tear down capture process: {message}")]
    Teardown { message: String },

    #[error("Recording {id} is already tracked")]
    DuplicateId { id: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Output directory unusable: {path}")]
    OutputDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using CameramanError.
pub type CameramanResult<T> = Result<T, CameramanError>;

impl CameramanError {
    pub fn spawn(msg: impl Into<String>) -> Self {
        Self::Spawn {
            message: msg.into(),
        }
    }

    pub fn teardown(msg: impl Into<String>) -> Self {
        Self::Teardown {
            message: msg.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    pub fn unknown_camera(number: impl ToString) -> Self {
        Self::UnknownCamera {
            number: number.to_string(),
        }
    }

    pub fn unknown_recording(id: impl ToString) -> Self {
        Self::UnknownRecording { id: id.to_string() }
    }

    pub fn not_running(id: impl ToString) -> Self {
        Self::NotRunning { id: id.to_string() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_subject() {
        let err = CameramanError::CameraUnreachable {
            number: 222,
            address: "10.0.0.2:554".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Camera no.222 at 10.0.0.2:554 is unreachable"
        );
        assert_eq!(
            CameramanError::not_running("abc").to_string(),
            "Recording abc is not currently ongoing thus cannot be stopped"
        );
    }
}
