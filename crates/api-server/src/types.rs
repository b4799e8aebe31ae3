//! API request and response types

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

/// Liveness response for `GET /`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub message: String,
}

/// Successful detection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectResponse {
    /// "FAKE" or "REAL"
    pub output: String,
    /// Confidence of the label in percent, 2 decimal places
    pub confidence: f64,
    /// Seconds spent decoding and classifying, 2 decimal places
    pub processing_time: f64,
}

/// Body of every error response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Request failures and the status they map to
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("No video file uploaded")]
    MissingVideo,

    #[error("No video file selected")]
    EmptyFilename,

    #[error("Invalid file format. Please upload MP4, AVI, or MOV")]
    InvalidFormat,

    #[error("File exceeds the maximum upload size of {limit_mb} MiB")]
    PayloadTooLarge { limit_mb: usize },

    #[error("Malformed upload: {0}")]
    BadUpload(String),

    #[error("Error processing video: {0}")]
    Processing(String),
}

impl ApiError {
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::MissingVideo
            | ApiError::EmptyFilename
            | ApiError::InvalidFormat
            | ApiError::BadUpload(_) => StatusCode::BAD_REQUEST,
            ApiError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::Processing(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        // Server errors are logged with full detail where they occur
        let status = self.status();
        if !status.is_server_error() {
            warn!("Rejected request ({}): {}", status.as_u16(), self);
        }

        (
            status,
            Json(ErrorResponse {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}
