//! HTTP request handlers for API endpoints

use axum::{
    extract::{multipart::MultipartError, rejection::MultipartRejection, Multipart, State},
    http::StatusCode,
    Json,
};
use deepfake_pipeline::round2;
use tokio::io::AsyncWriteExt;
use tracing::{error, info};

use crate::{
    staging::{has_allowed_extension, StagedVideo},
    types::{ApiError, DetectResponse, StatusResponse},
    ApiState,
};

/// Form field carrying the upload
pub const VIDEO_FIELD: &str = "video";

/// Liveness check
pub async fn root() -> Json<StatusResponse> {
    Json(StatusResponse {
        message: "Deepfake Detection API is running".to_string(),
    })
}

/// Classify an uploaded video as FAKE or REAL
///
/// Expects a multipart body with the file in the `video` field. The upload is
/// staged, run through the pipeline on a blocking worker, and deleted before
/// the response is sent.
pub async fn detect(
    State(state): State<ApiState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<DetectResponse>, ApiError> {
    // A body that is not multipart at all carries no video field either
    let mut multipart = multipart.map_err(|e| {
        info!("Request without multipart body: {}", e);
        ApiError::MissingVideo
    })?;

    let staged = stage_upload(&state, &mut multipart).await?;
    info!("Processing upload {}", staged.path().display());

    let pipeline = state.pipeline.clone();
    let outcome = tokio::task::spawn_blocking(move || {
        let result = pipeline.detect(staged.path());
        let cleanup = staged.remove();
        (result, cleanup)
    })
    .await;

    let (result, cleanup) = outcome.map_err(|e| {
        error!("Processing task failed: {}", e);
        ApiError::Processing("processing task failed".to_string())
    })?;
    if let Err(e) = cleanup {
        error!("Failed to remove staged upload: {}", e);
    }

    match result {
        Ok(detection) => Ok(Json(DetectResponse {
            output: detection.prediction.label.to_string(),
            confidence: round2(detection.prediction.confidence_percent),
            processing_time: round2(detection.processing_time.as_secs_f64()),
        })),
        Err(e) => {
            error!("Pipeline error: {:?}", e);
            Err(ApiError::Processing(e.to_string()))
        }
    }
}

/// Find the `video` field, validate its filename and stream it to disk
async fn stage_upload(state: &ApiState, multipart: &mut Multipart) -> Result<StagedVideo, ApiError> {
    let limit_mb = state.max_upload_bytes / (1024 * 1024);

    loop {
        let Some(mut field) = multipart
            .next_field()
            .await
            .map_err(|e| multipart_error(&e, limit_mb))?
        else {
            return Err(ApiError::MissingVideo);
        };

        if field.name() != Some(VIDEO_FIELD) {
            continue;
        }

        // A plain form value named `video` is not a file upload
        let filename = field.file_name().ok_or(ApiError::MissingVideo)?.to_string();
        if filename.is_empty() {
            return Err(ApiError::EmptyFilename);
        }
        if !has_allowed_extension(&filename) {
            return Err(ApiError::InvalidFormat);
        }

        let (staged, mut file) = StagedVideo::create(&state.upload_dir, &filename)
            .await
            .map_err(staging_error)?;

        let mut written = 0usize;
        while let Some(chunk) = field
            .chunk()
            .await
            .map_err(|e| multipart_error(&e, limit_mb))?
        {
            file.write_all(&chunk).await.map_err(staging_error)?;
            written += chunk.len();
        }
        file.flush().await.map_err(staging_error)?;

        info!("Received {} ({} bytes)", filename, written);
        return Ok(staged);
    }
}

fn staging_error(err: std::io::Error) -> ApiError {
    error!("Failed to stage upload: {:?}", err);
    ApiError::Processing(format!("failed to stage upload: {err}"))
}

fn multipart_error(err: &MultipartError, limit_mb: usize) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge { limit_mb }
    } else {
        ApiError::BadUpload(err.body_text())
    }
}
