//! REST API server for video deepfake detection
//!
//! - `GET /` liveness message
//! - `POST /detect` multipart upload (field `video`), answered with a FAKE/REAL
//!   label, confidence and processing time

pub mod config;
mod handlers;
pub mod staging;
mod types;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use deepfake_pipeline::DetectionPipeline;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub use config::ServerConfig;
pub use handlers::*;
pub use types::*;

/// Default request body limit (500 MiB)
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 500 * 1024 * 1024;

/// API server state shared across handlers
#[derive(Clone)]
pub struct ApiState {
    /// Detection pipeline, loaded once at startup
    pub pipeline: Arc<DetectionPipeline>,
    /// Root of the per-request staging directories
    pub upload_dir: PathBuf,
    /// Request body limit enforced before the handler reads the upload
    pub max_upload_bytes: usize,
}

impl ApiState {
    /// Create new API state
    #[must_use]
    pub fn new(pipeline: DetectionPipeline, upload_dir: impl Into<PathBuf>) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            upload_dir: upload_dir.into(),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }

    #[must_use]
    pub fn with_max_upload_bytes(mut self, max_upload_bytes: usize) -> Self {
        self.max_upload_bytes = max_upload_bytes;
        self
    }
}

/// Build the API router with all endpoints
pub fn build_router(state: ApiState) -> Router {
    let body_limit = DefaultBodyLimit::max(state.max_upload_bytes);

    Router::new()
        .route("/", get(root))
        .route("/detect", post(detect))
        // Middleware
        .layer(body_limit)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Serve the API on an already bound listener
pub async fn serve(listener: TcpListener, state: ApiState) -> Result<(), std::io::Error> {
    axum::serve(listener, build_router(state)).await
}

/// Start the API server
pub async fn start_server(addr: &str, state: ApiState) -> Result<(), std::io::Error> {
    tracing::info!("Starting API server on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    serve(listener, state).await
}
