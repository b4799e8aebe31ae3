//! API Server Binary Entry Point

use anyhow::Context;
use clap::Parser;
use deepfake_api_server::{start_server, ApiState, ServerConfig};
use deepfake_face_detection::{FaceDetectionConfig, FaceLocalizer};
use deepfake_pipeline::{DetectionPipeline, OnnxClassifier};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Load both models and prepare the upload directory; any failure aborts startup
fn load_state(config: &ServerConfig) -> anyhow::Result<ApiState> {
    let localizer = FaceLocalizer::from_file(&config.cascade_path, FaceDetectionConfig::default())
        .with_context(|| format!("Failed to load face cascade {}", config.cascade_path.display()))?;

    let classifier = OnnxClassifier::load(&config.model_path, config.inference_threads)
        .with_context(|| format!("Failed to load classifier {}", config.model_path.display()))?;

    let pipeline = DetectionPipeline::new(localizer, Arc::new(classifier), config.pipeline_config())
        .context("Invalid pipeline configuration")?;

    std::fs::create_dir_all(&config.upload_dir).with_context(|| {
        format!("Failed to create upload directory {}", config.upload_dir.display())
    })?;

    Ok(ApiState::new(pipeline, config.upload_dir.clone())
        .with_max_upload_bytes(config.max_upload_bytes()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "deepfake_api_server=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::parse();
    tracing::info!(
        "Starting Deepfake Detection API Server (sequence length {}, upload limit {} MiB)",
        config.sequence_length,
        config.max_upload_mb
    );

    let state = load_state(&config).map_err(|e| {
        tracing::error!("Startup failed: {:#}", e);
        e
    })?;

    start_server(&config.bind_addr(), state).await?;

    Ok(())
}
