//! Server configuration from flags and environment

use clap::Parser;
use deepfake_pipeline::PipelineConfig;
use std::path::PathBuf;

/// Deepfake detection HTTP server
#[derive(Debug, Clone, Parser)]
#[command(name = "deepfake-api-server", version)]
pub struct ServerConfig {
    /// Address to bind
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on
    #[arg(long, env = "PORT", default_value_t = 5000)]
    pub port: u16,

    /// Sequence classifier (ONNX)
    #[arg(long, env = "MODEL_PATH", default_value = "model/df_model.onnx")]
    pub model_path: PathBuf,

    /// Haar cascade used for face localization (OpenCV XML)
    #[arg(
        long,
        env = "FACE_CASCADE_PATH",
        default_value = "model/haarcascade_frontalface_default.xml"
    )]
    pub cascade_path: PathBuf,

    /// Directory uploads are staged in (created on startup)
    #[arg(long, env = "UPLOAD_DIR", default_value = "Uploaded_Files")]
    pub upload_dir: PathBuf,

    /// Frames per video fed to the classifier
    #[arg(long, env = "SEQUENCE_LENGTH", default_value_t = 20, value_parser = parse_sequence_length)]
    pub sequence_length: usize,

    /// Maximum request body size in MiB
    #[arg(long, env = "MAX_UPLOAD_MB", default_value_t = 500)]
    pub max_upload_mb: usize,

    /// ONNX Runtime intra-op threads (default: physical cores)
    #[arg(long, env = "INFERENCE_THREADS")]
    pub inference_threads: Option<usize>,
}

fn parse_sequence_length(value: &str) -> Result<usize, String> {
    match value.parse::<usize>() {
        Ok(n) if n >= 1 => Ok(n),
        Ok(_) => Err("sequence length must be at least 1".to_string()),
        Err(e) => Err(e.to_string()),
    }
}

impl ServerConfig {
    #[must_use]
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    #[must_use]
    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_mb.saturating_mul(1024 * 1024)
    }

    #[must_use]
    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            sequence_length: self.sequence_length,
            ..PipelineConfig::default()
        }
    }
}
