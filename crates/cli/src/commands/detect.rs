//! Offline detection on local files

use super::ChannelOrderArg;
use anyhow::{Context as _, Result};
use clap::Args;
use deepfake_face_detection::{FaceDetectionConfig, FaceLocalizer};
use deepfake_pipeline::{round2, DetectionPipeline, OnnxClassifier, PipelineConfig};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

#[derive(Args)]
pub struct DetectCommand {
    /// Video files to classify
    #[arg(value_name = "FILE", required = true)]
    inputs: Vec<PathBuf>,

    /// Sequence classifier (ONNX)
    #[arg(long, env = "MODEL_PATH", default_value = "model/df_model.onnx")]
    model_path: PathBuf,

    /// Haar cascade used for face localization
    #[arg(
        long,
        env = "FACE_CASCADE_PATH",
        default_value = "model/haarcascade_frontalface_default.xml"
    )]
    cascade_path: PathBuf,

    /// Frames per video fed to the classifier
    #[arg(long, default_value_t = 20, value_parser = clap::value_parser!(u32).range(1..))]
    sequence_length: u32,

    /// Channel order the classifier was trained on
    #[arg(long, value_enum, default_value = "bgr")]
    channel_order: ChannelOrderArg,

    /// ONNX Runtime intra-op threads (default: physical cores)
    #[arg(long)]
    threads: Option<usize>,

    /// Pretty-print JSON
    #[arg(long)]
    pretty: bool,
}

/// One line of output per input file
#[derive(Serialize)]
struct FileReport {
    file: String,
    #[serde(flatten)]
    outcome: Outcome,
}

#[derive(Serialize)]
#[serde(untagged)]
enum Outcome {
    Detected {
        output: String,
        confidence: f64,
        processing_time: f64,
    },
    Failed {
        error: String,
    },
}

impl DetectCommand {
    pub fn execute(self) -> Result<()> {
        let localizer = FaceLocalizer::from_file(&self.cascade_path, FaceDetectionConfig::default())
            .with_context(|| format!("Failed to load face cascade {}", self.cascade_path.display()))?;
        let classifier = OnnxClassifier::load(&self.model_path, self.threads)
            .with_context(|| format!("Failed to load classifier {}", self.model_path.display()))?;

        let config = PipelineConfig {
            sequence_length: self.sequence_length as usize,
            channel_order: self.channel_order.into(),
            ..PipelineConfig::default()
        };
        let pipeline = DetectionPipeline::new(localizer, Arc::new(classifier), config)?;

        info!("Classifying {} file(s)", self.inputs.len());
        let mut failures = 0usize;

        for input in &self.inputs {
            let outcome = match pipeline.detect(input) {
                Ok(detection) => Outcome::Detected {
                    output: detection.prediction.label.to_string(),
                    confidence: round2(detection.prediction.confidence_percent),
                    processing_time: round2(detection.processing_time.as_secs_f64()),
                },
                Err(e) => {
                    error!("{}: {}", input.display(), e);
                    failures += 1;
                    Outcome::Failed {
                        error: format!("Error processing video: {e}"),
                    }
                }
            };

            let report = FileReport {
                file: input.display().to_string(),
                outcome,
            };
            let json = if self.pretty {
                serde_json::to_string_pretty(&report)?
            } else {
                serde_json::to_string(&report)?
            };
            println!("{json}");
        }

        if failures > 0 {
            anyhow::bail!("{failures} of {} file(s) failed", self.inputs.len());
        }
        Ok(())
    }
}
