//! Video deepfake detection pipeline
//!
//! Frame sampling, face localization, preprocessing, sequence assembly,
//! classification and post-processing for a single video file.
//!
//! # Example
//! ```no_run
//! use deepfake_face_detection::{FaceDetectionConfig, FaceLocalizer};
//! use deepfake_pipeline::{DetectionPipeline, OnnxClassifier, PipelineConfig};
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let localizer = FaceLocalizer::from_file(
//!     "model/haarcascade_frontalface_default.xml",
//!     FaceDetectionConfig::default(),
//! )?;
//! let classifier = Arc::new(OnnxClassifier::load("model/df_model.onnx", None)?);
//! let pipeline = DetectionPipeline::new(localizer, classifier, PipelineConfig::default())?;
//!
//! let detection = pipeline.detect(Path::new("clip.mp4"))?;
//! println!(
//!     "{} ({:.2}%) in {:.2}s",
//!     detection.prediction.label,
//!     detection.prediction.confidence_percent,
//!     detection.processing_time.as_secs_f64()
//! );
//! # Ok(())
//! # }
//! ```

pub mod inference;
pub mod prediction;
pub mod preprocess;
pub mod sequence;

pub use inference::{check_finite, Classifier, InferenceError, OnnxClassifier};
pub use prediction::{predict, round2, Label, PredictionResult};
pub use preprocess::{FramePreprocessor, PreprocessConfig};
pub use sequence::{assemble_sequence, FrameSequence};

use deepfake_common::{ChannelOrder, ProcessingError, Result};
use deepfake_face_detection::FaceLocalizer;
use deepfake_video_decoder::{FrameSampler, SamplerConfig};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Frames per classification (N)
    pub sequence_length: usize,
    /// Channel order requested from the decoder
    pub channel_order: ChannelOrder,
    pub preprocess: PreprocessConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            sequence_length: 20,
            channel_order: ChannelOrder::Bgr,
            preprocess: PreprocessConfig::default(),
        }
    }
}

/// Result of running the pipeline on one video
#[derive(Debug, Clone, Copy)]
pub struct Detection {
    pub prediction: PredictionResult,
    /// From just before assembly to just after the label is computed
    pub processing_time: Duration,
}

/// Shared, thread-safe detection pipeline.
///
/// The face localizer is immutable and the classifier serializes its own runs,
/// so one instance serves every request.
pub struct DetectionPipeline {
    localizer: FaceLocalizer,
    preprocessor: FramePreprocessor,
    classifier: Arc<dyn Classifier>,
    config: PipelineConfig,
}

impl DetectionPipeline {
    /// # Errors
    ///
    /// Returns `InvalidConfig` for a zero sequence length or invalid preprocessing settings
    pub fn new(
        localizer: FaceLocalizer,
        classifier: Arc<dyn Classifier>,
        config: PipelineConfig,
    ) -> Result<Self> {
        if config.sequence_length == 0 {
            return Err(ProcessingError::InvalidConfig(
                "sequence_length must be at least 1".to_string(),
            ));
        }
        let preprocessor = FramePreprocessor::new(config.preprocess.clone())?;

        Ok(Self {
            localizer,
            preprocessor,
            classifier,
            config,
        })
    }

    #[must_use]
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    fn sampler_config(&self) -> SamplerConfig {
        SamplerConfig {
            max_frames: self.config.sequence_length,
            channel_order: self.config.channel_order,
        }
    }

    /// Decode and assemble the model input for `video_path`
    ///
    /// # Errors
    ///
    /// Returns `Decode`/`NoVideoStream` if the file is not a readable video and
    /// `EmptySequence` if it has no decodable frames
    pub fn assemble(&self, video_path: &Path) -> Result<FrameSequence> {
        let sampler = FrameSampler::open(video_path, &self.sampler_config())?;
        assemble_sequence(
            sampler,
            self.config.sequence_length,
            &self.localizer,
            &self.preprocessor,
        )
    }

    /// Classify one video
    ///
    /// # Errors
    ///
    /// Returns an error if the video cannot be decoded, has no frames, or
    /// inference fails or yields non-finite scores
    pub fn detect(&self, video_path: &Path) -> Result<Detection> {
        let start = Instant::now();

        let sequence = self.assemble(video_path)?;
        debug!("Sequence shape {:?}", sequence.as_array().shape());

        let logits = check_finite(self.classifier.classify(&sequence)?)?;
        let prediction = predict(logits);
        let processing_time = start.elapsed();

        info!(
            "{}: {} ({:.2}%) in {:.2}s",
            video_path.display(),
            prediction.label,
            prediction.confidence_percent,
            processing_time.as_secs_f64()
        );

        Ok(Detection {
            prediction,
            processing_time,
        })
    }
}
