//! Sequence classifier backed by ONNX Runtime
//!
//! The model takes one `(1, N, 3, H, W)` float tensor and returns two class
//! logits. A session is loaded once and shared; `Session::run` needs exclusive
//! access, so runs are serialized behind a mutex.

use crate::sequence::FrameSequence;
use deepfake_common::ProcessingError;
use ort::execution_providers::CPUExecutionProvider;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::TensorRef;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info};

/// Output name preferred when the model exports more than one tensor
pub const LOGITS_OUTPUT: &str = "logits";

/// Errors that can occur while loading or running the classifier
#[derive(Error, Debug)]
pub enum InferenceError {
    #[error("Model file not found: {0}")]
    ModelNotFound(String),

    #[error("Failed to create session builder: {0}")]
    SessionBuilderError(String),

    #[error("Failed to load ONNX model from {path}: {error}")]
    ModelLoadError { path: String, error: String },

    #[error("ONNX Runtime error: {0}")]
    OrtError(#[from] ort::Error),

    #[error("Model has no outputs")]
    NoOutputs,

    #[error("Invalid model output shape: expected 2 class scores, got {0:?}")]
    InvalidOutputShape(Vec<i64>),

    #[error("Classifier returned non-finite scores: {0:?}")]
    NonFiniteOutput(Vec<f32>),

    #[error("Classifier session lock poisoned")]
    SessionPoisoned,
}

impl From<InferenceError> for ProcessingError {
    fn from(err: InferenceError) -> Self {
        ProcessingError::Inference(err.to_string())
    }
}

/// Anything that maps a frame sequence to two class logits (FAKE, REAL)
pub trait Classifier: Send + Sync {
    /// # Errors
    ///
    /// Returns an error if the model cannot be run on `sequence`
    fn classify(&self, sequence: &FrameSequence) -> Result<[f32; 2], InferenceError>;
}

/// CPU ONNX Runtime classifier
pub struct OnnxClassifier {
    session: Mutex<Session>,
    output_name: String,
    model_path: PathBuf,
}

impl OnnxClassifier {
    /// Load a model with `threads` intra-op threads (physical core count when `None`)
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing, cannot be parsed, or exports no outputs
    pub fn load<P: AsRef<Path>>(model_path: P, threads: Option<usize>) -> Result<Self, InferenceError> {
        let model_path = model_path.as_ref();
        if !model_path.exists() {
            return Err(InferenceError::ModelNotFound(model_path.display().to_string()));
        }

        let num_threads = threads.unwrap_or_else(num_cpus::get_physical).max(1);
        info!(
            "Loading classifier from {} ({} intra-op threads)",
            model_path.display(),
            num_threads
        );
        let start = Instant::now();

        let session = Session::builder()
            .map_err(|e| InferenceError::SessionBuilderError(e.to_string()))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| InferenceError::SessionBuilderError(e.to_string()))?
            .with_intra_threads(num_threads)
            .map_err(|e| InferenceError::SessionBuilderError(e.to_string()))?
            .with_memory_pattern(true)
            .map_err(|e| InferenceError::SessionBuilderError(e.to_string()))?
            .with_execution_providers([CPUExecutionProvider::default().build()])
            .map_err(|e| InferenceError::SessionBuilderError(e.to_string()))?
            .commit_from_file(model_path)
            .map_err(|e| InferenceError::ModelLoadError {
                path: model_path.display().to_string(),
                error: e.to_string(),
            })?;

        let output_name = select_output(session.outputs.iter().map(|o| o.name.as_str()))
            .ok_or(InferenceError::NoOutputs)?
            .to_string();

        info!(
            "Classifier loaded in {:.3}s, reading output '{}'",
            start.elapsed().as_secs_f64(),
            output_name
        );

        Ok(Self {
            session: Mutex::new(session),
            output_name,
            model_path: model_path.to_path_buf(),
        })
    }

    #[must_use]
    pub fn model_path(&self) -> &Path {
        &self.model_path
    }
}

impl Classifier for OnnxClassifier {
    fn classify(&self, sequence: &FrameSequence) -> Result<[f32; 2], InferenceError> {
        let input_tensor = TensorRef::from_array_view(sequence.as_array().view())?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| InferenceError::SessionPoisoned)?;

        let start = Instant::now();
        let outputs = session.run(ort::inputs![input_tensor])?;
        let (shape, scores) = outputs[self.output_name.as_str()].try_extract_tensor::<f32>()?;

        debug!(
            "Inference on {} frames took {:.3}s",
            sequence.len(),
            start.elapsed().as_secs_f64()
        );

        let logits = logits_pair(scores)
            .ok_or_else(|| InferenceError::InvalidOutputShape(shape.to_vec()))?;
        check_finite(logits)
    }
}

/// `logits` when exported, otherwise the last output
fn select_output<'a>(names: impl Iterator<Item = &'a str>) -> Option<&'a str> {
    let mut last = None;
    for name in names {
        if name == LOGITS_OUTPUT {
            return Some(name);
        }
        last = Some(name);
    }
    last
}

fn logits_pair(scores: &[f32]) -> Option<[f32; 2]> {
    match scores {
        [fake, real] => Some([*fake, *real]),
        _ => None,
    }
}

/// Reject NaN or infinite class scores
///
/// # Errors
///
/// Returns `NonFiniteOutput` if either score is not finite
pub fn check_finite(logits: [f32; 2]) -> Result<[f32; 2], InferenceError> {
    if logits.iter().all(|l| l.is_finite()) {
        Ok(logits)
    } else {
        Err(InferenceError::NonFiniteOutput(logits.to_vec()))
    }
}
