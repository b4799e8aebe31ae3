//! Assembly of per-frame tensors into a fixed-length model input

use crate::preprocess::FramePreprocessor;
use deepfake_common::{ProcessingError, RawFrame, Result};
use deepfake_face_detection::FaceLocalizer;
use ndarray::{s, Array3, Array5, ArrayView3, Axis};
use tracing::debug;

/// Model input of shape `(1, N, 3, H, W)`
#[derive(Debug, Clone, PartialEq)]
pub struct FrameSequence {
    tensor: Array5<f32>,
}

impl FrameSequence {
    /// Stack `tensors` under a batch dimension of 1.
    ///
    /// # Errors
    ///
    /// Returns `EmptySequence` for no tensors and `InvalidConfig` when shapes differ
    pub fn from_tensors(tensors: &[Array3<f32>]) -> Result<Self> {
        let first = tensors.first().ok_or(ProcessingError::EmptySequence)?;
        let (c, h, w) = first.dim();

        let mut tensor = Array5::zeros((1, tensors.len(), c, h, w));
        for (i, t) in tensors.iter().enumerate() {
            if t.dim() != (c, h, w) {
                return Err(ProcessingError::InvalidConfig(format!(
                    "frame {i} has shape {:?}, expected {:?}",
                    t.dim(),
                    (c, h, w)
                )));
            }
            tensor.slice_mut(s![0, i, .., .., ..]).assign(t);
        }

        Ok(Self { tensor })
    }

    /// Number of frames (N)
    #[must_use]
    pub fn len(&self) -> usize {
        self.tensor.len_of(Axis(1))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Tensor of frame `index`
    #[must_use]
    pub fn frame(&self, index: usize) -> ArrayView3<'_, f32> {
        self.tensor.slice(s![0, index, .., .., ..])
    }

    #[must_use]
    pub fn as_array(&self) -> &Array5<f32> {
        &self.tensor
    }

    #[must_use]
    pub fn into_array(self) -> Array5<f32> {
        self.tensor
    }
}

/// Localize and preprocess up to `sequence_length` frames, then pad or truncate
/// to exactly `sequence_length`.
///
/// Short sequences are padded by repeating the last tensor. A frame without a
/// detected face is used whole.
///
/// # Errors
///
/// Returns `EmptySequence` if `frames` yields nothing, and `InvalidConfig` for
/// a zero `sequence_length`.
pub fn assemble_sequence<I>(
    frames: I,
    sequence_length: usize,
    localizer: &FaceLocalizer,
    preprocessor: &FramePreprocessor,
) -> Result<FrameSequence>
where
    I: IntoIterator<Item = RawFrame>,
{
    if sequence_length == 0 {
        return Err(ProcessingError::InvalidConfig(
            "sequence_length must be at least 1".to_string(),
        ));
    }

    let mut tensors = Vec::with_capacity(sequence_length);
    let mut faces = 0usize;

    for frame in frames.into_iter().take(sequence_length) {
        let region = localizer.locate(&frame);
        if region.is_some() {
            faces += 1;
        }
        tensors.push(preprocessor.preprocess(&frame, region));
    }

    let produced = tensors.len();
    let last = tensors.last().cloned().ok_or(ProcessingError::EmptySequence)?;

    tensors.truncate(sequence_length);
    tensors.resize(sequence_length, last);

    debug!(
        "Assembled {} frames ({} decoded, {} with a face)",
        sequence_length, produced, faces
    );

    FrameSequence::from_tensors(&tensors)
}
