//! Face localization using a classical Haar cascade detector
//!
//! This module finds at most one face per frame. A boosted cascade of Haar
//! features (OpenCV XML format, e.g. `haarcascade_frontalface_default.xml`) is
//! slid over an image pyramid, raw hits are clustered, and clusters with too
//! few neighbors are discarded.
//!
//! Selection policy: the first cluster in scan order wins. There is no
//! re-ranking by size or score, and a frame with no face is not an error; the
//! caller falls back to the whole frame.
//!
//! # Example
//! ```no_run
//! use deepfake_face_detection::{FaceDetectionConfig, FaceLocalizer};
//! # fn run(frame: &deepfake_common::RawFrame) -> Result<(), Box<dyn std::error::Error>> {
//! let localizer = FaceLocalizer::from_file(
//!     "model/haarcascade_frontalface_default.xml",
//!     FaceDetectionConfig::default(),
//! )?;
//!
//! match localizer.locate(frame) {
//!     Some(face) => println!("Face at ({}, {}) {}x{}", face.x, face.y, face.width, face.height),
//!     None => println!("No face, using full frame"),
//! }
//! # Ok(())
//! # }
//! ```

pub mod cascade;
mod detector;
pub mod grouping;

pub use cascade::HaarCascade;

use deepfake_common::{FaceRegion, ProcessingError, RawFrame};
use image::{GrayImage, Luma};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};

/// Configuration for face localization
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaceDetectionConfig {
    /// Pyramid scale step between levels (> 1.0)
    pub scale_factor: f64,
    /// A cluster needs more than this many raw hits to count as a face
    pub min_neighbors: usize,
    /// Smallest face reported, in source pixels
    pub min_size: (u32, u32),
    /// Largest face reported, in source pixels (None = unbounded)
    pub max_size: Option<(u32, u32)>,
}

impl Default for FaceDetectionConfig {
    fn default() -> Self {
        Self {
            scale_factor: 1.1,
            min_neighbors: 5,
            min_size: (30, 30),
            max_size: None,
        }
    }
}

/// Errors that can occur while loading or configuring the detector
#[derive(Error, Debug)]
pub enum FaceDetectionError {
    #[error("Failed to load cascade from {path}: {error}")]
    ModelLoadError { path: String, error: String },

    #[error("Invalid cascade: {0}")]
    CascadeParse(String),

    #[error("Unsupported cascade: {0}")]
    UnsupportedCascade(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl From<FaceDetectionError> for ProcessingError {
    fn from(err: FaceDetectionError) -> Self {
        ProcessingError::FaceDetection(err.to_string())
    }
}

/// Haar cascade face localizer.
///
/// Detection takes `&self`; a single instance can be shared across threads.
#[derive(Debug, Clone)]
pub struct FaceLocalizer {
    cascade: HaarCascade,
    config: FaceDetectionConfig,
}

impl FaceLocalizer {
    /// Create a localizer from an already parsed cascade
    pub fn new(cascade: HaarCascade, config: FaceDetectionConfig) -> Result<Self, FaceDetectionError> {
        if !(config.scale_factor > 1.0) {
            return Err(FaceDetectionError::InvalidConfig(format!(
                "scale_factor must be greater than 1.0, got {}",
                config.scale_factor
            )));
        }
        Ok(Self { cascade, config })
    }

    /// Load a cascade XML file
    pub fn from_file<P: AsRef<Path>>(
        path: P,
        config: FaceDetectionConfig,
    ) -> Result<Self, FaceDetectionError> {
        let path = path.as_ref();
        info!("Loading face cascade from {}", path.display());

        let xml = std::fs::read_to_string(path).map_err(|e| FaceDetectionError::ModelLoadError {
            path: path.display().to_string(),
            error: e.to_string(),
        })?;
        let cascade = HaarCascade::from_xml(&xml)?;

        info!(
            "Face cascade loaded ({} stages, {}x{} window)",
            cascade.stage_count(),
            cascade.window_size().0,
            cascade.window_size().1
        );

        Self::new(cascade, config)
    }

    #[must_use]
    pub fn config(&self) -> &FaceDetectionConfig {
        &self.config
    }

    /// All face regions in scan order
    #[must_use]
    pub fn detect(&self, frame: &RawFrame) -> Vec<FaceRegion> {
        let gray = to_gray(frame);
        let hits = detector::scan(&self.cascade, &gray, &self.config);
        let faces = grouping::group_rectangles(&hits, self.config.min_neighbors, grouping::GROUP_EPS);

        debug!(
            "Frame {}: {} raw hits, {} faces",
            frame.frame_number,
            hits.len(),
            faces.len()
        );

        faces
    }

    /// The face region to crop, or `None` to use the full frame
    #[must_use]
    pub fn locate(&self, frame: &RawFrame) -> Option<FaceRegion> {
        self.detect(frame).into_iter().next()
    }
}

/// Luma plane of a frame, honoring its channel order
fn to_gray(frame: &RawFrame) -> GrayImage {
    let order = frame.channel_order;
    GrayImage::from_fn(frame.width(), frame.height(), |x, y| {
        Luma([order.luma(frame.image.get_pixel(x, y).0)])
    })
}
