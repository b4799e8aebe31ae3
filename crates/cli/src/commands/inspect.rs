//! Per-frame face localization report, no classifier needed

use anyhow::{Context as _, Result};
use clap::Args;
use deepfake_common::FaceRegion;
use deepfake_face_detection::{FaceDetectionConfig, FaceLocalizer};
use deepfake_video_decoder::{FrameSampler, SamplerConfig};
use serde::Serialize;
use std::path::PathBuf;
use tracing::info;

#[derive(Args)]
pub struct InspectCommand {
    /// Video file to inspect
    #[arg(value_name = "FILE")]
    input: PathBuf,

    /// Haar cascade used for face localization
    #[arg(
        long,
        env = "FACE_CASCADE_PATH",
        default_value = "model/haarcascade_frontalface_default.xml"
    )]
    cascade_path: PathBuf,

    /// Number of leading frames to inspect
    #[arg(long, default_value_t = 20)]
    max_frames: usize,

    /// Pyramid scale step
    #[arg(long, default_value_t = 1.1)]
    scale_factor: f64,

    /// Neighbor votes a face needs
    #[arg(long, default_value_t = 5)]
    min_neighbors: usize,
}

#[derive(Serialize)]
struct FrameReport {
    frame: u64,
    width: u32,
    height: u32,
    /// First face in scan order (what the pipeline crops to)
    face: Option<FaceRegion>,
    faces_found: usize,
}

impl InspectCommand {
    pub fn execute(self) -> Result<()> {
        let config = FaceDetectionConfig {
            scale_factor: self.scale_factor,
            min_neighbors: self.min_neighbors,
            ..FaceDetectionConfig::default()
        };
        let localizer = FaceLocalizer::from_file(&self.cascade_path, config)
            .with_context(|| format!("Failed to load face cascade {}", self.cascade_path.display()))?;

        let sampler_config = SamplerConfig {
            max_frames: self.max_frames,
            ..SamplerConfig::default()
        };
        let sampler = FrameSampler::open(&self.input, &sampler_config)
            .with_context(|| format!("Failed to open {}", self.input.display()))?;

        let mut with_face = 0usize;
        let mut total = 0usize;
        for frame in sampler {
            let faces = localizer.detect(&frame);
            if !faces.is_empty() {
                with_face += 1;
            }
            total += 1;

            let report = FrameReport {
                frame: frame.frame_number,
                width: frame.width(),
                height: frame.height(),
                face: faces.first().copied(),
                faces_found: faces.len(),
            };
            println!("{}", serde_json::to_string(&report)?);
        }

        info!("{} of {} frames had a face", with_face, total);
        Ok(())
    }
}
