//! Shared fixtures: synthetic videos, a toy cascade and stub classifiers

#![allow(dead_code)]

use deepfake_common::{ChannelOrder, RawFrame};
use deepfake_face_detection::{FaceDetectionConfig, FaceLocalizer, HaarCascade};
use deepfake_pipeline::{Classifier, FrameSequence, InferenceError};
use image::{Rgb, RgbImage};
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

/// 20x20 cascade that fires on a bright block surrounded by a darker border
pub const BRIGHT_CENTER_CASCADE: &str = r#"<?xml version="1.0"?>
<opencv_storage>
<cascade type_id="opencv-cascade-classifier"><stageType>BOOST</stageType>
  <featureType>HAAR</featureType>
  <height>20</height>
  <width>20</width>
  <stageNum>1</stageNum>
  <stages>
    <_>
      <maxWeakCount>1</maxWeakCount>
      <stageThreshold>0.</stageThreshold>
      <weakClassifiers>
        <_>
          <internalNodes>
            0 -1 0 1.0000000149011612e-01</internalNodes>
          <leafValues>
            -1. 1.</leafValues></_></weakClassifiers></_></stages>
  <features>
    <_>
      <rects>
        <_>
          0 0 20 20 -1.</_>
        <_>
          5 5 10 10 4.</_></rects></_></features></cascade>
</opencv_storage>
"#;

pub fn localizer() -> FaceLocalizer {
    let cascade = HaarCascade::from_xml(BRIGHT_CENTER_CASCADE).unwrap();
    let config = FaceDetectionConfig {
        min_size: (20, 20),
        max_size: Some((30, 30)),
        min_neighbors: 3,
        ..FaceDetectionConfig::default()
    };
    FaceLocalizer::new(cascade, config).unwrap()
}

pub fn solid_frame(frame_number: u64, width: u32, height: u32, value: u8) -> RawFrame {
    RawFrame {
        frame_number,
        channel_order: ChannelOrder::Bgr,
        image: RgbImage::from_pixel(width, height, Rgb([value, value, value])),
    }
}

/// BT.601 limited-range YUV for an RGB color
fn rgb_to_yuv(rgb: [u8; 3]) -> [u8; 3] {
    let [r, g, b] = rgb.map(f64::from);
    let y = 16.0 + (65.481 * r + 128.553 * g + 24.966 * b) / 255.0;
    let u = 128.0 + (-37.797 * r - 74.203 * g + 112.0 * b) / 255.0;
    let v = 128.0 + (112.0 * r - 93.786 * g - 18.214 * b) / 255.0;
    [y, u, v].map(|c| c.round().clamp(0.0, 255.0) as u8)
}

/// Write a 4:4:4 YUV4MPEG2 file with one solid-colored frame per entry of `colors`
pub fn write_y4m(path: &Path, width: u32, height: u32, colors: &[[u8; 3]]) {
    let mut file = std::fs::File::create(path).unwrap();
    writeln!(file, "YUV4MPEG2 W{width} H{height} F25:1 Ip A1:1 C444").unwrap();

    let plane = (width * height) as usize;
    for &color in colors {
        let [y, u, v] = rgb_to_yuv(color);
        file.write_all(b"FRAME\n").unwrap();
        file.write_all(&vec![y; plane]).unwrap();
        file.write_all(&vec![u; plane]).unwrap();
        file.write_all(&vec![v; plane]).unwrap();
    }
}

/// Returns fixed logits and remembers the length of every sequence it saw
pub struct FixedClassifier {
    logits: [f32; 2],
    pub seen: Mutex<Vec<usize>>,
}

impl FixedClassifier {
    pub fn new(logits: [f32; 2]) -> Self {
        Self {
            logits,
            seen: Mutex::new(Vec::new()),
        }
    }
}

impl Classifier for FixedClassifier {
    fn classify(&self, sequence: &FrameSequence) -> Result<[f32; 2], InferenceError> {
        self.seen.lock().unwrap().push(sequence.len());
        Ok(self.logits)
    }
}

/// Always fails with a shape error
pub struct BrokenClassifier;

impl Classifier for BrokenClassifier {
    fn classify(&self, _sequence: &FrameSequence) -> Result<[f32; 2], InferenceError> {
        Err(InferenceError::InvalidOutputShape(vec![1, 5]))
    }
}
