//! Test server harness
//!
//! Serves the real router on an ephemeral port with a stub classifier, a toy
//! Haar cascade and a scratch upload directory.

#![allow(dead_code)]

use deepfake_api_server::{serve, ApiState};
use deepfake_face_detection::{FaceDetectionConfig, FaceLocalizer, HaarCascade};
use deepfake_pipeline::{Classifier, DetectionPipeline, FrameSequence, InferenceError, PipelineConfig};
use std::io::Write;
use std::sync::Arc;
use tempfile::TempDir;

const CASCADE: &str = r#"<?xml version="1.0"?>
<opencv_storage>
<cascade type_id="opencv-cascade-classifier"><stageType>BOOST</stageType>
  <featureType>HAAR</featureType>
  <height>20</height>
  <width>20</width>
  <stages>
    <_>
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

/// Returns the same logits for every sequence
pub struct FixedClassifier(pub [f32; 2]);

impl Classifier for FixedClassifier {
    fn classify(&self, _sequence: &FrameSequence) -> Result<[f32; 2], InferenceError> {
        Ok(self.0)
    }
}

pub struct TestServer {
    pub base_url: String,
    pub upload_dir: TempDir,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    pub async fn start(logits: [f32; 2], max_upload_bytes: Option<usize>) -> Self {
        let cascade = HaarCascade::from_xml(CASCADE).unwrap();
        let localizer = FaceLocalizer::new(cascade, FaceDetectionConfig::default()).unwrap();
        let pipeline = DetectionPipeline::new(
            localizer,
            Arc::new(FixedClassifier(logits)),
            PipelineConfig::default(),
        )
        .unwrap();

        let upload_dir = TempDir::new().unwrap();
        let mut state = ApiState::new(pipeline, upload_dir.path());
        if let Some(limit) = max_upload_bytes {
            state = state.with_max_upload_bytes(limit);
        }

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            serve(listener, state).await.expect("server failed");
        });

        Self {
            base_url: format!("http://{addr}"),
            upload_dir,
            handle,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Number of entries left in the upload directory
    pub fn staged_entries(&self) -> usize {
        std::fs::read_dir(self.upload_dir.path()).unwrap().count()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Uncompressed 4:4:4 YUV4MPEG2 clip of mid-gray frames
pub fn gray_y4m(width: u32, height: u32, frames: usize) -> Vec<u8> {
    let mut data = Vec::new();
    writeln!(data, "YUV4MPEG2 W{width} H{height} F25:1 Ip A1:1 C444").unwrap();
    let plane = (width * height) as usize;
    for _ in 0..frames {
        data.extend_from_slice(b"FRAME\n");
        data.extend(std::iter::repeat(126u8).take(plane));
        data.extend(std::iter::repeat(128u8).take(plane * 2));
    }
    data
}

pub fn video_form(filename: &str, bytes: Vec<u8>) -> reqwest::multipart::Form {
    let part = reqwest::multipart::Part::bytes(bytes).file_name(filename.to_string());
    reqwest::multipart::Form::new().part("video", part)
}
