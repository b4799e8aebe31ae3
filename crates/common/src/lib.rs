/// Common types and utilities for the deepfake detection pipeline
use image::RgbImage;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Processing errors
#[derive(Debug, Error)]
pub enum ProcessingError {
    #[error("Failed to decode video: {0}")]
    Decode(String),

    #[error("No video stream found")]
    NoVideoStream,

    #[error("No frames extracted from video")]
    EmptySequence,

    #[error("Face detection error: {0}")]
    FaceDetection(String),

    #[error("Inference error: {0}")]
    Inference(String),

    #[error("FFmpeg error: {0}")]
    FFmpegError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Image processing error: {0}")]
    ImageError(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl From<image::ImageError> for ProcessingError {
    fn from(err: image::ImageError) -> Self {
        ProcessingError::ImageError(err.to_string())
    }
}

/// Result type for processing operations
pub type Result<T> = std::result::Result<T, ProcessingError>;

/// Byte order of the three color channels in a decoded frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelOrder {
    /// Blue, green, red (what OpenCV-style decoders emit)
    #[default]
    Bgr,
    /// Red, green, blue
    Rgb,
}

impl ChannelOrder {
    /// Reorder a pixel stored in this order into RGB
    #[must_use]
    #[inline]
    pub fn to_rgb(self, pixel: [u8; 3]) -> [u8; 3] {
        match self {
            ChannelOrder::Rgb => pixel,
            ChannelOrder::Bgr => [pixel[2], pixel[1], pixel[0]],
        }
    }

    /// ITU-R BT.601 luma of a pixel stored in this order
    #[must_use]
    #[inline]
    pub fn luma(self, pixel: [u8; 3]) -> u8 {
        let [r, g, b] = self.to_rgb(pixel);
        let y = 0.299 * f32::from(r) + 0.587 * f32::from(g) + 0.114 * f32::from(b);
        y.round().clamp(0.0, 255.0) as u8
    }
}

/// A single decoded video frame.
///
/// The pixel buffer is a plain 3-channel container; which byte holds which
/// color is described by `channel_order`, not by the buffer type.
#[derive(Debug, Clone)]
pub struct RawFrame {
    /// Frame number within the stream (0-indexed)
    pub frame_number: u64,
    /// Channel layout of `image`
    pub channel_order: ChannelOrder,
    /// Row-major, 8 bits per channel
    pub image: RgbImage,
}

impl RawFrame {
    #[must_use]
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

/// Axis-aligned face rectangle in frame pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaceRegion {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl FaceRegion {
    #[must_use]
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    #[must_use]
    #[inline]
    pub fn area(&self) -> i64 {
        i64::from(self.width.max(0)) * i64::from(self.height.max(0))
    }

    /// Intersect the region with a `frame_width`×`frame_height` frame.
    ///
    /// Returns `(x, y, width, height)` of the visible part, or `None` when
    /// nothing with a positive area remains.
    #[must_use]
    pub fn clamp_to(&self, frame_width: u32, frame_height: u32) -> Option<(u32, u32, u32, u32)> {
        let fw = i64::from(frame_width);
        let fh = i64::from(frame_height);

        let x1 = i64::from(self.x).clamp(0, fw);
        let y1 = i64::from(self.y).clamp(0, fh);
        let x2 = (i64::from(self.x) + i64::from(self.width)).clamp(0, fw);
        let y2 = (i64::from(self.y) + i64::from(self.height)).clamp(0, fh);

        if x2 <= x1 || y2 <= y1 {
            return None;
        }

        Some((x1 as u32, y1 as u32, (x2 - x1) as u32, (y2 - y1) as u32))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_region_inside_frame_is_unchanged() {
        let region = FaceRegion::new(10, 20, 30, 40);
        assert_eq!(region.clamp_to(100, 100), Some((10, 20, 30, 40)));
        assert_eq!(region.area(), 1200);
    }

    #[test]
    fn test_region_clamped_to_frame_bounds() {
        let region = FaceRegion::new(-5, 90, 20, 50);
        assert_eq!(region.clamp_to(100, 100), Some((0, 90, 15, 10)));
    }

    #[test]
    fn test_degenerate_region() {
        assert_eq!(FaceRegion::new(10, 10, 0, 5).clamp_to(100, 100), None);
        assert_eq!(FaceRegion::new(10, 10, -4, 5).clamp_to(100, 100), None);
        assert_eq!(FaceRegion::new(150, 10, 20, 20).clamp_to(100, 100), None);
    }

    #[test]
    fn test_channel_order_conversion() {
        assert_eq!(ChannelOrder::Bgr.to_rgb([1, 2, 3]), [3, 2, 1]);
        assert_eq!(ChannelOrder::Rgb.to_rgb([1, 2, 3]), [1, 2, 3]);
        assert_eq!(ChannelOrder::default(), ChannelOrder::Bgr);
    }

    #[test]
    fn test_luma_respects_channel_order() {
        // Pure red in each layout
        let red_bgr = ChannelOrder::Bgr.luma([0, 0, 255]);
        let red_rgb = ChannelOrder::Rgb.luma([255, 0, 0]);
        assert_eq!(red_bgr, red_rgb);
        assert_eq!(red_rgb, 76);
        assert_eq!(ChannelOrder::Rgb.luma([255, 255, 255]), 255);
    }

    #[test]
    fn test_empty_sequence_message() {
        assert_eq!(
            ProcessingError::EmptySequence.to_string(),
            "No frames extracted from video"
        );
    }
}
