//! Frame preprocessing: crop, resize, normalize
//!
//! Produces one `(3, size, size)` CHW tensor per frame. Channels are kept in
//! the frame's own order; `mean[c]` and `std[c]` apply to channel index `c`.

use deepfake_common::{FaceRegion, ProcessingError, RawFrame, Result};
use image::imageops::FilterType;
use image::RgbImage;
use ndarray::Array3;
use serde::{Deserialize, Serialize};

/// ImageNet normalization statistics
pub const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
pub const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Preprocessing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreprocessConfig {
    /// Square side of the model input
    pub input_size: u32,
    /// Per-channel mean, applied after scaling to [0, 1]
    pub mean: [f32; 3],
    /// Per-channel standard deviation
    pub std: [f32; 3],
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            input_size: 112,
            mean: IMAGENET_MEAN,
            std: IMAGENET_STD,
        }
    }
}

/// Turns a frame and its optional face region into a normalized tensor
#[derive(Debug, Clone)]
pub struct FramePreprocessor {
    config: PreprocessConfig,
}

impl FramePreprocessor {
    /// # Errors
    ///
    /// Returns `InvalidConfig` for a zero input size or a zero standard deviation
    pub fn new(config: PreprocessConfig) -> Result<Self> {
        if config.input_size == 0 {
            return Err(ProcessingError::InvalidConfig(
                "input_size must be positive".to_string(),
            ));
        }
        if config.std.iter().any(|s| *s == 0.0 || !s.is_finite()) {
            return Err(ProcessingError::InvalidConfig(format!(
                "std must be finite and non-zero, got {:?}",
                config.std
            )));
        }
        Ok(Self { config })
    }

    #[must_use]
    pub fn config(&self) -> &PreprocessConfig {
        &self.config
    }

    /// Shape of every tensor this preprocessor produces
    #[must_use]
    pub fn output_shape(&self) -> (usize, usize, usize) {
        let size = self.config.input_size as usize;
        (3, size, size)
    }

    /// Crop to `region` (or use the whole frame), resize and normalize.
    ///
    /// Regions that extend past the frame are clamped; a region with nothing
    /// left after clamping falls back to the whole frame.
    #[must_use]
    pub fn preprocess(&self, frame: &RawFrame, region: Option<FaceRegion>) -> Array3<f32> {
        let size = self.config.input_size;

        let crop = region.and_then(|r| r.clamp_to(frame.width(), frame.height()));
        let source: RgbImage = match crop {
            Some((x, y, w, h)) if (x, y, w, h) != (0, 0, frame.width(), frame.height()) => {
                image::imageops::crop_imm(&frame.image, x, y, w, h).to_image()
            }
            _ => frame.image.clone(),
        };

        let resized = if source.dimensions() == (size, size) {
            source
        } else {
            image::imageops::resize(&source, size, size, FilterType::Triangle)
        };

        self.normalize(&resized)
    }

    fn normalize(&self, image: &RgbImage) -> Array3<f32> {
        let (mean, std) = (self.config.mean, self.config.std);
        let mut tensor = Array3::zeros(self.output_shape());

        for (x, y, pixel) in image.enumerate_pixels() {
            for c in 0..3 {
                let value = f32::from(pixel[c]) / 255.0;
                tensor[[c, y as usize, x as usize]] = (value - mean[c]) / std[c];
            }
        }

        tensor
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use deepfake_common::ChannelOrder;
    use image::Rgb;

    fn frame(width: u32, height: u32, pixel: [u8; 3]) -> RawFrame {
        RawFrame {
            frame_number: 0,
            channel_order: ChannelOrder::Bgr,
            image: RgbImage::from_pixel(width, height, Rgb(pixel)),
        }
    }

    fn bounds(config: &PreprocessConfig, c: usize) -> (f32, f32) {
        (
            (0.0 - config.mean[c]) / config.std[c],
            (1.0 - config.mean[c]) / config.std[c],
        )
    }

    #[test]
    fn test_solid_frames_of_any_size() {
        let preprocessor = FramePreprocessor::new(PreprocessConfig::default()).unwrap();
        let config = preprocessor.config().clone();

        for (w, h) in [(1, 1), (7, 300), (112, 112), (640, 360)] {
            let tensor = preprocessor.preprocess(&frame(w, h, [10, 128, 250]), None);
            assert_eq!(tensor.dim(), (3, 112, 112));
            for c in 0..3 {
                let (lo, hi) = bounds(&config, c);
                assert!(tensor
                    .index_axis(ndarray::Axis(0), c)
                    .iter()
                    .all(|v| *v >= lo - 1e-5 && *v <= hi + 1e-5));
            }
        }
    }

    #[test]
    fn test_normalization_per_channel_index() {
        let preprocessor = FramePreprocessor::new(PreprocessConfig::default()).unwrap();
        let tensor = preprocessor.preprocess(&frame(112, 112, [255, 0, 51]), None);

        let expected = [
            (1.0 - IMAGENET_MEAN[0]) / IMAGENET_STD[0],
            (0.0 - IMAGENET_MEAN[1]) / IMAGENET_STD[1],
            (0.2 - IMAGENET_MEAN[2]) / IMAGENET_STD[2],
        ];
        for (c, want) in expected.iter().enumerate() {
            assert!((tensor[[c, 50, 60]] - want).abs() < 1e-5);
        }
    }

    #[test]
    fn test_crop_uses_face_region() {
        let preprocessor = FramePreprocessor::new(PreprocessConfig::default()).unwrap();
        let mut input = frame(200, 200, [0, 0, 0]);
        for y in 50..100 {
            for x in 50..100 {
                input.image.put_pixel(x, y, Rgb([255, 255, 255]));
            }
        }

        let cropped = preprocessor.preprocess(&input, Some(FaceRegion::new(50, 50, 50, 50)));
        let (_, hi) = bounds(preprocessor.config(), 0);
        assert!(cropped
            .index_axis(ndarray::Axis(0), 0)
            .iter()
            .all(|v| *v > hi - 0.1));
    }

    #[test]
    fn test_out_of_bounds_region_is_clamped() {
        let preprocessor = FramePreprocessor::new(PreprocessConfig::default()).unwrap();
        let input = frame(64, 64, [90, 90, 90]);

        let partial = preprocessor.preprocess(&input, Some(FaceRegion::new(-20, 40, 200, 200)));
        assert_eq!(partial.dim(), (3, 112, 112));

        // Nothing left after clamping: whole frame is used
        let outside = preprocessor.preprocess(&input, Some(FaceRegion::new(500, 500, 10, 10)));
        let full = preprocessor.preprocess(&input, None);
        assert_eq!(outside, full);

        let degenerate = preprocessor.preprocess(&input, Some(FaceRegion::new(10, 10, 0, 0)));
        assert_eq!(degenerate, full);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = PreprocessConfig {
            std: [0.2, 0.0, 0.2],
            ..PreprocessConfig::default()
        };
        assert!(matches!(
            FramePreprocessor::new(config),
            Err(ProcessingError::InvalidConfig(_))
        ));

        let config = PreprocessConfig {
            input_size: 0,
            ..PreprocessConfig::default()
        };
        assert!(FramePreprocessor::new(config).is_err());
    }
}
