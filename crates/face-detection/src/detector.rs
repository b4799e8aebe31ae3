//! Multi-scale sliding-window evaluation of a Haar cascade
//!
//! The window stays at the cascade's native size while the image is shrunk by
//! `scale_factor` per pyramid level. Hits are reported in source image
//! coordinates, in scan order: pyramid level, then row, then column.

use crate::cascade::{HaarCascade, WeakClassifier};
use crate::FaceDetectionConfig;
use deepfake_common::FaceRegion;
use image::imageops::FilterType;
use image::GrayImage;
use imageproc::integral_image::{integral_image, integral_squared_image};
use tracing::debug;

/// Summed-area tables of an image, `(width + 1) × (height + 1)` with a zero border
struct IntegralImages {
    stride: usize,
    sum: Vec<u64>,
    sqsum: Vec<u64>,
}

impl IntegralImages {
    fn new(image: &GrayImage) -> Self {
        Self {
            stride: image.width() as usize + 1,
            sum: integral_image::<_, u64>(image).into_raw(),
            sqsum: integral_squared_image::<_, u64>(image).into_raw(),
        }
    }

    #[inline]
    fn area_sum(table: &[u64], stride: usize, x: u32, y: u32, w: u32, h: u32) -> u64 {
        let (x, y, w, h) = (x as usize, y as usize, w as usize, h as usize);
        let a = table[y * stride + x];
        let b = table[y * stride + x + w];
        let c = table[(y + h) * stride + x];
        let d = table[(y + h) * stride + x + w];
        (d + a) - (b + c)
    }

    #[inline]
    fn rect_sum(&self, x: u32, y: u32, w: u32, h: u32) -> u64 {
        Self::area_sum(&self.sum, self.stride, x, y, w, h)
    }

    #[inline]
    fn rect_sqsum(&self, x: u32, y: u32, w: u32, h: u32) -> u64 {
        Self::area_sum(&self.sqsum, self.stride, x, y, w, h)
    }
}

/// Evaluates the cascade on windows of one pyramid level
struct WindowEvaluator<'a> {
    cascade: &'a HaarCascade,
    integral: IntegralImages,
}

impl WindowEvaluator<'_> {
    /// Standard deviation term used to normalize feature responses
    fn variance_norm(&self, wx: u32, wy: u32) -> f64 {
        let (ww, wh) = self.cascade.window_size();
        let (nw, nh) = (ww - 2, wh - 2);
        let area = f64::from(nw) * f64::from(nh);

        let sum = self.integral.rect_sum(wx + 1, wy + 1, nw, nh) as f64;
        let sqsum = self.integral.rect_sqsum(wx + 1, wy + 1, nw, nh) as f64;

        let nf = area * sqsum - sum * sum;
        if nf > 0.0 {
            nf.sqrt()
        } else {
            1.0
        }
    }

    fn feature_value(&self, feature: usize, wx: u32, wy: u32) -> f64 {
        self.cascade.features[feature]
            .rects
            .iter()
            .map(|r| {
                f64::from(r.weight) * self.integral.rect_sum(wx + r.x, wy + r.y, r.width, r.height) as f64
            })
            .sum()
    }

    fn weak_response(&self, classifier: &WeakClassifier, wx: u32, wy: u32, norm: f64) -> f32 {
        let mut idx = 0usize;
        loop {
            let node = &classifier.nodes[idx];
            let value = self.feature_value(node.feature, wx, wy);
            let next = if value < f64::from(node.threshold) * norm {
                node.left
            } else {
                node.right
            };
            if next <= 0 {
                return classifier.leaves[next.unsigned_abs() as usize];
            }
            idx = next as usize;
        }
    }

    /// True when the window at (wx, wy) passes every stage
    fn accepts(&self, wx: u32, wy: u32) -> bool {
        let norm = self.variance_norm(wx, wy);
        self.cascade.stages.iter().all(|stage| {
            let score: f32 = stage
                .classifiers
                .iter()
                .map(|c| self.weak_response(c, wx, wy, norm))
                .sum();
            score >= stage.threshold
        })
    }
}

/// Collect raw cascade hits over all pyramid levels
pub(crate) fn scan(
    cascade: &HaarCascade,
    gray: &GrayImage,
    config: &FaceDetectionConfig,
) -> Vec<FaceRegion> {
    let (img_w, img_h) = gray.dimensions();
    let (win_w, win_h) = cascade.window_size();
    let (min_w, min_h) = config.min_size;

    let mut hits = Vec::new();
    let mut factor = 1.0f64;

    loop {
        let scaled_w = (f64::from(img_w) / factor).round() as u32;
        let scaled_h = (f64::from(img_h) / factor).round() as u32;
        if scaled_w < win_w || scaled_h < win_h {
            break;
        }

        let region_w = (f64::from(win_w) * factor).round() as u32;
        let region_h = (f64::from(win_h) * factor).round() as u32;
        if let Some((max_w, max_h)) = config.max_size {
            if region_w > max_w || region_h > max_h {
                break;
            }
        }

        if region_w >= min_w && region_h >= min_h {
            let level = if scaled_w == img_w && scaled_h == img_h {
                gray.clone()
            } else {
                image::imageops::resize(gray, scaled_w, scaled_h, FilterType::Triangle)
            };

            let evaluator = WindowEvaluator {
                cascade,
                integral: IntegralImages::new(&level),
            };

            // Coarser step on fine levels, every pixel once windows get large
            let step = if factor > 2.0 { 1 } else { 2 };
            let before = hits.len();

            for y in (0..=scaled_h - win_h).step_by(step) {
                for x in (0..=scaled_w - win_w).step_by(step) {
                    if evaluator.accepts(x, y) {
                        hits.push(FaceRegion::new(
                            (f64::from(x) * factor).round() as i32,
                            (f64::from(y) * factor).round() as i32,
                            region_w as i32,
                            region_h as i32,
                        ));
                    }
                }
            }

            debug!(
                "Pyramid level {:.3}: {}x{} -> {} hits",
                factor,
                scaled_w,
                scaled_h,
                hits.len() - before
            );
        }

        factor *= config.scale_factor;
    }

    hits
}
