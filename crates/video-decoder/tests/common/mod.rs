//! Synthetic test videos
//!
//! Writes uncompressed YUV4MPEG2 streams, which FFmpeg demuxes without any
//! external codec, so tests do not depend on sample files on disk.

use std::io::Write;
use std::path::Path;

/// BT.601 limited-range YUV for an RGB color
pub fn rgb_to_yuv(rgb: [u8; 3]) -> [u8; 3] {
    let [r, g, b] = rgb.map(f64::from);
    let y = 16.0 + (65.481 * r + 128.553 * g + 24.966 * b) / 255.0;
    let u = 128.0 + (-37.797 * r - 74.203 * g + 112.0 * b) / 255.0;
    let v = 128.0 + (112.0 * r - 93.786 * g - 18.214 * b) / 255.0;
    [y, u, v].map(|c| c.round().clamp(0.0, 255.0) as u8)
}

/// Write a 4:4:4 Y4M file with one solid-colored frame per entry of `colors`
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

/// `count` frames of mid gray
pub fn write_gray_video(path: &Path, width: u32, height: u32, count: usize) {
    write_y4m(path, width, height, &vec![[128, 128, 128]; count]);
}
