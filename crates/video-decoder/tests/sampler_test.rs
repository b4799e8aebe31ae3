/// Integration tests for the frame sampler
mod common;

use deepfake_common::{ChannelOrder, ProcessingError};
use deepfake_video_decoder::{sample_frames, FrameSampler, SamplerConfig};
use tempfile::TempDir;

fn config(max_frames: usize) -> SamplerConfig {
    SamplerConfig {
        max_frames,
        ..SamplerConfig::default()
    }
}

#[test]
fn test_sampling_stops_at_limit() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("long.y4m");
    common::write_gray_video(&path, 64, 48, 30);

    let frames = sample_frames(&path, &config(20)).expect("Failed to sample video");

    assert_eq!(frames.len(), 20);
    for (i, frame) in frames.iter().enumerate() {
        assert_eq!(frame.frame_number, i as u64);
        assert_eq!(frame.width(), 64);
        assert_eq!(frame.height(), 48);
        assert_eq!(frame.channel_order, ChannelOrder::Bgr);
    }
}

#[test]
fn test_short_video_yields_every_frame() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("short.y4m");
    common::write_gray_video(&path, 32, 32, 5);

    let frames = sample_frames(&path, &config(20)).unwrap();
    assert_eq!(frames.len(), 5);
}

#[test]
fn test_sampler_is_lazy() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("clip.y4m");
    common::write_gray_video(&path, 32, 32, 10);

    let sampler = FrameSampler::open(&path, &config(20)).unwrap();
    assert_eq!(sampler.dimensions(), (32, 32));

    let first: Vec<_> = sampler.take(3).collect();
    assert_eq!(first.len(), 3);
    assert_eq!(first[2].frame_number, 2);
}

#[test]
fn test_zero_limit_yields_nothing() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("clip.y4m");
    common::write_gray_video(&path, 32, 32, 3);

    assert_eq!(sample_frames(&path, &config(0)).unwrap().len(), 0);
}

#[test]
fn test_channel_order_of_decoded_pixels() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("red.y4m");
    common::write_y4m(&path, 16, 16, &[[255, 0, 0]]);

    let bgr = sample_frames(&path, &config(1)).unwrap();
    let px = bgr[0].image.get_pixel(8, 8).0;
    assert!(px[2] > 180 && px[0] < 70, "expected red in the last byte, got {px:?}");

    let rgb_config = SamplerConfig {
        max_frames: 1,
        channel_order: ChannelOrder::Rgb,
    };
    let rgb = sample_frames(&path, &rgb_config).unwrap();
    let px = rgb[0].image.get_pixel(8, 8).0;
    assert_eq!(rgb[0].channel_order, ChannelOrder::Rgb);
    assert!(px[0] > 180 && px[2] < 70, "expected red in the first byte, got {px:?}");
}

#[test]
fn test_garbage_file_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("fake.mp4");
    let garbage: Vec<u8> = [0xDE, 0xAD, 0xBE, 0xEF].repeat(4096);
    std::fs::write(&path, garbage).unwrap();

    let result = FrameSampler::open(&path, &config(20));
    assert!(matches!(
        result,
        Err(ProcessingError::Decode(_) | ProcessingError::NoVideoStream)
    ));
}

#[test]
fn test_header_only_stream_has_no_frames() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("empty.y4m");
    common::write_y4m(&path, 32, 32, &[]);

    let frames = sample_frames(&path, &config(20)).expect("header alone is a valid stream");
    assert!(frames.is_empty());
}
