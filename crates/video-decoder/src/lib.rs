/// Frame sampling from video files
///
/// Opens a container with FFmpeg, decodes the best video stream and yields the
/// first `max_frames` frames in presentation order as packed 24-bit images.
/// Decoding is pull-based: frames are only decoded as the iterator is advanced,
/// so a sampler that is dropped early never touches the rest of the file.
use deepfake_common::{ChannelOrder, ProcessingError, RawFrame, Result};
use ffmpeg_next as ffmpeg;
use image::RgbImage;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info, warn};

/// Frame sampler configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SamplerConfig {
    /// Stop after this many frames
    pub max_frames: usize,
    /// Channel layout of the emitted frames
    pub channel_order: ChannelOrder,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            max_frames: 20,
            channel_order: ChannelOrder::Bgr,
        }
    }
}

fn output_pixel_format(order: ChannelOrder) -> ffmpeg::format::Pixel {
    match order {
        ChannelOrder::Bgr => ffmpeg::format::Pixel::BGR24,
        ChannelOrder::Rgb => ffmpeg::format::Pixel::RGB24,
    }
}

/// Initialize `FFmpeg` library
fn init_ffmpeg() {
    static INIT: std::sync::Once = std::sync::Once::new();
    INIT.call_once(|| {
        ffmpeg::init().expect("Failed to initialize FFmpeg");
    });
}

/// Scaler plus the source geometry it was built for
struct Converter {
    source: (ffmpeg::format::Pixel, u32, u32),
    context: ffmpeg::software::scaling::Context,
}

/// Lazily decodes the leading frames of a video stream.
///
/// Yields at most `max_frames` frames. Fewer are yielded when the stream ends
/// early or a frame cannot be converted; the latter is logged and ends the
/// iteration.
pub struct FrameSampler {
    input: ffmpeg::format::context::Input,
    decoder: ffmpeg::decoder::Video,
    stream_index: usize,
    converter: Option<Converter>,
    decoded: ffmpeg::util::frame::video::Video,
    converted: ffmpeg::util::frame::video::Video,
    channel_order: ChannelOrder,
    max_frames: usize,
    emitted: usize,
    draining: bool,
    finished: bool,
}

impl FrameSampler {
    /// Open a video file for sampling
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The input file cannot be opened or probed
    /// - No video stream is found
    /// - The decoder cannot be created
    pub fn open(input_path: &Path, config: &SamplerConfig) -> Result<Self> {
        init_ffmpeg();

        let input = ffmpeg::format::input(&input_path)
            .map_err(|e| ProcessingError::Decode(format!("Failed to open input file: {e}")))?;

        let video_stream = input
            .streams()
            .best(ffmpeg::media::Type::Video)
            .ok_or(ProcessingError::NoVideoStream)?;
        let stream_index = video_stream.index();

        let decoder = ffmpeg::codec::context::Context::from_parameters(video_stream.parameters())
            .map_err(|e| ProcessingError::Decode(format!("Failed to create context: {e}")))?
            .decoder()
            .video()
            .map_err(|e| ProcessingError::Decode(format!("Failed to create decoder: {e}")))?;

        info!(
            "Opened {} ({}x{}, stream {}), sampling up to {} frames",
            input_path.display(),
            decoder.width(),
            decoder.height(),
            stream_index,
            config.max_frames
        );

        Ok(Self {
            input,
            decoder,
            stream_index,
            converter: None,
            decoded: ffmpeg::util::frame::video::Video::empty(),
            converted: ffmpeg::util::frame::video::Video::empty(),
            channel_order: config.channel_order,
            max_frames: config.max_frames,
            emitted: 0,
            draining: false,
            finished: config.max_frames == 0,
        })
    }

    /// Coded frame size reported by the stream
    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        (self.decoder.width(), self.decoder.height())
    }

    /// Feed the decoder one more packet of our stream, or start draining at EOF
    fn feed(&mut self) {
        let mut packet = ffmpeg::Packet::empty();
        match packet.read(&mut self.input) {
            Ok(()) => {
                if packet.stream() != self.stream_index {
                    return;
                }
                if let Err(e) = self.decoder.send_packet(&packet) {
                    debug!("Decoder rejected packet: {e}");
                }
            }
            Err(ffmpeg::Error::Eof) => {
                self.decoder.send_eof().ok();
                self.draining = true;
            }
            Err(e) => {
                warn!("Stopped reading input after {} frames: {e}", self.emitted);
                self.decoder.send_eof().ok();
                self.draining = true;
            }
        }
    }

    /// Convert the last decoded frame into the output layout
    fn convert(&mut self) -> Result<RawFrame> {
        let source = (
            self.decoded.format(),
            self.decoded.width(),
            self.decoded.height(),
        );

        let stale = self.converter.as_ref().is_none_or(|c| c.source != source);
        if stale {
            let (format, width, height) = source;
            let context = ffmpeg::software::scaling::Context::get(
                format,
                width,
                height,
                output_pixel_format(self.channel_order),
                width,
                height,
                ffmpeg::software::scaling::Flags::BILINEAR,
            )
            .map_err(|e| ProcessingError::FFmpegError(format!("Failed to create scaler: {e}")))?;
            self.converter = Some(Converter { source, context });
        }

        if let Some(converter) = self.converter.as_mut() {
            converter
                .context
                .run(&self.decoded, &mut self.converted)
                .map_err(|e| ProcessingError::FFmpegError(format!("Failed to convert frame: {e}")))?;
        }

        let image = copy_frame_data(&self.converted)?;
        Ok(RawFrame {
            frame_number: self.emitted as u64,
            channel_order: self.channel_order,
            image,
        })
    }
}

impl Iterator for FrameSampler {
    type Item = RawFrame;

    fn next(&mut self) -> Option<RawFrame> {
        if self.finished || self.emitted >= self.max_frames {
            return None;
        }

        loop {
            if self.decoder.receive_frame(&mut self.decoded).is_ok() {
                return match self.convert() {
                    Ok(frame) => {
                        self.emitted += 1;
                        Some(frame)
                    }
                    Err(e) => {
                        warn!("Frame {} could not be converted: {e}", self.emitted);
                        self.finished = true;
                        None
                    }
                };
            }

            if self.draining {
                debug!("End of stream after {} frames", self.emitted);
                self.finished = true;
                return None;
            }

            self.feed();
        }
    }
}

/// Open `input_path` and collect up to `config.max_frames` frames
///
/// # Errors
///
/// Returns an error if the file cannot be opened as a video (see [`FrameSampler::open`])
pub fn sample_frames(input_path: &Path, config: &SamplerConfig) -> Result<Vec<RawFrame>> {
    Ok(FrameSampler::open(input_path, config)?.collect())
}

/// Copy a packed 24-bit frame into a contiguous image, dropping row padding
fn copy_frame_data(frame: &ffmpeg::util::frame::video::Video) -> Result<RgbImage> {
    let width = frame.width() as usize;
    let height = frame.height() as usize;
    let stride = frame.stride(0);
    let plane_data = frame.data(0);

    let mut data = Vec::with_capacity(width * height * 3);
    for y in 0..height {
        let row_start = y * stride;
        let row_end = row_start + (width * 3);
        data.extend_from_slice(&plane_data[row_start..row_end]);
    }

    RgbImage::from_raw(frame.width(), frame.height(), data).ok_or_else(|| {
        ProcessingError::ImageError(format!("Frame buffer does not match {width}x{height}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_pixel_format() {
        assert_eq!(
            output_pixel_format(ChannelOrder::Bgr),
            ffmpeg::format::Pixel::BGR24
        );
        assert_eq!(
            output_pixel_format(ChannelOrder::Rgb),
            ffmpeg::format::Pixel::RGB24
        );
    }

    #[test]
    fn test_sampler_config_default() {
        let config = SamplerConfig::default();
        assert_eq!(config.max_frames, 20);
        assert_eq!(config.channel_order, ChannelOrder::Bgr);
    }

    #[test]
    fn test_missing_file_is_decode_error() {
        let result = FrameSampler::open(Path::new("/nonexistent/clip.mp4"), &SamplerConfig::default());
        assert!(matches!(result, Err(ProcessingError::Decode(_))));
    }
}
