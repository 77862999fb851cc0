extern crate ffmpeg_next as ffmpeg;

use std::path::{Path, PathBuf};

use ffmpeg::format::{Pixel, input};
use ffmpeg::media::Type;
use ffmpeg::software::scaling::{context::Context, flag::Flags};
use ffmpeg::util::frame::video::Video;
use ffmpeg::{Packet, Rational};
use image::RgbImage;

use crate::error::{MediaError, Result};
use crate::media::{Frame, FrameSource};

/// Decodes the best video stream of a file into RGB frames, one at a time.
pub struct FfmpegVideoSource {
    path: PathBuf,
    ictx: ffmpeg::format::context::Input,
    decoder: ffmpeg::decoder::Video,
    scaler: Context,
    stream_index: usize,
    fps: f64,
    frame_count: u64,
    frames_read: u64,
    eof_sent: bool,
}

fn rate_to_f64(rate: Rational) -> Option<f64> {
    if rate.numerator() > 0 && rate.denominator() > 0 {
        Some(f64::from(rate))
    } else {
        None
    }
}

/// Converts a container duration in `AV_TIME_BASE` units to seconds.
/// Unknown (`AV_NOPTS_VALUE`) and empty durations give `None`.
pub fn container_seconds(duration: i64) -> Option<f64> {
    if duration > 0 {
        Some(duration as f64 / f64::from(ffmpeg::ffi::AV_TIME_BASE))
    } else {
        None
    }
}

impl FfmpegVideoSource {
    pub fn open(path: &Path) -> Result<Self> {
        let decode_err = |reason: String| MediaError::Decode {
            path: path.to_path_buf(),
            reason,
        };
        let ictx = input(&path).map_err(|e| decode_err(e.to_string()))?;
        let stream = ictx
            .streams()
            .best(Type::Video)
            .ok_or_else(|| decode_err("no video stream".to_string()))?;
        let stream_index = stream.index();

        let fps = rate_to_f64(stream.avg_frame_rate())
            .or_else(|| rate_to_f64(stream.rate()))
            .unwrap_or(0.0);

        // Some containers leave nb_frames empty; estimate from the duration.
        let frame_count = if stream.frames() > 0 {
            stream.frames() as u64
        } else {
            match container_seconds(ictx.duration()) {
                Some(seconds) if fps > 0.0 => (seconds * fps).round() as u64,
                _ => 0,
            }
        };

        let context_decoder = ffmpeg::codec::context::Context::from_parameters(stream.parameters())?;
        let decoder = context_decoder.decoder().video()?;

        let scaler = Context::get(
            decoder.format(),
            decoder.width(),
            decoder.height(),
            Pixel::RGB24,
            decoder.width(),
            decoder.height(),
            Flags::BILINEAR,
        )?;

        log::debug!(
            "Opened {} ({}x{}, {:.3} fps, ~{} frames)",
            path.display(),
            decoder.width(),
            decoder.height(),
            fps,
            frame_count
        );

        Ok(Self {
            path: path.to_path_buf(),
            ictx,
            decoder,
            scaler,
            stream_index,
            fps,
            frame_count,
            frames_read: 0,
            eof_sent: false,
        })
    }

    fn to_frame(&mut self, decoded: &Video) -> Result<Frame> {
        let mut rgb_frame = Video::empty();
        self.scaler.run(decoded, &mut rgb_frame)?;
        let image = rgb_image_from(&rgb_frame).ok_or_else(|| MediaError::Decode {
            path: self.path.clone(),
            reason: format!("frame {} has an unexpected layout", self.frames_read),
        })?;
        let index = self.frames_read;
        self.frames_read += 1;
        let timestamp = if self.fps > 0.0 {
            index as f64 / self.fps
        } else {
            0.0
        };
        Ok(Frame {
            image,
            index,
            timestamp,
        })
    }
}

/// Copies an RGB24 frame row by row, dropping the stride padding.
fn rgb_image_from(frame: &Video) -> Option<RgbImage> {
    if frame.format() != Pixel::RGB24 {
        return None;
    }
    let width = frame.width() as usize;
    let height = frame.height() as usize;
    let stride = frame.stride(0);
    let data = frame.data(0);
    let row_len = width * 3;
    let mut buf = Vec::with_capacity(row_len * height);
    for y in 0..height {
        let row_start = y * stride;
        buf.extend_from_slice(data.get(row_start..row_start + row_len)?);
    }
    RgbImage::from_raw(width as u32, height as u32, buf)
}

impl FrameSource for FfmpegVideoSource {
    fn fps(&self) -> f64 {
        self.fps
    }

    fn frame_count(&self) -> u64 {
        self.frame_count
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        let mut decoded = Video::empty();
        loop {
            match self.decoder.receive_frame(&mut decoded) {
                Ok(()) => return self.to_frame(&decoded).map(Some),
                Err(ffmpeg::Error::Eof) => return Ok(None),
                Err(ffmpeg::Error::Other {
                    errno: ffmpeg::util::error::EAGAIN,
                }) => {}
                Err(e) => return Err(e.into()),
            }
            if self.eof_sent {
                return Ok(None);
            }

            let mut packet = Packet::empty();
            match packet.read(&mut self.ictx) {
                Ok(()) => {
                    if packet.stream() == self.stream_index {
                        self.decoder.send_packet(&packet)?;
                    }
                }
                Err(ffmpeg::Error::Eof) => {
                    self.decoder.send_eof()?;
                    self.eof_sent = true;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn padded_rows_are_copied_without_padding() {
        ffmpeg::init().unwrap();
        let (width, height) = (30u32, 3u32);
        let mut frame = Video::new(Pixel::RGB24, width, height);
        let stride = frame.stride(0);
        assert!(stride >= width as usize * 3);
        let data = frame.data_mut(0);
        for y in 0..height as usize {
            for x in 0..width as usize {
                let at = y * stride + x * 3;
                data[at..at + 3].copy_from_slice(&[x as u8, y as u8, 7]);
            }
        }

        let image = rgb_image_from(&frame).unwrap();
        assert_eq!(image.dimensions(), (width, height));
        assert_eq!(image.get_pixel(29, 2).0, [29, 2, 7]);
        assert_eq!(image.get_pixel(0, 1).0, [0, 1, 7]);
    }

    #[test]
    fn only_rgb24_frames_are_converted() {
        ffmpeg::init().unwrap();
        let frame = Video::new(Pixel::YUV420P, 4, 4);
        assert!(rgb_image_from(&frame).is_none());
    }

    #[test]
    fn container_duration_in_seconds() {
        let base = i64::from(ffmpeg::ffi::AV_TIME_BASE);
        assert_eq!(container_seconds(3 * base / 2), Some(1.5));
        assert_eq!(container_seconds(0), None);
        // AV_NOPTS_VALUE
        assert_eq!(container_seconds(i64::MIN), None);
    }

    #[test]
    fn text_file_is_not_a_video() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("notes.mp4");
        std::fs::write(&path, b"definitely not a video").unwrap();
        ffmpeg::init().unwrap();
        assert!(matches!(
            FfmpegVideoSource::open(&path),
            Err(MediaError::Decode { .. })
        ));
    }
}
