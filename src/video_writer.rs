extern crate ffmpeg_next as ffmpeg;

use std::path::{Path, PathBuf};

use ffmpeg::{Dictionary, Packet, Rational, codec, encoder, format, frame};
use image::RgbImage;

use crate::error::{MediaError, Result};
use crate::media::FrameSink;

/// H.264 encoder muxing into whatever container the output extension names.
pub struct FfmpegVideoWriter {
    path: PathBuf,
    encoder: encoder::Video,
    octx: format::context::Output,
    scaler: ffmpeg::software::scaling::Context,
    rgb_frame: frame::Video,
    yuv_frame: frame::Video,
    width: u32,
    height: u32,
    encoder_time_base: Rational,
    stream_time_base: Rational,
    frames_written: u64,
    finished: bool,
}

impl FfmpegVideoWriter {
    pub fn create(
        path: &Path,
        width: u32,
        height: u32,
        fps: f64,
        x264_opts: Dictionary,
    ) -> Result<Self> {
        if !(fps.is_finite() && fps > 0.0) {
            return Err(MediaError::InvalidInput(format!(
                "output frame rate must be positive, got {}",
                fps
            )));
        }
        let mut octx = format::output(&path)?;
        let global_header = octx.format().flags().contains(format::Flags::GLOBAL_HEADER);

        let codec = encoder::find(codec::Id::H264).ok_or(ffmpeg::Error::EncoderNotFound)?;
        let framerate = Rational::from(fps);
        let time_base = framerate.invert();

        let mut encoder = codec::context::Context::new_with_codec(codec)
            .encoder()
            .video()?;
        encoder.set_height(height);
        encoder.set_width(width);
        encoder.set_format(format::Pixel::YUV420P);
        encoder.set_time_base(time_base);
        encoder.set_frame_rate(Some(framerate));
        encoder.set_bit_rate(8_000_000);
        encoder.set_max_bit_rate(10_000_000);
        encoder.set_gop(12);
        if global_header {
            encoder.set_flags(codec::Flags::GLOBAL_HEADER);
        }
        let opened_encoder = encoder.open_with(x264_opts)?;

        {
            let mut ost = octx.add_stream(codec)?;
            ost.set_parameters(&opened_encoder);
            ost.set_time_base(time_base);
            ost.set_avg_frame_rate(framerate);
        }
        octx.write_header()?;
        // The muxer may pick its own time base while writing the header.
        let stream_time_base = octx
            .stream(0)
            .map(|s| s.time_base())
            .unwrap_or(time_base);

        let scaler = ffmpeg::software::scaling::Context::get(
            format::Pixel::RGB24,
            width,
            height,
            format::Pixel::YUV420P,
            width,
            height,
            ffmpeg::software::scaling::Flags::BILINEAR,
        )?;

        log::debug!(
            "Writing {} at {}x{}, {} fps",
            path.display(),
            width,
            height,
            framerate
        );

        Ok(Self {
            path: path.to_path_buf(),
            encoder: opened_encoder,
            octx,
            scaler,
            rgb_frame: frame::Video::new(format::Pixel::RGB24, width, height),
            yuv_frame: frame::Video::new(format::Pixel::YUV420P, width, height),
            width,
            height,
            encoder_time_base: time_base,
            stream_time_base,
            frames_written: 0,
            finished: false,
        })
    }

    fn copy_image_to_frame(&mut self, image: &RgbImage) {
        let row_len = self.width as usize * 3;
        let stride = self.rgb_frame.stride(0);
        let frame_data = self.rgb_frame.data_mut(0);
        for (y, row) in image.as_raw().chunks_exact(row_len).enumerate() {
            let dst_offset = y * stride;
            frame_data[dst_offset..dst_offset + row_len].copy_from_slice(row);
        }
    }

    fn write_pending_packets(&mut self) -> Result<()> {
        let mut packet = Packet::empty();
        loop {
            match self.encoder.receive_packet(&mut packet) {
                Ok(()) => {
                    packet.set_stream(0);
                    packet.rescale_ts(self.encoder_time_base, self.stream_time_base);
                    packet.write_interleaved(&mut self.octx)?;
                }
                Err(ffmpeg::Error::Other {
                    errno: ffmpeg::util::error::EAGAIN,
                })
                | Err(ffmpeg::Error::Eof) => return Ok(()),
                Err(e) => return Err(e.into()),
            }
        }
    }
}

impl FrameSink for FfmpegVideoWriter {
    fn write_frame(&mut self, image: &RgbImage) -> Result<()> {
        if self.finished {
            return Err(MediaError::InvalidInput(format!(
                "{} is already finalized",
                self.path.display()
            )));
        }
        if image.width() != self.width || image.height() != self.height {
            return Err(MediaError::InvalidInput(format!(
                "frame is {}x{}, output expects {}x{}",
                image.width(),
                image.height(),
                self.width,
                self.height
            )));
        }

        self.copy_image_to_frame(image);
        self.scaler.run(&self.rgb_frame, &mut self.yuv_frame)?;
        self.yuv_frame.set_pts(Some(self.frames_written as i64));
        self.encoder.send_frame(&self.yuv_frame)?;
        self.frames_written += 1;
        self.write_pending_packets()
    }

    fn finish(&mut self) -> Result<()> {
        if self.finished {
            return Ok(());
        }
        self.finished = true;
        self.encoder.send_eof()?;
        self.write_pending_packets()?;
        self.octx.write_trailer()?;
        log::debug!(
            "Finalized {} after {} frames",
            self.path.display(),
            self.frames_written
        );
        Ok(())
    }
}

impl Drop for FfmpegVideoWriter {
    fn drop(&mut self) {
        if !self.finished {
            if let Err(e) = self.finish() {
                log::warn!("Failed to finalize {}: {}", self.path.display(), e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::FrameSource;
    use crate::video_source::FfmpegVideoSource;
    use image::Rgb;
    use tempfile::TempDir;

    const WIDTH: u32 = 1920;
    const HEIGHT: u32 = 1080;
    const COLOUR: [u8; 3] = [200, 40, 40];

    fn writer(path: &Path) -> FfmpegVideoWriter {
        ffmpeg::init().unwrap();
        FfmpegVideoWriter::create(path, WIDTH, HEIGHT, 10.0, Dictionary::new()).unwrap()
    }

    fn write_frames(writer: &mut FfmpegVideoWriter, count: usize) {
        let image = RgbImage::from_pixel(WIDTH, HEIGHT, Rgb(COLOUR));
        for _ in 0..count {
            writer.write_frame(&image).unwrap();
        }
    }

    fn read_all(path: &Path) -> (FfmpegVideoSource, Vec<crate::media::Frame>) {
        let mut source = FfmpegVideoSource::open(path).unwrap();
        let mut frames = Vec::new();
        while let Some(frame) = source.next_frame().unwrap() {
            frames.push(frame);
        }
        (source, frames)
    }

    #[test]
    fn written_frames_read_back() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.mp4");
        let mut w = writer(&path);
        write_frames(&mut w, 12);
        w.finish().unwrap();
        w.finish().unwrap();

        let (source, frames) = read_all(&path);
        assert_eq!(frames.len(), 12);
        assert_eq!(source.frame_count(), 12);
        assert!((source.fps() - 10.0).abs() < 0.05);
        assert!(frames.iter().enumerate().all(|(i, f)| f.index == i as u64));

        let last = &frames[11];
        assert_eq!(last.image.dimensions(), (WIDTH, HEIGHT));
        assert!((last.timestamp - 1.1).abs() < 0.01);
        let centre = last.image.get_pixel(WIDTH / 2, HEIGHT / 2).0;
        for (got, want) in centre.iter().zip(COLOUR) {
            assert!((i32::from(*got) - i32::from(want)).abs() <= 20, "{:?}", centre);
        }
    }

    #[test]
    fn dropped_writer_still_leaves_a_playable_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("dropped.mp4");
        {
            let mut w = writer(&path);
            write_frames(&mut w, 5);
        }
        let (_, frames) = read_all(&path);
        assert_eq!(frames.len(), 5);
    }

    #[test]
    fn wrong_size_and_late_frames_are_rejected() {
        let dir = TempDir::new().unwrap();
        let mut w = writer(&dir.path().join("out.mp4"));
        let small = RgbImage::new(640, 480);
        assert!(matches!(w.write_frame(&small), Err(MediaError::InvalidInput(_))));

        write_frames(&mut w, 1);
        w.finish().unwrap();
        let frame = RgbImage::new(WIDTH, HEIGHT);
        assert!(matches!(w.write_frame(&frame), Err(MediaError::InvalidInput(_))));
    }

    #[test]
    fn non_positive_rate_is_rejected() {
        let dir = TempDir::new().unwrap();
        let result = FfmpegVideoWriter::create(
            &dir.path().join("out.mp4"),
            WIDTH,
            HEIGHT,
            0.0,
            Dictionary::new(),
        );
        assert!(matches!(result, Err(MediaError::InvalidInput(_))));
    }
}
