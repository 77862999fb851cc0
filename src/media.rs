extern crate ffmpeg_next as ffmpeg;

use std::path::Path;

use image::RgbImage;

use crate::error::{MediaError, Result};
use crate::video_source::FfmpegVideoSource;
use crate::video_writer::FfmpegVideoWriter;

/// One decoded picture and where it came from in its stream.
#[derive(Debug, Clone)]
pub struct Frame {
    pub image: RgbImage,
    pub index: u64,
    /// Seconds from the start of the source.
    pub timestamp: f64,
}

/// Sequential reader over the frames of a video.
pub trait FrameSource {
    fn fps(&self) -> f64;
    fn frame_count(&self) -> u64;
    /// Returns `Ok(None)` once the stream is exhausted.
    fn next_frame(&mut self) -> Result<Option<Frame>>;
}

/// Fixed-size video output.
pub trait FrameSink {
    fn write_frame(&mut self, frame: &RgbImage) -> Result<()>;
    /// Flushes and closes the output. Calling it again is a no-op.
    fn finish(&mut self) -> Result<()>;
}

/// Everything the core needs from an image/video library.
pub trait MediaBackend {
    fn open_video(&self, path: &Path) -> Result<Box<dyn FrameSource>>;
    fn load_image(&self, path: &Path) -> Result<RgbImage>;
    fn create_writer(
        &self,
        path: &Path,
        width: u32,
        height: u32,
        fps: f64,
    ) -> Result<Box<dyn FrameSink>>;
}

/// libav* through `ffmpeg-next` for video, the `image` crate for stills.
pub struct FfmpegBackend {
    encoder_opts: String,
}

impl FfmpegBackend {
    pub fn new(encoder_opts: &str) -> Result<Self> {
        ffmpeg::init()?;
        ffmpeg::util::log::set_level(ffmpeg::util::log::Level::Error);
        // Reject malformed options before any file is touched.
        parse_opts(encoder_opts)?;
        Ok(Self {
            encoder_opts: encoder_opts.to_string(),
        })
    }
}

impl MediaBackend for FfmpegBackend {
    fn open_video(&self, path: &Path) -> Result<Box<dyn FrameSource>> {
        Ok(Box::new(FfmpegVideoSource::open(path)?))
    }

    fn load_image(&self, path: &Path) -> Result<RgbImage> {
        let img = image::ImageReader::open(path)?
            .with_guessed_format()?
            .decode()
            .map_err(|e| MediaError::Decode {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        Ok(img.to_rgb8())
    }

    fn create_writer(
        &self,
        path: &Path,
        width: u32,
        height: u32,
        fps: f64,
    ) -> Result<Box<dyn FrameSink>> {
        let opts = parse_opts(&self.encoder_opts)?;
        Ok(Box::new(FfmpegVideoWriter::create(
            path, width, height, fps, opts,
        )?))
    }
}

/// Parses a comma separated `key=val` list into encoder options.
pub fn parse_opts<'a>(s: &str) -> Result<ffmpeg::Dictionary<'a>> {
    let mut dict = ffmpeg::Dictionary::new();
    for keyval in s.split_terminator(',').filter(|kv| !kv.trim().is_empty()) {
        let tokens: Vec<&str> = keyval.split('=').collect();
        match tokens[..] {
            [key, val] if !key.trim().is_empty() => dict.set(key.trim(), val.trim()),
            _ => {
                return Err(MediaError::InvalidInput(format!(
                    "encoder option `{}` is not of the form key=val",
                    keyval
                )));
            }
        }
    }
    Ok(dict)
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_opts_accepts_pairs_and_empty() {
        let dict = parse_opts("preset=medium,crf=23").unwrap();
        assert_eq!(dict.get("preset"), Some("medium"));
        assert_eq!(dict.get("crf"), Some("23"));
        assert!(parse_opts("").is_ok());
    }

    #[test]
    fn parse_opts_rejects_garbage() {
        assert!(matches!(
            parse_opts("preset"),
            Err(MediaError::InvalidInput(_))
        ));
        assert!(parse_opts("a=b=c").is_err());
    }
}
