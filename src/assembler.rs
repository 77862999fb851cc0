use std::fs;
use std::path::{Path, PathBuf};

use crate::asset_collector::{Asset, AssetKind};
use crate::error::{MediaError, Result};
use crate::media::{FrameSink, MediaBackend};
use crate::orientation::{CANONICAL_HEIGHT, CANONICAL_WIDTH, normalize};
use crate::stamp::generation_stamp;

pub const DEFAULT_FPS: f64 = 10.0;
pub const DEFAULT_IMAGE_SECONDS: f64 = 15.0;

/// How clip frames are mapped onto the output frame rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum ClipPacing {
    /// Each output tick shows the clip frame on screen at that instant, so
    /// clips keep their real duration at any rate ratio.
    #[default]
    Realtime,
    /// Keep every `floor(native / fps)`-th frame and write it twice.
    Decimate,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AssemblyConfig {
    pub fps: f64,
    pub image_seconds: f64,
    pub loop_count: u32,
    pub clip_pacing: ClipPacing,
}

impl Default for AssemblyConfig {
    fn default() -> Self {
        Self {
            fps: DEFAULT_FPS,
            image_seconds: DEFAULT_IMAGE_SECONDS,
            loop_count: 1,
            clip_pacing: ClipPacing::default(),
        }
    }
}

impl AssemblyConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.fps.is_finite() && self.fps > 0.0) {
            return Err(MediaError::InvalidInput(format!(
                "fps must be positive, got {}",
                self.fps
            )));
        }
        if !(self.image_seconds.is_finite() && self.image_seconds >= 0.0) {
            return Err(MediaError::InvalidInput(format!(
                "image duration must be zero or more seconds, got {}",
                self.image_seconds
            )));
        }
        if self.loop_count == 0 {
            return Err(MediaError::InvalidInput(
                "loop count must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Output frames each still image occupies.
    pub fn frames_per_image(&self) -> u64 {
        (self.fps * self.image_seconds).round() as u64
    }
}

#[derive(Debug, Clone)]
pub struct SkippedAsset {
    pub path: PathBuf,
    pub reason: String,
}

#[derive(Debug)]
pub struct AssemblyReport {
    pub output: PathBuf,
    pub frames_written: u64,
    pub images_written: usize,
    pub clips_written: usize,
    pub skipped: Vec<SkippedAsset>,
}

pub fn output_file_name(stamp: &str) -> String {
    format!("windowgen_{}.mp4", stamp)
}

/// Decides how many times each decoded clip frame is written.
struct ClipPacer {
    mode: ClipPacing,
    native_fps: f64,
    target_fps: f64,
    skip: u64,
    next_tick: u64,
}

impl ClipPacer {
    fn new(mode: ClipPacing, native_fps: f64, target_fps: f64) -> Self {
        let skip = (native_fps / target_fps).floor().max(1.0) as u64;
        Self {
            mode,
            native_fps,
            target_fps,
            skip,
            next_tick: 0,
        }
    }

    fn copies_for(&mut self, index: u64) -> u64 {
        match self.mode {
            ClipPacing::Decimate => {
                if index % self.skip == 0 {
                    2
                } else {
                    0
                }
            }
            ClipPacing::Realtime => {
                // Tick k (at k / target) falls before the end of frame i
                // (at (i + 1) / native).
                let frame_end = (index + 1) as f64 * self.target_fps;
                let mut copies = 0;
                while (self.next_tick as f64) * self.native_fps < frame_end {
                    self.next_tick += 1;
                    copies += 1;
                }
                copies
            }
        }
    }
}

struct Assembler<'a> {
    config: &'a AssemblyConfig,
    backend: &'a dyn MediaBackend,
    sink: &'a mut dyn FrameSink,
    frames_written: u64,
    images_written: usize,
    clips_written: usize,
    skipped: Vec<SkippedAsset>,
}

impl Assembler<'_> {
    fn skip(&mut self, path: &Path, reason: impl Into<String>) {
        let reason = reason.into();
        log::warn!("Skipping {}: {}", path.display(), reason);
        self.skipped.push(SkippedAsset {
            path: path.to_path_buf(),
            reason,
        });
    }

    fn write_image(&mut self, path: &Path) -> Result<()> {
        log::info!("Adding image {} to the video", path.display());
        let image = match self.backend.load_image(path) {
            Ok(image) => normalize(image),
            Err(e) => {
                self.skip(path, e.to_string());
                return Ok(());
            }
        };
        for _ in 0..self.config.frames_per_image() {
            self.sink.write_frame(&image)?;
            self.frames_written += 1;
        }
        self.images_written += 1;
        Ok(())
    }

    fn write_clip(&mut self, path: &Path) -> Result<()> {
        log::info!("Adding video {} to the video", path.display());
        let mut source = match self.backend.open_video(path) {
            Ok(source) => source,
            Err(e) => {
                self.skip(path, e.to_string());
                return Ok(());
            }
        };
        let native_fps = source.fps();
        if !(native_fps.is_finite() && native_fps > 0.0) {
            self.skip(path, "frame rate unavailable");
            return Ok(());
        }
        log::debug!(
            "Video fps={}, number of frames={}",
            native_fps,
            source.frame_count()
        );

        let mut pacer = ClipPacer::new(self.config.clip_pacing, native_fps, self.config.fps);
        let mut clip_frames = 0u64;
        loop {
            let frame = match source.next_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) => break,
                Err(e) => {
                    log::info!("{} frames written from this video", clip_frames);
                    self.skip(path, format!("stopped after {} frames: {}", clip_frames, e));
                    return Ok(());
                }
            };
            let copies = pacer.copies_for(frame.index);
            if copies == 0 {
                continue;
            }
            let image = normalize(frame.image);
            for _ in 0..copies {
                self.sink.write_frame(&image)?;
                self.frames_written += 1;
                clip_frames += 1;
            }
        }
        log::info!("{} frames written from this video", clip_frames);
        self.clips_written += 1;
        Ok(())
    }

    fn run(&mut self, assets: &[Asset]) -> Result<()> {
        for pass in 0..self.config.loop_count {
            log::debug!("Pass {} of {}", pass + 1, self.config.loop_count);
            for asset in assets {
                match asset.kind {
                    AssetKind::Image => self.write_image(&asset.path)?,
                    AssetKind::Clip => self.write_clip(&asset.path)?,
                }
            }
        }
        Ok(())
    }
}

/// Writes `assets` in order into `output_dir/windowgen_<stamp>.mp4`.
///
/// Assets that cannot be decoded are skipped and listed in the report. A
/// failure of the output stream itself aborts the run, after the stream has
/// been finalized.
pub fn assemble_video(
    assets: &[Asset],
    config: &AssemblyConfig,
    backend: &dyn MediaBackend,
    output_dir: &Path,
) -> Result<AssemblyReport> {
    config.validate()?;
    if assets.is_empty() {
        return Err(MediaError::EmptyAssetList);
    }

    fs::create_dir_all(output_dir)?;
    let output = output_dir.join(output_file_name(&generation_stamp()));
    let mut sink = backend.create_writer(&output, CANONICAL_WIDTH, CANONICAL_HEIGHT, config.fps)?;

    let mut assembler = Assembler {
        config,
        backend,
        sink: sink.as_mut(),
        frames_written: 0,
        images_written: 0,
        clips_written: 0,
        skipped: Vec::new(),
    };
    let outcome = assembler.run(assets);
    let Assembler {
        frames_written,
        images_written,
        clips_written,
        skipped,
        ..
    } = assembler;
    let finished = sink.finish();
    outcome?;
    finished?;

    log::info!("Video saved as {}", output.display());
    Ok(AssemblyReport {
        output,
        frames_written,
        images_written,
        clips_written,
        skipped,
    })
}
