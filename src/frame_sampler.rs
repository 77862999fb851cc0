use std::fs;
use std::path::{Path, PathBuf};

use image::imageops;

use crate::error::{MediaError, Result};
use crate::media::{FrameSource, MediaBackend};

/// Which frames of a video get captured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplePlan {
    /// Capture every `step`-th frame, starting with frame 0.
    pub step: u64,
    pub frame_count: u64,
}

impl SamplePlan {
    /// An interval shorter than one frame period samples every frame.
    pub fn new(fps: f64, interval_seconds: f64, frame_count: u64) -> Self {
        let step = (fps * interval_seconds).floor().max(1.0) as u64;
        Self { step, frame_count }
    }

    pub fn is_sample(&self, frame_index: u64) -> bool {
        frame_index % self.step == 0
    }

    pub fn expected_samples(&self) -> u64 {
        self.frame_count.div_ceil(self.step)
    }
}

#[derive(Debug, Clone)]
pub struct SavedFrame {
    pub path: PathBuf,
    pub frame_index: u64,
    pub timestamp: f64,
}

#[derive(Debug, Default)]
pub struct SampleReport {
    pub saved: Vec<SavedFrame>,
    pub frames_read: u64,
}

/// Saves every sampled frame of `source` into `output_dir` as `frame_<n>.jpg`,
/// turned 90° counter-clockwise.
pub fn sample_frames(
    source: &mut dyn FrameSource,
    video_path: &Path,
    output_dir: &Path,
    interval_seconds: f64,
) -> Result<SampleReport> {
    let fps = source.fps();
    if !(fps.is_finite() && fps > 0.0) {
        return Err(MediaError::MetadataUnavailable {
            path: video_path.to_path_buf(),
            what: "frame rate".to_string(),
        });
    }
    let frame_count = source.frame_count();
    if frame_count == 0 {
        return Err(MediaError::MetadataUnavailable {
            path: video_path.to_path_buf(),
            what: "frame count".to_string(),
        });
    }

    let plan = SamplePlan::new(fps, interval_seconds, frame_count);
    log::info!(
        "Total frames={}, duration {:.1}s, saving every {} frames (~{} images)",
        frame_count,
        frame_count as f64 / fps,
        plan.step,
        plan.expected_samples()
    );

    let mut report = SampleReport::default();
    while let Some(frame) = source.next_frame()? {
        report.frames_read += 1;
        if !plan.is_sample(frame.index) {
            continue;
        }
        let path = output_dir.join(format!("frame_{}.jpg", report.saved.len()));
        imageops::rotate270(&frame.image).save(&path)?;
        log::debug!(
            "Saved frame {} ({:.2}s) to {}",
            frame.index,
            frame.timestamp,
            path.display()
        );
        report.saved.push(SavedFrame {
            path,
            frame_index: frame.index,
            timestamp: frame.timestamp,
        });
    }
    Ok(report)
}

/// Opens `video_path` through `backend` and samples it into `output_dir`.
pub fn extract_frames(
    backend: &dyn MediaBackend,
    video_path: &Path,
    output_dir: &Path,
    interval_seconds: f64,
) -> Result<SampleReport> {
    if !(interval_seconds.is_finite() && interval_seconds > 0.0) {
        return Err(MediaError::InvalidInput(format!(
            "interval must be a positive number of seconds, got {}",
            interval_seconds
        )));
    }
    if !video_path.is_file() {
        return Err(MediaError::InputMissing(video_path.to_path_buf()));
    }
    fs::create_dir_all(output_dir)?;

    let mut source = backend.open_video(video_path)?;
    let report = sample_frames(source.as_mut(), video_path, output_dir, interval_seconds)?;
    log::info!(
        "Extraction complete! Saved {} frames to {}",
        report.saved.len(),
        output_dir.display()
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::Frame;
    use crate::media::fakes::{FakeBackend, FakeVideo, FakeVideoSpec};
    use image::{Rgb, RgbImage};
    use tempfile::TempDir;

    /// One landscape frame, white on top and black underneath.
    struct TwoToneVideo {
        done: bool,
    }

    impl FrameSource for TwoToneVideo {
        fn fps(&self) -> f64 {
            1.0
        }

        fn frame_count(&self) -> u64 {
            1
        }

        fn next_frame(&mut self) -> Result<Option<Frame>> {
            if self.done {
                return Ok(None);
            }
            self.done = true;
            let image = RgbImage::from_fn(64, 32, |_, y| {
                if y < 16 { Rgb([255, 255, 255]) } else { Rgb([0, 0, 0]) }
            });
            Ok(Some(Frame {
                image,
                index: 0,
                timestamp: 0.0,
            }))
        }
    }

    #[test]
    fn saved_frames_turn_counter_clockwise() {
        let out = TempDir::new().unwrap();
        let mut video = TwoToneVideo { done: false };
        let report = sample_frames(&mut video, Path::new("v.mp4"), out.path(), 1.0).unwrap();
        assert_eq!(report.saved.len(), 1);

        let img = image::open(&report.saved[0].path).unwrap().to_luma8();
        assert_eq!((img.width(), img.height()), (32, 64));
        // The top edge of the source ends up on the left.
        assert!(img.get_pixel(4, 32).0[0] > 200);
        assert!(img.get_pixel(27, 32).0[0] < 50);
    }

    #[test]
    fn plan_step_never_drops_to_zero() {
        let plan = SamplePlan::new(30.0, 0.01, 10);
        assert_eq!(plan.step, 1);
        assert!((0..10).all(|i| plan.is_sample(i)));
        assert_eq!(plan.expected_samples(), 10);
    }

    #[test]
    fn plan_samples_every_step_frames() {
        let plan = SamplePlan::new(29.97, 2.0, 600);
        assert_eq!(plan.step, 59);
        let indices: Vec<u64> = (0..600).filter(|&i| plan.is_sample(i)).collect();
        assert_eq!(indices[..3], [0, 59, 118]);
        assert_eq!(indices.len() as u64, plan.expected_samples());
    }

    #[test]
    fn samples_about_duration_over_interval_frames() {
        let out = TempDir::new().unwrap();
        // 60 s at 25 fps, one frame every 20 s.
        let mut video = FakeVideo::new(25.0, 1500, 64, 36);
        let report =
            sample_frames(&mut video, Path::new("v.mp4"), out.path(), 20.0).unwrap();

        let expected = (60.0f64 / 20.0).floor() as i64;
        assert!((report.saved.len() as i64 - expected).abs() <= 1);
        assert_eq!(report.saved[0].frame_index, 0);
        assert!(report.saved.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
        assert_eq!(report.frames_read, 1500);

        for (n, saved) in report.saved.iter().enumerate() {
            assert_eq!(saved.path, out.path().join(format!("frame_{}.jpg", n)));
            let img = image::open(&saved.path).unwrap();
            // Rotated a quarter turn, so the sides swap.
            assert_eq!((img.width(), img.height()), (36, 64));
        }
    }

    #[test]
    fn sub_frame_interval_saves_every_frame() {
        let out = TempDir::new().unwrap();
        let mut video = FakeVideo::new(10.0, 5, 8, 8);
        let report = sample_frames(&mut video, Path::new("v.mp4"), out.path(), 0.01).unwrap();
        assert_eq!(report.saved.len(), 5);
    }

    #[test]
    fn zero_fps_is_fatal() {
        let out = TempDir::new().unwrap();
        let mut video = FakeVideo::new(0.0, 100, 8, 8);
        let err = sample_frames(&mut video, Path::new("v.mp4"), out.path(), 1.0).unwrap_err();
        assert!(matches!(err, MediaError::MetadataUnavailable { .. }));
        assert_eq!(std::fs::read_dir(out.path()).unwrap().count(), 0);
    }

    #[test]
    fn zero_frame_count_is_fatal() {
        let out = TempDir::new().unwrap();
        let mut video = FakeVideo::new(30.0, 10, 8, 8);
        video.reported_frame_count = 0;
        let err = sample_frames(&mut video, Path::new("v.mp4"), out.path(), 1.0).unwrap_err();
        assert!(matches!(err, MediaError::MetadataUnavailable { .. }));
    }

    #[test]
    fn extract_creates_folder_and_keeps_existing_files() {
        let root = TempDir::new().unwrap();
        let video_path = root.path().join("clip.mp4");
        std::fs::write(&video_path, b"not really a video").unwrap();
        let out = root.path().join("frames");
        std::fs::create_dir(&out).unwrap();
        std::fs::write(out.join("keep.txt"), b"keep").unwrap();

        let mut backend = FakeBackend::default();
        backend.videos.insert(
            video_path.clone(),
            FakeVideoSpec {
                fps: 10.0,
                frames: 30,
                width: 16,
                height: 16,
                fail_at: None,
            },
        );
        let report = extract_frames(&backend, &video_path, &out, 1.0).unwrap();
        assert_eq!(report.saved.len(), 3);
        assert!(out.join("keep.txt").exists());
        assert!(out.join("frame_2.jpg").exists());
    }

    #[test]
    fn extract_rejects_bad_interval_and_missing_video() {
        let root = TempDir::new().unwrap();
        let backend = FakeBackend::default();
        let missing = root.path().join("missing.mp4");
        assert!(matches!(
            extract_frames(&backend, &missing, root.path(), 0.0),
            Err(MediaError::InvalidInput(_))
        ));
        assert!(matches!(
            extract_frames(&backend, &missing, root.path(), 5.0),
            Err(MediaError::InputMissing(_))
        ));
    }

    #[test]
    fn unopenable_video_is_fatal() {
        let root = TempDir::new().unwrap();
        let video_path = root.path().join("broken.mp4");
        std::fs::write(&video_path, b"garbage").unwrap();
        let backend = FakeBackend::default();
        let err = extract_frames(&backend, &video_path, &root.path().join("out"), 5.0)
            .unwrap_err();
        assert!(matches!(err, MediaError::Decode { .. }));
    }
}
