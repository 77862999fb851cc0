extern crate ffmpeg_next as ffmpeg;

use std::ffi::{OsStr, OsString};
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use rand::Rng;

use crate::error::{MediaError, Result};
use crate::video_source::container_seconds;

pub const DEFAULT_TIMEOUT_SECS: u64 = 300;
const POLL_INTERVAL: Duration = Duration::from_millis(100);
const PREVIEW_SIZE: u32 = 150;

#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Runs external programs with an argument vector and a time limit.
#[derive(Debug, Clone)]
pub struct ToolRunner {
    timeout: Duration,
}

impl Default for ToolRunner {
    fn default() -> Self {
        Self::new(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }
}

fn drain<R: Read + Send + 'static>(reader: Option<R>) -> JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut reader) = reader {
            let _ = reader.read_to_end(&mut buf);
        }
        String::from_utf8_lossy(&buf).into_owned()
    })
}

fn kill_and_reap(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

impl ToolRunner {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    fn wait_with_timeout(&self, child: &mut Child, program: &str) -> Result<ExitStatus> {
        let start = Instant::now();
        loop {
            match child.try_wait() {
                Ok(Some(status)) => return Ok(status),
                Ok(None) => {}
                Err(e) => {
                    kill_and_reap(child);
                    return Err(e.into());
                }
            }
            if start.elapsed() >= self.timeout {
                kill_and_reap(child);
                log::error!("{} timed out after {:?}", program, self.timeout);
                return Err(MediaError::Timeout {
                    program: program.to_string(),
                    timeout: self.timeout,
                });
            }
            thread::sleep(POLL_INTERVAL);
        }
    }

    /// Runs `program` with `args`, failing on a non-zero exit or timeout.
    pub fn run<S: AsRef<OsStr>>(&self, program: &str, args: &[S]) -> Result<ToolOutput> {
        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        log::debug!("Running command: {:?}", cmd);

        let mut child = cmd.spawn().map_err(|e| {
            MediaError::ExternalTool(format!("failed to start {}: {}", program, e))
        })?;
        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let status = self.wait_with_timeout(&mut child, program)?;
        let output = ToolOutput {
            stdout: stdout.join().unwrap_or_default(),
            stderr: stderr.join().unwrap_or_default(),
        };
        if !status.success() {
            log::error!("{} failed with {}: {}", program, status, output.stderr.trim());
            return Err(MediaError::ExternalTool(format!(
                "{} exited with {}: {}",
                program,
                status,
                output.stderr.trim()
            )));
        }
        Ok(output)
    }
}

fn os(s: &str) -> OsString {
    OsString::from(s)
}

pub fn convert_args(input: &Path, output: &Path) -> Vec<OsString> {
    vec![
        os("-y"),
        os("-i"),
        input.into(),
        output.into(),
    ]
}

pub fn extract_audio_args(input: &Path, output: &Path) -> Vec<OsString> {
    vec![
        os("-y"),
        os("-i"),
        input.into(),
        os("-q:a"),
        os("0"),
        os("-map"),
        os("a"),
        output.into(),
    ]
}

pub fn extract_all_frames_args(input: &Path, output_dir: &Path) -> Vec<OsString> {
    vec![os("-i"), input.into(), output_dir.join("frame_%04d.png").into()]
}

pub fn preview_frame_args(input: &Path, at_seconds: f64, output: &Path) -> Vec<OsString> {
    vec![
        os("-y"),
        os("-ss"),
        os(&format!("{:.3}", at_seconds)),
        os("-i"),
        input.into(),
        os("-vframes"),
        os("1"),
        os("-vf"),
        os(&format!("scale={}:{}", PREVIEW_SIZE, PREVIEW_SIZE)),
        output.into(),
    ]
}

pub fn download_args(url: &str, format: Option<&str>, downloads_dir: &Path) -> Vec<OsString> {
    let mut args = Vec::new();
    if let Some(format) = format {
        args.push(os("-f"));
        args.push(os(format));
    }
    args.push(os("-o"));
    args.push(downloads_dir.join("%(title)s.%(ext)s").into());
    args.push(os(url));
    args
}

pub fn list_formats_args(url: &str) -> Vec<OsString> {
    vec![os("-F"), os(url)]
}

fn require_file(input: &Path) -> Result<()> {
    if input.is_file() {
        Ok(())
    } else {
        Err(MediaError::InputMissing(input.to_path_buf()))
    }
}

/// Removes the regular files directly inside `dir`, creating it if needed.
pub fn clear_directory(dir: &Path) -> Result<()> {
    if !dir.exists() {
        fs::create_dir_all(dir)?;
        log::info!("Created {}", dir.display());
        return Ok(());
    }
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() {
            match fs::remove_file(&path) {
                Ok(()) => log::debug!("Deleted {}", path.display()),
                Err(e) => log::warn!("Failed to delete {}: {}", path.display(), e),
            }
        }
    }
    Ok(())
}

pub fn convert_video(
    runner: &ToolRunner,
    input: &Path,
    format: &str,
    output_dir: &Path,
) -> Result<PathBuf> {
    require_file(input)?;
    if format.is_empty() || !format.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(MediaError::InvalidInput(format!(
            "`{}` is not a container extension",
            format
        )));
    }
    fs::create_dir_all(output_dir)?;
    let output = output_dir.join(format!("converted_video.{}", format));
    runner.run("ffmpeg", &convert_args(input, &output))?;
    Ok(output)
}

pub fn extract_audio(runner: &ToolRunner, input: &Path, output_dir: &Path) -> Result<PathBuf> {
    require_file(input)?;
    fs::create_dir_all(output_dir)?;
    let output = output_dir.join("extracted_audio.mp3");
    runner.run("ffmpeg", &extract_audio_args(input, &output))?;
    Ok(output)
}

pub fn extract_all_frames(runner: &ToolRunner, input: &Path, output_dir: &Path) -> Result<()> {
    require_file(input)?;
    fs::create_dir_all(output_dir)?;
    runner.run("ffmpeg", &extract_all_frames_args(input, output_dir))?;
    Ok(())
}

/// Length of the container in seconds, read through libavformat.
pub fn probe_duration(input: &Path) -> Result<f64> {
    ffmpeg::init()?;
    let ictx = ffmpeg::format::input(&input)?;
    container_seconds(ictx.duration()).ok_or_else(|| MediaError::MetadataUnavailable {
        path: input.to_path_buf(),
        what: "duration".to_string(),
    })
}

/// `count` sorted random instants within `[0, duration)`.
pub fn random_times<R: Rng>(rng: &mut R, duration: f64, count: usize) -> Vec<f64> {
    if !(duration.is_finite() && duration > 0.0) {
        return Vec::new();
    }
    let mut times: Vec<f64> = (0..count).map(|_| rng.gen_range(0.0..duration)).collect();
    times.sort_by(|a, b| a.total_cmp(b));
    times
}

/// Replaces the contents of `output_dir` with `count` thumbnails taken at
/// random points of the video. Returns the thumbnails that were produced.
pub fn create_previews(
    runner: &ToolRunner,
    input: &Path,
    output_dir: &Path,
    count: usize,
) -> Result<Vec<PathBuf>> {
    require_file(input)?;
    clear_directory(output_dir)?;

    let duration = match probe_duration(input) {
        Ok(duration) => duration,
        Err(e) => {
            log::warn!("Failed to retrieve video duration, preview extraction skipped: {}", e);
            return Ok(Vec::new());
        }
    };

    let mut previews = Vec::new();
    for (i, at) in random_times(&mut rand::thread_rng(), duration, count)
        .into_iter()
        .enumerate()
    {
        let frame_path = output_dir.join(format!("frame_{}.png", i + 1));
        match runner.run("ffmpeg", &preview_frame_args(input, at, &frame_path)) {
            Ok(_) if frame_path.exists() => {
                log::info!("Extracted frame {} at {:.2}s to {}", i + 1, at, frame_path.display());
                previews.push(frame_path);
            }
            Ok(output) => log::warn!(
                "Failed to create frame {} at {:.2}s: {}",
                i + 1,
                at,
                output.stderr.trim()
            ),
            Err(e) => log::warn!("Failed to create frame {} at {:.2}s: {}", i + 1, at, e),
        }
    }
    Ok(previews)
}

pub fn list_formats(runner: &ToolRunner, url: &str) -> Result<String> {
    if url.trim().is_empty() {
        return Err(MediaError::InvalidInput("no URL provided".to_string()));
    }
    log::info!("Querying available formats...");
    Ok(runner.run("yt-dlp", &list_formats_args(url))?.stdout)
}

pub fn download_video(
    runner: &ToolRunner,
    url: &str,
    format: Option<&str>,
    downloads_dir: &Path,
) -> Result<String> {
    if url.trim().is_empty() {
        return Err(MediaError::InvalidInput("no URL provided".to_string()));
    }
    log::info!("Downloads directory: {}", downloads_dir.display());
    clear_directory(downloads_dir)?;
    Ok(runner.run("yt-dlp", &download_args(url, format, downloads_dir))?.stdout)
}
