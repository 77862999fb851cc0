use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use media_kit::assembler::ClipPacing;
use media_kit::qr_generation::{ErrorCorrection, ModuleStyle};
use media_kit::toolbox::DEFAULT_TIMEOUT_SECS;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "QR codes, window videos and small video chores"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Log per-frame and per-command detail
    #[arg(short, long, global = true, default_value_t = false)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate a QR code image
    Qr(QrArgs),
    /// Build a window video from a folder of images and clips
    Assemble(AssembleArgs),
    /// Save a still every few seconds of a video
    Extract(ExtractArgs),
    /// Hand video chores to ffmpeg and yt-dlp
    Tools(ToolsArgs),
}

#[derive(Args, Debug)]
pub struct QrArgs {
    /// The URL or data for the QR code
    #[arg(long, alias = "data")]
    pub url: String,

    /// Colour of the modules: a name, #RRGGBB or #RGB
    #[arg(long, default_value = "black")]
    pub color: String,

    /// Pixels per module
    #[arg(long, default_value_t = 10, value_parser = clap::value_parser!(u32).range(1..=100))]
    pub size: u32,

    #[arg(long, value_enum, default_value_t = ModuleStyle::Square)]
    pub style: ModuleStyle,

    /// Smallest QR version to use (grown if the data does not fit)
    #[arg(long = "qr-version", default_value_t = 1, value_parser = clap::value_parser!(i16).range(1..=40))]
    pub qr_version: i16,

    #[arg(long, alias = "error_correction", value_enum, ignore_case = true, default_value_t = ErrorCorrection::L)]
    pub error_correction: ErrorCorrection,

    /// Output file; `.svg` writes SVG. Defaults to <data>_<timestamp>.png
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Decode the rendered PNG and fail unless it reads back
    #[arg(long)]
    pub verify: bool,
}

#[derive(Args, Debug)]
pub struct AssembleArgs {
    /// Path to the folder containing images
    #[arg(short, long, default_value = "images", env = "MEDIA_KIT_IMAGES")]
    pub images: PathBuf,

    /// Path to the folder containing mp4 clips (optional)
    #[arg(short, long, default_value = "videos", env = "MEDIA_KIT_CLIPS")]
    pub clips: PathBuf,

    /// Path to the output folder
    #[arg(short, long, default_value = "output", env = "MEDIA_KIT_OUTPUT")]
    pub output: PathBuf,

    /// Randomise the order of images and clips
    #[arg(short, long, alias = "randomize")]
    pub randomise: bool,

    /// Seed for --randomise, for a repeatable order
    #[arg(long, requires = "randomise")]
    pub seed: Option<u64>,

    /// Frames per second of the output
    #[arg(short, long, default_value_t = 10.0, env = "MEDIA_KIT_FPS")]
    pub fps: f64,

    /// Seconds each image stays on screen
    #[arg(long, default_value_t = 15.0)]
    pub image_seconds: f64,

    /// Number of passes over the assets
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
    pub loops: u32,

    #[arg(long, value_enum, default_value_t = ClipPacing::Realtime)]
    pub clip_pacing: ClipPacing,

    /// Encoder options as key=val,key=val (e.g. preset=medium,crf=23)
    #[arg(long, default_value = "")]
    pub encoder_opts: String,
}

#[derive(Args, Debug)]
pub struct ExtractArgs {
    /// Path to the input video file
    pub video_path: PathBuf,

    /// Path to the output folder for frames
    pub output_folder: PathBuf,

    /// Interval between frames in seconds
    #[arg(long, default_value_t = 20.0)]
    pub interval: f64,
}

#[derive(Args, Debug)]
pub struct ToolsArgs {
    /// Give up on the external program after this many seconds
    #[arg(long, global = true, default_value_t = DEFAULT_TIMEOUT_SECS, env = "MEDIA_KIT_TOOL_TIMEOUT")]
    pub timeout: u64,

    #[command(subcommand)]
    pub command: ToolCommand,
}

#[derive(Subcommand, Debug)]
pub enum ToolCommand {
    /// Convert a video to another container
    Convert {
        input: PathBuf,
        #[arg(long, default_value = "mp4", value_parser = ["mp4", "mkv", "avi", "mov", "webm", "flv", "ogg"])]
        format: String,
        #[arg(short, long, default_value = "output")]
        output_dir: PathBuf,
    },
    /// Extract the audio track as mp3
    Audio {
        input: PathBuf,
        #[arg(short, long, default_value = "output")]
        output_dir: PathBuf,
    },
    /// Dump every frame as png
    Frames {
        input: PathBuf,
        #[arg(short, long, default_value = "output/frames")]
        output_dir: PathBuf,
    },
    /// Replace the preview folder with thumbnails from random points
    Previews {
        input: PathBuf,
        #[arg(short, long, default_value = "output/frames")]
        output_dir: PathBuf,
        #[arg(long, default_value_t = 3)]
        count: usize,
    },
    /// List the formats yt-dlp offers for a URL
    Formats { url: String },
    /// Download a video with yt-dlp (clears the downloads folder first)
    Download {
        url: String,
        /// yt-dlp format code
        #[arg(short, long)]
        format: Option<String>,
        #[arg(short, long, default_value = "downloads")]
        output_dir: PathBuf,
    },
}
