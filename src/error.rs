extern crate ffmpeg_next as ffmpeg;

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum MediaError {
    #[error("Input not found: {}", .0.display())]
    InputMissing(PathBuf),

    #[error("No images found in {}", .0.display())]
    NoImages(PathBuf),

    #[error("Nothing to assemble: the asset list is empty")]
    EmptyAssetList,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Failed to decode {}: {reason}", path.display())]
    Decode { path: PathBuf, reason: String },

    #[error("Metadata unavailable for {}: {what}", path.display())]
    MetadataUnavailable { path: PathBuf, what: String },

    #[error("External tool error: {0}")]
    ExternalTool(String),

    #[error("{program} timed out after {:.1} seconds", .timeout.as_secs_f64())]
    Timeout { program: String, timeout: Duration },

    #[error("QR code did not decode back to its payload: {0}")]
    QrVerification(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("FFmpeg error: {0}")]
    Ffmpeg(#[from] ffmpeg::Error),

    #[error("Invalid glob pattern: {0}")]
    Pattern(#[from] glob::PatternError),

    #[error("QR encoding error: {0}")]
    Qr(#[from] qrcode::types::QrError),
}

pub type Result<T> = std::result::Result<T, MediaError>;
