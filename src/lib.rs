//! Media utilities: QR codes, window videos assembled from stills and clips,
//! frame sampling, and thin wrappers over the ffmpeg and yt-dlp tools.

pub mod assembler;
pub mod asset_collector;
pub mod error;
pub mod frame_sampler;
pub mod media;
pub mod orientation;
pub mod qr_generation;
pub mod sort_lib;
pub mod stamp;
pub mod toolbox;
pub mod video_source;
pub mod video_writer;

pub use error::{MediaError, Result};
