use std::path::{Path, PathBuf};

use glob::{Pattern, glob};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

use crate::error::{MediaError, Result};
use crate::sort_lib::sort_paths_naturally;

const IMAGE_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];
const CLIP_EXTENSIONS: [&str; 1] = ["mp4"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetKind {
    Image,
    Clip,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Asset {
    pub path: PathBuf,
    pub kind: AssetKind,
    /// Position in the final ordering.
    pub index: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AssetOrder {
    #[default]
    Natural,
    Shuffled { seed: Option<u64> },
}

fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| extensions.iter().any(|e| ext.eq_ignore_ascii_case(e)))
        .unwrap_or(false)
}

/// Flat listing of the regular files in `dir` with one of `extensions`.
fn list_files(dir: &Path, extensions: &[&str]) -> Result<Vec<PathBuf>> {
    let pattern = format!("{}/*", Pattern::escape(&dir.to_string_lossy()));
    let mut files = Vec::new();
    for entry in glob(&pattern)? {
        match entry {
            Ok(path) if path.is_file() && has_extension(&path, extensions) => files.push(path),
            Ok(_) => {}
            Err(e) => log::warn!("Skipping unreadable entry: {}", e),
        }
    }
    Ok(files)
}

/// Gathers images (required) and clips (optional) into one ordered list.
pub fn collect_assets(
    image_dir: &Path,
    clip_dir: Option<&Path>,
    order: AssetOrder,
) -> Result<Vec<Asset>> {
    if !image_dir.is_dir() {
        return Err(MediaError::InputMissing(image_dir.to_path_buf()));
    }
    let images = list_files(image_dir, &IMAGE_EXTENSIONS)?;
    if images.is_empty() {
        return Err(MediaError::NoImages(image_dir.to_path_buf()));
    }

    let clips = match clip_dir {
        Some(dir) if dir.is_dir() => list_files(dir, &CLIP_EXTENSIONS)?,
        Some(dir) => {
            log::warn!("Clip folder {} not found, using images only", dir.display());
            Vec::new()
        }
        None => Vec::new(),
    };
    if !clips.is_empty() {
        log::info!("{} videos found in the folder", clips.len());
    }

    let mut assets: Vec<(PathBuf, AssetKind)> = images
        .into_iter()
        .map(|p| (p, AssetKind::Image))
        .chain(clips.into_iter().map(|p| (p, AssetKind::Clip)))
        .collect();
    log::info!("Found {} assets in the folders", assets.len());

    // Sorting first makes a seeded shuffle independent of listing order.
    assets.sort_by(|a, b| sort_paths_naturally(&a.0, &b.0));
    match order {
        AssetOrder::Natural => {
            log::info!("Assets will be displayed in the order they are named");
        }
        AssetOrder::Shuffled { seed } => {
            let mut rng = match seed {
                Some(seed) => StdRng::seed_from_u64(seed),
                None => StdRng::from_entropy(),
            };
            assets.shuffle(&mut rng);
            log::info!("Randomised the order of assets");
        }
    }

    Ok(assets
        .into_iter()
        .enumerate()
        .map(|(index, (path, kind))| Asset { path, kind, index })
        .collect())
}
