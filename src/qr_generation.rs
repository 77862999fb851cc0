use std::fs;
use std::path::{Path, PathBuf};

use image::{Rgb, RgbImage, imageops};
use qrcode::render::svg;
use qrcode::types::QrError;
use qrcode::{EcLevel, QrCode, Version};

use crate::error::{MediaError, Result};
use crate::stamp::generation_stamp;

const BORDER_MODULES: u32 = 4;
const LIGHT: Rgb<u8> = Rgb([255, 255, 255]);
/// Share of a module left empty on each side by the gapped style.
const GAP_RATIO: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum ModuleStyle {
    #[default]
    Square,
    GappedSquare,
    Circle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum ErrorCorrection {
    #[default]
    #[value(name = "L")]
    L,
    #[value(name = "M")]
    M,
    #[value(name = "Q")]
    Q,
    #[value(name = "H")]
    H,
}

impl From<ErrorCorrection> for EcLevel {
    fn from(level: ErrorCorrection) -> Self {
        match level {
            ErrorCorrection::L => EcLevel::L,
            ErrorCorrection::M => EcLevel::M,
            ErrorCorrection::Q => EcLevel::Q,
            ErrorCorrection::H => EcLevel::H,
        }
    }
}

#[derive(Debug, Clone)]
pub struct QrOptions {
    pub data: String,
    pub color: Rgb<u8>,
    /// Pixels per module side.
    pub module_size: u32,
    pub style: ModuleStyle,
    /// Smallest version to use; grown automatically when the data needs it.
    pub version: i16,
    pub error_correction: ErrorCorrection,
}

/// Accepts `#RRGGBB`, `#RGB` or a basic CSS colour name.
pub fn parse_color(s: &str) -> Result<Rgb<u8>> {
    let invalid = || MediaError::InvalidInput(format!("unknown colour `{}`", s));
    let trimmed = s.trim();
    if let Some(hex) = trimmed.strip_prefix('#') {
        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(invalid());
        }
        let channel = |h: &str| u8::from_str_radix(h, 16).map_err(|_| invalid());
        return match hex.len() {
            6 => Ok(Rgb([
                channel(&hex[0..2])?,
                channel(&hex[2..4])?,
                channel(&hex[4..6])?,
            ])),
            3 => {
                let doubled: Vec<String> = hex.chars().map(|c| format!("{}{}", c, c)).collect();
                Ok(Rgb([
                    channel(&doubled[0])?,
                    channel(&doubled[1])?,
                    channel(&doubled[2])?,
                ]))
            }
            _ => Err(invalid()),
        };
    }
    let rgb = match trimmed.to_ascii_lowercase().as_str() {
        "black" => [0, 0, 0],
        "white" => [255, 255, 255],
        "red" => [255, 0, 0],
        "lime" => [0, 255, 0],
        "green" => [0, 128, 0],
        "blue" => [0, 0, 255],
        "yellow" => [255, 255, 0],
        "cyan" | "aqua" => [0, 255, 255],
        "magenta" | "fuchsia" => [255, 0, 255],
        "gray" | "grey" => [128, 128, 128],
        "silver" => [192, 192, 192],
        "maroon" => [128, 0, 0],
        "olive" => [128, 128, 0],
        "teal" => [0, 128, 128],
        "navy" => [0, 0, 128],
        "purple" => [128, 0, 128],
        "orange" => [255, 165, 0],
        _ => return Err(invalid()),
    };
    Ok(Rgb(rgb))
}

fn hex_color(color: Rgb<u8>) -> String {
    format!("#{:02x}{:02x}{:02x}", color[0], color[1], color[2])
}

/// Default file stem: the payload with every non-alphanumeric character
/// replaced by `_`, followed by a timestamp.
pub fn default_file_stem(data: &str) -> String {
    let sanitized: String = data
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    format!("{}_{}", sanitized, generation_stamp())
}

pub fn create_qr_code(options: &QrOptions) -> Result<QrCode> {
    if !(1..=40).contains(&options.version) {
        return Err(MediaError::InvalidInput(format!(
            "QR version must be between 1 and 40, got {}",
            options.version
        )));
    }
    if options.module_size == 0 {
        return Err(MediaError::InvalidInput(
            "module size must be at least 1".to_string(),
        ));
    }
    let level = EcLevel::from(options.error_correction);
    let data = options.data.as_bytes();
    match QrCode::with_version(data, Version::Normal(options.version), level) {
        Ok(code) => Ok(code),
        Err(QrError::DataTooLong) => {
            let code = QrCode::with_error_correction_level(data, level)?;
            log::info!(
                "Data does not fit version {}, using {:?}",
                options.version,
                code.version()
            );
            Ok(code)
        }
        Err(e) => Err(e.into()),
    }
}

fn module_pixel_is_dark(style: ModuleStyle, dx: u32, dy: u32, size: u32) -> bool {
    let size = size as f64;
    let (cx, cy) = (dx as f64 + 0.5, dy as f64 + 0.5);
    match style {
        ModuleStyle::Square => true,
        ModuleStyle::GappedSquare => {
            let gap = size * GAP_RATIO;
            cx >= gap && cx < size - gap && cy >= gap && cy < size - gap
        }
        ModuleStyle::Circle => {
            let r = size / 2.0;
            (cx - r).powi(2) + (cy - r).powi(2) <= r * r
        }
    }
}

/// Rasterizes `code` with a 4-module white border.
pub fn render_image(code: &QrCode, options: &QrOptions) -> RgbImage {
    let modules = code.width() as u32;
    let size = options.module_size;
    let side = (modules + 2 * BORDER_MODULES) * size;
    let mut img = RgbImage::from_pixel(side, side, LIGHT);

    for (i, color) in code.to_colors().iter().enumerate() {
        if *color != qrcode::Color::Dark {
            continue;
        }
        let x0 = (i as u32 % modules + BORDER_MODULES) * size;
        let y0 = (i as u32 / modules + BORDER_MODULES) * size;
        for dy in 0..size {
            for dx in 0..size {
                if module_pixel_is_dark(options.style, dx, dy, size) {
                    img.put_pixel(x0 + dx, y0 + dy, options.color);
                }
            }
        }
    }
    img
}

pub fn render_svg(code: &QrCode, options: &QrOptions) -> String {
    if options.style != ModuleStyle::Square {
        log::warn!("SVG output always uses square modules");
    }
    let dark = hex_color(options.color);
    code.render::<svg::Color>()
        .quiet_zone(true)
        .module_dimensions(options.module_size, options.module_size)
        .dark_color(svg::Color(&dark))
        .light_color(svg::Color("#ffffff"))
        .build()
}

/// Decodes `img` and checks that it carries exactly `expected`.
pub fn verify_image(img: &RgbImage, expected: &str) -> Result<()> {
    let mut prepared = rqrr::PreparedImage::prepare(imageops::grayscale(img));
    let grids = prepared.detect_grids();
    if grids.len() != 1 {
        return Err(MediaError::QrVerification(format!(
            "expected one code, detected {}",
            grids.len()
        )));
    }
    let (_, content) = grids[0]
        .decode()
        .map_err(|e| MediaError::QrVerification(e.to_string()))?;
    if content != expected {
        return Err(MediaError::QrVerification(format!(
            "decoded `{}` instead of `{}`",
            content, expected
        )));
    }
    Ok(())
}

/// Writes the code to `output` (PNG, or SVG for a `.svg` extension) and
/// returns the path written.
pub fn create_qrcode_file(
    options: &QrOptions,
    output: Option<&Path>,
    verify: bool,
) -> Result<PathBuf> {
    let code = create_qr_code(options)?;
    let path = match output {
        Some(path) => path.to_path_buf(),
        None => PathBuf::from(format!("{}.png", default_file_stem(&options.data))),
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let is_svg = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("svg"))
        .unwrap_or(false);
    if is_svg {
        fs::write(&path, render_svg(&code, options))?;
    } else {
        let img = render_image(&code, options);
        if verify && options.style == ModuleStyle::Square {
            verify_image(&img, &options.data)?;
        } else if verify {
            log::warn!("Only square modules can be verified, skipping the check");
        }
        log::info!("Generated QR code size: {}x{} pixels", img.width(), img.height());
        img.save(&path)?;
    }
    log::info!("QR code generated and saved as '{}'", path.display());
    Ok(path)
}
