use image::RgbImage;
use image::imageops::{self, FilterType};

pub const CANONICAL_WIDTH: u32 = 1920;
pub const CANONICAL_HEIGHT: u32 = 1080;

const FILTER: FilterType = FilterType::Triangle;

pub fn is_canonical(frame: &RgbImage) -> bool {
    frame.width() == CANONICAL_WIDTH && frame.height() == CANONICAL_HEIGHT
}

/// Brings any frame to 1920x1080.
///
/// Portrait (and square) frames are treated as phone footage held upright:
/// they are fitted to 1080x1920 and turned 90° clockwise. Landscape frames of
/// another size are scaled straight to the canonical size.
pub fn normalize(frame: RgbImage) -> RgbImage {
    if is_canonical(&frame) {
        return frame;
    }
    if frame.height() >= frame.width() {
        let portrait = imageops::resize(&frame, CANONICAL_HEIGHT, CANONICAL_WIDTH, FILTER);
        imageops::rotate90(&portrait)
    } else {
        imageops::resize(&frame, CANONICAL_WIDTH, CANONICAL_HEIGHT, FILTER)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn canonical_frame_is_returned_untouched() {
        let mut frame = RgbImage::new(CANONICAL_WIDTH, CANONICAL_HEIGHT);
        frame.put_pixel(3, 7, Rgb([1, 2, 3]));
        let ptr = frame.as_raw().as_ptr();
        let out = normalize(frame.clone());
        assert_eq!(out, frame);
        let moved = normalize(frame);
        assert_eq!(moved.as_raw().as_ptr(), ptr);
    }

    #[test]
    fn portrait_frame_turns_clockwise() {
        // Solid quadrants survive resampling, so the rotation is observable.
        let mut frame = RgbImage::from_pixel(1080, 1920, Rgb([0, 0, 255]));
        for y in 0..960 {
            for x in 0..1080 {
                frame.put_pixel(x, y, Rgb([255, 0, 0]));
            }
        }
        let out = normalize(frame);
        assert_eq!(out.dimensions(), (1920, 1080));
        // Clockwise: the old top half ends up on the right.
        assert_eq!(out.get_pixel(1900, 540), &Rgb([255, 0, 0]));
        assert_eq!(out.get_pixel(20, 540), &Rgb([0, 0, 255]));
    }

    #[test]
    fn small_portrait_frame_is_scaled_up() {
        let out = normalize(RgbImage::new(720, 1280));
        assert_eq!(out.dimensions(), (1920, 1080));
    }

    #[test]
    fn off_size_landscape_frame_keeps_its_orientation() {
        let mut frame = RgbImage::from_pixel(1280, 720, Rgb([0, 255, 0]));
        for y in 0..720 {
            for x in 0..640 {
                frame.put_pixel(x, y, Rgb([255, 255, 0]));
            }
        }
        let out = normalize(frame);
        assert_eq!(out.dimensions(), (1920, 1080));
        assert_eq!(out.get_pixel(20, 540), &Rgb([255, 255, 0]));
        assert_eq!(out.get_pixel(1900, 540), &Rgb([0, 255, 0]));
    }

    #[test]
    fn normalize_is_idempotent() {
        let once = normalize(RgbImage::from_pixel(600, 800, Rgb([9, 9, 9])));
        let twice = normalize(once.clone());
        assert_eq!(once, twice);
    }
}
