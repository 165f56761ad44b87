//! Letterbox preprocessing.
//!
//! Backends consume a frame resized to their declared input dimensions with
//! the aspect ratio preserved: the image is scaled by a single uniform
//! factor and the remaining canvas is padded gray. That factor must reach
//! the output rescaler unchanged: it is the only link between network-input
//! coordinates and original-image coordinates.

use image::{imageops, Rgb, RgbImage};

/// Pad value for the unused letterbox area.
const PAD_VALUE: u8 = 114;

/// A letterboxed frame plus the scale factor that produced it.
pub struct Letterbox {
    /// RGB8 canvas at exactly the requested target dimensions.
    pub image: RgbImage,
    /// `min(target_w / src_w, target_h / src_h)`.
    pub scale: f32,
}

/// Resize `src` into a `target_w` x `target_h` canvas, preserving aspect
/// ratio and padding the remainder. The scaled content sits at the top-left;
/// detections decoded from it map back through `scale` alone, with no
/// offset.
pub fn letterbox(src: &RgbImage, target_w: u32, target_h: u32) -> Letterbox {
    let scale = f32::min(
        target_w as f32 / src.width() as f32,
        target_h as f32 / src.height() as f32,
    );
    let scaled_w = ((src.width() as f32 * scale).round() as u32).clamp(1, target_w);
    let scaled_h = ((src.height() as f32 * scale).round() as u32).clamp(1, target_h);

    let resized = imageops::resize(src, scaled_w, scaled_h, imageops::FilterType::Triangle);
    let mut canvas = RgbImage::from_pixel(target_w, target_h, Rgb([PAD_VALUE; 3]));
    imageops::replace(&mut canvas, &resized, 0, 0);

    Letterbox {
        image: canvas,
        scale,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wide_image_scales_by_width() {
        let src = RgbImage::from_pixel(320, 240, Rgb([10, 20, 30]));
        let lb = letterbox(&src, 640, 640);
        assert_eq!(lb.image.dimensions(), (640, 640));
        assert!((lb.scale - 2.0).abs() < 1e-6);

        // Content fills the top 480 rows; below that is padding.
        assert_eq!(lb.image.get_pixel(0, 0), &Rgb([10, 20, 30]));
        assert_eq!(lb.image.get_pixel(0, 500), &Rgb([PAD_VALUE; 3]));
    }

    #[test]
    fn tall_image_scales_by_height() {
        let src = RgbImage::from_pixel(100, 400, Rgb([0, 0, 0]));
        let lb = letterbox(&src, 640, 640);
        assert!((lb.scale - 1.6).abs() < 1e-6);
        // 160 content columns, then padding.
        assert_eq!(lb.image.get_pixel(300, 0), &Rgb([PAD_VALUE; 3]));
    }

    #[test]
    fn matching_size_is_scale_one() {
        let src = RgbImage::from_pixel(640, 640, Rgb([1, 2, 3]));
        let lb = letterbox(&src, 640, 640);
        assert!((lb.scale - 1.0).abs() < 1e-6);
        assert_eq!(lb.image.get_pixel(639, 639), &Rgb([1, 2, 3]));
    }
}
