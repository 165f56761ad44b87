//! Mapping detections from network-input space back to original image pixels.

use super::result::Detection;

/// Rescale kept detections into original-image coordinates, in place.
///
/// `scale` must be the same letterbox scale factor applied during
/// preprocessing (`min(in_w / img_w, in_h / img_h)`); any mismatch offsets
/// every box systematically. Coordinates are clamped to the image bounds to
/// absorb rounding at the edges.
pub fn rescale_to_image(
    detections: &mut [Detection],
    scale: f32,
    original_w: u32,
    original_h: u32,
) {
    let max_x = original_w as f32 - 1.0;
    let max_y = original_h as f32 - 1.0;

    for det in detections.iter_mut() {
        let x0 = (det.rect.x / scale).clamp(0.0, max_x);
        let y0 = (det.rect.y / scale).clamp(0.0, max_y);
        let x1 = ((det.rect.x + det.rect.width) / scale).clamp(0.0, max_x);
        let y1 = ((det.rect.y + det.rect.height) / scale).clamp(0.0, max_y);

        det.rect.x = x0;
        det.rect.y = y0;
        det.rect.width = x1 - x0;
        det.rect.height = y1 - y0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::result::Rect;

    fn det(x: f32, y: f32, w: f32, h: f32) -> Detection {
        Detection {
            rect: Rect::new(x, y, w, h),
            label: 0,
            prob: 0.9,
        }
    }

    #[test]
    fn identity_scale_is_a_no_op() {
        let mut dets = vec![det(10.0, 20.0, 30.0, 40.0)];
        rescale_to_image(&mut dets, 1.0, 640, 480);
        assert_eq!(dets[0].rect, Rect::new(10.0, 20.0, 30.0, 40.0));
    }

    #[test]
    fn inverts_a_known_letterbox_resize() {
        // 640x640 network input over a 320x240 original: scale = min(2, 8/3) = 2.
        let mut dets = vec![det(100.0, 100.0, 50.0, 50.0)];
        rescale_to_image(&mut dets, 2.0, 320, 240);
        assert_eq!(dets[0].rect, Rect::new(50.0, 50.0, 25.0, 25.0));
    }

    #[test]
    fn half_scale_doubles_coordinates_and_clamps() {
        // scale 0.5 doubles coordinates; the box would reach (400, 400) but
        // the 320x240 image clamps it.
        let mut dets = vec![det(100.0, 100.0, 50.0, 50.0)];
        rescale_to_image(&mut dets, 0.5, 320, 240);
        let r = dets[0].rect;
        assert_eq!(r.x, 200.0);
        assert_eq!(r.y, 200.0);
        assert_eq!(r.x + r.width, 319.0);
        assert_eq!(r.y + r.height, 239.0);
    }

    #[test]
    fn boxes_outside_the_image_clamp_to_bounds() {
        let mut dets = vec![det(-50.0, -50.0, 2000.0, 2000.0)];
        rescale_to_image(&mut dets, 1.0, 640, 480);
        let r = dets[0].rect;
        assert_eq!(r.x, 0.0);
        assert_eq!(r.y, 0.0);
        assert_eq!(r.x + r.width, 639.0);
        assert_eq!(r.y + r.height, 479.0);
    }
}
