/// Axis-aligned rectangle in some pixel coordinate space.
///
/// Whether coordinates are network-input pixels or original-image pixels
/// depends on where in the pipeline the owning `Detection` sits: the decoder
/// produces network-input space, `rescale_to_image` converts in place.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Rect {
    /// Top-left x coordinate.
    pub x: f32,
    /// Top-left y coordinate.
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn area(&self) -> f32 {
        self.width * self.height
    }

    /// Intersection-over-union with another rectangle.
    ///
    /// An empty union yields 0.0, so degenerate zero-area boxes never
    /// suppress anything and never divide by zero.
    pub fn iou(&self, other: &Rect) -> f32 {
        let x1 = self.x.max(other.x);
        let y1 = self.y.max(other.y);
        let x2 = (self.x + self.width).min(other.x + other.width);
        let y2 = (self.y + self.height).min(other.y + other.height);

        let intersection = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
        let union = self.area() + other.area() - intersection;

        if union > 0.0 {
            intersection / union
        } else {
            0.0
        }
    }
}

/// A single detected object.
///
/// Produced by the proposal decoder in network-input coordinates, consumed by
/// sort/NMS, and mapped into original-image coordinates by the rescaler.
/// Candidates and final detections share this type; only the coordinate space
/// differs.
#[derive(Clone, Debug)]
pub struct Detection {
    pub rect: Rect,
    /// Class index into the host's label table. The pipeline never resolves
    /// names; an out-of-range index is a caller error.
    pub label: usize,
    /// Confidence probability in [0, 1] (objectness x class score).
    pub prob: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn iou_of_identical_boxes_is_one() {
        let r = Rect::new(10.0, 10.0, 20.0, 20.0);
        assert!((r.iou(&r) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn iou_of_disjoint_boxes_is_zero() {
        let a = Rect::new(0.0, 0.0, 10.0, 10.0);
        let b = Rect::new(100.0, 100.0, 10.0, 10.0);
        assert_eq!(a.iou(&b), 0.0);
    }

    #[test]
    fn iou_of_half_overlapping_boxes() {
        // Two 10x10 boxes sharing a 5x10 strip: inter 50, union 150.
        let a = Rect::new(0.0, 0.0, 10.0, 10.0);
        let b = Rect::new(5.0, 0.0, 10.0, 10.0);
        assert!((a.iou(&b) - 50.0 / 150.0).abs() < 1e-6);
    }

    #[test]
    fn zero_area_box_has_zero_iou() {
        let degenerate = Rect::new(5.0, 5.0, 0.0, 0.0);
        let other = Rect::new(0.0, 0.0, 10.0, 10.0);
        assert_eq!(degenerate.iou(&other), 0.0);
        assert_eq!(degenerate.iou(&degenerate), 0.0);
    }
}
