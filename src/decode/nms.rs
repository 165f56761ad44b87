//! Confidence ordering and greedy non-maximum suppression.

use std::cmp::Ordering;

use super::result::Detection;

/// Sort candidates by descending confidence, in place.
///
/// The sort is stable: equal-confidence candidates keep their input order,
/// which keeps NMS results reproducible across runs and platforms. NaN
/// confidences compare as equal rather than panicking; the decoder never
/// produces them from finite outputs.
pub fn sort_by_confidence(candidates: &mut [Detection]) {
    candidates.sort_by(|a, b| b.prob.partial_cmp(&a.prob).unwrap_or(Ordering::Equal));
}

/// Greedy NMS over candidates already sorted by descending confidence.
///
/// Walks the slice in order; a candidate is kept unless it overlaps an
/// already-kept candidate with IoU at or above `iou_threshold`. Returns the
/// indices of kept candidates, in their sorted order.
///
/// Suppression is purely geometric; class labels are ignored. Callers that
/// want class-aware suppression partition candidates by class first.
/// Quadratic in the candidate count, which stays small after confidence
/// filtering.
pub fn nms_sorted(sorted: &[Detection], iou_threshold: f32) -> Vec<usize> {
    let mut kept: Vec<usize> = Vec::new();
    for (index, candidate) in sorted.iter().enumerate() {
        let suppressed = kept
            .iter()
            .any(|&k| sorted[k].rect.iou(&candidate.rect) >= iou_threshold);
        if !suppressed {
            kept.push(index);
        }
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::result::Rect;

    fn det(x: f32, y: f32, w: f32, h: f32, prob: f32, label: usize) -> Detection {
        Detection {
            rect: Rect::new(x, y, w, h),
            label,
            prob,
        }
    }

    #[test]
    fn sort_is_descending() {
        let mut dets = vec![
            det(0.0, 0.0, 1.0, 1.0, 0.2, 0),
            det(0.0, 0.0, 1.0, 1.0, 0.9, 0),
            det(0.0, 0.0, 1.0, 1.0, 0.5, 0),
        ];
        sort_by_confidence(&mut dets);
        let probs: Vec<f32> = dets.iter().map(|d| d.prob).collect();
        assert_eq!(probs, vec![0.9, 0.5, 0.2]);
    }

    #[test]
    fn sort_is_stable_for_equal_confidence() {
        let mut dets = vec![
            det(0.0, 0.0, 1.0, 1.0, 0.5, 0),
            det(1.0, 0.0, 1.0, 1.0, 0.5, 1),
            det(2.0, 0.0, 1.0, 1.0, 0.5, 2),
            det(3.0, 0.0, 1.0, 1.0, 0.9, 3),
        ];
        sort_by_confidence(&mut dets);
        assert_eq!(dets[0].label, 3);
        // Input order preserved among the 0.5 ties.
        assert_eq!(dets[1].label, 0);
        assert_eq!(dets[2].label, 1);
        assert_eq!(dets[3].label, 2);
    }

    #[test]
    fn overlapping_boxes_keep_only_highest_confidence() {
        let dets = vec![
            det(0.0, 0.0, 10.0, 10.0, 0.9, 0),
            det(1.0, 1.0, 10.0, 10.0, 0.8, 0),
        ];
        let kept = nms_sorted(&dets, 0.45);
        assert_eq!(kept, vec![0]);
    }

    #[test]
    fn disjoint_boxes_both_survive() {
        let dets = vec![
            det(0.0, 0.0, 10.0, 10.0, 0.9, 0),
            det(100.0, 100.0, 10.0, 10.0, 0.8, 1),
        ];
        let kept = nms_sorted(&dets, 0.45);
        assert_eq!(kept, vec![0, 1]);
    }

    #[test]
    fn suppression_ignores_class_labels() {
        let dets = vec![
            det(0.0, 0.0, 10.0, 10.0, 0.9, 0),
            det(0.5, 0.5, 10.0, 10.0, 0.8, 7),
        ];
        let kept = nms_sorted(&dets, 0.45);
        assert_eq!(kept, vec![0]);
    }

    #[test]
    fn zero_area_box_never_suppresses_and_is_never_an_error() {
        let dets = vec![
            det(5.0, 5.0, 0.0, 0.0, 0.9, 0),
            det(0.0, 0.0, 10.0, 10.0, 0.8, 0),
        ];
        let kept = nms_sorted(&dets, 0.45);
        // The degenerate box has IoU 0 against everything, so both survive.
        assert_eq!(kept, vec![0, 1]);
    }
}
