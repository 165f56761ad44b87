//! Anchor-free proposal decoding.
//!
//! The network predicts, per grid cell: a box center offset within the cell,
//! log-space box dimensions, an objectness score, and one score per class.
//! All scores are assumed to be probabilities already; applying the output
//! activation is the backend's responsibility, not the decoder's.

use super::grid::GridStride;
use super::result::{Detection, Rect};

/// Features per grid cell: 4 box coordinates + 1 objectness + class scores.
pub fn features_per_cell(num_classes: usize) -> usize {
    4 + 1 + num_classes
}

/// Decode one output buffer against its grid/stride table.
///
/// `output` holds `grid_strides.len()` cells of `features_per_cell` values in
/// cell-major order; index correspondence with the table is the contract
/// (see `decode::grid`). Cells whose best `objectness x class_score` clears
/// `conf_threshold` become candidates in network-input coordinates; the rest
/// are dropped.
///
/// Ties in the class argmax resolve to the lowest class index.
///
/// # Panics
///
/// Panics if the buffer is shorter than the table requires. A wrong-length
/// buffer is a caller contract violation, and reading out of bounds would
/// produce silently wrong detections.
pub fn decode_proposals(
    output: &[f32],
    grid_strides: &[GridStride],
    num_classes: usize,
    conf_threshold: f32,
) -> Vec<Detection> {
    let features = features_per_cell(num_classes);
    let required = grid_strides.len() * features;
    assert!(
        output.len() >= required,
        "output buffer holds {} values but the grid table requires {} ({} cells x {} features)",
        output.len(),
        required,
        grid_strides.len(),
        features
    );

    let mut proposals = Vec::new();
    for (cell, gs) in grid_strides.iter().enumerate() {
        let base = cell * features;
        let objectness = output[base + 4];

        let mut best_class = 0usize;
        let mut best_score = f32::MIN;
        for class in 0..num_classes {
            let score = output[base + 5 + class];
            if score > best_score {
                best_score = score;
                best_class = class;
            }
        }

        let prob = objectness * best_score;
        if prob <= conf_threshold {
            continue;
        }

        let stride = gs.stride as f32;
        let center_x = (output[base] + gs.gx as f32) * stride;
        let center_y = (output[base + 1] + gs.gy as f32) * stride;
        let width = output[base + 2].exp() * stride;
        let height = output[base + 3].exp() * stride;

        proposals.push(Detection {
            rect: Rect::new(center_x - width / 2.0, center_y - height / 2.0, width, height),
            label: best_class,
            prob,
        });
    }
    proposals
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::grid::generate_grid_strides;

    const NUM_CLASSES: usize = 3;

    fn empty_output(cells: usize) -> Vec<f32> {
        // exp(0) * stride produces a stride-sized box, but objectness 0 keeps
        // every cell below threshold.
        vec![0.0; cells * features_per_cell(NUM_CLASSES)]
    }

    fn force_cell(output: &mut [f32], cell: usize, class: usize, objectness: f32, score: f32) {
        let base = cell * features_per_cell(NUM_CLASSES);
        output[base] = 0.5; // center offset within the cell
        output[base + 1] = 0.5;
        output[base + 2] = 0.0; // exp(0) => stride-sized box
        output[base + 3] = 0.0;
        output[base + 4] = objectness;
        output[base + 5 + class] = score;
    }

    #[test]
    fn single_forced_cell_yields_single_proposal() {
        let table = generate_grid_strides(64, 64, &[8, 16]);
        let mut output = empty_output(table.len());
        // Cell 10 of the stride-8 grid (8x8): gx=2, gy=1.
        force_cell(&mut output, 10, 1, 0.9, 0.8);

        let proposals = decode_proposals(&output, &table, NUM_CLASSES, 0.3);
        assert_eq!(proposals.len(), 1);

        let det = &proposals[0];
        assert_eq!(det.label, 1);
        assert!((det.prob - 0.72).abs() < 1e-6);

        // Decoded center must land inside the forced cell: gx=2, gy=1, stride 8.
        let center_x = det.rect.x + det.rect.width / 2.0;
        let center_y = det.rect.y + det.rect.height / 2.0;
        assert!(center_x >= 16.0 && center_x < 24.0);
        assert!(center_y >= 8.0 && center_y < 16.0);
    }

    #[test]
    fn below_threshold_cells_are_discarded() {
        let table = generate_grid_strides(32, 32, &[8]);
        let mut output = empty_output(table.len());
        force_cell(&mut output, 0, 0, 0.5, 0.5); // prob 0.25

        let proposals = decode_proposals(&output, &table, NUM_CLASSES, 0.3);
        assert!(proposals.is_empty());
    }

    #[test]
    fn argmax_tie_resolves_to_lowest_class() {
        let table = generate_grid_strides(32, 32, &[8]);
        let mut output = empty_output(table.len());
        let base = 0;
        output[base + 4] = 1.0;
        output[base + 5] = 0.7;
        output[base + 6] = 0.7;
        output[base + 7] = 0.7;

        let proposals = decode_proposals(&output, &table, NUM_CLASSES, 0.3);
        assert_eq!(proposals.len(), 1);
        assert_eq!(proposals[0].label, 0);
    }

    #[test]
    fn box_dimensions_are_exponential_in_stride_units() {
        let table = generate_grid_strides(32, 32, &[16]);
        let mut output = empty_output(table.len());
        let base = 0;
        output[base + 2] = 1.0; // exp(1) * 16
        output[base + 3] = 0.0; // exp(0) * 16
        output[base + 4] = 1.0;
        output[base + 5] = 1.0;

        let proposals = decode_proposals(&output, &table, NUM_CLASSES, 0.3);
        assert_eq!(proposals.len(), 1);
        assert!((proposals[0].rect.width - 16.0 * 1.0f32.exp()).abs() < 1e-4);
        assert!((proposals[0].rect.height - 16.0).abs() < 1e-4);
    }

    #[test]
    #[should_panic(expected = "output buffer holds")]
    fn short_buffer_panics() {
        let table = generate_grid_strides(32, 32, &[8]);
        let output = vec![0.0f32; 3];
        decode_proposals(&output, &table, NUM_CLASSES, 0.3);
    }
}
