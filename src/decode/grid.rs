//! Grid/stride table generation.
//!
//! Anchor-free heads predict one box per output grid cell. The table built
//! here links each flattened output index to its (cell, stride) pair, so its
//! ordering is an exact contract with the network's own output flattening:
//! stride-major, then row-major, then column-major. Get the order wrong and
//! every decoded box is silently wrong.
//!
//! Tables are pure functions of (input resolution, stride set). Callers cache
//! them per resolution and reuse them across frames; they are read-only after
//! construction and safe to share between pipeline instances.

/// One output grid cell: column, row, and the downsampling stride that
/// produced it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GridStride {
    pub gx: u32,
    pub gy: u32,
    pub stride: u32,
}

/// Build the grid/stride table for the given input resolution and strides.
///
/// For each stride `s` the head emits a `(w/s) x (h/s)` grid; entries are
/// emitted stride-major, row-major, column-major. The total length is
/// `sum((w/s) * (h/s))`.
pub fn generate_grid_strides(input_w: u32, input_h: u32, strides: &[u32]) -> Vec<GridStride> {
    let mut table = Vec::with_capacity(table_len(input_w, input_h, strides));
    for &stride in strides {
        let grid_w = input_w / stride;
        let grid_h = input_h / stride;
        for gy in 0..grid_h {
            for gx in 0..grid_w {
                table.push(GridStride { gx, gy, stride });
            }
        }
    }
    table
}

/// Number of cells the table for (w, h, strides) will contain.
pub fn table_len(input_w: u32, input_h: u32, strides: &[u32]) -> usize {
    strides
        .iter()
        .map(|&s| (input_w / s) as usize * (input_h / s) as usize)
        .sum()
}
