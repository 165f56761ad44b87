//! Backend-agnostic output decoding.
//!
//! Everything after inference and before the host sees results lives here:
//!
//! - `grid`: grid/stride table generation (cached per resolution)
//! - `dequant`: raw tensor bytes -> calibrated f32
//! - `proposals`: anchor-free box decode + confidence filtering
//! - `nms`: descending-confidence sort + greedy suppression
//! - `rescale`: network-input space -> original image pixels
//!
//! Each stage is a pure function over its inputs so detections are
//! numerically identical regardless of which backend produced the raw
//! tensor. Per-frame allocations (dequantized buffers, candidate lists) are
//! owned by the in-flight call; nothing here retains frame state.

pub mod dequant;
pub mod grid;
pub mod nms;
pub mod proposals;
pub mod rescale;
mod result;

pub use dequant::{dequantize, dequantize_buffer, ChannelLayout, Quantization, TensorElement};
pub use grid::{generate_grid_strides, GridStride};
pub use nms::{nms_sorted, sort_by_confidence};
pub use proposals::{decode_proposals, features_per_cell};
pub use rescale::rescale_to_image;
pub use result::{Detection, Rect};
