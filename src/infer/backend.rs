use anyhow::Result;

use crate::decode::{ChannelLayout, Quantization, TensorElement};

/// Options passed through to backend constructors.
///
/// Every field is advisory and backend-specific: adapters read what applies
/// to their runtime and ignore the rest.
#[derive(Clone, Debug)]
pub struct BackendConfig {
    /// Accelerator device index, for runtimes with more than one device.
    pub device_index: i32,
    /// Intra-op thread count for CPU runtimes.
    pub num_threads: usize,
    /// Declared network input width, for model formats that do not
    /// self-describe static shapes.
    pub input_width: u32,
    /// Declared network input height.
    pub input_height: u32,
    /// Class count of the loaded model, for runtimes whose output layout
    /// cannot be read back from tensor metadata alone.
    pub num_classes: usize,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            device_index: 0,
            num_threads: 1,
            input_width: 640,
            input_height: 640,
            num_classes: 80,
        }
    }
}

/// Raw buffer contents of one output tensor.
///
/// Quantized runtimes deliver integer levels as bytes; float runtimes can
/// hand over their `f32` output without a byte-packing round trip.
#[derive(Clone, Debug)]
pub enum TensorData {
    /// Raw bytes, interpreted per the tensor's element format.
    Bytes(Vec<u8>),
    /// Native host floats; element format is implicitly `Float32`.
    Floats(Vec<f32>),
}

/// One raw output tensor with the metadata decoding needs.
///
/// A backend returns either a single combined tensor covering every output
/// stride, or one tensor per stride in ascending-stride order. `cells` must
/// match the grid-table subrange the tensor covers; `features` must be
/// 4 box coordinates + 1 objectness + the model's class count.
#[derive(Clone, Debug)]
pub struct RawOutputTensor {
    pub data: TensorData,
    pub element: TensorElement,
    /// Per-tensor quantization parameters; identity for float tensors.
    pub quant: Quantization,
    pub layout: ChannelLayout,
    /// Grid cells covered by this tensor.
    pub cells: usize,
    /// Values per cell.
    pub features: usize,
}

impl RawOutputTensor {
    /// Convenience constructor for float backends: cell-major `f32` values,
    /// identity quantization.
    pub fn from_floats(values: Vec<f32>, cells: usize, features: usize) -> Self {
        Self {
            data: TensorData::Floats(values),
            element: TensorElement::Float32,
            quant: Quantization::default(),
            layout: ChannelLayout::CellMajor,
            cells,
            features,
        }
    }

    /// Number of values this tensor's metadata promises.
    pub fn expected_len(&self) -> usize {
        self.cells * self.features
    }

    /// Number of values actually present in the buffer.
    pub fn actual_len(&self) -> usize {
        match &self.data {
            TensorData::Bytes(bytes) => bytes.len() / self.element.size_bytes(),
            TensorData::Floats(values) => values.len(),
        }
    }
}

/// Inference backend trait.
///
/// One implementation per runtime, selected at configuration time. The
/// contract is a single synchronous operation: given one preprocessed image
/// buffer, return the raw output tensor(s) with their quantization metadata.
/// Whether a backend parallelizes its own input-feed and output-read
/// internally is invisible here; it must have joined any workers before
/// `run` returns.
///
/// Implementations must not retain the pixel slice or any reference into the
/// returned tensors across calls; per-frame buffers belong to the in-flight
/// call.
pub trait InferenceBackend: Send {
    /// Backend identifier, for logs and selection.
    fn name(&self) -> &'static str;

    /// Network input dimensions (width, height). Constant for the lifetime
    /// of the backend; the pipeline caches its grid table against these.
    fn input_dimensions(&self) -> (u32, u32);

    /// Run inference on one letterboxed RGB8 image buffer.
    ///
    /// `pixels` is `width * height * 3` bytes at exactly
    /// `input_dimensions()`; channel reordering and normalization are the
    /// implementation's own concern. An error fails this frame only; the
    /// backend must remain usable for subsequent calls.
    fn run(&mut self, pixels: &[u8], width: u32, height: u32) -> Result<Vec<RawOutputTensor>>;
}

/// Validate a frame buffer against the backend's declared dimensions.
pub(crate) fn check_input(
    pixels: &[u8],
    width: u32,
    height: u32,
    expect_w: u32,
    expect_h: u32,
) -> Result<()> {
    if width != expect_w || height != expect_h {
        anyhow::bail!(
            "frame size {}x{} does not match model input {}x{}",
            width,
            height,
            expect_w,
            expect_h
        );
    }
    let expected_len = (width as usize) * (height as usize) * 3;
    if pixels.len() != expected_len {
        anyhow::bail!(
            "expected {} RGB bytes, received {}",
            expected_len,
            pixels.len()
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tensor_length_accounting() {
        let t = RawOutputTensor::from_floats(vec![0.0; 12], 2, 6);
        assert_eq!(t.expected_len(), 12);
        assert_eq!(t.actual_len(), 12);

        let t = RawOutputTensor {
            data: TensorData::Bytes(vec![0u8; 24]),
            element: TensorElement::Uint16,
            quant: Quantization::default(),
            layout: ChannelLayout::CellMajor,
            cells: 2,
            features: 6,
        };
        assert_eq!(t.actual_len(), 12);
    }

    #[test]
    fn input_check_rejects_wrong_sizes() {
        assert!(check_input(&[0u8; 12], 2, 2, 2, 2).is_ok());
        assert!(check_input(&[0u8; 12], 2, 2, 4, 4).is_err());
        assert!(check_input(&[0u8; 11], 2, 2, 2, 2).is_err());
    }
}
