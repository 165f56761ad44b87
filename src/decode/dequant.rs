//! Output tensor dequantization.
//!
//! Quantized backends hand back integer levels plus per-tensor quantization
//! parameters; float backends hand back IEEE bytes. Everything downstream of
//! the backend boundary works on calibrated `f32`, so this module is the
//! single place raw output bytes are interpreted.
//!
//! A malformed element degrades to 0.0 with a logged warning instead of
//! failing the frame: a zeroed score falls below any positive confidence
//! threshold and the cell is discarded downstream.

/// Element format of a raw output tensor.
///
/// Little-endian byte order throughout, matching what every supported
/// runtime delivers on the host side.
#[non_exhaustive]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TensorElement {
    Uint8,
    Uint16,
    Float32,
}

impl TensorElement {
    pub fn size_bytes(&self) -> usize {
        match self {
            TensorElement::Uint8 => 1,
            TensorElement::Uint16 => 2,
            TensorElement::Float32 => 4,
        }
    }
}

/// Per-tensor affine quantization parameters.
///
/// Dequantized value = `(level - zero_point) * scale`. The default is the
/// identity mapping, which is what float backends report.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Quantization {
    pub scale: f32,
    pub zero_point: f32,
}

impl Default for Quantization {
    fn default() -> Self {
        Self {
            scale: 1.0,
            zero_point: 0.0,
        }
    }
}

impl Quantization {
    pub fn new(scale: f32, zero_point: f32) -> Self {
        Self { scale, zero_point }
    }

    #[inline]
    fn apply(&self, level: f32) -> f32 {
        (level - self.zero_point) * self.scale
    }
}

/// Memory layout of a multi-channel output buffer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ChannelLayout {
    /// `[cell][feature]`: what the decoder consumes directly.
    #[default]
    CellMajor,
    /// `[feature][cell]`: emitted by some embedded runtimes; transposed
    /// during dequantization.
    ChannelMajor,
}

/// Dequantize a single element from its raw bytes.
///
/// Quantization parameters are ignored for `Float32` (passthrough). A
/// truncated element logs a warning and yields 0.0 rather than failing the
/// frame.
pub fn dequantize(raw: &[u8], element: TensorElement, quant: &Quantization) -> f32 {
    if raw.len() < element.size_bytes() {
        log::warn!(
            "truncated {:?} tensor element ({} of {} bytes), treating as 0.0",
            element,
            raw.len(),
            element.size_bytes()
        );
        return 0.0;
    }
    match element {
        TensorElement::Uint8 => quant.apply(raw[0] as f32),
        TensorElement::Uint16 => quant.apply(u16::from_le_bytes([raw[0], raw[1]]) as f32),
        TensorElement::Float32 => f32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]),
    }
}

/// Dequantize a whole output buffer into a cell-major `f32` vector.
///
/// `features` is the per-cell feature count (4 box coords + 1 objectness +
/// class scores); it drives the transpose for `ChannelMajor` buffers. The
/// element-format dispatch happens once per buffer so the per-element loops
/// stay a bare affine transform.
pub fn dequantize_buffer(
    raw: &[u8],
    element: TensorElement,
    quant: &Quantization,
    layout: ChannelLayout,
    features: usize,
) -> Vec<f32> {
    let elem_size = element.size_bytes();
    let count = raw.len() / elem_size;
    if raw.len() % elem_size != 0 {
        log::warn!(
            "output buffer length {} is not a multiple of {:?} size; ignoring trailing bytes",
            raw.len(),
            element
        );
    }

    let mut values = Vec::with_capacity(count);
    match element {
        TensorElement::Uint8 => {
            values.extend(raw[..count].iter().map(|&v| quant.apply(v as f32)));
        }
        TensorElement::Uint16 => {
            values.extend(
                raw[..count * 2]
                    .chunks_exact(2)
                    .map(|b| quant.apply(u16::from_le_bytes([b[0], b[1]]) as f32)),
            );
        }
        TensorElement::Float32 => {
            values.extend(
                raw[..count * 4]
                    .chunks_exact(4)
                    .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]])),
            );
        }
    }

    match layout {
        ChannelLayout::CellMajor => values,
        ChannelLayout::ChannelMajor => transpose_to_cell_major(&values, features),
    }
}

/// Reorder a `[feature][cell]` buffer into `[cell][feature]`.
pub(crate) fn transpose_to_cell_major(values: &[f32], features: usize) -> Vec<f32> {
    if features == 0 || values.len() % features != 0 {
        log::warn!(
            "cannot transpose buffer of {} values with {} features per cell",
            values.len(),
            features
        );
        return values.to_vec();
    }
    let cells = values.len() / features;
    let mut out = vec![0.0f32; values.len()];
    for (i, &v) in values.iter().enumerate() {
        let channel = i / cells;
        let cell = i % cells;
        out[cell * features + channel] = v;
    }
    out
}
