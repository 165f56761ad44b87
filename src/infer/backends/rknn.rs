#![cfg(feature = "backend-rknn")]

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use rknn_runtime::{nc1hwc2_to_flat, RknnModel, TensorFormat};

use crate::decode::{ChannelLayout, Quantization, TensorElement};
use crate::infer::backend::{
    check_input, BackendConfig, InferenceBackend, RawOutputTensor, TensorData,
};

/// Embedded-accelerator backend for Rockchip NPUs.
///
/// The NPU delivers quantized uint8 outputs with per-tensor affine
/// parameters; those are passed through untouched so dequantization happens
/// once, in the shared decoding path. NC1HWC2-packed outputs are unpacked to
/// a flat channel-major buffer here because the packing is a Rockchip
/// hardware detail, not a decoding concern.
pub struct RknnBackend {
    model: RknnModel,
    input_w: u32,
    input_h: u32,
    features: usize,
}

impl RknnBackend {
    /// Load a compiled .rknn model. Input dimensions come from the model's
    /// own input attributes (NHWC).
    pub fn load<P: AsRef<Path>>(model_path: P, config: &BackendConfig) -> Result<Self> {
        let model_path = model_path.as_ref();
        let model = RknnModel::load(model_path)
            .map_err(|e| anyhow!("failed to load rknn model {}: {}", model_path.display(), e))?;

        let input = model.input_attr();
        let (input_h, input_w) = match input.shape.as_slice() {
            [1, h, w, 3] => (*h, *w),
            other => {
                return Err(anyhow!(
                    "unexpected input tensor shape {:?}; expected [1, h, w, 3] NHWC",
                    other
                ))
            }
        };

        Ok(Self {
            model,
            input_w,
            input_h,
            features: 4 + 1 + config.num_classes,
        })
    }
}

impl InferenceBackend for RknnBackend {
    fn name(&self) -> &'static str {
        "rknn"
    }

    fn input_dimensions(&self) -> (u32, u32) {
        (self.input_w, self.input_h)
    }

    fn run(&mut self, pixels: &[u8], width: u32, height: u32) -> Result<Vec<RawOutputTensor>> {
        check_input(pixels, width, height, self.input_w, self.input_h)?;
        self.model
            .run(pixels)
            .map_err(|e| anyhow!("inference failed: {}", e))?;

        let output_attrs = self.model.output_attrs();
        let mut tensors = Vec::with_capacity(output_attrs.len());
        for (index, attr) in output_attrs.iter().enumerate() {
            let raw = self
                .model
                .output_raw(index)
                .map_err(|e| anyhow!("failed to read output {}: {}", index, e))?;
            let quant = Quantization::new(attr.scale, attr.zp as f32);

            let tensor = match attr.format {
                TensorFormat::NC1HWC2 => {
                    let (c1, h, w, c2) = match attr.shape.as_slice() {
                        [1, c1, h, w, c2] => {
                            (*c1 as usize, *h as usize, *w as usize, *c2 as usize)
                        }
                        other => {
                            return Err(anyhow!(
                                "unexpected NC1HWC2 output shape {:?}",
                                other
                            ))
                        }
                    };
                    // Unpack to [features, cells]; the H dimension carries
                    // the prediction count in this packing.
                    let flat = nc1hwc2_to_flat(raw, c1, h, w, c2, self.features);
                    RawOutputTensor {
                        data: TensorData::Bytes(flat),
                        element: TensorElement::Uint8,
                        quant,
                        layout: ChannelLayout::ChannelMajor,
                        cells: h,
                        features: self.features,
                    }
                }
                _ => {
                    // Per-stride NHWC grid: [1, gh, gw, features], features
                    // contiguous per cell.
                    let (cells, features) = match attr.shape.as_slice() {
                        [1, gh, gw, features] => {
                            ((*gh as usize) * (*gw as usize), *features as usize)
                        }
                        other => {
                            return Err(anyhow!("unexpected output shape {:?}", other))
                        }
                    };
                    RawOutputTensor {
                        data: TensorData::Bytes(raw.to_vec()),
                        element: TensorElement::Uint8,
                        quant,
                        layout: ChannelLayout::CellMajor,
                        cells,
                        features,
                    }
                }
            };
            tensors.push(tensor);
        }
        Ok(tensors)
    }
}
