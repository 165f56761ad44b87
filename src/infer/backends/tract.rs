#![cfg(feature = "backend-tract")]

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use tract_onnx::prelude::*;

use crate::infer::backend::{
    check_input, BackendConfig, InferenceBackend, RawOutputTensor,
};

/// Portable-runtime backend: ONNX inference on the CPU via tract.
///
/// Loads a local model file and runs it with a fixed NCHW f32 input shape.
/// Output tensors come back as native floats with identity quantization.
pub struct TractBackend {
    model: TypedSimplePlan<TypedModel>,
    input_w: u32,
    input_h: u32,
}

impl TractBackend {
    /// Load an ONNX model from disk and prepare it for inference.
    ///
    /// tract needs the input shape pinned before optimization, so the
    /// declared `input_width`/`input_height` from the config are part of the
    /// load, not the run.
    pub fn load<P: AsRef<Path>>(model_path: P, config: &BackendConfig) -> Result<Self> {
        let model_path = model_path.as_ref();
        let (width, height) = (config.input_width, config.input_height);
        let model = tract_onnx::onnx()
            .model_for_path(model_path)
            .with_context(|| format!("failed to load ONNX model from {}", model_path.display()))?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(
                    f32::datum_type(),
                    tvec!(1, 3, height as usize, width as usize),
                ),
            )
            .context("failed to set input fact")?
            .into_optimized()
            .context("failed to optimize ONNX model")?
            .into_runnable()
            .context("failed to build runnable ONNX model")?;

        Ok(Self {
            model,
            input_w: width,
            input_h: height,
        })
    }

    fn build_input(&self, pixels: &[u8]) -> Result<Tensor> {
        let width = self.input_w as usize;
        // The detection heads were trained on raw 0-255 channel values, so no
        // normalization here; only HWC -> CHW reordering.
        let input = tract_ndarray::Array4::from_shape_fn(
            (1, 3, self.input_h as usize, width),
            |(_, channel, y, x)| pixels[(y * width + x) * 3 + channel] as f32,
        );
        Ok(input.into_tensor())
    }
}

impl InferenceBackend for TractBackend {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn input_dimensions(&self) -> (u32, u32) {
        (self.input_w, self.input_h)
    }

    fn run(&mut self, pixels: &[u8], width: u32, height: u32) -> Result<Vec<RawOutputTensor>> {
        check_input(pixels, width, height, self.input_w, self.input_h)?;
        let input = self.build_input(pixels)?;
        let outputs = self
            .model
            .run(tvec!(input.into()))
            .context("ONNX inference failed")?;

        let mut tensors = Vec::with_capacity(outputs.len());
        for output in outputs.iter() {
            let view = output
                .to_array_view::<f32>()
                .context("model output tensor was not f32")?;
            let shape = view.shape();
            // Detection heads emit [1, cells, features].
            let (cells, features) = match shape {
                [_, cells, features] => (*cells, *features),
                other => {
                    return Err(anyhow!(
                        "unexpected output tensor shape {:?}; expected [1, cells, features]",
                        other
                    ))
                }
            };
            let values: Vec<f32> = view.iter().copied().collect();
            tensors.push(RawOutputTensor::from_floats(values, cells, features));
        }
        Ok(tensors)
    }
}
