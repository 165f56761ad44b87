#![cfg(feature = "backend-ort")]

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use ort::execution_providers::{CUDAExecutionProvider, TensorRTExecutionProvider};
use ort::session::Session;
use ort::value::TensorRef;

use crate::infer::backend::{
    check_input, BackendConfig, InferenceBackend, RawOutputTensor,
};

/// GPU-accelerated compiled-graph backend via ONNX Runtime.
///
/// Registers the TensorRT and CUDA execution providers for the configured
/// device; ONNX Runtime falls back to CPU when neither is available, so the
/// same adapter also serves as a plain CPU path on machines without a GPU.
pub struct OrtBackend {
    session: Session,
    input_w: u32,
    input_h: u32,
    /// Reused NCHW staging buffer; sized once at load.
    input_scratch: Vec<f32>,
}

impl OrtBackend {
    /// Load a model and build a session with GPU execution providers.
    pub fn load<P: AsRef<Path>>(model_path: P, config: &BackendConfig) -> Result<Self> {
        let model_path = model_path.as_ref();
        let session = Session::builder()
            .context("failed to create session builder")?
            .with_execution_providers([
                TensorRTExecutionProvider::default()
                    .with_device_id(config.device_index)
                    .build(),
                CUDAExecutionProvider::default()
                    .with_device_id(config.device_index)
                    .build(),
            ])
            .context("failed to register execution providers")?
            .with_intra_threads(config.num_threads)
            .context("failed to set thread count")?
            .commit_from_file(model_path)
            .with_context(|| format!("failed to load model from {}", model_path.display()))?;

        log::info!(
            "OrtBackend: session ready for {} (device {})",
            model_path.display(),
            config.device_index
        );

        let scratch_len = 3 * config.input_width as usize * config.input_height as usize;
        Ok(Self {
            session,
            input_w: config.input_width,
            input_h: config.input_height,
            input_scratch: vec![0.0; scratch_len],
        })
    }

    fn fill_input(&mut self, pixels: &[u8]) {
        let width = self.input_w as usize;
        let height = self.input_h as usize;
        let plane = width * height;
        // HWC u8 -> NCHW f32, raw 0-255 values.
        for y in 0..height {
            for x in 0..width {
                let src = (y * width + x) * 3;
                let dst = y * width + x;
                self.input_scratch[dst] = pixels[src] as f32;
                self.input_scratch[plane + dst] = pixels[src + 1] as f32;
                self.input_scratch[2 * plane + dst] = pixels[src + 2] as f32;
            }
        }
    }
}

impl InferenceBackend for OrtBackend {
    fn name(&self) -> &'static str {
        "ort"
    }

    fn input_dimensions(&self) -> (u32, u32) {
        (self.input_w, self.input_h)
    }

    fn run(&mut self, pixels: &[u8], width: u32, height: u32) -> Result<Vec<RawOutputTensor>> {
        check_input(pixels, width, height, self.input_w, self.input_h)?;
        self.fill_input(pixels);

        let shape = vec![1usize, 3, self.input_h as usize, self.input_w as usize];
        let input_value = TensorRef::from_array_view((shape, self.input_scratch.as_slice()))
            .context("failed to build input tensor")?;
        let outputs = self
            .session
            .run(ort::inputs![input_value])
            .context("inference failed")?;

        let mut tensors = Vec::with_capacity(outputs.len());
        for (_name, output) in outputs.iter() {
            let view = output
                .try_extract_array::<f32>()
                .context("model output tensor was not f32")?;
            let shape = view.shape().to_vec();
            let (cells, features) = match shape.as_slice() {
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
