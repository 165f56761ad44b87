#![cfg(feature = "backend-tflite")]

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use tflite::ops::builtin::BuiltinOpResolver;
use tflite::{FlatBufferModel, Interpreter, InterpreterBuilder};

use crate::infer::backend::{
    check_input, BackendConfig, InferenceBackend, RawOutputTensor,
};

/// Mobile-interpreter backend via TensorFlow Lite.
///
/// Runs float models through the builtin-op interpreter (XNNPACK kernels
/// where the build provides them). Input is NHWC f32, which is what the
/// flatbuffer export of the detection models declares.
pub struct TfliteBackend {
    interpreter: Interpreter<'static, BuiltinOpResolver>,
    input_w: u32,
    input_h: u32,
}

impl TfliteBackend {
    /// Load a flatbuffer model and allocate interpreter tensors.
    pub fn load<P: AsRef<Path>>(model_path: P, config: &BackendConfig) -> Result<Self> {
        let model_path = model_path.as_ref();
        let model = FlatBufferModel::build_from_file(model_path)
            .with_context(|| format!("failed to load model from {}", model_path.display()))?;
        let resolver = BuiltinOpResolver::default();
        let builder = InterpreterBuilder::new(model, resolver)
            .context("failed to create interpreter builder")?;
        let mut interpreter = builder.build().context("failed to build interpreter")?;
        interpreter.set_num_threads(config.num_threads as i32);
        interpreter
            .allocate_tensors()
            .context("failed to allocate tensors")?;

        // NHWC input: [1, height, width, 3].
        let input_index = *interpreter
            .inputs()
            .first()
            .ok_or_else(|| anyhow!("model has no input tensor"))?;
        let info = interpreter
            .tensor_info(input_index)
            .ok_or_else(|| anyhow!("missing input tensor info"))?;
        let (input_h, input_w) = match info.dims.as_slice() {
            [1, h, w, 3] => (*h as u32, *w as u32),
            other => {
                return Err(anyhow!(
                    "unexpected input tensor shape {:?}; expected [1, h, w, 3]",
                    other
                ))
            }
        };

        Ok(Self {
            interpreter,
            input_w,
            input_h,
        })
    }
}

impl InferenceBackend for TfliteBackend {
    fn name(&self) -> &'static str {
        "tflite"
    }

    fn input_dimensions(&self) -> (u32, u32) {
        (self.input_w, self.input_h)
    }

    fn run(&mut self, pixels: &[u8], width: u32, height: u32) -> Result<Vec<RawOutputTensor>> {
        check_input(pixels, width, height, self.input_w, self.input_h)?;

        let input_index = *self
            .interpreter
            .inputs()
            .first()
            .ok_or_else(|| anyhow!("model has no input tensor"))?;
        {
            let input: &mut [f32] = self
                .interpreter
                .tensor_data_mut(input_index)
                .context("failed to map input tensor")?;
            // NHWC layout matches the incoming RGB8 buffer directly.
            for (dst, &src) in input.iter_mut().zip(pixels.iter()) {
                *dst = src as f32;
            }
        }

        self.interpreter.invoke().context("inference failed")?;

        let output_indices: Vec<i32> = self.interpreter.outputs().to_vec();
        let mut tensors = Vec::with_capacity(output_indices.len());
        for output_index in output_indices {
            let info = self
                .interpreter
                .tensor_info(output_index)
                .ok_or_else(|| anyhow!("missing output tensor info"))?;
            let (cells, features) = match info.dims.as_slice() {
                [_, cells, features] => (*cells, *features),
                other => {
                    return Err(anyhow!(
                        "unexpected output tensor shape {:?}; expected [1, cells, features]",
                        other
                    ))
                }
            };
            let values: &[f32] = self
                .interpreter
                .tensor_data(output_index)
                .context("failed to map output tensor")?;
            tensors.push(RawOutputTensor::from_floats(values.to_vec(), cells, features));
        }
        Ok(tensors)
    }
}
