use anyhow::Result;

use crate::infer::backend::{check_input, InferenceBackend, RawOutputTensor};

/// Stub backend for tests and demos. Replays caller-supplied raw output
/// tensors instead of running a model, so the decoding path can be exercised
/// with known inputs, and so identical tensors can be fed through the
/// pipeline as if they came from any real runtime.
pub struct StubBackend {
    input_w: u32,
    input_h: u32,
    tensors: Vec<RawOutputTensor>,
}

impl StubBackend {
    /// A stub with no canned output. Calling `run` before supplying tensors
    /// is an error, matching a backend whose device produced nothing.
    pub fn new(input_w: u32, input_h: u32) -> Self {
        Self {
            input_w,
            input_h,
            tensors: Vec::new(),
        }
    }

    /// A stub that replays one all-zero combined tensor: every cell scores
    /// zero, so detection runs end to end and returns no objects.
    pub fn silent(input_w: u32, input_h: u32, cells: usize, features: usize) -> Self {
        Self::new(input_w, input_h)
            .with_tensors(vec![RawOutputTensor::from_floats(
                vec![0.0; cells * features],
                cells,
                features,
            )])
    }

    /// Set the tensors replayed on every `run` call.
    pub fn with_tensors(mut self, tensors: Vec<RawOutputTensor>) -> Self {
        self.tensors = tensors;
        self
    }
}

impl InferenceBackend for StubBackend {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn input_dimensions(&self) -> (u32, u32) {
        (self.input_w, self.input_h)
    }

    fn run(&mut self, pixels: &[u8], width: u32, height: u32) -> Result<Vec<RawOutputTensor>> {
        check_input(pixels, width, height, self.input_w, self.input_h)?;
        if self.tensors.is_empty() {
            anyhow::bail!("stub backend has no tensors to replay");
        }
        Ok(self.tensors.clone())
    }
}
