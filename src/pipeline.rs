//! Detection pipeline orchestration.
//!
//! One pipeline owns one backend and drives the full per-frame flow:
//! letterbox preprocess -> backend run -> dequantize -> per-tensor proposal
//! decode -> pooled sort + NMS -> rescale to original image coordinates.
//!
//! Candidates from every output tensor are pooled before the single NMS
//! pass. Suppression must see all scales together: running it per stride
//! would let duplicate detections of one object at different scales survive.

use std::borrow::Cow;

use anyhow::{bail, Context, Result};
use image::RgbImage;

use crate::config::{PipelineConfig, MAX_OUTPUT_STREAMS};
use crate::decode::{
    decode_proposals, dequant, dequantize_buffer, features_per_cell, generate_grid_strides,
    nms_sorted, rescale_to_image, sort_by_confidence, ChannelLayout, Detection, GridStride,
};
use crate::infer::{create_backend, InferenceBackend, RawOutputTensor, TensorData};
use crate::preprocess::letterbox;

/// Backend-agnostic detection pipeline.
///
/// Construction is fallible (configuration and model loading); a value that
/// exists is runnable. A failed `detect` call reports that frame's error and
/// leaves the pipeline valid for subsequent frames.
pub struct DetectionPipeline {
    backend: Box<dyn InferenceBackend>,
    confidence_threshold: f32,
    iou_threshold: f32,
    num_classes: usize,
    features: usize,
    /// Cached per input resolution; regenerated only if the configuration
    /// changes, never per frame.
    grid_strides: Vec<GridStride>,
}

impl DetectionPipeline {
    /// Wrap an already-loaded backend.
    pub fn new(backend: Box<dyn InferenceBackend>, config: &PipelineConfig) -> Result<Self> {
        config.validate()?;

        let (input_w, input_h) = backend.input_dimensions();
        for &stride in &config.strides {
            if input_w % stride != 0 || input_h % stride != 0 {
                bail!(
                    "backend input {}x{} is not divisible by stride {}",
                    input_w,
                    input_h,
                    stride
                );
            }
        }

        let grid_strides = generate_grid_strides(input_w, input_h, &config.strides);
        log::info!(
            "pipeline ready: backend={} input={}x{} strides={:?} cells={}",
            backend.name(),
            input_w,
            input_h,
            config.strides,
            grid_strides.len()
        );

        Ok(Self {
            backend,
            confidence_threshold: config.confidence_threshold,
            iou_threshold: config.iou_threshold,
            num_classes: config.num_classes,
            features: features_per_cell(config.num_classes),
            grid_strides,
        })
    }

    /// Build the configured backend and wrap it.
    pub fn from_config(config: &PipelineConfig) -> Result<Self> {
        config.validate()?;
        let backend = create_backend(config)?;
        Self::new(backend, config)
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    pub fn input_dimensions(&self) -> (u32, u32) {
        self.backend.input_dimensions()
    }

    /// Run detection on one image.
    ///
    /// Returns detections in original-image pixel coordinates, highest
    /// confidence first.
    pub fn detect(&mut self, image: &RgbImage) -> Result<Vec<Detection>> {
        let (input_w, input_h) = self.backend.input_dimensions();
        let lb = letterbox(image, input_w, input_h);

        let tensors = self
            .backend
            .run(lb.image.as_raw(), input_w, input_h)
            .with_context(|| format!("backend '{}' inference failed", self.backend.name()))?;

        let candidates = self.decode_tensors(&tensors)?;

        let mut sorted = candidates;
        sort_by_confidence(&mut sorted);
        let kept = nms_sorted(&sorted, self.iou_threshold);

        let mut detections: Vec<Detection> = kept.into_iter().map(|i| sorted[i].clone()).collect();
        rescale_to_image(&mut detections, lb.scale, image.width(), image.height());
        Ok(detections)
    }

    /// Decode every output tensor against its grid-table subrange and pool
    /// the candidates.
    fn decode_tensors(&self, tensors: &[RawOutputTensor]) -> Result<Vec<Detection>> {
        if tensors.is_empty() {
            bail!("backend returned no output tensors");
        }
        if tensors.len() > MAX_OUTPUT_STREAMS {
            bail!(
                "backend returned {} output tensors, more than the supported {}",
                tensors.len(),
                MAX_OUTPUT_STREAMS
            );
        }

        let mut candidates = Vec::new();
        let mut offset = 0usize;
        for (index, tensor) in tensors.iter().enumerate() {
            if tensor.features != self.features {
                bail!(
                    "output tensor {} has {} features per cell, expected {} (4 + 1 + {} classes)",
                    index,
                    tensor.features,
                    self.features,
                    self.num_classes
                );
            }
            if tensor.actual_len() != tensor.expected_len() {
                bail!(
                    "output tensor {} holds {} values but declares {} cells x {} features",
                    index,
                    tensor.actual_len(),
                    tensor.cells,
                    tensor.features
                );
            }
            let end = offset + tensor.cells;
            if end > self.grid_strides.len() {
                bail!(
                    "output tensors cover {} cells, more than the {} the grid table holds",
                    end,
                    self.grid_strides.len()
                );
            }

            let values = tensor_values(tensor);
            candidates.extend(decode_proposals(
                &values,
                &self.grid_strides[offset..end],
                self.num_classes,
                self.confidence_threshold,
            ));
            offset = end;
        }

        if offset != self.grid_strides.len() {
            bail!(
                "output tensors cover {} cells but the grid table holds {}",
                offset,
                self.grid_strides.len()
            );
        }
        Ok(candidates)
    }
}

/// Calibrated cell-major values for one tensor, borrowing when the backend
/// already delivered that form.
fn tensor_values(tensor: &RawOutputTensor) -> Cow<'_, [f32]> {
    match (&tensor.data, tensor.layout) {
        (TensorData::Floats(values), ChannelLayout::CellMajor) => Cow::Borrowed(values.as_slice()),
        (TensorData::Floats(values), ChannelLayout::ChannelMajor) => {
            Cow::Owned(dequant::transpose_to_cell_major(values, tensor.features))
        }
        (TensorData::Bytes(bytes), layout) => Cow::Owned(dequantize_buffer(
            bytes,
            tensor.element,
            &tensor.quant,
            layout,
            tensor.features,
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infer::StubBackend;

    fn small_config() -> PipelineConfig {
        let mut config = PipelineConfig::default();
        config.strides = vec![8, 16];
        config.num_classes = 2;
        config.backend_options.input_width = 32;
        config.backend_options.input_height = 32;
        config.backend_options.num_classes = 2;
        config
    }

    #[test]
    fn silent_stub_detects_nothing() {
        let config = small_config();
        let mut pipeline = DetectionPipeline::from_config(&config).unwrap();
        let image = RgbImage::new(32, 32);
        let detections = pipeline.detect(&image).unwrap();
        assert!(detections.is_empty());
    }

    #[test]
    fn indivisible_stride_fails_construction() {
        let mut config = small_config();
        config.strides = vec![7];
        let backend = Box::new(StubBackend::new(32, 32));
        assert!(DetectionPipeline::new(backend, &config).is_err());
    }

    #[test]
    fn tensor_covering_too_few_cells_fails_the_frame() {
        let config = small_config();
        // 32x32 with strides 8+16 needs 16 + 4 = 20 cells; deliver 16.
        let backend = Box::new(
            StubBackend::new(32, 32).with_tensors(vec![RawOutputTensor::from_floats(
                vec![0.0; 16 * 7],
                16,
                7,
            )]),
        );
        let mut pipeline = DetectionPipeline::new(backend, &config).unwrap();
        let image = RgbImage::new(32, 32);
        let err = pipeline.detect(&image).unwrap_err();
        assert!(err.to_string().contains("grid table"));
    }

    #[test]
    fn wrong_feature_count_fails_the_frame() {
        let config = small_config();
        let backend = Box::new(
            StubBackend::new(32, 32).with_tensors(vec![RawOutputTensor::from_floats(
                vec![0.0; 20 * 9],
                20,
                9,
            )]),
        );
        let mut pipeline = DetectionPipeline::new(backend, &config).unwrap();
        let image = RgbImage::new(32, 32);
        let err = pipeline.detect(&image).unwrap_err();
        assert!(err.to_string().contains("features per cell"));
    }
}
