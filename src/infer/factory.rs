//! Backend selection.
//!
//! One concrete backend is chosen at configuration time by name; there are
//! no compile-time-exclusive paths in the pipeline itself. Unavailable
//! backends fail with an error naming the cargo feature that enables them.

use anyhow::{anyhow, Result};

use crate::config::PipelineConfig;
use crate::decode::{features_per_cell, grid};
use crate::infer::backend::InferenceBackend;
use crate::infer::backends::StubBackend;

/// Backend names accepted in configuration, in preference order.
pub const BACKEND_NAMES: &[&str] = &["stub", "ort", "tract", "tflite", "rknn"];

/// Build the backend named by the configuration.
///
/// Every backend except `stub` requires `model_path`. The stub is built
/// "silent" (one all-zero combined tensor sized to the configured strides),
/// so a pipeline over it runs end to end and reports no objects; tests and
/// demos that want detections construct `StubBackend` directly with their
/// own tensors.
pub fn create_backend(config: &PipelineConfig) -> Result<Box<dyn InferenceBackend>> {
    match config.backend.as_str() {
        "stub" => {
            let opts = &config.backend_options;
            let cells = grid::table_len(opts.input_width, opts.input_height, &config.strides);
            Ok(Box::new(StubBackend::silent(
                opts.input_width,
                opts.input_height,
                cells,
                features_per_cell(config.num_classes),
            )))
        }
        "tract" => {
            #[cfg(feature = "backend-tract")]
            {
                let path = require_model_path(config)?;
                Ok(Box::new(crate::infer::backends::TractBackend::load(
                    path,
                    &config.backend_options,
                )?))
            }
            #[cfg(not(feature = "backend-tract"))]
            {
                anyhow::bail!("backend 'tract' requires the backend-tract feature")
            }
        }
        "ort" => {
            #[cfg(feature = "backend-ort")]
            {
                let path = require_model_path(config)?;
                Ok(Box::new(crate::infer::backends::OrtBackend::load(
                    path,
                    &config.backend_options,
                )?))
            }
            #[cfg(not(feature = "backend-ort"))]
            {
                anyhow::bail!("backend 'ort' requires the backend-ort feature")
            }
        }
        "tflite" => {
            #[cfg(feature = "backend-tflite")]
            {
                let path = require_model_path(config)?;
                Ok(Box::new(crate::infer::backends::TfliteBackend::load(
                    path,
                    &config.backend_options,
                )?))
            }
            #[cfg(not(feature = "backend-tflite"))]
            {
                anyhow::bail!("backend 'tflite' requires the backend-tflite feature")
            }
        }
        "rknn" => {
            #[cfg(feature = "backend-rknn")]
            {
                let path = require_model_path(config)?;
                Ok(Box::new(crate::infer::backends::RknnBackend::load(
                    path,
                    &config.backend_options,
                )?))
            }
            #[cfg(not(feature = "backend-rknn"))]
            {
                anyhow::bail!("backend 'rknn' requires the backend-rknn feature")
            }
        }
        other => Err(anyhow!(
            "unknown backend '{}'; expected one of {}",
            other,
            BACKEND_NAMES.join(", ")
        )),
    }
}

#[cfg(any(
    feature = "backend-tract",
    feature = "backend-ort",
    feature = "backend-tflite",
    feature = "backend-rknn"
))]
fn require_model_path(config: &PipelineConfig) -> Result<&std::path::Path> {
    config
        .model_path
        .as_deref()
        .ok_or_else(|| anyhow!("backend '{}' requires model_path", config.backend))
}
