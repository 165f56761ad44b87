//! Backend-agnostic real-time object detection pipeline.
//!
//! This crate decodes raw neural-network output tensors into labeled
//! bounding boxes, independent of which inference runtime produced them.
//! Identical raw tensors yield numerically identical detections whether they
//! came from a GPU graph, an embedded NPU, a mobile interpreter, or a
//! portable CPU runtime.
//!
//! # Architecture
//!
//! - `config`: pipeline parameters with file/env loading and validation
//! - `preprocess`: aspect-preserving letterbox resize
//! - `infer`: the `InferenceBackend` trait and one adapter per runtime
//! - `decode`: grid tables, dequantization, proposal decode, sort/NMS,
//!   rescaling; the shared post-processing every backend feeds into
//! - `pipeline`: `DetectionPipeline`, the per-frame orchestrator
//! - `labels`: built-in COCO class-name table
//!
//! # Error handling
//!
//! Failures split by when they can happen:
//!
//! 1. **Configuration**: rejected by `PipelineConfig::validate` before any
//!    pipeline exists. Malformed stride sets and out-of-range thresholds are
//!    never worked around.
//! 2. **Backend load**: model/session construction errors surface from the
//!    backend constructors; loading is not retried.
//! 3. **Per-frame inference**: `detect` returns an error for that frame
//!    only. The pipeline and backend stay valid for the next frame.
//! 4. **Decode degradation**: malformed tensor elements are logged and
//!    treated as zero-confidence instead of dropping the whole frame.
//!
//! No cancellation is offered: a `detect` call runs to completion, and hosts
//! needing deadlines wrap calls on their own workers.

pub mod config;
pub mod decode;
pub mod infer;
pub mod labels;
pub mod preprocess;
pub mod pipeline;

pub use config::{PipelineConfig, MAX_OUTPUT_STREAMS};
pub use decode::{
    decode_proposals, dequantize, dequantize_buffer, features_per_cell, generate_grid_strides,
    nms_sorted, rescale_to_image, sort_by_confidence, ChannelLayout, Detection, GridStride,
    Quantization, Rect, TensorElement,
};
pub use infer::{
    create_backend, BackendConfig, InferenceBackend, RawOutputTensor, StubBackend, TensorData,
    BACKEND_NAMES,
};
pub use labels::{class_name, COCO_CLASSES};
pub use pipeline::DetectionPipeline;
pub use preprocess::{letterbox, Letterbox};

#[cfg(feature = "backend-ort")]
pub use infer::OrtBackend;
#[cfg(feature = "backend-rknn")]
pub use infer::RknnBackend;
#[cfg(feature = "backend-tflite")]
pub use infer::TfliteBackend;
#[cfg(feature = "backend-tract")]
pub use infer::TractBackend;
