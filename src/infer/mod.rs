//! Inference backend boundary.
//!
//! The pipeline is polymorphic over one trait, `InferenceBackend`, with one
//! adapter per runtime:
//!
//! - `stub`: tensor playback (always available; tests and demos)
//! - `ort`: GPU compiled-graph execution (feature: backend-ort)
//! - `tract`: portable CPU runtime (feature: backend-tract)
//! - `tflite`: mobile interpreter (feature: backend-tflite)
//! - `rknn`: embedded NPU, quantized outputs (feature: backend-rknn)
//!
//! Adapters own their runtime sessions and scratch buffers. They must not
//! retain references to per-frame data, and a failed `run` must leave the
//! session usable for the next frame.

pub mod backend;
pub mod backends;
mod factory;

pub use backend::{BackendConfig, InferenceBackend, RawOutputTensor, TensorData};
pub use backends::StubBackend;
pub use factory::{create_backend, BACKEND_NAMES};

#[cfg(feature = "backend-ort")]
pub use backends::OrtBackend;
#[cfg(feature = "backend-rknn")]
pub use backends::RknnBackend;
#[cfg(feature = "backend-tflite")]
pub use backends::TfliteBackend;
#[cfg(feature = "backend-tract")]
pub use backends::TractBackend;
