pub mod stub;

#[cfg(feature = "backend-ort")]
pub mod ort;
#[cfg(feature = "backend-rknn")]
pub mod rknn;
#[cfg(feature = "backend-tflite")]
pub mod tflite;
#[cfg(feature = "backend-tract")]
pub mod tract;

pub use stub::StubBackend;

#[cfg(feature = "backend-ort")]
pub use ort::OrtBackend;
#[cfg(feature = "backend-rknn")]
pub use rknn::RknnBackend;
#[cfg(feature = "backend-tflite")]
pub use tflite::TfliteBackend;
#[cfg(feature = "backend-tract")]
pub use tract::TractBackend;
