use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::infer::BackendConfig;

const DEFAULT_BACKEND: &str = "stub";
const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.3;
const DEFAULT_IOU_THRESHOLD: f32 = 0.45;
const DEFAULT_NUM_CLASSES: usize = 80;
const DEFAULT_STRIDES: [u32; 3] = [8, 16, 32];
const P6_STRIDES: [u32; 4] = [8, 16, 32, 64];

/// Upper bound on per-frame output streams (strides and tensors alike).
/// Configurations beyond this are rejected outright rather than truncated.
pub const MAX_OUTPUT_STREAMS: usize = 16;

#[derive(Debug, Deserialize, Default)]
struct PipelineConfigFile {
    backend: Option<String>,
    model_path: Option<PathBuf>,
    confidence_threshold: Option<f32>,
    iou_threshold: Option<f32>,
    num_classes: Option<usize>,
    strides: Option<Vec<u32>>,
    p6: Option<bool>,
    backend_options: Option<BackendOptionsFile>,
}

#[derive(Debug, Deserialize, Default)]
struct BackendOptionsFile {
    device_index: Option<i32>,
    num_threads: Option<usize>,
    input_width: Option<u32>,
    input_height: Option<u32>,
}

/// Resolved pipeline configuration.
///
/// Defaults match the usual single-stage anchor-free deployment: confidence
/// 0.3, IoU 0.45, 80 classes, strides [8, 16, 32] (plus 64 in p6 mode).
#[derive(Clone, Debug)]
pub struct PipelineConfig {
    /// Backend name; see `infer::BACKEND_NAMES`.
    pub backend: String,
    /// Model file handed opaquely to the backend. Required by every backend
    /// except `stub`.
    pub model_path: Option<PathBuf>,
    /// Proposals at or below this objectness x class score are discarded.
    pub confidence_threshold: f32,
    /// Greedy NMS suppression threshold.
    pub iou_threshold: f32,
    pub num_classes: usize,
    /// Output strides, ascending. Must divide the backend input dimensions.
    pub strides: Vec<u32>,
    /// Whether `strides` came from the p6 default set.
    pub p6: bool,
    pub backend_options: BackendConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            backend: DEFAULT_BACKEND.to_string(),
            model_path: None,
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            iou_threshold: DEFAULT_IOU_THRESHOLD,
            num_classes: DEFAULT_NUM_CLASSES,
            strides: DEFAULT_STRIDES.to_vec(),
            p6: false,
            backend_options: BackendConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Load configuration from the file named by `DETECT_CONFIG` (JSON),
    /// apply `DETECT_*` environment overrides, and validate.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("DETECT_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) => Some(read_config_file(Path::new(path))?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: PipelineConfigFile) -> Self {
        let p6 = file.p6.unwrap_or(false);
        let strides = file
            .strides
            .unwrap_or_else(|| default_strides(p6).to_vec());
        let opts = file.backend_options.unwrap_or_default();
        let defaults = BackendConfig::default();
        let num_classes = file.num_classes.unwrap_or(DEFAULT_NUM_CLASSES);
        Self {
            backend: file.backend.unwrap_or_else(|| DEFAULT_BACKEND.to_string()),
            model_path: file.model_path,
            confidence_threshold: file
                .confidence_threshold
                .unwrap_or(DEFAULT_CONFIDENCE_THRESHOLD),
            iou_threshold: file.iou_threshold.unwrap_or(DEFAULT_IOU_THRESHOLD),
            num_classes,
            strides,
            p6,
            backend_options: BackendConfig {
                device_index: opts.device_index.unwrap_or(defaults.device_index),
                num_threads: opts.num_threads.unwrap_or(defaults.num_threads),
                input_width: opts.input_width.unwrap_or(defaults.input_width),
                input_height: opts.input_height.unwrap_or(defaults.input_height),
                num_classes,
            },
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(backend) = std::env::var("DETECT_BACKEND") {
            if !backend.trim().is_empty() {
                self.backend = backend;
            }
        }
        if let Ok(path) = std::env::var("DETECT_MODEL_PATH") {
            if !path.trim().is_empty() {
                self.model_path = Some(PathBuf::from(path));
            }
        }
        if let Ok(value) = std::env::var("DETECT_CONFIDENCE_THRESHOLD") {
            self.confidence_threshold = value
                .parse()
                .map_err(|_| anyhow!("DETECT_CONFIDENCE_THRESHOLD must be a float"))?;
        }
        if let Ok(value) = std::env::var("DETECT_IOU_THRESHOLD") {
            self.iou_threshold = value
                .parse()
                .map_err(|_| anyhow!("DETECT_IOU_THRESHOLD must be a float"))?;
        }
        if let Ok(value) = std::env::var("DETECT_NUM_CLASSES") {
            self.num_classes = value
                .parse()
                .map_err(|_| anyhow!("DETECT_NUM_CLASSES must be an integer"))?;
            self.backend_options.num_classes = self.num_classes;
        }
        if let Ok(value) = std::env::var("DETECT_P6") {
            let p6: bool = value
                .parse()
                .map_err(|_| anyhow!("DETECT_P6 must be true or false"))?;
            if p6 != self.p6 {
                self.p6 = p6;
                self.strides = default_strides(p6).to_vec();
            }
        }
        if let Ok(value) = std::env::var("DETECT_STRIDES") {
            let parsed = parse_stride_csv(&value)?;
            if !parsed.is_empty() {
                self.strides = parsed;
            }
        }
        if let Ok(value) = std::env::var("DETECT_DEVICE_INDEX") {
            self.backend_options.device_index = value
                .parse()
                .map_err(|_| anyhow!("DETECT_DEVICE_INDEX must be an integer"))?;
        }
        if let Ok(value) = std::env::var("DETECT_NUM_THREADS") {
            self.backend_options.num_threads = value
                .parse()
                .map_err(|_| anyhow!("DETECT_NUM_THREADS must be an integer"))?;
        }
        Ok(())
    }

    /// Reject configurations the pipeline cannot run correctly.
    ///
    /// A pipeline is never constructed from an invalid configuration; these
    /// errors are fatal at startup, not per-frame.
    pub fn validate(&self) -> Result<()> {
        if !(self.confidence_threshold > 0.0 && self.confidence_threshold < 1.0) {
            return Err(anyhow!(
                "confidence_threshold must be in (0, 1), got {}",
                self.confidence_threshold
            ));
        }
        if !(self.iou_threshold > 0.0 && self.iou_threshold <= 1.0) {
            return Err(anyhow!(
                "iou_threshold must be in (0, 1], got {}",
                self.iou_threshold
            ));
        }
        if self.num_classes == 0 {
            return Err(anyhow!("num_classes must be >= 1"));
        }
        if self.strides.is_empty() {
            return Err(anyhow!("stride set must not be empty"));
        }
        if self.strides.len() > MAX_OUTPUT_STREAMS {
            return Err(anyhow!(
                "{} strides exceed the supported maximum of {}",
                self.strides.len(),
                MAX_OUTPUT_STREAMS
            ));
        }
        if self.strides.iter().any(|&s| s == 0) {
            return Err(anyhow!("strides must be positive"));
        }
        if self.strides.windows(2).any(|w| w[0] >= w[1]) {
            return Err(anyhow!(
                "strides must be strictly ascending, got {:?}",
                self.strides
            ));
        }
        if self.backend_options.num_threads == 0 {
            return Err(anyhow!("num_threads must be >= 1"));
        }
        Ok(())
    }
}

fn default_strides(p6: bool) -> &'static [u32] {
    if p6 {
        &P6_STRIDES
    } else {
        &DEFAULT_STRIDES
    }
}

fn read_config_file(path: &Path) -> Result<PipelineConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = serde_json::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}

fn parse_stride_csv(value: &str) -> Result<Vec<u32>> {
    value
        .split(',')
        .map(|entry| entry.trim())
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            entry
                .parse()
                .map_err(|_| anyhow!("DETECT_STRIDES entries must be integers, got '{}'", entry))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        let cfg = PipelineConfig::default();
        cfg.validate().unwrap();
        assert_eq!(cfg.strides, vec![8, 16, 32]);
    }

    #[test]
    fn p6_default_strides_include_64() {
        let file = PipelineConfigFile {
            p6: Some(true),
            ..PipelineConfigFile::default()
        };
        let cfg = PipelineConfig::from_file(file);
        assert_eq!(cfg.strides, vec![8, 16, 32, 64]);
    }

    #[test]
    fn explicit_strides_override_p6_default() {
        let file = PipelineConfigFile {
            p6: Some(true),
            strides: Some(vec![16, 32]),
            ..PipelineConfigFile::default()
        };
        let cfg = PipelineConfig::from_file(file);
        assert_eq!(cfg.strides, vec![16, 32]);
    }

    #[test]
    fn zero_threshold_is_rejected() {
        let cfg = PipelineConfig {
            confidence_threshold: 0.0,
            ..PipelineConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn negative_threshold_is_rejected() {
        let cfg = PipelineConfig {
            iou_threshold: -0.1,
            ..PipelineConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn unsorted_strides_are_rejected() {
        let cfg = PipelineConfig {
            strides: vec![16, 8, 32],
            ..PipelineConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn oversized_stride_set_is_rejected() {
        let cfg = PipelineConfig {
            strides: (1..=(MAX_OUTPUT_STREAMS as u32 + 1)).collect(),
            ..PipelineConfig::default()
        };
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("maximum"));
    }
}
