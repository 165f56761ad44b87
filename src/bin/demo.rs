//! demo - end-to-end synthetic run of the detection pipeline

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use image::RgbImage;
use std::path::PathBuf;
use std::time::Instant;

use detect_pipeline::{
    class_name, features_per_cell, generate_grid_strides, DetectionPipeline, GridStride,
    PipelineConfig, RawOutputTensor, StubBackend,
};

const STUB_INPUT: u32 = 640;
const STUB_IMAGE_W: u32 = 320;
const STUB_IMAGE_H: u32 = 240;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Backend to run: stub, ort, tract, tflite, rknn.
    #[arg(long, default_value = "stub")]
    backend: String,
    /// Model file (required for every backend except stub).
    #[arg(long)]
    model: Option<PathBuf>,
    /// Image to detect on; the stub backend generates a synthetic scene when
    /// omitted.
    #[arg(long)]
    image: Option<PathBuf>,
    /// Confidence threshold.
    #[arg(long, default_value_t = 0.3)]
    confidence: f32,
    /// NMS IoU threshold.
    #[arg(long, default_value_t = 0.45)]
    iou: f32,
    /// Class count of the model.
    #[arg(long, default_value_t = 80)]
    num_classes: usize,
    /// Use the p6 stride set (8/16/32/64).
    #[arg(long)]
    p6: bool,
    /// Number of detect calls, for a rough latency figure.
    #[arg(long, default_value_t = 1)]
    frames: u32,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();
    if args.frames == 0 {
        return Err(anyhow!("frames must be >= 1"));
    }

    let mut config = PipelineConfig::default();
    config.backend = args.backend.clone();
    config.model_path = args.model.clone();
    config.confidence_threshold = args.confidence;
    config.iou_threshold = args.iou;
    config.num_classes = args.num_classes;
    config.backend_options.num_classes = args.num_classes;
    if args.p6 {
        config.p6 = true;
        config.strides = vec![8, 16, 32, 64];
    }

    stage("build pipeline");
    let mut pipeline = if args.backend == "stub" && args.image.is_none() {
        synthetic_pipeline(&config)?
    } else {
        DetectionPipeline::from_config(&config)?
    };

    stage("load image");
    let image = match &args.image {
        Some(path) => image::open(path)
            .with_context(|| format!("failed to open image {}", path.display()))?
            .to_rgb8(),
        None => synthetic_image(),
    };

    stage("detect");
    let start = Instant::now();
    let mut detections = Vec::new();
    for _ in 0..args.frames {
        detections = pipeline.detect(&image)?;
    }
    let avg_ms = start.elapsed().as_secs_f64() * 1000.0 / args.frames as f64;

    println!("demo summary:");
    println!("  backend: {}", pipeline.backend_name());
    println!(
        "  input: {}x{}",
        pipeline.input_dimensions().0,
        pipeline.input_dimensions().1
    );
    println!("  image: {}x{}", image.width(), image.height());
    println!("  frames: {} ({:.2} ms/frame)", args.frames, avg_ms);
    println!("  detections: {}", detections.len());
    for (i, det) in detections.iter().enumerate() {
        let name = class_name(det.label).unwrap_or("?");
        println!(
            "    {:2}. {} ({:.1}%) at ({:.0}, {:.0}) {:.0}x{:.0}",
            i + 1,
            name,
            det.prob * 100.0,
            det.rect.x,
            det.rect.y,
            det.rect.width,
            det.rect.height
        );
    }
    Ok(())
}

fn stage(msg: &str) {
    eprintln!("demo: {}", msg);
}

/// A pipeline over a stub backend replaying a tensor with two objects in it:
/// a "person" and a "car", placed where the synthetic image draws them.
fn synthetic_pipeline(config: &PipelineConfig) -> Result<DetectionPipeline> {
    let features = features_per_cell(config.num_classes);
    let table = generate_grid_strides(STUB_INPUT, STUB_INPUT, &config.strides);
    let mut output = vec![0.0f32; table.len() * features];

    // Network-input coordinates; the 320x240 image letterboxes into 640x640
    // at scale 2.0, so these land at half these coordinates in the image.
    encode_box(&mut output, &table, features, 16, (120.0, 160.0), (80.0, 200.0), 0, 0.92);
    encode_box(&mut output, &table, features, 32, (440.0, 240.0), (180.0, 110.0), 2, 0.85);

    let backend = StubBackend::new(STUB_INPUT, STUB_INPUT)
        .with_tensors(vec![RawOutputTensor::from_floats(output, table.len(), features)]);
    DetectionPipeline::new(Box::new(backend), config)
}

/// Write one box into the output buffer at the grid cell containing its
/// center for the given stride.
fn encode_box(
    output: &mut [f32],
    table: &[GridStride],
    features: usize,
    stride: u32,
    center: (f32, f32),
    size: (f32, f32),
    label: usize,
    score: f32,
) {
    let gx = (center.0 / stride as f32) as u32;
    let gy = (center.1 / stride as f32) as u32;
    let cell = table
        .iter()
        .position(|gs| gs.stride == stride && gs.gx == gx && gs.gy == gy)
        .expect("box center outside the grid");

    let base = cell * features;
    let s = stride as f32;
    output[base] = center.0 / s - gx as f32;
    output[base + 1] = center.1 / s - gy as f32;
    output[base + 2] = (size.0 / s).ln();
    output[base + 3] = (size.1 / s).ln();
    output[base + 4] = 1.0;
    output[base + 5 + label] = score;
}

/// Flat gray scene with two brighter blocks roughly where the stub tensor
/// claims objects are.
fn synthetic_image() -> RgbImage {
    let mut image = RgbImage::from_pixel(STUB_IMAGE_W, STUB_IMAGE_H, image::Rgb([96, 96, 96]));
    for y in 30..130 {
        for x in 40..80 {
            image.put_pixel(x, y, image::Rgb([200, 180, 160]));
        }
    }
    for y in 93..147 {
        for x in 175..265 {
            image.put_pixel(x, y, image::Rgb([160, 40, 40]));
        }
    }
    image
}
