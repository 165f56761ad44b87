use std::sync::Mutex;

use tempfile::NamedTempFile;

use detect_pipeline::config::PipelineConfig;

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        "DETECT_CONFIG",
        "DETECT_BACKEND",
        "DETECT_MODEL_PATH",
        "DETECT_CONFIDENCE_THRESHOLD",
        "DETECT_IOU_THRESHOLD",
        "DETECT_NUM_CLASSES",
        "DETECT_STRIDES",
        "DETECT_P6",
        "DETECT_DEVICE_INDEX",
        "DETECT_NUM_THREADS",
    ] {
        std::env::remove_var(key);
    }
}

#[test]
fn loads_config_from_file_and_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    let json = r#"{
        "backend": "stub",
        "model_path": "models/detector.onnx",
        "confidence_threshold": 0.25,
        "iou_threshold": 0.5,
        "num_classes": 20,
        "backend_options": {
            "device_index": 1,
            "num_threads": 4,
            "input_width": 416,
            "input_height": 416
        }
    }"#;
    std::io::Write::write_all(&mut file, json.as_bytes()).expect("write config");

    std::env::set_var("DETECT_CONFIG", file.path());
    std::env::set_var("DETECT_CONFIDENCE_THRESHOLD", "0.4");
    std::env::set_var("DETECT_STRIDES", "8, 16");

    let cfg = PipelineConfig::load().expect("load config");

    assert_eq!(cfg.backend, "stub");
    assert_eq!(cfg.model_path.as_deref().unwrap().to_str(), Some("models/detector.onnx"));
    assert_eq!(cfg.confidence_threshold, 0.4);
    assert_eq!(cfg.iou_threshold, 0.5);
    assert_eq!(cfg.num_classes, 20);
    assert_eq!(cfg.strides, vec![8, 16]);
    assert_eq!(cfg.backend_options.device_index, 1);
    assert_eq!(cfg.backend_options.num_threads, 4);
    assert_eq!(cfg.backend_options.input_width, 416);
    assert_eq!(cfg.backend_options.input_height, 416);
    assert_eq!(cfg.backend_options.num_classes, 20);

    clear_env();
}

#[test]
fn p6_env_flag_switches_the_default_stride_set() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("DETECT_P6", "true");
    let cfg = PipelineConfig::load().expect("load config");
    assert_eq!(cfg.strides, vec![8, 16, 32, 64]);
    assert!(cfg.p6);

    clear_env();
}

#[test]
fn invalid_threshold_from_env_fails_load() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("DETECT_IOU_THRESHOLD", "0.0");
    assert!(PipelineConfig::load().is_err());

    std::env::set_var("DETECT_IOU_THRESHOLD", "not-a-number");
    assert!(PipelineConfig::load().is_err());

    clear_env();
}

#[test]
fn defaults_load_without_file_or_env() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let cfg = PipelineConfig::load().expect("load config");
    assert_eq!(cfg.backend, "stub");
    assert_eq!(cfg.confidence_threshold, 0.3);
    assert_eq!(cfg.iou_threshold, 0.45);
    assert_eq!(cfg.num_classes, 80);
    assert_eq!(cfg.strides, vec![8, 16, 32]);

    clear_env();
}
