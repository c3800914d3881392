pub const YOLO_MODEL_NAME: &str = "yolo11n-pose_widerface.onnx";
pub const YOLO_MODEL_URL: &str =
    "https://github.com/neutrinographics/faceguard/releases/download/v0.1.0/yolo11n-pose_widerface.onnx";

pub const EMBEDDING_MODEL_NAME: &str = "w600k_r50.onnx";
pub const EMBEDDING_MODEL_URL: &str =
    "https://github.com/neutrinographics/faceguard/releases/download/v0.1.0/w600k_r50.onnx";

/// Max frames a ByteTrack track can be lost before its id is retired.
pub const TRACKER_MAX_LOST: usize = 5;

/// Minimum similarity a match must strictly exceed to be accepted.
pub const MATCH_THRESHOLD: f32 = 0.6;

/// Faces smaller than this in either dimension are never enriched.
pub const MIN_FACE_SIZE: i32 = 50;

/// Frames per frame-rate report window.
pub const FPS_WINDOW: usize = 100;

pub const FEATURE_REFRESH_INTERVAL_SECS: u64 = 30;

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "tiff", "tif", "webp"];
