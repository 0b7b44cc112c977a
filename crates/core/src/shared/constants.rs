/// Stride at which video frames are sent to detection. Frame 1 and every
/// multiple of this interval are sampled; everything in between is written
/// through untouched.
pub const SAMPLE_INTERVAL: usize = 5;

/// Default confidence threshold applied by both back ends.
pub const DEFAULT_CONFIDENCE: f64 = 0.5;

/// Hosted inference endpoint. Overridable for self-hosted inference servers.
pub const INFERENCE_API_URL: &str = "https://detect.roboflow.com";

/// Default hosted model identifier (`project/version` form).
pub const DEFAULT_MODEL_ID: &str = "snake-detection-gat5j-nbtyc/1";

pub const LOCAL_MODEL_NAME: &str = "snakesight-yolov8n.onnx";
pub const LOCAL_MODEL_URL: &str =
    "https://github.com/snakesight/snakesight/releases/download/v0.1.0/snakesight-yolov8n.onnx";

/// Class table of the local model, in output-channel order.
pub const CLASS_NAMES: &[&str] = &["snake"];

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "tiff", "tif", "webp"];
