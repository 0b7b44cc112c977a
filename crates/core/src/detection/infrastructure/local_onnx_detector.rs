use std::path::{Path, PathBuf};

use crate::detection::domain::detector::Detector;
use crate::shared::detection::{BoundingBox, Detection};
use crate::shared::frame::Frame;

/// Fallback model input resolution when the model doesn't specify dimensions.
const DEFAULT_INPUT_SIZE: u32 = 640;

/// NMS IoU threshold.
const NMS_IOU_THRESH: f64 = 0.45;

/// Local YOLOv8-style object detector using ONNX Runtime via `ort`.
///
/// Handles letterbox preprocessing, inference, confidence filtering, NMS,
/// and mapping boxes back to source-frame coordinates. The session is
/// created lazily on the first `detect` call so that a missing model
/// artifact surfaces as a detection-time failure, not a construction
/// failure; the artifact is irrelevant when only the API back end runs.
pub struct LocalOnnxDetector {
    model_path: PathBuf,
    confidence: f64,
    class_names: Vec<String>,
    session: Option<ort::session::Session>,
    input_size: u32,
}

impl LocalOnnxDetector {
    /// Remembers the model location without touching the filesystem.
    pub fn new(model_path: &Path, confidence: f64, class_names: &[&str]) -> Self {
        Self {
            model_path: model_path.to_path_buf(),
            confidence,
            class_names: class_names.iter().map(|s| s.to_string()).collect(),
            session: None,
            input_size: DEFAULT_INPUT_SIZE,
        }
    }

    fn ensure_session(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        if self.session.is_some() {
            return Ok(());
        }
        if !self.model_path.exists() {
            return Err(format!(
                "Local model not found at path: {}. Ensure the model file exists.",
                self.model_path.display()
            )
            .into());
        }

        let session = ort::session::Session::builder()?
            .commit_from_file(&self.model_path)
            .map_err(|e| format!("Local model detection error: failed to load model: {e}"))?;

        // Read the input size from the model's NCHW input shape, falling
        // back to 640 when the shape is dynamic or unreadable.
        self.input_size = session
            .inputs()
            .first()
            .and_then(|input| {
                if let ort::value::ValueType::Tensor { ref shape, .. } = input.dtype() {
                    if shape.len() >= 4 && shape[2] > 0 {
                        Some(shape[2] as u32)
                    } else {
                        None
                    }
                } else {
                    None
                }
            })
            .unwrap_or(DEFAULT_INPUT_SIZE);

        self.session = Some(session);
        Ok(())
    }

    fn label_for(&self, class_idx: usize) -> String {
        self.class_names
            .get(class_idx)
            .cloned()
            .unwrap_or_else(|| format!("class{class_idx}"))
    }
}

impl Detector for LocalOnnxDetector {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>, Box<dyn std::error::Error>> {
        self.ensure_session()?;

        let (input_tensor, scale, pad_x, pad_y) = letterbox(frame, self.input_size);

        let session = self.session.as_mut().ok_or("Local model session missing")?;
        let input_value = ort::value::Tensor::from_array(input_tensor)
            .map_err(|e| format!("Local model detection error: {e}"))?;
        let outputs = session
            .run(ort::inputs![input_value])
            .map_err(|e| format!("Local model detection error: {e}"))?;
        if outputs.len() == 0 {
            return Err("Local model detection error: model produced no outputs".into());
        }
        let tensor = outputs[0]
            .try_extract_array::<f32>()
            .map_err(|e| format!("Local model detection error: {e}"))?;
        let shape = tensor.shape();
        if shape.len() != 3 {
            return Err(
                format!("Local model detection error: unexpected output shape {shape:?}").into(),
            );
        }
        let data = tensor
            .as_slice()
            .ok_or("Local model detection error: non-contiguous output tensor")?;

        let mut raw = decode_output(data, shape[1], shape[2], self.confidence);
        let kept = nms(&mut raw, NMS_IOU_THRESH);
        drop(outputs);

        Ok(kept
            .into_iter()
            .map(|d| {
                let bbox = unletterbox(&d, scale, pad_x, pad_y, frame.width(), frame.height());
                Detection::new(bbox, d.confidence, self.label_for(d.class_idx))
            })
            .collect())
    }
}

/// A detection in letterbox coordinates, before NMS and un-mapping.
#[derive(Clone, Debug)]
struct RawDetection {
    x1: f64,
    y1: f64,
    x2: f64,
    y2: f64,
    confidence: f64,
    class_idx: usize,
}

// ---------------------------------------------------------------------------
// Preprocessing
// ---------------------------------------------------------------------------

/// Letterbox-resize a frame to `target_size` x `target_size`.
///
/// Returns `(NCHW float32 tensor, scale, pad_x, pad_y)`. Padding uses the
/// 114/255 gray YOLO convention.
fn letterbox(frame: &Frame, target_size: u32) -> (ndarray::Array4<f32>, f64, u32, u32) {
    let fw = frame.width() as f64;
    let fh = frame.height() as f64;
    let target = target_size as f64;

    let scale = (target / fw).min(target / fh);
    let new_w = (fw * scale).round() as u32;
    let new_h = (fh * scale).round() as u32;
    let pad_x = (target_size - new_w) / 2;
    let pad_y = (target_size - new_h) / 2;

    let gray = 114.0f32 / 255.0;
    let mut tensor =
        ndarray::Array4::<f32>::from_elem((1, 3, target_size as usize, target_size as usize), gray);

    let src = frame.as_ndarray();
    let src_h = frame.height() as usize;
    let src_w = frame.width() as usize;

    // Nearest-neighbor resize into the padded region.
    for y in 0..new_h as usize {
        let src_y = ((y as f64 / scale) as usize).min(src_h - 1);
        for x in 0..new_w as usize {
            let src_x = ((x as f64 / scale) as usize).min(src_w - 1);
            let ty = pad_y as usize + y;
            let tx = pad_x as usize + x;
            for c in 0..3 {
                tensor[[0, c, ty, tx]] = src[[src_y, src_x, c]] as f32 / 255.0;
            }
        }
    }

    (tensor, scale, pad_x, pad_y)
}

// ---------------------------------------------------------------------------
// Postprocessing
// ---------------------------------------------------------------------------

/// Decodes a `[1, d1, d2]` YOLO output into raw detections.
///
/// Row format is `[cx, cy, w, h, class_score...]`; the detection
/// confidence is the best class score. Handles both `[1, features, N]`
/// (transposed, the usual YOLOv8 export) and `[1, N, features]` layouts.
fn decode_output(data: &[f32], d1: usize, d2: usize, confidence: f64) -> Vec<RawDetection> {
    let transposed = d1 < d2;
    let (num_dets, num_feats) = if transposed { (d2, d1) } else { (d1, d2) };
    if num_feats < 5 {
        return Vec::new();
    }

    let mut raw = Vec::new();
    for i in 0..num_dets {
        let at = |f: usize| {
            if transposed {
                data[f * num_dets + i]
            } else {
                data[i * num_feats + f]
            }
        };

        let (mut best_score, mut best_class) = (0.0f64, 0usize);
        for cls in 0..num_feats - 4 {
            let score = at(4 + cls) as f64;
            if score > best_score {
                best_score = score;
                best_class = cls;
            }
        }
        if best_score < confidence {
            continue;
        }

        let cx = at(0) as f64;
        let cy = at(1) as f64;
        let w = at(2) as f64;
        let h = at(3) as f64;

        raw.push(RawDetection {
            x1: cx - w / 2.0,
            y1: cy - h / 2.0,
            x2: cx + w / 2.0,
            y2: cy + h / 2.0,
            confidence: best_score,
            class_idx: best_class,
        });
    }
    raw
}

/// Greedy class-agnostic non-maximum suppression, highest confidence first.
fn nms(detections: &mut Vec<RawDetection>, iou_threshold: f64) -> Vec<RawDetection> {
    detections.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut kept: Vec<RawDetection> = Vec::new();
    for det in detections.drain(..) {
        let suppressed = kept.iter().any(|k| {
            bbox_iou(
                &[det.x1, det.y1, det.x2, det.y2],
                &[k.x1, k.y1, k.x2, k.y2],
            ) > iou_threshold
        });
        if !suppressed {
            kept.push(det);
        }
    }
    kept
}

fn bbox_iou(a: &[f64; 4], b: &[f64; 4]) -> f64 {
    let ix1 = a[0].max(b[0]);
    let iy1 = a[1].max(b[1]);
    let ix2 = a[2].min(b[2]);
    let iy2 = a[3].min(b[3]);

    let inter = (ix2 - ix1).max(0.0) * (iy2 - iy1).max(0.0);
    if inter == 0.0 {
        return 0.0;
    }
    let area_a = (a[2] - a[0]) * (a[3] - a[1]);
    let area_b = (b[2] - b[0]) * (b[3] - b[1]);
    inter / (area_a + area_b - inter)
}

/// Maps a letterbox-space detection back to source-frame pixels, clamped
/// to the frame bounds.
fn unletterbox(
    det: &RawDetection,
    scale: f64,
    pad_x: u32,
    pad_y: u32,
    frame_width: u32,
    frame_height: u32,
) -> BoundingBox {
    let map_x =
        |v: f64| (((v - pad_x as f64) / scale).round() as i32).clamp(0, frame_width as i32);
    let map_y =
        |v: f64| (((v - pad_y as f64) / scale).round() as i32).clamp(0, frame_height as i32);
    BoundingBox::new(map_x(det.x1), map_y(det.y1), map_x(det.x2), map_y(det.y2))
}
