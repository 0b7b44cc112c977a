use std::path::PathBuf;

use crate::detection::domain::detector::Detector;
use crate::detection::infrastructure::local_onnx_detector::LocalOnnxDetector;
use crate::shared::detection::Detection;
use crate::shared::frame::Frame;

/// Produces the model artifact path on demand. Typically wraps a
/// cache-or-download resolver, so it may block and may fail.
pub type ModelSource = Box<dyn FnMut() -> Result<PathBuf, Box<dyn std::error::Error>> + Send>;

/// Decorator that materializes a [`LocalOnnxDetector`] on first use.
///
/// The wrapped source is not called at construction, so a run that never
/// reaches the local back end (API success on every sampled frame) never
/// resolves or downloads the model. A failed resolve is retried on the
/// next `detect` call.
pub struct DeferredModelDetector {
    source: ModelSource,
    confidence: f64,
    class_names: Vec<String>,
    inner: Option<LocalOnnxDetector>,
}

impl DeferredModelDetector {
    pub fn new(source: ModelSource, confidence: f64, class_names: &[&str]) -> Self {
        Self {
            source,
            confidence,
            class_names: class_names.iter().map(|s| s.to_string()).collect(),
            inner: None,
        }
    }
}

impl Detector for DeferredModelDetector {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>, Box<dyn std::error::Error>> {
        if self.inner.is_none() {
            let path = (self.source)()?;
            let names: Vec<&str> = self.class_names.iter().map(String::as_str).collect();
            self.inner = Some(LocalOnnxDetector::new(&path, self.confidence, &names));
        }
        self.inner
            .as_mut()
            .ok_or("Local model detection error: detector not initialized")?
            .detect(frame)
    }
}
