use crate::shared::detection::Detection;
use crate::shared::frame::Frame;

/// Domain interface for a detection back end.
///
/// Implementations own their transport and timeout behavior; errors carry
/// a human-readable message that the dispatcher tags and the error
/// classifier categorizes. Implementations may be stateful (lazy model
/// loading, connection reuse), hence `&mut self`.
pub trait Detector: Send {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>, Box<dyn std::error::Error>>;
}
