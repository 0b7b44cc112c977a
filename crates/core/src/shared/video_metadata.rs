use std::path::PathBuf;

/// Container properties read once at open time.
///
/// These values are trusted for the whole run even when the decodable
/// frame count ends up differing from `total_frames`; no re-validation
/// happens mid-stream.
#[derive(Clone, Debug, PartialEq)]
pub struct VideoMetadata {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub total_frames: usize,
    pub codec: String,
    pub source_path: Option<PathBuf>,
}

impl VideoMetadata {
    /// Integer frame rate used for run statistics and the output encoder.
    pub fn nominal_fps(&self) -> u32 {
        let fps = self.fps.round();
        if fps <= 0.0 {
            0
        } else {
            fps as u32
        }
    }
}
