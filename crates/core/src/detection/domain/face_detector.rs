use crate::shared::frame::Frame;
use crate::shared::region::Region;

/// One face found in a frame.
///
/// `track_id` stays stable for as long as the detector keeps seeing the
/// same face in consecutive frames.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DetectedFace {
    pub track_id: u32,
    pub region: Region,
}

/// Domain interface for face detection.
///
/// Implementations are stateful (tracking across frames), hence `&mut self`.
pub trait FaceDetector: Send {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<DetectedFace>, Box<dyn std::error::Error>>;
}
