use crate::shared::frame::Frame;
use crate::shared::region::Region;

use super::face_track::FaceTrack;

/// What the overlay needs to know about one track.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackView {
    pub id: u32,
    pub region: Region,
    pub status: String,
    pub identified: bool,
}

impl From<&FaceTrack> for TrackView {
    fn from(track: &FaceTrack) -> Self {
        let info = track.info();
        Self {
            id: track.id(),
            region: track.region(),
            status: info.status_line(),
            identified: !info.name.is_empty(),
        }
    }
}

/// Draws track overlays onto a frame in place.
pub trait FrameAnnotator: Send {
    fn annotate(&self, frame: &mut Frame, tracks: &[TrackView]);
}
