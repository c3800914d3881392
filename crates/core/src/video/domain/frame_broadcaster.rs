use crate::shared::frame::Frame;

/// Fan-out of annotated frames to whoever is watching.
///
/// Broadcasting with nobody watching does nothing. Implementations must not
/// block the caller on a slow viewer.
pub trait FrameBroadcaster: Send + Sync {
    fn broadcast(&self, frame: Frame);
}
