use thiserror::Error;

use crate::shared::frame::Frame;

#[derive(Error, Debug)]
pub enum FrameSourceError {
    #[error("end of stream")]
    EndOfStream,
    #[error("no video stream in {0}")]
    NoVideoStream(String),
}

/// Pull-based supplier of RGB frames.
///
/// There is no separate "done" state: once the source is exhausted every
/// `read` fails with [`FrameSourceError::EndOfStream`].
pub trait FrameSource: Send {
    fn read(&mut self) -> Result<Frame, Box<dyn std::error::Error>>;
}
