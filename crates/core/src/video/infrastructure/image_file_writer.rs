use std::path::Path;

use image::{ImageFormat, RgbImage};

use crate::shared::frame::Frame;
use crate::video::domain::image_writer::ImageWriter;

/// Writes frames with the `image` crate, format chosen by file extension.
///
/// The image is written next to the target and renamed into place, so a
/// reader polling the file never sees a partial image.
#[derive(Default)]
pub struct ImageFileWriter;

impl ImageFileWriter {
    pub fn new() -> Self {
        Self
    }
}

impl ImageWriter for ImageFileWriter {
    fn write(&self, path: &Path, frame: &Frame) -> Result<(), Box<dyn std::error::Error>> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let format = ImageFormat::from_path(path)?;
        let img = RgbImage::from_raw(frame.width(), frame.height(), frame.data().to_vec())
            .ok_or("Failed to create image from frame data")?;

        let mut tmp = path.as_os_str().to_owned();
        tmp.push(".part");
        img.save_with_format(&tmp, format)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }
}
