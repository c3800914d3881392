use std::path::Path;

use crate::shared::frame::Frame;

/// Decodes a still image into an RGB [`Frame`] with index 0.
pub fn load_frame(path: &Path) -> Result<Frame, image::ImageError> {
    let img = image::open(path)?.to_rgb8();
    let (width, height) = img.dimensions();
    Ok(Frame::new(img.into_raw(), width, height, 0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_png_as_rgb() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("face.png");
        let mut img = image::RgbImage::new(100, 80);
        for pixel in img.pixels_mut() {
            *pixel = image::Rgb([50, 100, 200]);
        }
        img.save(&path).unwrap();

        let frame = load_frame(&path).unwrap();

        assert_eq!((frame.width(), frame.height()), (100, 80));
        assert_eq!(&frame.data()[..3], &[50, 100, 200]);
        assert_eq!(frame.index(), 0);
    }

    #[test]
    fn test_grayscale_is_expanded_to_rgb() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gray.png");
        image::GrayImage::from_pixel(4, 4, image::Luma([90])).save(&path).unwrap();

        let frame = load_frame(&path).unwrap();

        assert_eq!(frame.data().len(), 4 * 4 * 3);
        assert_eq!(&frame.data()[..3], &[90, 90, 90]);
    }

    #[test]
    fn test_missing_file_is_error() {
        assert!(load_frame(Path::new("/nonexistent/face.png")).is_err());
    }
}
