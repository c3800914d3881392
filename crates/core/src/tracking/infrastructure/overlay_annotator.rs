/// Track overlays drawn with `imageproc`.
///
/// Boxes are blue once a face has a name and red until then. The status line
/// sits above the box and the track id just inside its top edge, rendered
/// with the embedded DejaVu Sans unless another TrueType font is supplied.
use std::path::Path;

use ab_glyph::{FontArc, InvalidFont, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing;
use imageproc::rect::Rect;

use crate::shared::frame::Frame;
use crate::tracking::domain::frame_annotator::{FrameAnnotator, TrackView};

pub const IDENTIFIED_COLOR: Rgb<u8> = Rgb([0, 0, 255]);
pub const UNIDENTIFIED_COLOR: Rgb<u8> = Rgb([255, 0, 0]);

const TEXT_SCALE: f32 = 20.0;

const DEFAULT_FONT: &[u8] = include_bytes!("../../../assets/fonts/DejaVuSans.ttf");

pub struct OverlayAnnotator {
    font: FontArc,
    scale: PxScale,
}

impl OverlayAnnotator {
    pub fn new(font: FontArc) -> Self {
        Self {
            font,
            scale: PxScale::from(TEXT_SCALE),
        }
    }

    pub fn with_default_font() -> Result<Self, InvalidFont> {
        Ok(Self::new(FontArc::try_from_slice(DEFAULT_FONT)?))
    }

    pub fn from_font_file(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let bytes = std::fs::read(path)?;
        let font = FontArc::try_from_vec(bytes)?;
        Ok(Self::new(font))
    }

    fn draw_track(&self, img: &mut RgbImage, track: &TrackView) {
        let region = track.region;
        if region.width <= 0 || region.height <= 0 {
            return;
        }
        let color = if track.identified {
            IDENTIFIED_COLOR
        } else {
            UNIDENTIFIED_COLOR
        };
        let rect = Rect::at(region.x, region.y).of_size(region.width as u32, region.height as u32);
        drawing::draw_hollow_rect_mut(img, rect, color);

        let (x, y) = region.top_left();
        if !track.status.is_empty() {
            let text_y = y - TEXT_SCALE as i32 - 2;
            drawing::draw_text_mut(img, color, x, text_y, self.scale, &self.font, &track.status);
        }
        let (mid_x, top) = region.top_middle();
        drawing::draw_text_mut(
            img,
            color,
            mid_x,
            top + 2,
            self.scale,
            &self.font,
            &track.id.to_string(),
        );
    }
}

impl FrameAnnotator for OverlayAnnotator {
    fn annotate(&self, frame: &mut Frame, tracks: &[TrackView]) {
        if tracks.is_empty() {
            return;
        }
        let Some(mut img) = RgbImage::from_raw(frame.width(), frame.height(), frame.data().to_vec())
        else {
            log::warn!("Frame {} has inconsistent dimensions, skipping overlay", frame.index());
            return;
        };
        for track in tracks {
            self.draw_track(&mut img, track);
        }
        frame.data_mut().copy_from_slice(img.as_raw());
    }
}
