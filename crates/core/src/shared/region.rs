use crate::shared::constants::MIN_FACE_SIZE;

/// A face bounding box in frame pixel coordinates.
///
/// May extend past the frame edges; use [`Region::clamp_to`] before
/// touching pixel data.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Region {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Region {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Builds a region from `[x1, y1, x2, y2]` float corners, rounding outward
    /// to whole pixels.
    pub fn from_corners(bbox: [f64; 4]) -> Self {
        let x1 = bbox[0].floor() as i32;
        let y1 = bbox[1].floor() as i32;
        let x2 = bbox[2].ceil() as i32;
        let y2 = bbox[3].ceil() as i32;
        Self::new(x1, y1, (x2 - x1).max(0), (y2 - y1).max(0))
    }

    pub fn center(&self) -> (i32, i32) {
        (self.x + self.width / 2, self.y + self.height / 2)
    }

    pub fn area(&self) -> i64 {
        self.width.max(0) as i64 * self.height.max(0) as i64
    }

    /// Manhattan distance from this region's center to `point`.
    pub fn manhattan_distance_to(&self, point: (i32, i32)) -> i32 {
        let (cx, cy) = self.center();
        (cx - point.0).abs() + (cy - point.1).abs()
    }

    /// True when both dimensions reach the enrichment minimum.
    pub fn is_large_enough(&self) -> bool {
        self.width >= MIN_FACE_SIZE && self.height >= MIN_FACE_SIZE
    }

    /// Intersection with a `frame_w` x `frame_h` frame, or `None` if empty.
    pub fn clamp_to(&self, frame_w: u32, frame_h: u32) -> Option<Region> {
        let x1 = self.x.max(0);
        let y1 = self.y.max(0);
        let x2 = (self.x + self.width).min(frame_w as i32);
        let y2 = (self.y + self.height).min(frame_h as i32);
        if x2 <= x1 || y2 <= y1 {
            return None;
        }
        Some(Region::new(x1, y1, x2 - x1, y2 - y1))
    }

    pub fn top_left(&self) -> (i32, i32) {
        (self.x, self.y)
    }

    pub fn top_middle(&self) -> (i32, i32) {
        (self.x + self.width / 2, self.y)
    }
}
