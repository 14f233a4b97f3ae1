use crate::domain::Post;

/// Axis-aligned rectangle in viewport units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn contains(&self, px: f64, py: f64) -> bool {
        px >= self.x && px < self.x + self.width && py >= self.y && py < self.y + self.height
    }
}

/// A post travelling across the stage.
#[derive(Debug, Clone)]
pub struct DisplayItem {
    pub post_id: String,
    pub post: Post,
    pub lane: usize,
    /// Left edge.
    pub x: f64,
    /// Vertical centre of the lane.
    pub y: f64,
    pub width: f64,
    pub speed_factor: f64,
    pub paused: bool,
}

impl DisplayItem {
    pub fn right_edge(&self) -> f64 {
        self.x + self.width
    }

    pub fn frame(&self, lane_height: f64) -> Rect {
        Rect::new(self.x, self.y - lane_height / 2.0, self.width, lane_height)
    }
}
