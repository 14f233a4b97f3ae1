use crate::domain::{DisplayItem, Rect};

/// Current on-screen rectangle of every live item, for hit-testing.
#[derive(Debug, Default)]
pub struct PositionTracker {
    frames: Vec<(String, Rect)>,
}

impl PositionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, id: &str, rect: Rect) {
        match self.frames.iter_mut().find(|(known, _)| known == id) {
            Some((_, frame)) => *frame = rect,
            None => self.frames.push((id.to_string(), rect)),
        }
    }

    pub fn remove(&mut self, id: &str) {
        self.frames.retain(|(known, _)| known != id);
    }

    /// Replace every frame with the items' current positions.
    pub fn sync<'a, I>(&mut self, items: I, lane_height: f64)
    where
        I: IntoIterator<Item = &'a DisplayItem>,
    {
        self.frames.clear();
        self.frames.extend(
            items
                .into_iter()
                .map(|item| (item.post_id.clone(), item.frame(lane_height))),
        );
    }

    pub fn get(&self, id: &str) -> Option<Rect> {
        self.frames
            .iter()
            .find(|(known, _)| known == id)
            .map(|(_, rect)| *rect)
    }

    /// First item whose frame contains the point.
    pub fn item_at(&self, x: f64, y: f64) -> Option<&str> {
        self.frames
            .iter()
            .find(|(_, rect)| rect.contains(x, y))
            .map(|(id, _)| id.as_str())
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn clear(&mut self) {
        self.frames.clear();
    }
}
