use crate::danmaku::lanes::{LaneGeometry, LaneOccupancy};
use crate::danmaku::tracker::PositionTracker;
use crate::domain::DisplayItem;

/// Advances live items by one frame.
#[derive(Debug, Clone, Copy)]
pub struct MotionTicker {
    geometry: LaneGeometry,
}

impl MotionTicker {
    pub fn new(geometry: LaneGeometry) -> Self {
        Self { geometry }
    }

    /// Move unpaused items left, rebuild occupancy and the position index,
    /// then retire anything at or past the retirement line.
    ///
    /// Returns the number of retired items.
    pub fn tick(
        &self,
        items: &mut Vec<DisplayItem>,
        occupancy: &mut LaneOccupancy,
        tracker: &mut PositionTracker,
        base_speed: f64,
    ) -> usize {
        for item in items.iter_mut().filter(|item| !item.paused) {
            item.x -= base_speed * item.speed_factor;
        }

        occupancy.rebuild(items.iter());
        tracker.sync(items.iter(), self.geometry.lane_height);

        let before = items.len();
        let retire_x = self.geometry.retire_x;
        items.retain(|item| {
            let keep = item.x > retire_x;
            if !keep {
                tracker.remove(&item.post_id);
            }
            keep
        });
        before - items.len()
    }
}
