//! The scrolling stage: lane allocation, motion and hit-testing.
//!
//! `Stage` is the single owner of every live [`DisplayItem`]. Placement and
//! ticking both take `&mut self`, so inserts and per-frame motion never
//! interleave.

pub mod lanes;
pub mod ticker;
pub mod tracker;

use std::collections::{HashSet, VecDeque};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use crate::config::DisplayConfig;
use crate::domain::{DisplayItem, Post};

pub use lanes::{LaneAllocator, LaneGeometry, LaneOccupancy, Viewport, ZoneFlags};
pub use ticker::MotionTicker;
pub use tracker::PositionTracker;

pub struct Stage<R: Rng = StdRng> {
    geometry: LaneGeometry,
    viewport: Viewport,
    allocator: LaneAllocator<R>,
    ticker: MotionTicker,
    items: Vec<DisplayItem>,
    occupancy: LaneOccupancy,
    tracker: PositionTracker,
    seen: SeenIds,
}

/// Ids offered to the stage, placed or dropped, oldest first. Unbounded
/// unless a limit is set; forgotten ids may be placed again.
#[derive(Debug, Default)]
struct SeenIds {
    order: VecDeque<String>,
    ids: HashSet<String>,
    limit: Option<usize>,
}

impl SeenIds {
    fn insert(&mut self, id: &str) -> bool {
        if !self.ids.insert(id.to_string()) {
            return false;
        }
        self.order.push_back(id.to_string());
        self.evict();
        true
    }

    fn set_limit(&mut self, limit: Option<usize>) {
        self.limit = limit;
        self.evict();
    }

    fn evict(&mut self) {
        let Some(limit) = self.limit else {
            return;
        };
        while self.order.len() > limit {
            if let Some(oldest) = self.order.pop_front() {
                self.ids.remove(&oldest);
            }
        }
    }

    fn len(&self) -> usize {
        self.order.len()
    }

    fn clear(&mut self) {
        self.order.clear();
        self.ids.clear();
    }
}

impl Stage<StdRng> {
    pub fn new(geometry: LaneGeometry, viewport: Viewport) -> Self {
        Self::with_rng(geometry, viewport, StdRng::from_entropy())
    }
}

impl<R: Rng> Stage<R> {
    pub fn with_rng(geometry: LaneGeometry, viewport: Viewport, rng: R) -> Self {
        Self {
            geometry,
            viewport,
            allocator: LaneAllocator::new(geometry, rng),
            ticker: MotionTicker::new(geometry),
            items: Vec::new(),
            occupancy: LaneOccupancy::new(),
            tracker: PositionTracker::new(),
            seen: SeenIds::default(),
        }
    }

    pub fn geometry(&self) -> &LaneGeometry {
        &self.geometry
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn resize(&mut self, viewport: Viewport) {
        self.viewport = viewport;
    }

    pub fn items(&self) -> &[DisplayItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn tracker(&self) -> &PositionTracker {
        &self.tracker
    }

    /// Cap remembered ids, matching the aggregator's history ceiling.
    pub fn set_seen_limit(&mut self, limit: Option<usize>) {
        self.seen.set_limit(limit);
    }

    pub fn seen_len(&self) -> usize {
        self.seen.len()
    }

    /// Offer posts in arrival order. Posts seen before or still on stage
    /// are ignored; posts
    /// with no free lane are dropped for good. Returns how many were placed.
    pub fn place_batch<I>(&mut self, posts: I, display: &DisplayConfig) -> usize
    where
        I: IntoIterator<Item = Post>,
    {
        let zones = ZoneFlags::from(display);
        let mut placed = 0;

        for post in posts {
            let live = self.items.iter().any(|item| item.post_id == post.id);
            if live || !self.seen.insert(&post.id) {
                continue;
            }

            match self.allocator.place(
                &post,
                self.viewport,
                &mut self.occupancy,
                zones,
                display.font_size,
            ) {
                Some(item) => {
                    self.tracker
                        .update(&item.post_id, item.frame(self.geometry.lane_height));
                    self.items.push(item);
                    placed += 1;
                }
                None => debug!(id = %post.id, "No free lane, dropping post"),
            }
        }

        placed
    }

    /// Advance one frame. Returns the number of retired items.
    pub fn tick(&mut self, base_speed: f64) -> usize {
        self.ticker.tick(
            &mut self.items,
            &mut self.occupancy,
            &mut self.tracker,
            base_speed,
        )
    }

    /// Replace an item's estimated width with the renderer's measurement.
    pub fn set_measured_width(&mut self, id: &str, width: f64) -> bool {
        let lane_height = self.geometry.lane_height;
        let Some(item) = self.items.iter_mut().find(|item| item.post_id == id) else {
            return false;
        };
        item.width = width;
        self.tracker.update(id, item.frame(lane_height));
        let lane = item.lane;

        let edge = self
            .items
            .iter()
            .filter(|other| other.lane == lane)
            .map(DisplayItem::right_edge)
            .fold(f64::NEG_INFINITY, f64::max);
        self.occupancy.set(lane, edge);
        true
    }

    pub fn set_paused(&mut self, id: &str, paused: bool) -> bool {
        match self.items.iter_mut().find(|item| item.post_id == id) {
            Some(item) => {
                item.paused = paused;
                true
            }
            None => false,
        }
    }

    /// Pause only the item under the point, resuming every other one.
    pub fn hover(&mut self, x: f64, y: f64) -> Option<&DisplayItem> {
        let hit = self.tracker.item_at(x, y).map(str::to_string);
        for item in &mut self.items {
            item.paused = hit.as_deref() == Some(item.post_id.as_str());
        }
        let id = hit?;
        self.get(&id)
    }

    pub fn item_at(&self, x: f64, y: f64) -> Option<&DisplayItem> {
        let id = self.tracker.item_at(x, y)?;
        self.get(id)
    }

    pub fn get(&self, id: &str) -> Option<&DisplayItem> {
        self.items.iter().find(|item| item.post_id == id)
    }

    /// Drop every item and forget seen ids.
    pub fn clear(&mut self) {
        self.items.clear();
        self.occupancy.clear();
        self.tracker.clear();
        self.seen.clear();
    }
}
