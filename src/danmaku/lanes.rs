//! Lane geometry and allocation.

use std::collections::HashMap;

use rand::seq::SliceRandom;
use rand::Rng;

use crate::config::DisplayConfig;
use crate::domain::{DisplayItem, Post};

/// Fixed layout constants, in viewport units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LaneGeometry {
    pub lane_height: f64,
    pub lane_padding: f64,
    pub vertical_margin: f64,
    /// How far right of the viewport a new item starts.
    pub entry_margin: f64,
    /// Required clearance between a lane's rightmost edge and the viewport edge.
    pub horizontal_gap: f64,
    pub width_ratio: f64,
    pub width_padding: f64,
    /// Items at or left of this x are retired.
    pub retire_x: f64,
}

impl Default for LaneGeometry {
    fn default() -> Self {
        Self {
            lane_height: 40.0,
            lane_padding: 10.0,
            vertical_margin: 20.0,
            entry_margin: 100.0,
            horizontal_gap: 0.0,
            width_ratio: 0.7,
            width_padding: 150.0,
            retire_x: -2000.0,
        }
    }
}

impl LaneGeometry {
    pub fn lane_pitch(&self) -> f64 {
        self.lane_height + self.lane_padding
    }

    pub fn total_lanes(&self, viewport: Viewport) -> usize {
        let usable = viewport.height - 2.0 * self.vertical_margin;
        if usable <= 0.0 {
            return 0;
        }
        (usable / self.lane_pitch()).floor() as usize
    }

    /// Vertical centre of a lane.
    pub fn lane_y(&self, lane: usize) -> f64 {
        lane as f64 * self.lane_pitch() + self.lane_height / 2.0 + self.vertical_margin
    }

    /// Rough width before the renderer reports a measured one.
    pub fn estimate_width(&self, text: &str, font_size: f64) -> f64 {
        text.chars().count() as f64 * font_size * self.width_ratio + self.width_padding
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
}

impl Viewport {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZoneFlags {
    pub top: bool,
    pub middle: bool,
    pub bottom: bool,
}

impl Default for ZoneFlags {
    fn default() -> Self {
        Self {
            top: true,
            middle: true,
            bottom: true,
        }
    }
}

impl From<&DisplayConfig> for ZoneFlags {
    fn from(display: &DisplayConfig) -> Self {
        Self {
            top: display.show_top,
            middle: display.show_middle,
            bottom: display.show_bottom,
        }
    }
}

/// Candidate lanes for the enabled zones, in ascending order.
///
/// Zones split at floor(0.33 * total) and floor(0.66 * total). With every
/// zone disabled all lanes are candidates.
pub fn zone_lanes(total: usize, zones: ZoneFlags) -> Vec<usize> {
    let first = (total as f64 * 0.33).floor() as usize;
    let second = (total as f64 * 0.66).floor() as usize;

    let mut lanes = Vec::with_capacity(total);
    if zones.top {
        lanes.extend(0..first);
    }
    if zones.middle {
        lanes.extend(first..second);
    }
    if zones.bottom {
        lanes.extend(second..total);
    }

    if lanes.is_empty() {
        lanes.extend(0..total);
    }
    lanes
}

/// Rightmost occupied x per lane. A lane with no entry is free.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LaneOccupancy {
    edges: HashMap<usize, f64>,
}

impl LaneOccupancy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rightmost(&self, lane: usize) -> Option<f64> {
        self.edges.get(&lane).copied()
    }

    pub fn is_free(&self, lane: usize, viewport_width: f64, gap: f64) -> bool {
        self.rightmost(lane)
            .is_none_or(|edge| edge < viewport_width - gap)
    }

    /// Overwrite a lane's edge after placing an item in it.
    pub fn set(&mut self, lane: usize, edge: f64) {
        self.edges.insert(lane, edge);
    }

    pub fn rebuild<'a, I>(&mut self, items: I)
    where
        I: IntoIterator<Item = &'a DisplayItem>,
    {
        self.edges.clear();
        for item in items {
            let edge = item.right_edge();
            self.edges
                .entry(item.lane)
                .and_modify(|e| *e = e.max(edge))
                .or_insert(edge);
        }
    }

    pub fn clear(&mut self) {
        self.edges.clear();
    }
}

/// Picks a random free lane for each new post.
pub struct LaneAllocator<R: Rng> {
    geometry: LaneGeometry,
    rng: R,
}

impl<R: Rng> LaneAllocator<R> {
    pub fn new(geometry: LaneGeometry, rng: R) -> Self {
        Self { geometry, rng }
    }

    pub fn geometry(&self) -> &LaneGeometry {
        &self.geometry
    }

    /// Place a post, or `None` when every candidate lane is still occupied.
    pub fn place(
        &mut self,
        post: &Post,
        viewport: Viewport,
        occupancy: &mut LaneOccupancy,
        zones: ZoneFlags,
        font_size: f64,
    ) -> Option<DisplayItem> {
        let geometry = self.geometry;
        let mut candidates = zone_lanes(geometry.total_lanes(viewport), zones);
        candidates.shuffle(&mut self.rng);

        let lane = candidates
            .into_iter()
            .find(|&lane| occupancy.is_free(lane, viewport.width, geometry.horizontal_gap))?;

        let x = viewport.width + geometry.entry_margin;
        let width = geometry.estimate_width(&post.text, font_size);
        occupancy.set(lane, x + width);

        Some(DisplayItem {
            post_id: post.id.clone(),
            post: post.clone(),
            lane,
            x,
            y: geometry.lane_y(lane),
            width,
            speed_factor: self.rng.gen_range(0.8..=1.2),
            paused: false,
        })
    }
}
