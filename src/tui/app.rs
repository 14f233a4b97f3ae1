use std::collections::HashSet;

use chrono::{DateTime, Utc};

use crate::config::DisplayConfig;
use crate::danmaku::{LaneGeometry, Stage, Viewport};
use crate::domain::{extract_addresses, Chain, CryptoAddress, DisplayItem, Post};

/// Viewport units per terminal column.
pub const CELL_WIDTH: f64 = 10.0;
/// Viewport units per terminal row.
pub const CELL_HEIGHT: f64 = 20.0;
/// Rows reserved below the stage.
pub const STATUS_ROWS: u16 = 1;

pub struct TuiApp {
    pub stage: Stage,
    pub paused: bool,
    pub should_quit: bool,
    pub status_message: Option<String>,
    pub last_error: Option<String>,
    pub accepted_total: usize,
    pub latest: Option<Post>,
    measured: HashSet<String>,
}

impl TuiApp {
    pub fn new(cols: u16, rows: u16) -> Self {
        Self::with_stage(Stage::new(LaneGeometry::default(), viewport_for(cols, rows)))
    }

    pub fn with_stage(stage: Stage) -> Self {
        Self {
            stage,
            paused: false,
            should_quit: false,
            status_message: None,
            last_error: None,
            accepted_total: 0,
            latest: None,
            measured: HashSet::new(),
        }
    }

    /// Hand a freshly accepted batch to the stage and measure what was placed.
    pub fn ingest(&mut self, batch: Vec<Post>, display: &DisplayConfig) {
        self.accepted_total += batch.len();
        if let Some(newest) = batch.last() {
            self.latest = Some(newest.clone());
        }
        self.stage.place_batch(batch, display);
        self.measure_new_items(display);
    }

    fn measure_new_items(&mut self, display: &DisplayConfig) {
        let now = Utc::now();
        let max_cells = max_label_cells(display);
        let pending: Vec<(String, f64)> = self
            .stage
            .items()
            .iter()
            .filter(|item| !self.measured.contains(&item.post_id))
            .map(|item| {
                let cells = label_cells(&item.post, display, now).min(max_cells);
                (item.post_id.clone(), cells as f64 * CELL_WIDTH)
            })
            .collect();

        for (id, width) in pending {
            self.stage.set_measured_width(&id, width);
            self.measured.insert(id);
        }
    }

    pub fn tick(&mut self, speed: f64) {
        if self.paused {
            return;
        }
        self.stage.tick(speed);
        let live: HashSet<&str> = self.stage.items().iter().map(|i| i.post_id.as_str()).collect();
        self.measured.retain(|id| live.contains(id.as_str()));
    }

    pub fn resize(&mut self, cols: u16, rows: u16) {
        self.stage.resize(viewport_for(cols, rows));
    }

    pub fn toggle_pause(&mut self) {
        self.paused = !self.paused;
    }

    /// Pause the item under the cell, if any.
    pub fn hover(&mut self, col: u16, row: u16) {
        let (x, y) = cell_center(col, row);
        self.stage.hover(x, y);
    }

    pub fn item_at_cell(&self, col: u16, row: u16) -> Option<&DisplayItem> {
        let (x, y) = cell_center(col, row);
        self.stage.item_at(x, y)
    }

    /// Link under a cell: a badge's trading page, otherwise the post itself.
    /// A badge for an unknown DEX has no link.
    pub fn link_at_cell(&self, col: u16, row: u16, display: &DisplayConfig) -> Option<String> {
        let item = self.item_at_cell(col, row)?;
        let offset = col as i64 - item_column(item);

        let mut start = handle_label(&item.post).chars().count() as i64;
        for address in crypto_badges(&item.post, display) {
            let end = start + badge_label(address.chain).chars().count() as i64;
            if (start..end).contains(&offset) {
                return address.trading_url(&display.dex).map(String::from);
            }
            start = end;
        }
        Some(item.post.permalink())
    }

    pub fn restart(&mut self) {
        self.stage.clear();
        self.measured.clear();
        self.accepted_total = 0;
        self.latest = None;
        self.last_error = None;
        self.set_status("Restarted".to_string());
    }

    pub fn set_status(&mut self, message: String) {
        self.status_message = Some(message);
    }
}

/// Stage viewport for a terminal of the given size, minus the status bar.
pub fn viewport_for(cols: u16, rows: u16) -> Viewport {
    Viewport::new(
        cols as f64 * CELL_WIDTH,
        rows.saturating_sub(STATUS_ROWS) as f64 * CELL_HEIGHT,
    )
}

/// Terminal column of an item's left edge. Negative once it slides off screen.
pub fn item_column(item: &DisplayItem) -> i64 {
    (item.x / CELL_WIDTH).floor() as i64
}

pub fn cell_center(col: u16, row: u16) -> (f64, f64) {
    (
        (col as f64 + 0.5) * CELL_WIDTH,
        (row as f64 + 0.5) * CELL_HEIGHT,
    )
}

pub fn max_label_cells(display: &DisplayConfig) -> usize {
    (display.max_item_width / CELL_WIDTH).max(1.0) as usize
}

/// "@handle " prefix drawn before the text.
pub fn handle_label(post: &Post) -> String {
    let mark = if post.is_verified == Some(true) { " ✓" } else { "" };
    format!("@{}{} ", post.display_handle(), mark)
}

/// Post text on one line, with the relative age appended.
pub fn body_label(post: &Post, now: DateTime<Utc>) -> String {
    let text: String = post
        .text
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect();
    let age = post.relative_timestamp(now);
    if age.is_empty() {
        text
    } else {
        format!("{} · {}", text, age)
    }
}

/// Token addresses to badge, empty unless enabled.
pub fn crypto_badges(post: &Post, display: &DisplayConfig) -> Vec<CryptoAddress> {
    if !display.crypto_enabled {
        return Vec::new();
    }
    extract_addresses(&post.text)
}

/// "[SOL] " drawn between the handle and the text.
pub fn badge_label(chain: Chain) -> String {
    format!("[{}] ", chain.tag())
}

pub fn label_cells(post: &Post, display: &DisplayConfig, now: DateTime<Utc>) -> usize {
    let badges: usize = crypto_badges(post, display)
        .iter()
        .map(|a| badge_label(a.chain).chars().count())
        .sum();
    handle_label(post).chars().count() + badges + body_label(post, now).chars().count()
}
