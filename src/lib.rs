//! # XFlow
//!
//! A terminal danmaku for X: posts from handles, searches, lists,
//! communities and the home timeline scroll across the screen in lanes.
//!
//! ## Architecture
//!
//! ```text
//! Config → Sources → Aggregator → Provider → dedup/filter/order → Stage → UI
//!                        ↑
//!                  PollScheduler
//! ```
//!
//! - [`provider`]: RapidAPI and official API adapters with key rotation
//! - [`aggregator`]: One fetch pass across every source
//! - [`scheduler`]: Interval driver with start/stop/restart
//! - [`danmaku`]: Lane allocation, motion and hit-testing
//! - [`tui`]: Terminal stage built with ratatui
//!
//! ## Quick Start
//!
//! ```bash
//! # Show what would be fetched
//! xflow sources
//!
//! # Run one pass
//! xflow fetch
//!
//! # Scroll posts across the terminal
//! xflow watch
//!
//! # Offline, from a saved response
//! xflow watch --fixture posts.json --ephemeral
//! ```

/// Application context and error handling.
///
/// The [`AppContext`](app::AppContext) struct wires together config, store
/// and provider.
pub mod app;

/// Command-line interface using clap.
///
/// - `fetch [--json]` - Run one pass and print accepted posts
/// - `watch [--fixture PATH] [--ephemeral] [--interval 30s]` - Launch the stage
/// - `sources` - Print the resolved source list
/// - `status` - Print rotation state and source cursors
pub mod cli;

/// Configuration management.
///
/// Loads from `~/.config/xflow/config.toml`, supporting sources, provider
/// credentials, polling, filters, display, colors and keybindings.
pub mod config;

/// Core domain models.
///
/// - [`Post`](domain::Post): A fetched post; `id` is the dedup key
/// - [`SourceSpec`](domain::SourceSpec): One unit of work in a pass
/// - [`DisplayItem`](domain::DisplayItem): A post travelling across the stage
pub mod domain;

/// Backend adapters behind the [`Provider`](provider::Provider) trait.
pub mod provider;

/// Fetch pass: sequential source fetch, rotate-and-retry, dedup, filter, order.
pub mod aggregator;

/// Repeating driver for the aggregator.
pub mod scheduler;

/// Lane allocator, motion ticker and position tracker.
pub mod danmaku;

/// SQLite persistence for key rotation and per-source cursors.
///
/// - [`Store`](store::Store): Trait defining storage operations
/// - [`SqliteStore`](store::SqliteStore): SQLite implementation
pub mod store;

/// Terminal stage.
///
/// Hovering an item pauses it, clicking opens it in the browser;
/// p pauses everything, r restarts, o opens the newest post, q quits.
pub mod tui;
