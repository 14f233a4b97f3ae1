//! Configuration management for XFlow.
//!
//! Configuration is read from `~/.config/xflow/config.toml` at startup.
//! If the file doesn't exist, a default configuration with comments is created.
//! Every section is optional; missing fields fall back to defaults.

pub mod colors;
pub mod keybindings;

pub use colors::ColorConfig;
pub use keybindings::KeybindingConfig;

use serde::Deserialize;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::provider::{CredentialSet, ProviderKind};

/// Main configuration struct.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub sources: SourceConfig,
    pub provider: ProviderConfig,
    pub polling: PollingConfig,
    pub filters: FilterConfig,
    pub display: DisplayConfig,
    pub colors: ColorConfig,
    pub keybindings: KeybindingConfig,
}

/// Where posts come from. List fields are comma-separated.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub user_handles: String,
    pub use_user_handles: bool,
    pub search_query: String,
    pub use_search: bool,
    pub lists: String,
    pub use_lists: bool,
    pub communities: String,
    pub use_communities: bool,
    /// Account whose home timeline is followed.
    pub home_timeline: String,
    pub use_home_timeline: bool,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            user_handles: String::new(),
            use_user_handles: true,
            search_query: String::new(),
            use_search: true,
            lists: String::new(),
            use_lists: true,
            communities: String::new(),
            use_communities: true,
            home_timeline: String::new(),
            use_home_timeline: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub kind: ProviderKind,
    /// Tried in order; rotated when one runs out of quota.
    pub rapidapi_keys: Vec<String>,
    pub rapidapi_host: String,
    pub rapidapi_base_url: Option<String>,
    pub official_bearer_token: String,
    pub official_api_key: String,
    pub official_api_secret: String,
    /// User-context token, only needed for the home timeline.
    pub official_user_token: String,
    pub official_base_url: Option<String>,
    pub request_timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            kind: ProviderKind::RapidApi,
            rapidapi_keys: Vec::new(),
            rapidapi_host: crate::provider::rapid::DEFAULT_HOST.to_string(),
            rapidapi_base_url: None,
            official_bearer_token: String::new(),
            official_api_key: String::new(),
            official_api_secret: String::new(),
            official_user_token: String::new(),
            official_base_url: None,
            request_timeout_secs: 15,
        }
    }
}

impl ProviderConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    /// Credentials for the selected provider.
    pub fn credential_set(&self) -> CredentialSet {
        match self.kind {
            ProviderKind::RapidApi => CredentialSet::new(&self.rapidapi_keys),
            ProviderKind::Official => CredentialSet::new([&self.official_bearer_token]),
        }
    }

    /// Whether the selected provider has anything to authenticate with.
    pub fn has_credentials(&self) -> bool {
        match self.kind {
            ProviderKind::RapidApi => !self.credential_set().is_empty(),
            ProviderKind::Official => {
                !self.official_bearer_token.trim().is_empty()
                    || (!self.official_api_key.trim().is_empty()
                        && !self.official_api_secret.trim().is_empty())
                    || !self.official_user_token.trim().is_empty()
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub enum IntervalUnit {
    #[default]
    #[serde(rename = "s")]
    Seconds,
    #[serde(rename = "m")]
    Minutes,
    #[serde(rename = "h")]
    Hours,
}

impl IntervalUnit {
    pub fn seconds(self) -> u64 {
        match self {
            IntervalUnit::Seconds => 1,
            IntervalUnit::Minutes => 60,
            IntervalUnit::Hours => 3600,
        }
    }
}

/// Longest accepted polling interval, one week.
pub const MAX_INTERVAL_SECS: u64 = 7 * 24 * 3600;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    pub interval: u64,
    pub unit: IntervalUnit,
    /// Posts per source on the first pass, and the cap on that pass's result.
    pub initial_backlog: usize,
    /// Optional ceiling on retained history. Unbounded when absent.
    pub max_history: Option<usize>,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval: 30,
            unit: IntervalUnit::Seconds,
            initial_backlog: 20,
            max_history: None,
        }
    }
}

impl PollingConfig {
    /// Interval in seconds, or `None` when `interval * unit` overflows.
    pub fn checked_interval_secs(&self) -> Option<u64> {
        self.interval.checked_mul(self.unit.seconds())
    }

    /// Interval in seconds, clamped to `1..=MAX_INTERVAL_SECS`.
    pub fn interval_secs(&self) -> u64 {
        self.checked_interval_secs()
            .unwrap_or(MAX_INTERVAL_SECS)
            .clamp(1, MAX_INTERVAL_SECS)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs())
    }

    /// Parse interval strings like "30s", "5m", "1h" or bare seconds.
    pub fn parse_interval(s: &str) -> Result<u64, String> {
        let s = s.trim().to_lowercase();
        let (digits, scale) = if let Some(h) = s.strip_suffix('h') {
            (h, 3600)
        } else if let Some(m) = s.strip_suffix('m') {
            (m, 60)
        } else if let Some(secs) = s.strip_suffix('s') {
            (secs, 1)
        } else {
            (s.as_str(), 1)
        };

        match digits.trim().parse::<u64>() {
            Ok(0) => Err("Interval must be greater than zero".to_string()),
            Ok(n) => match n.checked_mul(scale) {
                Some(secs) if secs <= MAX_INTERVAL_SECS => Ok(secs),
                _ => Err(format!(
                    "Interval too large: {}. Maximum is {}",
                    s,
                    Self::format_interval(MAX_INTERVAL_SECS)
                )),
            },
            Err(_) => Err(format!(
                "Invalid interval: {}. Use format like '30s', '5m', '1h'",
                s
            )),
        }
    }

    /// Format interval for display
    pub fn format_interval(secs: u64) -> String {
        if secs >= 3600 && secs.is_multiple_of(3600) {
            format!("{}h", secs / 3600)
        } else if secs >= 60 && secs.is_multiple_of(60) {
            format!("{}m", secs / 60)
        } else {
            format!("{}s", secs)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Master switch; nothing below applies when off.
    pub enabled: bool,
    pub verified_only: bool,
    pub min_followers_enabled: bool,
    pub min_followers: u64,
    pub max_followers_enabled: bool,
    pub max_followers: u64,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            verified_only: false,
            min_followers_enabled: false,
            min_followers: 0,
            max_followers_enabled: false,
            max_followers: 1_000_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Viewport units moved per tick before the per-item speed factor.
    pub speed: f64,
    pub font_size: f64,
    pub max_item_width: f64,
    pub show_top: bool,
    pub show_middle: bool,
    pub show_bottom: bool,
    pub tick_ms: u64,
    /// Tag token addresses found in post text with a clickable badge.
    pub crypto_enabled: bool,
    /// Where badge clicks lead. Only "GMGN" is known.
    pub dex: String,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            speed: 3.0,
            font_size: 20.0,
            max_item_width: 400.0,
            show_top: true,
            show_middle: true,
            show_bottom: true,
            tick_ms: 16,
            crypto_enabled: false,
            dex: crate::domain::web3::DEFAULT_DEX.to_string(),
        }
    }
}

impl DisplayConfig {
    pub fn tick_rate(&self) -> Duration {
        Duration::from_millis(self.tick_ms.max(1))
    }
}

impl Config {
    /// Load configuration from the default path.
    ///
    /// If the config file doesn't exist, creates a default one with comments.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::default_config_path()?;

        if !config_path.exists() {
            Self::create_default_config(&config_path)?;
        }

        Self::load_from(&config_path)
    }

    /// Load from an explicit path. Environment fallbacks are applied afterwards.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;

        let mut config: Config = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            source: e,
        })?;

        config.apply_env(|name| std::env::var(name).ok());
        config.validate()?;
        Ok(config)
    }

    /// Get the default config file path: `~/.config/xflow/config.toml`
    pub fn default_config_path() -> Result<PathBuf, ConfigError> {
        let config_dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        Ok(config_dir.join("xflow").join("config.toml"))
    }

    /// Fill empty credentials from `RAPIDAPI_KEY` and `BEARER_TOKEN`.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if self.provider.rapidapi_keys.iter().all(|k| k.trim().is_empty()) {
            if let Some(key) = lookup("RAPIDAPI_KEY").filter(|k| !k.trim().is_empty()) {
                self.provider.rapidapi_keys = key.split(',').map(|k| k.trim().to_string()).collect();
            }
        }
        if self.provider.official_bearer_token.trim().is_empty() {
            if let Some(token) = lookup("BEARER_TOKEN").filter(|t| !t.trim().is_empty()) {
                self.provider.official_bearer_token = token;
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let f = &self.filters;
        if f.min_followers_enabled && f.max_followers_enabled && f.min_followers > f.max_followers
        {
            return Err(ConfigError::Invalid(format!(
                "filters.min_followers ({}) exceeds filters.max_followers ({})",
                f.min_followers, f.max_followers
            )));
        }
        match self.polling.checked_interval_secs() {
            Some(secs) if secs <= MAX_INTERVAL_SECS => {}
            _ => {
                return Err(ConfigError::Invalid(format!(
                    "polling.interval exceeds {}",
                    PollingConfig::format_interval(MAX_INTERVAL_SECS)
                )))
            }
        }
        if self.display.speed < 0.0 {
            return Err(ConfigError::Invalid("display.speed must not be negative".into()));
        }
        Ok(())
    }

    fn create_default_config(path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| ConfigError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let mut file = fs::File::create(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;

        file.write_all(Self::default_config_content().as_bytes())
            .map_err(|e| ConfigError::Io {
                path: path.to_path_buf(),
                source: e,
            })?;

        Ok(())
    }

    /// Generate the default config file content with comments.
    fn default_config_content() -> String {
        r##"# XFlow Configuration
#
# Comma-separated fields accept several values: "alice, @bob".
# Credentials may also come from the RAPIDAPI_KEY and BEARER_TOKEN
# environment variables when left empty here.

[sources]
user_handles = ""
use_user_handles = true
search_query = ""
use_search = true
lists = ""
use_lists = true
communities = ""
use_communities = true
# Official API only; needs official_user_token
home_timeline = ""
use_home_timeline = false

[provider]
# "rapidapi" or "official"
kind = "rapidapi"
# Several keys rotate automatically when one hits its quota
rapidapi_keys = []
rapidapi_host = "twitter241.p.rapidapi.com"
official_bearer_token = ""
official_api_key = ""
official_api_secret = ""
official_user_token = ""
request_timeout_secs = 15

[polling]
interval = 30
# "s", "m" or "h"
unit = "s"
# Posts fetched per source on the first pass
initial_backlog = 20
# max_history = 5000

[filters]
enabled = false
verified_only = false
min_followers_enabled = false
min_followers = 0
max_followers_enabled = false
max_followers = 1000000

[display]
speed = 3.0
font_size = 20.0
max_item_width = 400.0
show_top = true
show_middle = true
show_bottom = true
tick_ms = 16
# Tag Solana/EVM token addresses with a badge that opens a trading page
crypto_enabled = false
dex = "GMGN"

[colors]
handle = "Yellow"
text = "White"
verified = "LightBlue"
paused = "Cyan"
status_fg = "White"
status_bg = "DarkGray"
error = "LightRed"
sol_badge = "Magenta"
evm_badge = "Blue"

[keybindings]
quit = ["q", "Ctrl+c"]
toggle_pause = ["p", "Space"]
restart = ["r"]
open_latest = ["o"]
"##
        .to_string()
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Could not determine config directory")]
    NoConfigDir,

    #[error("Failed to read/write config file at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file at {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
