//! Client configuration.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tracing::info;

use crate::items::{ItemType, TransitionRule};

/// Errors raised while loading or saving configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to access config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to write default config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Invalid item or transition table: {0}")]
    Json(#[from] serde_json::Error),
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub grid: GridConfig,
    #[serde(default)]
    pub player: PlayerConfig,
    #[serde(default)]
    pub display: DisplayConfig,
    #[serde(default)]
    pub features: FeatureConfig,
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub items: Vec<ItemType>,
    #[serde(default)]
    pub transitions: Vec<TransitionRule>,
}

impl Config {
    /// Load configuration from `path`, writing the defaults there if the
    /// file does not exist yet.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            Ok(toml::from_str(&contents)?)
        } else {
            info!("No {} found, creating default config", path.display());
            let default_config = Self::default();
            std::fs::write(path, toml::to_string_pretty(&default_config)?)?;
            Ok(default_config)
        }
    }

    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    /// RGB value for a team color name. Unknown names render white.
    pub fn color_rgb(&self, name: &str) -> [f32; 3] {
        self.player
            .colors
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.rgb)
            .unwrap_or([1.0, 1.0, 1.0])
    }

    /// Index of a team color in the palette.
    pub fn color_index(&self, name: &str) -> Option<usize> {
        self.player.colors.iter().position(|c| c.name == name)
    }
}

/// Grid and window geometry.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GridConfig {
    #[serde(default = "default_grid_size")]
    pub rows: u32,
    #[serde(default = "default_grid_size")]
    pub columns: u32,
    #[serde(default = "default_grid_size")]
    pub window_rows: u32,
    #[serde(default = "default_grid_size")]
    pub window_columns: u32,
    /// Cell size in pixels.
    #[serde(default = "default_block_size")]
    pub block_size: u32,
    /// Gap between cells in pixels.
    #[serde(default = "default_padding")]
    pub padding: u32,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            rows: default_grid_size(),
            columns: default_grid_size(),
            window_rows: default_grid_size(),
            window_columns: default_grid_size(),
            block_size: default_block_size(),
            padding: default_padding(),
        }
    }
}

fn default_grid_size() -> u32 {
    25
}
fn default_block_size() -> u32 {
    10
}
fn default_padding() -> u32 {
    1
}

/// Team color entry.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PlayerColor {
    pub name: String,
    pub rgb: [f32; 3],
}

/// Movement and identity rules.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PlayerConfig {
    /// Cells per second. Zero or less disables rate limiting.
    #[serde(default = "default_speed_limit")]
    pub motion_speed_limit: f64,
    #[serde(default)]
    pub player_overlap: bool,
    /// Probability the server perturbs a move. Any nonzero rate makes the
    /// client trust server positions unconditionally.
    #[serde(default)]
    pub motion_tremble_rate: f64,
    /// Forced resync period for the ego player, in milliseconds.
    #[serde(default = "default_resync_interval")]
    pub resync_interval_ms: f64,
    #[serde(default = "default_colors")]
    pub colors: Vec<PlayerColor>,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            motion_speed_limit: default_speed_limit(),
            player_overlap: false,
            motion_tremble_rate: 0.0,
            resync_interval_ms: default_resync_interval(),
            colors: default_colors(),
        }
    }
}

fn default_speed_limit() -> f64 {
    8.0
}
fn default_resync_interval() -> f64 {
    5000.0
}
fn default_colors() -> Vec<PlayerColor> {
    [
        ("BLUE", [0.50, 0.86, 1.00]),
        ("YELLOW", [1.00, 0.86, 0.50]),
        ("ORANGE", [0.91, 0.50, 0.02]),
        ("RED", [0.64, 0.11, 0.31]),
        ("PURPLE", [0.85, 0.60, 0.85]),
        ("TEAL", [0.77, 0.96, 0.90]),
    ]
    .into_iter()
    .map(|(name, rgb)| PlayerColor { name: name.to_string(), rgb })
    .collect()
}

/// What gets drawn and how the fog behaves.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DisplayConfig {
    #[serde(default = "default_true")]
    pub background_animation: bool,
    /// Maximum fog radius, in cells.
    #[serde(default = "default_visibility")]
    pub visibility: f64,
    /// Seconds for the fog radius to ramp up to `visibility`.
    #[serde(default = "default_visibility_ramp_time")]
    pub visibility_ramp_time: f64,
    /// Radius at the very start of the ramp.
    #[serde(default = "default_min_visibility")]
    pub min_visibility: f64,
    /// Radius cap while the ego highlight is toggled on.
    #[serde(default = "default_highlight_visibility")]
    pub highlight_visibility: f64,
    #[serde(default = "default_true")]
    pub food_visible: bool,
    #[serde(default = "default_true")]
    pub walls_visible: bool,
    #[serde(default)]
    pub score_visible: bool,
    #[serde(default = "default_true")]
    pub others_visible: bool,
    #[serde(default)]
    pub use_identicons: bool,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            background_animation: true,
            visibility: default_visibility(),
            visibility_ramp_time: default_visibility_ramp_time(),
            min_visibility: default_min_visibility(),
            highlight_visibility: default_highlight_visibility(),
            food_visible: true,
            walls_visible: true,
            score_visible: false,
            others_visible: true,
            use_identicons: false,
        }
    }
}

fn default_true() -> bool {
    true
}
fn default_visibility() -> f64 {
    40.0
}
fn default_visibility_ramp_time() -> f64 {
    4.0
}
fn default_min_visibility() -> f64 {
    3.0
}
fn default_highlight_visibility() -> f64 {
    4.0
}

/// Optional player abilities.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FeatureConfig {
    #[serde(default)]
    pub identity_signaling: bool,
    #[serde(default)]
    pub mutable_colors: bool,
    #[serde(default)]
    pub build_walls: bool,
    #[serde(default = "default_donation_amount")]
    pub donation_amount: f64,
    #[serde(default)]
    pub donation_individual: bool,
    #[serde(default)]
    pub donation_group: bool,
    #[serde(default)]
    pub donation_ingroup: bool,
    #[serde(default)]
    pub donation_public: bool,
    /// Announce switches between collection and contribution rounds.
    #[serde(default)]
    pub alternate_consumption_donation: bool,
    #[serde(default = "default_true")]
    pub leaderboard_group: bool,
    #[serde(default = "default_true")]
    pub leaderboard_individual: bool,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            identity_signaling: false,
            mutable_colors: false,
            build_walls: false,
            donation_amount: default_donation_amount(),
            donation_individual: false,
            donation_group: false,
            donation_ingroup: false,
            donation_public: false,
            alternate_consumption_donation: false,
            leaderboard_group: true,
            leaderboard_individual: true,
        }
    }
}

fn default_donation_amount() -> f64 {
    1.0
}

/// Where and how to reach the server.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NetworkConfig {
    /// `host[:port]` of the game server.
    #[serde(default = "default_host")]
    pub host: String,
    /// Use `wss://` instead of `ws://`.
    #[serde(default)]
    pub secure: bool,
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// Lobby broadcast channel.
    #[serde(default = "default_broadcast_channel")]
    pub broadcast_channel: String,
    /// Lobby control channel.
    #[serde(default = "default_control_channel")]
    pub control_channel: String,
    /// Lag tolerance in seconds, passed to the server in the socket URL.
    #[serde(default = "default_lag_tolerance")]
    pub lag_tolerance: f64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            secure: false,
            endpoint: default_endpoint(),
            broadcast_channel: default_broadcast_channel(),
            control_channel: default_control_channel(),
            lag_tolerance: default_lag_tolerance(),
        }
    }
}

fn default_host() -> String {
    "localhost:5000".to_string()
}
fn default_endpoint() -> String {
    "chat".to_string()
}
fn default_broadcast_channel() -> String {
    "griduniverse".to_string()
}
fn default_control_channel() -> String {
    "griduniverse_ctrl".to_string()
}
fn default_lag_tolerance() -> f64 {
    0.001
}
