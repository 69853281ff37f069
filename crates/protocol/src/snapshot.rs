//! Grid snapshot carried (as a JSON string) inside `state` messages.
//!
//! Field defaults follow what the server assumes for a freshly spawned
//! player, so sparse snapshots still parse.

use serde::{Deserialize, Serialize};

use crate::{Direction, ItemId, ItemTypeId, PlayerId, Position, Rgb};

/// One player as reported by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerState {
    pub id: PlayerId,
    #[serde(default)]
    pub position: Position,
    /// Team color name, e.g. `"BLUE"`.
    #[serde(default)]
    pub color: String,
    #[serde(default)]
    pub motion_auto: bool,
    #[serde(default)]
    pub motion_direction: Direction,
    #[serde(default = "default_speed_limit")]
    pub motion_speed_limit: f64,
    #[serde(default)]
    pub motion_timestamp: f64,
    #[serde(default)]
    pub score: f64,
    #[serde(default)]
    pub payoff: f64,
    #[serde(default)]
    pub name: String,
    #[serde(default = "default_true")]
    pub identity_visible: bool,
    #[serde(default)]
    pub recruiter_id: String,
    #[serde(default)]
    pub current_item: Option<ItemState>,
}

fn default_speed_limit() -> f64 {
    8.0
}

fn default_true() -> bool {
    true
}

impl PlayerState {
    pub fn new(id: impl Into<PlayerId>, position: Position) -> Self {
        Self {
            id: id.into(),
            position,
            color: String::new(),
            motion_auto: false,
            motion_direction: Direction::default(),
            motion_speed_limit: default_speed_limit(),
            motion_timestamp: 0.0,
            score: 0.0,
            payoff: 0.0,
            name: String::new(),
            identity_visible: true,
            recruiter_id: String::new(),
            current_item: None,
        }
    }
}

/// One item instance. `position` is `None` while the item is carried.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemState {
    pub id: ItemId,
    pub item_id: ItemTypeId,
    #[serde(default)]
    pub position: Option<Position>,
    #[serde(default)]
    pub maturity: f64,
    #[serde(default)]
    pub creation_timestamp: Option<f64>,
    /// Falls back to the item type's `n_uses` when absent.
    #[serde(default)]
    pub remaining_uses: Option<u32>,
}

/// Walls arrive either as `{position, color}` or as a bare position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawWall")]
pub struct WallState {
    pub position: Position,
    pub color: Rgb,
}

pub const DEFAULT_WALL_COLOR: Rgb = [0.5, 0.5, 0.5];

#[derive(Deserialize)]
#[serde(untagged)]
enum RawWall {
    Full {
        position: Position,
        #[serde(default = "default_wall_color")]
        color: Rgb,
    },
    Bare(Position),
}

fn default_wall_color() -> Rgb {
    DEFAULT_WALL_COLOR
}

impl From<RawWall> for WallState {
    fn from(raw: RawWall) -> Self {
        match raw {
            RawWall::Full { position, color } => WallState { position, color },
            RawWall::Bare(position) => WallState { position, color: DEFAULT_WALL_COLOR },
        }
    }
}

/// Decoded `grid` document. `walls`/`items` are omitted by the server on
/// ticks where they did not change.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GridSnapshot {
    #[serde(default)]
    pub players: Vec<PlayerState>,
    #[serde(default)]
    pub round: u32,
    #[serde(default)]
    pub donation_active: bool,
    #[serde(default)]
    pub rows: Option<u32>,
    #[serde(default)]
    pub columns: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub walls: Option<Vec<WallState>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Vec<ItemState>>,
}
