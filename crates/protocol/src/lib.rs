//! Shared protocol crate for the Grid Universe client.
//!
//! This crate contains:
//! - Channel-prefixed frame encoding/decoding
//! - Message definitions (client -> server and server -> client)
//! - Grid snapshot types carried inside `state` messages
//! - Shared value types (Position, Direction, ids)

mod envelope;
mod error;
pub mod messages;
pub mod snapshot;

pub use envelope::{decode_client, decode_server, encode, strip_channel};
pub use error::ProtocolError;
pub use messages::{ClientMessage, ServerMessage, StateMessage};
pub use snapshot::{GridSnapshot, ItemState, PlayerState, WallState};

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// RGB color with components in `0.0..=1.0`, as sent for walls.
pub type Rgb = [f32; 3];

/// A grid cell, addressed as (row, column).
///
/// Serialized as a two-element JSON array `[row, column]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(from = "[i32; 2]", into = "[i32; 2]")]
pub struct Position {
    pub row: i32,
    pub column: i32,
}

impl Position {
    pub const fn new(row: i32, column: i32) -> Self {
        Self { row, column }
    }

    /// The neighbouring cell one step in `direction`. May lie off the grid.
    pub fn step(self, direction: Direction) -> Self {
        let (dr, dc) = direction.delta();
        Self::new(self.row + dr, self.column + dc)
    }

    pub fn manhattan(self, other: Position) -> i32 {
        (self.row - other.row).abs() + (self.column - other.column).abs()
    }
}

impl From<[i32; 2]> for Position {
    fn from([row, column]: [i32; 2]) -> Self {
        Self { row, column }
    }
}

impl From<Position> for [i32; 2] {
    fn from(p: Position) -> Self {
        [p.row, p.column]
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.row, self.column)
    }
}

/// Movement direction, serialized lowercase (`"up"`, `"down"`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
    Left,
    #[default]
    Right,
}

impl Direction {
    pub const ALL: [Direction; 4] = [Direction::Up, Direction::Down, Direction::Left, Direction::Right];

    /// (row delta, column delta)
    pub const fn delta(self) -> (i32, i32) {
        match self {
            Direction::Up => (-1, 0),
            Direction::Down => (1, 0),
            Direction::Left => (0, -1),
            Direction::Right => (0, 1),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Up => "up",
            Direction::Down => "down",
            Direction::Left => "left",
            Direction::Right => "right",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "up" => Some(Direction::Up),
            "down" => Some(Direction::Down),
            "left" => Some(Direction::Left),
            "right" => Some(Direction::Right),
            _ => None,
        }
    }
}

/// Numbers and strings are both accepted for identifiers on the wire.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Text(String),
    Int(i64),
    UInt(u64),
    Float(f64),
}

impl From<RawId> for String {
    fn from(raw: RawId) -> Self {
        match raw {
            RawId::Text(s) => s,
            RawId::Int(i) => i.to_string(),
            RawId::UInt(u) => u.to_string(),
            RawId::Float(f) if f.fract() == 0.0 => format!("{}", f as i64),
            RawId::Float(f) => f.to_string(),
        }
    }
}

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                RawId::deserialize(deserializer).map(|raw| Self(raw.into()))
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }
    };
}

string_id!(
    /// Participant identifier. `"spectator"` denotes a watch-only client.
    PlayerId
);

string_id!(
    /// Key into the item type catalog (`item_id` on the wire).
    ItemTypeId
);

impl PlayerId {
    pub fn spectator() -> Self {
        Self("spectator".to_string())
    }

    pub fn is_spectator(&self) -> bool {
        self.0 == "spectator"
    }

    /// Numeric form of the id, used as identicon texture slot.
    pub fn numeric(&self) -> Option<u32> {
        self.0.parse().ok()
    }
}

/// Identity of a single item instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(pub u128);

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_serializes_as_pair() {
        let p = Position::new(3, 7);
        assert_eq!(serde_json::to_string(&p).unwrap(), "[3,7]");
        let back: Position = serde_json::from_str("[3,7]").unwrap();
        assert_eq!(back, p);
    }

    #[test]
    fn test_position_step_and_distance() {
        let p = Position::new(5, 5);
        assert_eq!(p.step(Direction::Right), Position::new(5, 6));
        assert_eq!(p.step(Direction::Up), Position::new(4, 5));
        assert_eq!(p.manhattan(Position::new(2, 9)), 7);
    }

    #[test]
    fn test_player_id_accepts_numbers() {
        let a: PlayerId = serde_json::from_str("12").unwrap();
        let b: PlayerId = serde_json::from_str("\"12\"").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.numeric(), Some(12));
        assert!(PlayerId::spectator().is_spectator());
    }

    #[test]
    fn test_direction_names() {
        for d in Direction::ALL {
            assert_eq!(Direction::parse(d.as_str()), Some(d));
            assert_eq!(serde_json::to_string(&d).unwrap(), format!("\"{}\"", d.as_str()));
        }
    }
}
