//! Server -> Client messages.

use serde::{Deserialize, Serialize};

use crate::snapshot::{GridSnapshot, WallState};
use crate::{PlayerId, Position, ProtocolError};

/// Periodic world snapshot. `grid` is itself a JSON document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateMessage {
    pub grid: String,
    #[serde(default)]
    pub remaining_time: f64,
    #[serde(default)]
    pub round: u32,
    #[serde(default)]
    pub count: Option<u64>,
}

impl StateMessage {
    /// Parse the embedded grid document.
    pub fn snapshot(&self) -> Result<GridSnapshot, ProtocolError> {
        serde_json::from_str(&self.grid).map_err(ProtocolError::InvalidGrid)
    }
}

/// Parsed server message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    State(StateMessage),
    Chat {
        player_id: PlayerId,
        contents: String,
        #[serde(default)]
        player_index: Option<u32>,
        #[serde(default)]
        timestamp: Option<f64>,
    },
    DonationProcessed {
        donor_id: PlayerId,
        recipient_id: String,
        amount: f64,
    },
    #[serde(alias = "change_color")]
    ColorChanged {
        player_id: PlayerId,
        #[serde(default)]
        old_color: Option<String>,
        new_color: String,
        #[serde(default)]
        player_index: Option<u32>,
    },
    WallBuilt { wall: WallState },
    MoveRejection { player_id: PlayerId },
    PlayerAdded {
        player_id: PlayerId,
        broadcast_channel: String,
        control_channel: String,
    },
    NewRound {
        #[serde(default)]
        round: u32,
    },
    Stop,
    /// Pick-up, drop or transition refused by the server.
    ActionError {
        player_id: PlayerId,
        #[serde(default)]
        position: Option<Position>,
    },
    /// Consumption refused: nothing edible in hand.
    ConsumeError { player_id: PlayerId },
}

impl ServerMessage {
    /// Wire names accepted by the decoder (including aliases).
    pub const TYPES: &'static [&'static str] = &[
        "state",
        "chat",
        "donation_processed",
        "color_changed",
        "change_color",
        "wall_built",
        "move_rejection",
        "player_added",
        "new_round",
        "stop",
        "action_error",
        "consume_error",
    ];

    pub fn kind(&self) -> &'static str {
        match self {
            ServerMessage::State(_) => "state",
            ServerMessage::Chat { .. } => "chat",
            ServerMessage::DonationProcessed { .. } => "donation_processed",
            ServerMessage::ColorChanged { .. } => "color_changed",
            ServerMessage::WallBuilt { .. } => "wall_built",
            ServerMessage::MoveRejection { .. } => "move_rejection",
            ServerMessage::PlayerAdded { .. } => "player_added",
            ServerMessage::NewRound { .. } => "new_round",
            ServerMessage::Stop => "stop",
            ServerMessage::ActionError { .. } => "action_error",
            ServerMessage::ConsumeError { .. } => "consume_error",
        }
    }
}
