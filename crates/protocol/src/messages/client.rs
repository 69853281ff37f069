//! Client -> Server messages.

use serde::{Deserialize, Serialize};

use crate::{Direction, PlayerId, Position};

/// Outbound message. Every variant carries the sender's `player_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Announce ourselves on the lobby control channel.
    Connect { player_id: PlayerId },
    /// One-cell step. `timestamp` is the client's monotonic clock in ms.
    Move {
        player_id: PlayerId,
        #[serde(rename = "move")]
        direction: Direction,
        timestamp: f64,
    },
    PlantFood { player_id: PlayerId, position: Position },
    ItemPickUp { player_id: PlayerId, position: Position },
    ItemDrop { player_id: PlayerId, position: Position },
    ItemConsume { player_id: PlayerId, position: Position },
    ItemTransition { player_id: PlayerId, position: Position },
    ChangeColor { player_id: PlayerId, color: String },
    ToggleVisible { player_id: PlayerId, identity_visible: bool },
    BuildWall { player_id: PlayerId, position: Position },
    DonationSubmitted {
        player_id: PlayerId,
        donor_id: PlayerId,
        /// A player id, `"all"`, or `"group:<color index>"`.
        recipient_id: String,
        amount: f64,
    },
    Chat {
        player_id: PlayerId,
        contents: String,
        timestamp: f64,
        #[serde(default)]
        broadcast: bool,
    },
}

impl ClientMessage {
    /// Wire names of every variant, in declaration order.
    pub const TYPES: &'static [&'static str] = &[
        "connect",
        "move",
        "plant_food",
        "item_pick_up",
        "item_drop",
        "item_consume",
        "item_transition",
        "change_color",
        "toggle_visible",
        "build_wall",
        "donation_submitted",
        "chat",
    ];

    pub fn kind(&self) -> &'static str {
        match self {
            ClientMessage::Connect { .. } => "connect",
            ClientMessage::Move { .. } => "move",
            ClientMessage::PlantFood { .. } => "plant_food",
            ClientMessage::ItemPickUp { .. } => "item_pick_up",
            ClientMessage::ItemDrop { .. } => "item_drop",
            ClientMessage::ItemConsume { .. } => "item_consume",
            ClientMessage::ItemTransition { .. } => "item_transition",
            ClientMessage::ChangeColor { .. } => "change_color",
            ClientMessage::ToggleVisible { .. } => "toggle_visible",
            ClientMessage::BuildWall { .. } => "build_wall",
            ClientMessage::DonationSubmitted { .. } => "donation_submitted",
            ClientMessage::Chat { .. } => "chat",
        }
    }

    pub fn player_id(&self) -> &PlayerId {
        match self {
            ClientMessage::Connect { player_id }
            | ClientMessage::Move { player_id, .. }
            | ClientMessage::PlantFood { player_id, .. }
            | ClientMessage::ItemPickUp { player_id, .. }
            | ClientMessage::ItemDrop { player_id, .. }
            | ClientMessage::ItemConsume { player_id, .. }
            | ClientMessage::ItemTransition { player_id, .. }
            | ClientMessage::ChangeColor { player_id, .. }
            | ClientMessage::ToggleVisible { player_id, .. }
            | ClientMessage::BuildWall { player_id, .. }
            | ClientMessage::DonationSubmitted { player_id, .. }
            | ClientMessage::Chat { player_id, .. } => player_id,
        }
    }
}
