// Grid Universe client core
// Pure game logic: no sockets, no clock. The host feeds frames, input and
// timestamps in and drains outbound frames and rendered cells out.

pub mod config;   // TOML configuration, experiment settings
pub mod game;     // Session state, message dispatch, local actions
pub mod input;    // Key and pointer events to actions
pub mod items;    // Item catalog, grid items, transitions
pub mod network;  // Channel envelopes, socket bookkeeping, reconnect backoff
pub mod players;  // Player set, move prediction and reconciliation
pub mod render;   // Background shimmer, fog, frame assembly
pub mod ui;       // Dashboard and message log
pub mod utils;    // Color and math helpers
pub mod viewport; // Visible window and coordinate transforms
pub mod walls;    // Wall set

pub use config::{Config, ConfigError};
pub use game::{DonationType, GameClient, GameClientState};
pub use input::{Action, Key};
pub use network::{GuSocket, OutboundFrame, ReconnectState, SocketKind, SocketRequest};
pub use render::{Frame, Renderer};
