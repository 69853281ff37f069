// GuSocket: two logical sockets (lobby, game) multiplexing channel-prefixed
// JSON frames.
//
// The socket itself does no I/O. It records which connections the
// transport should open, queues outbound frames, and decodes inbound ones.
// The transport reports connection state back through `set_connected`.
use protocol::{decode_server, encode, ClientMessage, ProtocolError, ServerMessage};
use std::collections::VecDeque;
use std::fmt;
use thiserror::Error;
use tracing::{debug, info};

use crate::config::NetworkConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SocketKind {
    /// Opened at startup on the global broadcast channel.
    Lobby,
    /// Opened once the server assigns this player to a game.
    Game,
}

impl fmt::Display for SocketKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SocketKind::Lobby => f.write_str("lobby"),
            SocketKind::Game => f.write_str("game"),
        }
    }
}

/// Ask the transport to (re)connect `kind` to `url`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SocketRequest {
    pub kind: SocketKind,
    pub url: String,
}

/// A text frame to write on one of the sockets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundFrame {
    pub socket: SocketKind,
    pub text: String,
}

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("{0} socket is not connected")]
    NotConnected(SocketKind),

    #[error("No game channel assigned yet")]
    NoGameChannel,

    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

#[derive(Debug, Clone)]
struct Channels {
    broadcast: String,
    control: String,
}

pub struct GuSocket {
    root: String,
    tolerance: f64,
    lobby: Channels,
    game: Option<Channels>,
    connected: [bool; 2],
    outbox: VecDeque<OutboundFrame>,
    requests: VecDeque<SocketRequest>,
}

impl GuSocket {
    pub fn new(config: &NetworkConfig) -> Self {
        let scheme = if config.secure { "wss" } else { "ws" };
        let mut socket = Self {
            root: format!("{}://{}/{}", scheme, config.host, config.endpoint),
            tolerance: config.lag_tolerance,
            lobby: Channels {
                broadcast: config.broadcast_channel.clone(),
                control: config.control_channel.clone(),
            },
            game: None,
            connected: [false; 2],
            outbox: VecDeque::new(),
            requests: VecDeque::new(),
        };
        socket.request_open(SocketKind::Lobby);
        socket
    }

    /// `scheme://host/endpoint?channel=<name>&tolerance=<lag>`, with the
    /// channel name percent-encoded.
    pub fn socket_url(&self, channel: &str) -> String {
        format!("{}?channel={}&tolerance={}", self.root, encode_query(channel), self.tolerance)
    }

    fn request_open(&mut self, kind: SocketKind) {
        let Some(channel) = self.broadcast_channel(kind) else {
            return;
        };
        let url = self.socket_url(channel);
        info!("Opening {} socket: {}", kind, url);
        self.requests.push_back(SocketRequest { kind, url });
    }

    /// Subscribe to the per-game channels named by `player_added`.
    pub fn add_game_channels(&mut self, broadcast: &str, control: &str) {
        self.game = Some(Channels {
            broadcast: broadcast.to_string(),
            control: control.to_string(),
        });
        self.connected[1] = false;
        self.request_open(SocketKind::Game);
    }

    pub fn has_game_channels(&self) -> bool {
        self.game.is_some()
    }

    pub fn broadcast_channel(&self, kind: SocketKind) -> Option<&str> {
        match kind {
            SocketKind::Lobby => Some(&self.lobby.broadcast),
            SocketKind::Game => self.game.as_ref().map(|c| c.broadcast.as_str()),
        }
    }

    /// Connection state reported by the transport.
    pub fn set_connected(&mut self, kind: SocketKind, connected: bool) {
        let slot = &mut self.connected[kind as usize];
        if *slot != connected {
            debug!("{} socket {}", kind, if connected { "connected" } else { "disconnected" });
        }
        *slot = connected;
    }

    pub fn is_connected(&self, kind: SocketKind) -> bool {
        self.connected[kind as usize]
    }

    fn push(&mut self, socket: SocketKind, channel: &str, message: &ClientMessage) -> Result<(), ChannelError> {
        if !self.is_connected(socket) {
            return Err(ChannelError::NotConnected(socket));
        }
        let text = encode(channel, message)?;
        debug!("Sending to {}: {}", channel, text);
        self.outbox.push_back(OutboundFrame { socket, text });
        Ok(())
    }

    /// Send on the game control channel, or the lobby control channel
    /// before a game has been assigned.
    pub fn send(&mut self, message: &ClientMessage) -> Result<(), ChannelError> {
        match self.game.clone() {
            Some(game) => self.push(SocketKind::Game, &game.control, message),
            None => self.send_global(message),
        }
    }

    /// Send on the lobby control channel.
    pub fn send_global(&mut self, message: &ClientMessage) -> Result<(), ChannelError> {
        let control = self.lobby.control.clone();
        self.push(SocketKind::Lobby, &control, message)
    }

    /// Publish on the game broadcast channel.
    pub fn broadcast(&mut self, message: &ClientMessage) -> Result<(), ChannelError> {
        let game = self.game.clone().ok_or(ChannelError::NoGameChannel)?;
        self.push(SocketKind::Game, &game.broadcast, message)
    }

    /// Decode a frame that arrived on `kind`.
    pub fn receive(&self, kind: SocketKind, frame: &str) -> Result<ServerMessage, ChannelError> {
        let channel = self.broadcast_channel(kind).ok_or(ChannelError::NoGameChannel)?;
        Ok(decode_server(channel, frame)?)
    }

    pub fn drain_outbox(&mut self) -> impl Iterator<Item = OutboundFrame> + '_ {
        self.outbox.drain(..)
    }

    pub fn drain_requests(&mut self) -> impl Iterator<Item = SocketRequest> + '_ {
        self.requests.drain(..)
    }
}

/// Exponential reconnect delay: 1 s, growing 1.5x per failure, capped at 5 s.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReconnectState {
    delay_ms: f64,
    max_delay_ms: f64,
}

impl Default for ReconnectState {
    fn default() -> Self {
        Self {
            delay_ms: 1000.0,
            max_delay_ms: 5000.0,
        }
    }
}

impl ReconnectState {
    /// Delay before the next attempt; each call grows the following one.
    pub fn next_delay_ms(&mut self) -> u64 {
        let delay = self.delay_ms;
        self.delay_ms = (self.delay_ms * 1.5).min(self.max_delay_ms);
        delay as u64
    }

    /// Call once a connection is established.
    pub fn reset(&mut self) {
        self.delay_ms = 1000.0;
    }
}

/// Percent-encode everything outside the RFC 3986 unreserved set.
fn encode_query(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => out.push(byte as char),
            _ => out.push_str(&format!("%{:02X}", byte)),
        }
    }
    out
}
