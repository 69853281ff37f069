// Game session: inbound dispatch, local actions, and the frame tick
//
// Transport callbacks only enqueue frames; everything else happens inside
// `update`, so no handler ever runs in the middle of a frame.
use protocol::{ClientMessage, Direction, PlayerId, ProtocolError, ServerMessage, StateMessage};
use std::collections::VecDeque;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::input::{Action, Input, Key};
use crate::items::{ItemCatalog, TransitionDescription, TransitionTable};
use crate::network::{ChannelError, GuSocket, SocketKind};
use crate::render::{Frame, RenderLoop, Renderer};
use crate::ui::{Dashboard, Standings};
use crate::utils::wire_seconds;
use crate::walls::Wall;

mod state;

pub use state::GameClientState;

/// Recipient chosen by clicking a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DonationType {
    Individual,
    Group,
}

pub struct GameClient {
    config: Config,
    ego_id: PlayerId,
    /// Dropped once the game stops.
    state: Option<GameClientState>,
    socket: GuSocket,
    input: Input,
    render: RenderLoop,
    renderer: Box<dyn Renderer>,
    dashboard: Dashboard,
    inbound: VecDeque<(SocketKind, String)>,
    last_resync: f64,
    donation_type: Option<DonationType>,
    announced: bool,
}

impl GameClient {
    pub fn new(config: Config, ego_id: PlayerId, renderer: Box<dyn Renderer>, now: f64) -> Self {
        let render = RenderLoop::new(&config, ego_id.is_spectator(), now);
        Self::with_render_loop(config, ego_id, renderer, render, now)
    }

    pub fn with_render_loop(
        config: Config,
        ego_id: PlayerId,
        renderer: Box<dyn Renderer>,
        mut render: RenderLoop,
        now: f64,
    ) -> Self {
        let state = GameClientState::new(&config, ego_id.clone(), render.rng());
        Self {
            socket: GuSocket::new(&config.network),
            state: Some(state),
            input: Input::new(),
            render,
            renderer,
            dashboard: Dashboard::new(),
            inbound: VecDeque::new(),
            last_resync: now,
            donation_type: None,
            announced: false,
            ego_id,
            config,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn ego_id(&self) -> &PlayerId {
        &self.ego_id
    }

    pub fn is_spectator(&self) -> bool {
        self.ego_id.is_spectator()
    }

    pub fn state(&self) -> Option<&GameClientState> {
        self.state.as_ref()
    }

    pub fn state_mut(&mut self) -> Option<&mut GameClientState> {
        self.state.as_mut()
    }

    pub fn socket(&self) -> &GuSocket {
        &self.socket
    }

    /// The transport drains socket requests and outbound frames from here.
    pub fn socket_mut(&mut self) -> &mut GuSocket {
        &mut self.socket
    }

    pub fn dashboard(&self) -> &Dashboard {
        &self.dashboard
    }

    pub fn dashboard_mut(&mut self) -> &mut Dashboard {
        &mut self.dashboard
    }

    pub fn is_stopped(&self) -> bool {
        self.state.is_none()
    }

    /// Replace the item catalog with the server's table.
    pub fn set_item_catalog(&mut self, catalog: ItemCatalog) {
        if let Some(state) = self.state.as_mut() {
            info!("Loaded {} item types", catalog.len());
            state.catalog = catalog;
        }
    }

    /// Replace the transition table with the server's table.
    pub fn set_transition_table(&mut self, table: TransitionTable) {
        if let Some(state) = self.state.as_mut() {
            info!("Loaded {} transitions", table.len());
            state.transitions = table;
        }
    }

    /// Load an item table in the server's JSON layout.
    pub fn load_item_table(&mut self, json: &str) -> Result<(), serde_json::Error> {
        self.set_item_catalog(ItemCatalog::from_json(json)?);
        Ok(())
    }

    pub fn load_transition_table(&mut self, json: &str) -> Result<(), serde_json::Error> {
        self.set_transition_table(TransitionTable::from_json(json)?);
        Ok(())
    }

    pub fn on_socket_open(&mut self, kind: SocketKind) {
        self.socket.set_connected(kind, true);
        if kind == SocketKind::Lobby && !self.announced {
            self.announced = true;
            let player_id = if self.is_spectator() { PlayerId::spectator() } else { self.ego_id.clone() };
            self.send(ClientMessage::Connect { player_id });
        }
    }

    pub fn on_socket_closed(&mut self, kind: SocketKind) {
        self.socket.set_connected(kind, false);
    }

    /// Queue a raw frame for the next tick.
    pub fn enqueue_frame(&mut self, kind: SocketKind, frame: String) {
        self.inbound.push_back((kind, frame));
    }

    pub fn key_down(&mut self, key: Key, now: f64) {
        let interval = self.move_interval();
        self.input.key_down(key, now, interval);
    }

    pub fn key_up(&mut self, key: Key) {
        self.input.key_up(key);
    }

    pub fn tap(&mut self, key: Key, now: f64) {
        self.input.tap(key, now);
    }

    pub fn click(&mut self, x: f32, y: f32) {
        self.input.click(x, y);
    }

    /// Repeat interval for held arrows: the ego's own speed limit once known.
    fn move_interval(&self) -> f64 {
        if let Some(ego) = self.state.as_ref().and_then(|s| s.players.ego()) {
            return ego.move_interval();
        }
        let limit = self.config.player.motion_speed_limit;
        if limit > 0.0 { 1000.0 / limit } else { 0.0 }
    }

    /// One tick: drain inbound frames, resync, apply input, draw.
    pub fn update(&mut self, now: f64) -> Option<Frame> {
        let frames: Vec<(SocketKind, String)> = self.inbound.drain(..).collect();
        for (kind, frame) in frames {
            self.handle_frame(kind, &frame, now);
        }

        if now - self.last_resync >= self.config.player.resync_interval_ms {
            self.last_resync = now;
            let ego = self.ego_id.clone();
            if let Some(state) = self.state.as_mut() {
                state.players.mark_out_of_sync(&ego);
            }
        }

        for action in self.input.poll(now) {
            self.handle_action(action, now);
        }

        let state = self.state.as_mut()?;
        Some(self.render.render(state, now, self.renderer.as_mut()))
    }

    pub fn handle_frame(&mut self, kind: SocketKind, frame: &str, now: f64) {
        match self.socket.receive(kind, frame) {
            Ok(message) => self.handle_message(message, now),
            Err(ChannelError::Protocol(ProtocolError::WrongChannel { expected })) => {
                debug!("Message was not on channel {}. Ignoring.", expected);
            }
            Err(ChannelError::Protocol(ProtocolError::UnknownType(kind))) => {
                warn!("Unrecognized message type {} from backend.", kind);
            }
            Err(e) => warn!("Dropping {} frame: {}", kind, e),
        }
    }

    pub fn handle_message(&mut self, message: ServerMessage, now: f64) {
        match message {
            ServerMessage::State(state) => self.on_state(&state),
            ServerMessage::Chat { player_id, contents, player_index, .. } => {
                if let Some(state) = self.state.as_ref() {
                    self.dashboard.chat(&state.players, &player_id, player_index, &contents);
                }
            }
            ServerMessage::DonationProcessed { donor_id, recipient_id, amount } => {
                if let Some(state) = self.state.as_ref() {
                    self.dashboard
                        .donation_processed(&state.players, &self.config, &donor_id, &recipient_id, amount);
                }
                self.donation_type = None;
            }
            ServerMessage::ColorChanged { player_id, old_color, new_color, player_index } => {
                if let Some(state) = self.state.as_mut() {
                    if let Some(player) = state.players.get_mut(&player_id) {
                        player.color = new_color.clone();
                    }
                    self.dashboard.color_changed(
                        &state.players,
                        &player_id,
                        player_index,
                        old_color.as_deref(),
                        &new_color,
                    );
                }
            }
            ServerMessage::WallBuilt { wall } => {
                if let Some(state) = self.state.as_mut() {
                    state.add_wall(Wall::from(&wall));
                }
            }
            ServerMessage::MoveRejection { player_id } => {
                if player_id == self.ego_id {
                    debug!("Move rejected, resyncing");
                    if let Some(state) = self.state.as_mut() {
                        state.players.mark_out_of_sync(&player_id);
                    }
                }
            }
            ServerMessage::PlayerAdded { player_id, broadcast_channel, control_channel } => {
                if player_id == self.ego_id {
                    info!("Joined game on {}/{}", broadcast_channel, control_channel);
                    self.socket.add_game_channels(&broadcast_channel, &control_channel);
                }
            }
            ServerMessage::NewRound { round } => {
                if let Some(state) = self.state.as_mut() {
                    self.dashboard.leaderboard(Standings::Round(round), &state.players, &self.config);
                    state.reset_round(round);
                }
                self.render.restart(now);
            }
            ServerMessage::Stop => {
                if let Some(state) = self.state.take() {
                    self.dashboard.leaderboard(Standings::Final, &state.players, &self.config);
                }
                self.dashboard.game_over = true;
                self.input.reset();
                info!("Game over");
            }
            ServerMessage::ActionError { player_id, position } => {
                if player_id == self.ego_id {
                    info!("Action refused at {:?}", position);
                }
            }
            ServerMessage::ConsumeError { player_id } => {
                if player_id == self.ego_id {
                    info!("Nothing to consume");
                }
            }
        }
    }

    fn on_state(&mut self, message: &StateMessage) {
        let snapshot = match message.snapshot() {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!("{}", e);
                return;
            }
        };
        let Some(state) = self.state.as_mut() else {
            return;
        };
        if self.config.features.alternate_consumption_donation && snapshot.donation_active != state.donation_active {
            if snapshot.donation_active {
                self.dashboard
                    .moderator("Starting a contribution round: you cannot move, only contribute.");
            } else {
                self.dashboard
                    .moderator("Starting a collection round: collect as much food as possible.");
            }
        }
        state.apply_snapshot(&snapshot, self.render.rng());
        state.remaining_time = message.remaining_time;

        let ego = state.players.ego();
        self.dashboard.update(ego, message.remaining_time, message.round);
        self.dashboard.donation_enabled = state.donation_active
            && ego.is_some_and(|e| e.score >= self.config.features.donation_amount)
            && state.players.count() > 1;
    }

    /// Send on the active control channel; failures are logged and dropped.
    fn send(&mut self, message: ClientMessage) {
        if let Err(e) = self.socket.send(&message) {
            warn!("Dropped {} message: {}", message.kind(), e);
        }
    }

    fn handle_action(&mut self, action: Action, now: f64) {
        match action {
            Action::Move(direction) => self.move_ego(direction, now),
            Action::PlantFood => self.plant_food(),
            Action::ChangeColor => self.change_color(),
            Action::ToggleVisible => self.toggle_visible(),
            Action::BuildWall => self.build_wall(),
            Action::ToggleHighlight => self.render.highlight = !self.render.highlight,
            Action::PickUp => self.pick_up(),
            Action::Drop => self.drop_item(),
            Action::Consume => self.consume(),
            Action::Transition => self.transition(),
            Action::Click { x, y } => self.donate_to_clicked(x, y),
        }
    }

    /// Ego state for an action, or `None` (logged) when there is no ego.
    fn ego_state(&mut self, action: &str) -> Option<&mut GameClientState> {
        if self.is_spectator() {
            return None;
        }
        let state = self.state.as_mut()?;
        if state.players.ego().is_none() {
            debug!("No ego player yet, ignoring {}", action);
            return None;
        }
        Some(state)
    }

    /// Predict the move locally and report it only when accepted. A move
    /// the server later refuses comes back as `move_rejection`.
    pub fn move_ego(&mut self, direction: Direction, now: f64) {
        let Some(state) = self.ego_state("move") else {
            return;
        };
        if !state.move_ego(direction, now) {
            debug!("Move {} not sent, blocked locally", direction.as_str());
            return;
        }
        let player_id = self.ego_id.clone();
        self.send(ClientMessage::Move { player_id, direction, timestamp: wire_seconds(now) });
    }

    pub fn plant_food(&mut self) {
        let Some(position) = self.ego_state("plant_food").and_then(|s| s.ego_position()) else {
            return;
        };
        let player_id = self.ego_id.clone();
        self.send(ClientMessage::PlantFood { player_id, position });
    }

    /// Switch to the next palette color.
    pub fn change_color(&mut self) {
        if !self.config.features.mutable_colors {
            return;
        }
        let colors: Vec<String> = self.config.player.colors.iter().map(|c| c.name.clone()).collect();
        if colors.is_empty() {
            return;
        }
        let Some(ego) = self.ego_state("change_color").and_then(|s| s.players.ego_mut()) else {
            return;
        };
        let next = colors
            .iter()
            .position(|c| *c == ego.color)
            .map(|i| (i + 1) % colors.len())
            .unwrap_or(0);
        ego.color = colors[next].clone();
        let color = ego.color.clone();
        let player_id = self.ego_id.clone();
        self.send(ClientMessage::ChangeColor { player_id, color });
    }

    pub fn toggle_visible(&mut self) {
        if !self.config.features.identity_signaling {
            return;
        }
        let Some(ego) = self.ego_state("toggle_visible").and_then(|s| s.players.ego_mut()) else {
            return;
        };
        ego.identity_visible = !ego.identity_visible;
        let identity_visible = ego.identity_visible;
        let player_id = self.ego_id.clone();
        self.send(ClientMessage::ToggleVisible { player_id, identity_visible });
    }

    pub fn build_wall(&mut self) {
        if !self.config.features.build_walls {
            return;
        }
        let Some(position) = self.ego_state("build_wall").and_then(|s| s.ego_position()) else {
            return;
        };
        let player_id = self.ego_id.clone();
        self.send(ClientMessage::BuildWall { player_id, position });
    }

    pub fn pick_up(&mut self) {
        let Some(state) = self.ego_state("item_pick_up") else {
            return;
        };
        let Some(position) = state.ego_position() else {
            return;
        };
        if state.pick_up().is_none() {
            debug!("Nothing to pick up at {}", position);
        }
        let player_id = self.ego_id.clone();
        self.send(ClientMessage::ItemPickUp { player_id, position });
    }

    pub fn drop_item(&mut self) {
        let Some(state) = self.ego_state("item_drop") else {
            return;
        };
        let Some(position) = state.ego_position() else {
            return;
        };
        if state.drop_item().is_none() {
            debug!("Cannot drop at {}", position);
        }
        let player_id = self.ego_id.clone();
        self.send(ClientMessage::ItemDrop { player_id, position });
    }

    pub fn consume(&mut self) {
        let Some(state) = self.ego_state("item_consume") else {
            return;
        };
        let Some(position) = state.ego_position() else {
            return;
        };
        if state.consume_held().is_none() {
            debug!("Nothing in hand to consume");
        }
        let player_id = self.ego_id.clone();
        self.send(ClientMessage::ItemConsume { player_id, position });
    }

    /// Fire the transition available at the ego's cell, if any.
    pub fn transition(&mut self) {
        let Some(state) = self.ego_state("item_transition") else {
            return;
        };
        let Some(ego) = state.players.ego() else {
            return;
        };
        let position = ego.position;
        let ground = state.grid_items.at_position(position);
        let Some((key, rule)) = state.transitions.lookup(ego.current_item.as_ref(), ground) else {
            debug!("No transition at {}", position);
            return;
        };
        if rule.required_actors > 1 {
            let nearby = state.players.neighbors(state.players.ego_id(), 1).len() as u32 + 1;
            if nearby < rule.required_actors {
                debug!("Transition {} needs {} players, {} nearby", key, rule.required_actors, nearby);
            }
        }
        state.transitions.mark_seen(key);
        let player_id = self.ego_id.clone();
        self.send(ClientMessage::ItemTransition { player_id, position });
    }

    /// Description of the transition available at the ego's cell.
    pub fn current_transition(&self) -> Option<TransitionDescription> {
        let state = self.state.as_ref()?;
        let ego = state.players.ego()?;
        let ground = state.grid_items.at_position(ego.position);
        let (key, rule) = state.transitions.lookup(ego.current_item.as_ref(), ground)?;
        Some(state.transitions.describe(&key, rule, &state.catalog))
    }

    /// Choose what a click on the grid donates to.
    pub fn select_donation(&mut self, kind: DonationType) {
        let enabled = match kind {
            DonationType::Individual => self.config.features.donation_individual,
            DonationType::Group => self.config.features.donation_group,
        };
        if enabled {
            self.donation_type = Some(kind);
        }
    }

    pub fn donation_type(&self) -> Option<DonationType> {
        self.donation_type
    }

    /// Amount to donate if a donation is currently allowed.
    fn donation_amount(&self) -> Option<f64> {
        let state = self.state.as_ref()?;
        let ego = state.players.ego()?;
        let amount = self.config.features.donation_amount;
        (state.donation_active && amount <= ego.score).then_some(amount)
    }

    fn donate(&mut self, recipient_id: String, amount: f64) {
        if recipient_id == self.ego_id.as_str() {
            return;
        }
        let player_id = self.ego_id.clone();
        self.send(ClientMessage::DonationSubmitted {
            donor_id: player_id.clone(),
            player_id,
            recipient_id,
            amount,
        });
    }

    /// Donate to the player (or that player's group) nearest the clicked pixel.
    pub fn donate_to_clicked(&mut self, x: f32, y: f32) {
        let Some(amount) = self.donation_amount() else {
            return;
        };
        let Some(kind) = self.donation_type else {
            return;
        };
        let Some(state) = self.state.as_ref() else {
            return;
        };
        let window = state.viewport.window_for(state.ego_position());
        let cell = state.viewport.pointer_to_grid(&window, x, y);
        let Some(recipient) = state.players.nearest(cell.row, cell.column) else {
            return;
        };
        let recipient_id = match kind {
            DonationType::Individual => recipient.id.to_string(),
            DonationType::Group => match self.config.color_index(&recipient.color) {
                Some(index) => format!("group:{}", index),
                None => return,
            },
        };
        self.donate(recipient_id, amount);
    }

    pub fn donate_to_all(&mut self) {
        if !self.config.features.donation_public {
            return;
        }
        if let Some(amount) = self.donation_amount() {
            self.donate("all".to_string(), amount);
        }
    }

    pub fn donate_to_in_group(&mut self) {
        if !self.config.features.donation_ingroup {
            return;
        }
        let Some(amount) = self.donation_amount() else {
            return;
        };
        let Some(index) = self
            .state
            .as_ref()
            .and_then(|s| s.players.ego())
            .and_then(|ego| self.config.color_index(&ego.color))
        else {
            return;
        };
        self.donate(format!("group:{}", index), amount);
    }

    /// Chat goes straight to peers on the game broadcast channel and to
    /// the server for the record.
    pub fn send_chat(&mut self, contents: &str, now: f64) {
        let contents = contents.trim();
        if contents.is_empty() || self.is_spectator() {
            return;
        }
        let message = ClientMessage::Chat {
            player_id: self.ego_id.clone(),
            contents: contents.to_string(),
            timestamp: now,
            broadcast: true,
        };
        if let Err(e) = self.socket.broadcast(&message) {
            warn!("Chat not broadcast: {}", e);
        }
        self.send(message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::items::{ItemType, TransitionRule, Visibility};
    use glam::Vec3;
    use protocol::{encode, GridSnapshot, ItemId, ItemState, ItemTypeId, PlayerState, Position};
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Clone, Default)]
    struct Sink(Rc<RefCell<usize>>);

    impl Renderer for Sink {
        fn update(&mut self, _colors: &[Vec3], _textures: &[u32]) {
            *self.0.borrow_mut() += 1;
        }
    }

    fn config() -> Config {
        let mut config = Config::default();
        config.grid.rows = 20;
        config.grid.columns = 20;
        config.grid.window_rows = 10;
        config.grid.window_columns = 10;
        config.features.mutable_colors = true;
        config.features.identity_signaling = true;
        config.features.build_walls = true;
        config.features.donation_individual = true;
        config.features.donation_group = true;
        config.features.donation_public = true;
        config.features.donation_ingroup = true;
        let mut axe = ItemType::new("axe", "Axe");
        axe.interactive = true;
        let mut stump = ItemType::new("stump", "Stump");
        stump.interactive = true;
        stump.portable = false;
        config.items = vec![axe, stump];
        config.transitions = vec![TransitionRule {
            actor_start: Some(ItemTypeId::new("axe")),
            actor_end: Some(ItemTypeId::new("axe")),
            target_start: Some(ItemTypeId::new("stump")),
            target_end: None,
            visible: Visibility::Seen,
            ..Default::default()
        }];
        config
    }

    fn client(ego: &str) -> (GameClient, Sink) {
        let sink = Sink::default();
        let config = config();
        let render = RenderLoop::with_rng(&config, false, 0.0, StdRng::seed_from_u64(11));
        let mut client = GameClient::with_render_loop(config, PlayerId::new(ego), Box::new(sink.clone()), render, 0.0);
        client.on_socket_open(SocketKind::Lobby);
        (client, sink)
    }

    fn player(id: &str, row: i32, column: i32, color: &str, score: f64) -> PlayerState {
        let mut p = PlayerState::new(id, Position::new(row, column));
        p.color = color.to_string();
        p.score = score;
        p
    }

    fn state_frame(channel: &str, grid: &GridSnapshot) -> String {
        let message = ServerMessage::State(StateMessage {
            grid: serde_json::to_string(grid).unwrap(),
            remaining_time: 30.0,
            round: 0,
            count: None,
        });
        encode(channel, &message).unwrap()
    }

    fn sent(client: &mut GameClient) -> Vec<String> {
        client.socket_mut().drain_outbox().map(|f| f.text).collect()
    }

    fn world() -> GridSnapshot {
        GridSnapshot {
            players: vec![player("1", 5, 5, "BLUE", 3.0), player("2", 5, 8, "RED", 1.0)],
            donation_active: true,
            ..GridSnapshot::default()
        }
    }

    fn joined(ego: &str) -> (GameClient, Sink) {
        let (mut c, sink) = client(ego);
        c.enqueue_frame(
            SocketKind::Lobby,
            encode(
                "griduniverse",
                &ServerMessage::PlayerAdded {
                    player_id: PlayerId::new(ego),
                    broadcast_channel: "game".into(),
                    control_channel: "game_ctrl".into(),
                },
            )
            .unwrap(),
        );
        c.update(1.0);
        c.on_socket_open(SocketKind::Game);
        c.enqueue_frame(SocketKind::Game, state_frame("game", &world()));
        c.update(2.0);
        sent(&mut c);
        (c, sink)
    }

    #[test]
    fn test_connect_announced_once() {
        let (mut c, _) = client("1");
        c.on_socket_closed(SocketKind::Lobby);
        c.on_socket_open(SocketKind::Lobby);
        let frames = sent(&mut c);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0], "griduniverse_ctrl:{\"type\":\"connect\",\"player_id\":\"1\"}");
    }

    #[test]
    fn test_frames_wait_for_tick() {
        let (mut c, sink) = client("1");
        c.enqueue_frame(SocketKind::Lobby, state_frame("griduniverse", &world()));
        assert_eq!(c.state().unwrap().players.count(), 0);
        assert!(c.update(10.0).is_some());
        assert_eq!(c.state().unwrap().players.count(), 2);
        assert_eq!(*sink.0.borrow(), 1);
        assert_eq!(c.dashboard().score, 3);
        assert_eq!(c.dashboard().remaining_time, 30);
        assert!(c.dashboard().donation_enabled);
    }

    #[test]
    fn test_foreign_and_unknown_frames_dropped() {
        let (mut c, _) = client("1");
        c.enqueue_frame(SocketKind::Lobby, "other:{\"type\":\"stop\"}".into());
        c.enqueue_frame(SocketKind::Lobby, "griduniverse:{\"type\":\"fireworks\"}".into());
        c.enqueue_frame(SocketKind::Lobby, "griduniverse:not json".into());
        c.update(1.0);
        assert!(!c.is_stopped());
    }

    #[test]
    fn test_player_added_opens_game_socket() {
        let (mut c, _) = joined("1");
        assert!(c.socket().has_game_channels());
        let requests: Vec<_> = c.socket_mut().drain_requests().collect();
        assert!(requests.iter().any(|r| r.kind == SocketKind::Game && r.url.contains("channel=game&")));
    }

    #[test]
    fn test_player_added_for_someone_else_ignored() {
        let (mut c, _) = client("1");
        let frame = encode(
            "griduniverse",
            &ServerMessage::PlayerAdded {
                player_id: PlayerId::new("2"),
                broadcast_channel: "game".into(),
                control_channel: "game_ctrl".into(),
            },
        )
        .unwrap();
        c.enqueue_frame(SocketKind::Lobby, frame);
        c.update(1.0);
        assert!(!c.socket().has_game_channels());
    }

    #[test]
    fn test_arrow_moves_and_sends() {
        let (mut c, _) = joined("1");
        c.key_down(Key::Arrow(Direction::Right), 1000.0);
        c.update(1000.0);
        assert_eq!(c.state().unwrap().ego_position(), Some(Position::new(5, 6)));
        let frames = sent(&mut c);
        assert_eq!(frames.len(), 1);
        assert!(frames[0].starts_with("game_ctrl:{\"type\":\"move\""));
        assert!(frames[0].contains("\"move\":\"right\""));
    }

    #[test]
    fn test_stalled_update_sends_one_move() {
        let (mut c, _) = joined("1");
        c.key_down(Key::Arrow(Direction::Right), 1000.0);
        c.update(1000.0);
        assert_eq!(sent(&mut c).len(), 1);
        c.update(3000.0);
        assert_eq!(sent(&mut c).len(), 1);
        assert_eq!(c.state().unwrap().ego_position(), Some(Position::new(5, 7)));
    }

    #[test]
    fn test_blocked_move_not_sent() {
        let (mut c, _) = joined("1");
        c.move_ego(Direction::Right, 1000.0);
        c.move_ego(Direction::Right, 1001.0);
        assert_eq!(c.state().unwrap().ego_position(), Some(Position::new(5, 6)));
        let frames = sent(&mut c);
        assert_eq!(frames.len(), 1);
        assert!(frames[0].contains("\"timestamp\":1.0"));

        // Out of bounds: nothing to report either.
        let (mut c, _) = joined("1");
        let mut now = 1000.0;
        for _ in 0..5 {
            c.move_ego(Direction::Up, now);
            now += 200.0;
        }
        assert_eq!(c.state().unwrap().ego_position(), Some(Position::new(0, 5)));
        c.move_ego(Direction::Up, now);
        assert_eq!(sent(&mut c).len(), 5);
    }

    #[test]
    fn test_move_rejection_resyncs() {
        let (mut c, _) = joined("1");
        c.move_ego(Direction::Up, 1000.0);
        assert_eq!(c.state().unwrap().ego_position(), Some(Position::new(4, 5)));
        let rejection = encode("game", &ServerMessage::MoveRejection { player_id: PlayerId::new("1") }).unwrap();
        c.enqueue_frame(SocketKind::Game, rejection);
        c.enqueue_frame(SocketKind::Game, state_frame("game", &world()));
        c.update(1001.0);
        assert_eq!(c.state().unwrap().ego_position(), Some(Position::new(5, 5)));
    }

    #[test]
    fn test_periodic_resync() {
        let (mut c, _) = joined("1");
        c.move_ego(Direction::Up, 1000.0);
        c.update(1001.0);
        c.enqueue_frame(SocketKind::Game, state_frame("game", &world()));
        c.update(1002.0);
        assert_eq!(c.state().unwrap().ego_position(), Some(Position::new(4, 5)));

        c.update(6000.0);
        c.enqueue_frame(SocketKind::Game, state_frame("game", &world()));
        c.update(6001.0);
        assert_eq!(c.state().unwrap().ego_position(), Some(Position::new(5, 5)));
    }

    #[test]
    fn test_change_color_cycles_palette() {
        let (mut c, _) = joined("1");
        c.tap(Key::Char('c'), 100.0);
        c.update(100.0);
        let ego = c.state().unwrap().players.ego().unwrap();
        assert_eq!(ego.color, "YELLOW");
        let frames = sent(&mut c);
        assert!(frames[0].contains("\"color\":\"YELLOW\""));
    }

    #[test]
    fn test_toggle_visible_and_wall() {
        let (mut c, _) = joined("1");
        c.toggle_visible();
        c.build_wall();
        c.plant_food();
        assert!(!c.state().unwrap().players.ego().unwrap().identity_visible);
        let frames = sent(&mut c);
        assert!(frames[0].contains("\"identity_visible\":false"));
        assert!(frames[1].contains("\"type\":\"build_wall\",\"player_id\":\"1\",\"position\":[5,5]"));
        assert!(frames[2].contains("plant_food"));
    }

    #[test]
    fn test_wall_built_blocks_movement() {
        let (mut c, _) = joined("1");
        let wall = protocol::WallState { position: Position::new(5, 6), color: [0.1; 3] };
        c.enqueue_frame(SocketKind::Game, encode("game", &ServerMessage::WallBuilt { wall }).unwrap());
        c.update(500.0);
        c.move_ego(Direction::Right, 1000.0);
        assert_eq!(c.state().unwrap().ego_position(), Some(Position::new(5, 5)));
    }

    #[test]
    fn test_donate_to_clicked_player() {
        let (mut c, _) = joined("1");
        // Window starts at (0, 0); cells are 11px. Pixel (90, 56) is (5, 8).
        c.donate_to_clicked(90.0, 56.0);
        assert!(sent(&mut c).is_empty(), "no donation type chosen");

        c.select_donation(DonationType::Individual);
        c.donate_to_clicked(90.0, 56.0);
        c.select_donation(DonationType::Group);
        c.donate_to_clicked(90.0, 56.0);
        // Clicking yourself donates nothing.
        c.select_donation(DonationType::Individual);
        c.donate_to_clicked(56.0, 56.0);
        let frames = sent(&mut c);
        assert_eq!(frames.len(), 2);
        assert!(frames[0].contains("\"recipient_id\":\"2\""));
        assert!(frames[1].contains("\"recipient_id\":\"group:3\""));
    }

    #[test]
    fn test_donation_gates() {
        let (mut c, _) = joined("1");
        c.donate_to_all();
        c.donate_to_in_group();
        let frames = sent(&mut c);
        assert!(frames[0].contains("\"recipient_id\":\"all\""));
        assert!(frames[1].contains("\"recipient_id\":\"group:0\""));

        let mut poor = world();
        poor.players[0].score = 0.5;
        c.enqueue_frame(SocketKind::Game, state_frame("game", &poor));
        c.update(3.0);
        c.donate_to_all();
        assert!(sent(&mut c).is_empty());
        assert!(!c.dashboard().donation_enabled);
    }

    #[test]
    fn test_transition_marks_seen() {
        let (mut c, _) = joined("1");
        let mut grid = world();
        grid.players[0].current_item = Some(ItemState {
            id: ItemId(1),
            item_id: ItemTypeId::new("axe"),
            position: None,
            maturity: 1.0,
            creation_timestamp: None,
            remaining_uses: None,
        });
        grid.items = Some(vec![ItemState {
            id: ItemId(2),
            item_id: ItemTypeId::new("stump"),
            position: Some(Position::new(5, 5)),
            maturity: 1.0,
            creation_timestamp: None,
            remaining_uses: None,
        }]);
        c.enqueue_frame(SocketKind::Game, state_frame("game", &grid));
        c.update(3.0);

        let before = c.current_transition().unwrap();
        assert!(!before.revealed);
        c.transition();
        let after = c.current_transition().unwrap();
        assert!(after.revealed);
        assert_eq!(after.text, "Axe + Stump → Axe + nothing");
        assert!(sent(&mut c)[0].contains("item_transition"));

        // Hand is full, so the stump stays put.
        c.pick_up();
        assert!(c.state().unwrap().grid_items.position_of(ItemId(2)).is_some());
    }

    #[test]
    fn test_chat_broadcast_and_recorded() {
        let (mut c, _) = joined("1");
        c.send_chat("  hello  ", 50.0);
        c.send_chat("   ", 51.0);
        let frames = sent(&mut c);
        assert_eq!(frames.len(), 2);
        assert!(frames[0].starts_with("game:"));
        assert!(frames[1].starts_with("game_ctrl:"));
        assert!(frames[0].contains("\"contents\":\"hello\""));
    }

    #[test]
    fn test_new_round_and_stop() {
        let (mut c, _) = joined("1");
        c.enqueue_frame(SocketKind::Game, encode("game", &ServerMessage::NewRound { round: 1 }).unwrap());
        c.update(10.0);
        assert_eq!(c.state().unwrap().round, 1);
        assert!(c.dashboard().messages().iter().any(|m| m.contains("round 1 standings")));

        c.enqueue_frame(SocketKind::Game, encode("game", &ServerMessage::Stop).unwrap());
        assert!(c.update(20.0).is_none());
        assert!(c.is_stopped());
        assert!(c.dashboard().game_over);
        assert!(c.dashboard().messages().iter().any(|m| m.contains("final standings")));
    }

    #[test]
    fn test_spectator_sends_no_actions() {
        let (mut c, _) = client("spectator");
        sent(&mut c);
        c.enqueue_frame(SocketKind::Lobby, state_frame("griduniverse", &world()));
        c.update(1.0);
        c.move_ego(Direction::Up, 1000.0);
        c.plant_food();
        c.send_chat("hi", 1.0);
        assert!(sent(&mut c).is_empty());
    }

    #[test]
    fn test_disconnected_game_socket_drops_frames() {
        let (mut c, _) = joined("1");
        c.on_socket_closed(SocketKind::Game);
        c.plant_food();
        assert!(sent(&mut c).is_empty());
    }
}
