// Player registry: local movement prediction and server reconciliation
//
// The ego player moves optimistically; its position is kept across server
// snapshots until it is marked out of sync (periodic resync, move_rejection)
// or the server may perturb moves (tremble rate). Every other player is taken
// from the server as-is. Motion timestamps used for rate limiting live on the
// client clock and survive snapshots; the server's round-time value is kept
// alongside.
use protocol::{Direction, PlayerId, PlayerState, Position};
use std::collections::HashMap;
use tracing::{debug, trace};

use crate::config::PlayerConfig;
use crate::items::{GridItems, Item, ItemCatalog};
use crate::walls::Walls;

#[derive(Debug, Clone)]
pub struct Player {
    pub id: PlayerId,
    pub position: Position,
    /// Team color name.
    pub color: String,
    pub motion_auto: bool,
    pub motion_direction: Direction,
    /// Cells per second.
    pub motion_speed_limit: f64,
    /// Client clock time of the last accepted move, in ms.
    pub motion_timestamp: f64,
    /// Round time of the last move as the server reported it, in seconds.
    pub server_motion_timestamp: f64,
    pub score: f64,
    pub payoff: f64,
    pub name: String,
    pub identity_visible: bool,
    pub recruiter_id: String,
    pub position_in_sync: bool,
    pub current_item: Option<Item>,
}

impl Player {
    pub fn from_state(state: &PlayerState, catalog: &ItemCatalog) -> Self {
        Self {
            id: state.id.clone(),
            position: state.position,
            color: state.color.clone(),
            motion_auto: state.motion_auto,
            motion_direction: state.motion_direction,
            motion_speed_limit: state.motion_speed_limit,
            motion_timestamp: 0.0,
            server_motion_timestamp: state.motion_timestamp,
            score: state.score,
            payoff: state.payoff,
            name: state.name.clone(),
            identity_visible: state.identity_visible,
            recruiter_id: state.recruiter_id.clone(),
            position_in_sync: true,
            current_item: state
                .current_item
                .as_ref()
                .and_then(|item| Item::from_state(item, catalog)),
        }
    }

    /// Wire form, as the server last reported it apart from local moves.
    pub fn to_state(&self) -> PlayerState {
        PlayerState {
            id: self.id.clone(),
            position: self.position,
            color: self.color.clone(),
            motion_auto: self.motion_auto,
            motion_direction: self.motion_direction,
            motion_speed_limit: self.motion_speed_limit,
            motion_timestamp: self.server_motion_timestamp,
            score: self.score,
            payoff: self.payoff,
            name: self.name.clone(),
            identity_visible: self.identity_visible,
            recruiter_id: self.recruiter_id.clone(),
            current_item: self.current_item.as_ref().map(|item| item.to_state(None)),
        }
    }

    /// Minimum time between two moves, in ms. Zero when unlimited.
    pub fn move_interval(&self) -> f64 {
        if self.motion_speed_limit > 0.0 {
            1000.0 / self.motion_speed_limit
        } else {
            0.0
        }
    }

    /// Use the held item once, dropping it from the hand once spent.
    /// Returns the calories gained.
    pub fn consume_item(&mut self) -> Option<f64> {
        let item = self.current_item.as_mut()?;
        let calories = item.consume();
        if item.is_spent() {
            self.current_item = None;
        }
        Some(calories)
    }
}

/// Why a move was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveBlocked {
    UnknownPlayer,
    OutOfBounds,
    Wall,
    Player,
    Item,
    TooSoon,
}

/// Static obstacles consulted by [`PlayerSet::move_player`].
#[derive(Debug, Clone, Copy)]
pub struct Terrain<'a> {
    pub walls: &'a Walls,
    pub items: &'a GridItems,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GroupScore {
    pub color: String,
    pub score: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlayerScore {
    pub id: PlayerId,
    pub name: String,
    pub score: f64,
}

/// All known players in first-seen order, plus the local player's id.
#[derive(Debug, Clone)]
pub struct PlayerSet {
    ego_id: PlayerId,
    players: Vec<Player>,
    index: HashMap<PlayerId, usize>,
    rows: i32,
    columns: i32,
    player_overlap: bool,
    tremble_rate: f64,
}

impl PlayerSet {
    pub fn new(ego_id: PlayerId, rows: u32, columns: u32, config: &PlayerConfig) -> Self {
        Self {
            ego_id,
            players: Vec::new(),
            index: HashMap::new(),
            rows: rows as i32,
            columns: columns as i32,
            player_overlap: config.player_overlap,
            tremble_rate: config.motion_tremble_rate,
        }
    }

    pub fn ego_id(&self) -> &PlayerId {
        &self.ego_id
    }

    pub fn ego(&self) -> Option<&Player> {
        self.get(&self.ego_id)
    }

    pub fn ego_mut(&mut self) -> Option<&mut Player> {
        let i = *self.index.get(&self.ego_id)?;
        self.players.get_mut(i)
    }

    pub fn is_ego(&self, id: &PlayerId) -> bool {
        *id == self.ego_id
    }

    pub fn get(&self, id: &PlayerId) -> Option<&Player> {
        self.index.get(id).map(|&i| &self.players[i])
    }

    pub fn get_mut(&mut self, id: &PlayerId) -> Option<&mut Player> {
        let i = *self.index.get(id)?;
        self.players.get_mut(i)
    }

    pub fn count(&self) -> usize {
        self.players.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Player> {
        self.players.iter()
    }

    /// Grid dimensions may arrive with the first snapshot.
    pub fn resize(&mut self, rows: u32, columns: u32) {
        self.rows = rows as i32;
        self.columns = columns as i32;
    }

    fn in_bounds(&self, p: Position) -> bool {
        p.row >= 0 && p.row < self.rows && p.column >= 0 && p.column < self.columns
    }

    pub fn is_player_at(&self, position: Position) -> bool {
        self.players.iter().any(|p| p.position == position)
    }

    /// Check a move without applying it.
    pub fn check_move(
        &self,
        id: &PlayerId,
        direction: Direction,
        now: f64,
        terrain: Terrain<'_>,
    ) -> Result<Position, MoveBlocked> {
        let player = self.get(id).ok_or(MoveBlocked::UnknownPlayer)?;
        let target = player.position.step(direction);
        if !self.in_bounds(target) {
            return Err(MoveBlocked::OutOfBounds);
        }
        if terrain.walls.contains(target) {
            return Err(MoveBlocked::Wall);
        }
        if !self.player_overlap && self.is_player_at(target) {
            return Err(MoveBlocked::Player);
        }
        if terrain.items.at_position(target).is_some_and(|item| !item.is_crossable()) {
            return Err(MoveBlocked::Item);
        }
        if now - player.motion_timestamp < player.move_interval() {
            return Err(MoveBlocked::TooSoon);
        }
        Ok(target)
    }

    /// Try to move `id` one cell. On success the player's position,
    /// direction and motion timestamp are updated and true is returned;
    /// otherwise nothing changes.
    pub fn move_player(&mut self, id: &PlayerId, direction: Direction, now: f64, terrain: Terrain<'_>) -> bool {
        match self.check_move(id, direction, now, terrain) {
            Ok(target) => {
                if let Some(player) = self.get_mut(id) {
                    player.position = target;
                    player.motion_direction = direction;
                    player.motion_timestamp = now;
                }
                true
            }
            Err(reason) => {
                trace!("Move {} of {} blocked: {:?}", direction.as_str(), id, reason);
                false
            }
        }
    }

    /// Step every auto-moving player in its current direction.
    pub fn advance_auto(&mut self, now: f64, terrain: Terrain<'_>) {
        let movers: Vec<(PlayerId, Direction)> = self
            .players
            .iter()
            .filter(|p| p.motion_auto)
            .map(|p| (p.id.clone(), p.motion_direction))
            .collect();
        for (id, direction) in movers {
            self.move_player(&id, direction, now, terrain);
        }
    }

    /// Reconcile with a server snapshot.
    pub fn update(&mut self, states: &[PlayerState], catalog: &ItemCatalog) {
        for state in states {
            let mut player = Player::from_state(state, catalog);
            match self.index.get(&state.id) {
                Some(&i) => {
                    let local = &self.players[i];
                    player.motion_timestamp = local.motion_timestamp;
                    if local.id == self.ego_id && local.position_in_sync && self.tremble_rate == 0.0 {
                        player.position = local.position;
                    } else if local.id == self.ego_id && local.position != player.position {
                        debug!("Ego resynced from {} to {}", local.position, player.position);
                    }
                    self.players[i] = player;
                }
                None => {
                    self.index.insert(state.id.clone(), self.players.len());
                    self.players.push(player);
                }
            }
        }
    }

    /// Make the next [`PlayerSet::update`] adopt the server's position.
    pub fn mark_out_of_sync(&mut self, id: &PlayerId) {
        if let Some(player) = self.get_mut(id) {
            player.position_in_sync = false;
        }
    }

    /// Player closest to (row, column) by Manhattan distance; the
    /// earliest-seen player wins ties.
    pub fn nearest(&self, row: i32, column: i32) -> Option<&Player> {
        let target = Position::new(row, column);
        self.players.iter().min_by_key(|p| p.position.manhattan(target))
    }

    /// Other players within Manhattan distance `distance` of `id`.
    pub fn neighbors(&self, id: &PlayerId, distance: i32) -> Vec<&Player> {
        let Some(center) = self.get(id).map(|p| p.position) else {
            return Vec::new();
        };
        self.players
            .iter()
            .filter(|p| p.id != *id && p.position.manhattan(center) <= distance)
            .collect()
    }

    /// Rounded score totals per team color, highest first.
    pub fn group_scores(&self) -> Vec<GroupScore> {
        let mut groups: Vec<GroupScore> = Vec::new();
        for player in &self.players {
            let score = player.score.round() as i64;
            match groups.iter_mut().find(|g| g.color == player.color) {
                Some(group) => group.score += score,
                None => groups.push(GroupScore { color: player.color.clone(), score }),
            }
        }
        groups.sort_by(|a, b| b.score.cmp(&a.score));
        groups
    }

    /// Individual scores, highest first; ties keep first-seen order.
    pub fn player_scores(&self) -> Vec<PlayerScore> {
        let mut scores: Vec<PlayerScore> = self
            .players
            .iter()
            .map(|p| PlayerScore { id: p.id.clone(), name: p.name.clone(), score: p.score })
            .collect();
        scores.sort_by(|a, b| b.score.total_cmp(&a.score));
        scores
    }

    /// Highest score, never below zero.
    pub fn max_score(&self) -> f64 {
        self.players.iter().fold(0.0, |acc, p| acc.max(p.score))
    }

    /// Lowest score; zero when there are no players.
    pub fn min_score(&self) -> f64 {
        self.players
            .iter()
            .map(|p| p.score)
            .reduce(f64::min)
            .unwrap_or(0.0)
    }

    pub fn clear(&mut self) {
        self.players.clear();
        self.index.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::items::ItemType;
    use protocol::{ItemId, ItemState, ItemTypeId, WallState};
    use std::rc::Rc;

    fn set(ego: &str) -> PlayerSet {
        PlayerSet::new(PlayerId::new(ego), 20, 20, &PlayerConfig::default())
    }

    fn state(id: &str, row: i32, column: i32) -> PlayerState {
        PlayerState::new(id, Position::new(row, column))
    }

    #[derive(Default)]
    struct Fixture {
        walls: Walls,
        items: GridItems,
    }

    impl Fixture {
        fn terrain(&self) -> Terrain<'_> {
            Terrain { walls: &self.walls, items: &self.items }
        }
    }

    fn ego_id() -> PlayerId {
        PlayerId::new("1")
    }

    #[test]
    fn test_move_then_rate_limited() {
        let f = Fixture::default();
        let mut players = set("1");
        players.update(&[state("1", 5, 5)], &ItemCatalog::default());
        assert!(players.move_player(&ego_id(), Direction::Right, 1000.0, f.terrain()));
        assert_eq!(players.ego().unwrap().position, Position::new(5, 6));
        assert_eq!(players.ego().unwrap().motion_timestamp, 1000.0);

        assert!(!players.move_player(&ego_id(), Direction::Right, 1000.0, f.terrain()));
        assert_eq!(players.ego().unwrap().position, Position::new(5, 6));

        // 1000 / 8 = 125 ms later the next move is allowed.
        assert!(!players.move_player(&ego_id(), Direction::Down, 1124.0, f.terrain()));
        assert!(players.move_player(&ego_id(), Direction::Down, 1125.0, f.terrain()));
        assert_eq!(players.ego().unwrap().motion_direction, Direction::Down);
    }

    #[test]
    fn test_zero_speed_limit_is_unlimited() {
        let f = Fixture::default();
        let mut players = set("1");
        let mut s = state("1", 5, 5);
        s.motion_speed_limit = 0.0;
        players.update(&[s], &ItemCatalog::default());
        for _ in 0..3 {
            assert!(players.move_player(&ego_id(), Direction::Up, 0.0, f.terrain()));
        }
        assert_eq!(players.ego().unwrap().position, Position::new(2, 5));
    }

    #[test]
    fn test_never_leaves_grid() {
        let f = Fixture::default();
        let mut players = set("1");
        players.update(&[state("1", 0, 19)], &ItemCatalog::default());
        let mut now = 0.0;
        for direction in [Direction::Up, Direction::Right, Direction::Up, Direction::Right] {
            now += 1000.0;
            assert!(!players.move_player(&ego_id(), direction, now, f.terrain()));
        }
        let p = players.ego().unwrap().position;
        assert_eq!(p, Position::new(0, 19));
        assert_eq!(players.check_move(&ego_id(), Direction::Up, now, f.terrain()), Err(MoveBlocked::OutOfBounds));
    }

    #[test]
    fn test_walls_block() {
        let mut players = set("1");
        players.update(&[state("1", 5, 5)], &ItemCatalog::default());
        let mut f = Fixture::default();
        f.walls.merge(&[WallState { position: Position::new(5, 6), color: [0.5; 3] }]);
        let terrain = f.terrain();
        assert_eq!(
            players.check_move(&ego_id(), Direction::Right, 1000.0, terrain),
            Err(MoveBlocked::Wall)
        );
        assert!(!players.move_player(&ego_id(), Direction::Right, 1000.0, terrain));
        assert!(players.move_player(&ego_id(), Direction::Left, 1000.0, terrain));
    }

    #[test]
    fn test_players_block_unless_overlap() {
        let f = Fixture::default();
        let mut players = set("1");
        players.update(&[state("1", 5, 5), state("2", 5, 6)], &ItemCatalog::default());
        assert!(!players.move_player(&ego_id(), Direction::Right, 1000.0, f.terrain()));

        let config = PlayerConfig { player_overlap: true, ..PlayerConfig::default() };
        let mut players = PlayerSet::new(ego_id(), 20, 20, &config);
        players.update(&[state("1", 5, 5), state("2", 5, 6)], &ItemCatalog::default());
        assert!(players.move_player(&ego_id(), Direction::Right, 1000.0, f.terrain()));
    }

    #[test]
    fn test_uncrossable_item_blocks() {
        let mut boulder = ItemType::new("boulder", "Boulder");
        boulder.crossable = false;
        let catalog = ItemCatalog::new([boulder]);
        let mut f = Fixture::default();
        let def = Rc::clone(catalog.get(&ItemTypeId::new("boulder")).unwrap());
        f.items.add(Item::new(ItemId(1), def), Position::new(5, 6));

        let mut players = set("1");
        players.update(&[state("1", 5, 5)], &catalog);
        let terrain = f.terrain();
        assert_eq!(
            players.check_move(&ego_id(), Direction::Right, 1000.0, terrain),
            Err(MoveBlocked::Item)
        );
    }

    #[test]
    fn test_update_keeps_prediction_while_in_sync() {
        let f = Fixture::default();
        let mut players = set("1");
        players.update(&[state("1", 5, 5)], &ItemCatalog::default());
        players.move_player(&ego_id(), Direction::Right, 1000.0, f.terrain());

        let mut server = state("1", 5, 5);
        server.score = 7.0;
        players.update(&[server.clone()], &ItemCatalog::default());
        let ego = players.ego().unwrap();
        assert_eq!(ego.position, Position::new(5, 6));
        assert_eq!(ego.motion_timestamp, 1000.0);
        assert_eq!(ego.score, 7.0);

        players.mark_out_of_sync(&ego_id());
        players.update(&[server], &ItemCatalog::default());
        let ego = players.ego().unwrap();
        assert_eq!(ego.position, Position::new(5, 5));
        assert_eq!(ego.motion_timestamp, 1000.0);
        assert!(ego.position_in_sync);
    }

    #[test]
    fn test_tremble_trusts_server() {
        let f = Fixture::default();
        let config = PlayerConfig { motion_tremble_rate: 0.1, ..PlayerConfig::default() };
        let mut players = PlayerSet::new(ego_id(), 20, 20, &config);
        players.update(&[state("1", 5, 5)], &ItemCatalog::default());
        players.move_player(&ego_id(), Direction::Right, 1000.0, f.terrain());
        players.update(&[state("1", 5, 5)], &ItemCatalog::default());
        assert_eq!(players.ego().unwrap().position, Position::new(5, 5));
    }

    #[test]
    fn test_others_taken_verbatim() {
        let catalog = ItemCatalog::new([ItemType::new("stone", "Stone")]);
        let mut players = set("1");
        players.update(&[state("1", 0, 0), state("2", 3, 3)], &catalog);
        let mut other = state("2", 9, 9);
        other.color = "RED".into();
        other.motion_auto = true;
        other.motion_direction = Direction::Left;
        other.motion_speed_limit = 4.0;
        other.motion_timestamp = 42.0;
        other.score = 4.5;
        other.payoff = 1.25;
        other.name = "Ada".into();
        other.identity_visible = false;
        other.recruiter_id = "r1".into();
        other.current_item = Some(ItemState {
            id: ItemId(9),
            item_id: ItemTypeId::new("stone"),
            position: None,
            maturity: 0.5,
            creation_timestamp: None,
            remaining_uses: Some(2),
        });
        players.update(&[other.clone()], &catalog);

        let p = players.get(&PlayerId::new("2")).unwrap();
        assert_eq!(p.to_state(), other);
        assert!(p.position_in_sync);
        // Server round time never leaks into the local rate limit.
        assert_eq!(p.motion_timestamp, 0.0);
        assert_eq!(p.server_motion_timestamp, 42.0);
        // Unnamed players are kept.
        assert_eq!(players.count(), 2);
    }

    #[test]
    fn test_server_round_time_does_not_block_ego() {
        let f = Fixture::default();
        let mut players = set("1");
        let mut server = state("1", 5, 5);
        server.motion_timestamp = 300.0;
        players.update(&[server.clone()], &ItemCatalog::default());
        assert!(players.move_player(&ego_id(), Direction::Right, 200.0, f.terrain()));

        players.mark_out_of_sync(&ego_id());
        server.motion_timestamp = 301.0;
        players.update(&[server], &ItemCatalog::default());
        let ego = players.ego().unwrap();
        assert_eq!(ego.motion_timestamp, 200.0);
        assert_eq!(ego.server_motion_timestamp, 301.0);
        assert!(!players.move_player(&ego_id(), Direction::Right, 324.0, f.terrain()));
        assert!(players.move_player(&ego_id(), Direction::Right, 325.0, f.terrain()));
    }

    #[test]
    fn test_held_item_from_snapshot() {
        let catalog = ItemCatalog::new([ItemType::new("stone", "Stone")]);
        let mut s = state("1", 2, 2);
        s.current_item = Some(ItemState {
            id: ItemId(5),
            item_id: ItemTypeId::new("stone"),
            position: None,
            maturity: 1.0,
            creation_timestamp: None,
            remaining_uses: Some(1),
        });
        let mut players = set("1");
        players.update(&[s], &catalog);
        let ego = players.ego_mut().unwrap();
        assert_eq!(ego.current_item.as_ref().unwrap().id, ItemId(5));
        ego.consume_item();
        assert!(ego.current_item.is_none());
        assert_eq!(ego.consume_item(), None);
    }

    #[test]
    fn test_nearest_first_seen_wins_ties() {
        let mut players = set("1");
        players.update(
            &[state("1", 0, 0), state("2", 4, 4), state("3", 4, 6)],
            &ItemCatalog::default(),
        );
        assert_eq!(players.nearest(4, 5).unwrap().id, PlayerId::new("2"));
        assert_eq!(players.nearest(1, 1).unwrap().id, PlayerId::new("1"));
        assert!(set("1").nearest(0, 0).is_none());
    }

    #[test]
    fn test_neighbors_within_distance() {
        let mut players = set("1");
        players.update(
            &[state("1", 5, 5), state("2", 5, 6), state("3", 7, 7)],
            &ItemCatalog::default(),
        );
        let near: Vec<_> = players.neighbors(&ego_id(), 1).iter().map(|p| p.id.clone()).collect();
        assert_eq!(near, vec![PlayerId::new("2")]);
        assert_eq!(players.neighbors(&ego_id(), 4).len(), 2);
    }

    #[test]
    fn test_group_and_player_scores() {
        let mut players = set("1");
        let mut a = state("1", 0, 0);
        a.color = "BLUE".into();
        a.score = 1.4;
        let mut b = state("2", 0, 1);
        b.color = "RED".into();
        b.score = 3.0;
        let mut c = state("3", 0, 2);
        c.color = "BLUE".into();
        c.score = 1.0;
        players.update(&[a, b, c], &ItemCatalog::default());

        let groups = players.group_scores();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0], GroupScore { color: "RED".into(), score: 3 });
        assert_eq!(groups[1], GroupScore { color: "BLUE".into(), score: 2 });

        let order: Vec<_> = players.player_scores().into_iter().map(|s| s.id).collect();
        assert_eq!(order, vec![PlayerId::new("2"), PlayerId::new("1"), PlayerId::new("3")]);
        assert_eq!(players.max_score(), 3.0);
        assert_eq!(players.min_score(), 1.0);
    }

    #[test]
    fn test_auto_motion_advances() {
        let f = Fixture::default();
        let mut players = set("1");
        let mut bot = state("2", 3, 3);
        bot.motion_auto = true;
        bot.motion_direction = Direction::Down;
        players.update(&[state("1", 0, 0), bot], &ItemCatalog::default());
        players.advance_auto(1000.0, f.terrain());
        assert_eq!(players.get(&PlayerId::new("2")).unwrap().position, Position::new(4, 3));
        assert_eq!(players.ego().unwrap().position, Position::new(0, 0));
    }
}
