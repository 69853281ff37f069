// World model owned by one game session
use protocol::{Direction, GridSnapshot, ItemId, PlayerId, Position};
use rand::Rng;
use std::collections::HashSet;
use tracing::{debug, info};

use crate::config::{Config, GridConfig};
use crate::items::{GridItems, Item, ItemCatalog, TransitionTable};
use crate::players::{PlayerSet, Terrain};
use crate::render::Background;
use crate::viewport::Viewport;
use crate::walls::{Wall, Walls};

/// Players, items and walls as this client currently believes them to be.
pub struct GameClientState {
    pub players: PlayerSet,
    pub grid_items: GridItems,
    pub walls: Walls,
    pub background: Background,
    pub viewport: Viewport,
    pub catalog: ItemCatalog,
    pub transitions: TransitionTable,
    /// Items eaten or used up locally; never re-added from snapshots.
    pub consumed: HashSet<ItemId>,
    pub round: u32,
    pub remaining_time: f64,
    pub donation_active: bool,
    grid: GridConfig,
    background_animation: bool,
}

impl GameClientState {
    pub fn new<R: Rng>(config: &Config, ego_id: PlayerId, rng: &mut R) -> Self {
        let grid = config.grid.clone();
        Self {
            players: PlayerSet::new(ego_id, grid.rows, grid.columns, &config.player),
            grid_items: GridItems::new(),
            walls: Walls::new(),
            background: Background::new(grid.rows, grid.columns, config.display.background_animation, rng),
            viewport: Viewport::new(&grid),
            catalog: ItemCatalog::new(config.items.iter().cloned()),
            transitions: TransitionTable::new(config.transitions.iter().cloned()),
            consumed: HashSet::new(),
            round: 0,
            remaining_time: 0.0,
            donation_active: false,
            background_animation: config.display.background_animation,
            grid,
        }
    }

    pub fn terrain(&self) -> Terrain<'_> {
        Terrain {
            walls: &self.walls,
            items: &self.grid_items,
        }
    }

    fn resize<R: Rng>(&mut self, rows: u32, columns: u32, rng: &mut R) {
        if rows == self.grid.rows && columns == self.grid.columns {
            return;
        }
        info!("Grid is {}x{}", rows, columns);
        self.grid.rows = rows;
        self.grid.columns = columns;
        self.players.resize(rows, columns);
        self.viewport = Viewport::new(&self.grid);
        self.background = Background::new(rows, columns, self.background_animation, rng);
    }

    /// Merge a server snapshot into the local model.
    pub fn apply_snapshot<R: Rng>(&mut self, snapshot: &GridSnapshot, rng: &mut R) {
        if let (Some(rows), Some(columns)) = (snapshot.rows, snapshot.columns) {
            self.resize(rows, columns, rng);
        }

        self.players.update(&snapshot.players, &self.catalog);
        for id in snapshot.players.iter().map(|p| p.id.clone()) {
            if let Some(player) = self.players.get_mut(&id) {
                if player.current_item.as_ref().is_some_and(|i| self.consumed.contains(&i.id)) {
                    player.current_item = None;
                }
            }
        }

        if let Some(walls) = &snapshot.walls {
            let added = self.walls.merge(walls);
            if added > 0 {
                debug!("{} new wall(s)", added);
            }
        }

        if let Some(items) = &snapshot.items {
            self.grid_items.clear();
            for state in items {
                if self.consumed.contains(&state.id) {
                    continue;
                }
                let (Some(position), Some(item)) = (state.position, Item::from_state(state, &self.catalog)) else {
                    continue;
                };
                self.grid_items.add(item, position);
            }
        }

        self.round = snapshot.round;
        self.donation_active = snapshot.donation_active;
    }

    pub fn add_wall(&mut self, wall: Wall) -> bool {
        self.walls.add(wall)
    }

    pub fn move_ego(&mut self, direction: Direction, now: f64) -> bool {
        let ego = self.players.ego_id().clone();
        let terrain = Terrain {
            walls: &self.walls,
            items: &self.grid_items,
        };
        self.players.move_player(&ego, direction, now, terrain)
    }

    pub fn advance_auto(&mut self, now: f64) {
        let terrain = Terrain {
            walls: &self.walls,
            items: &self.grid_items,
        };
        self.players.advance_auto(now, terrain);
    }

    /// Remove food that any player is standing on. Returns the eaten ids.
    pub fn consume_food(&mut self) -> Vec<ItemId> {
        let occupied: Vec<Position> = self.players.iter().map(|p| p.position).collect();
        let mut eaten = Vec::new();
        for position in occupied {
            if !self.grid_items.at_position(position).is_some_and(Item::is_food) {
                continue;
            }
            if let Some(item) = self.grid_items.remove(position) {
                self.consumed.insert(item.id);
                eaten.push(item.id);
            }
        }
        eaten
    }

    pub fn ego_position(&self) -> Option<Position> {
        self.players.ego().map(|p| p.position)
    }

    /// Take the portable item under the ego into an empty hand.
    pub fn pick_up(&mut self) -> Option<ItemId> {
        let ego = self.players.ego_mut()?;
        if ego.current_item.is_some() {
            return None;
        }
        let position = ego.position;
        if !self.grid_items.at_position(position).is_some_and(Item::is_portable) {
            return None;
        }
        let item = self.grid_items.remove(position)?;
        let id = item.id;
        ego.current_item = Some(item);
        Some(id)
    }

    /// Put the held item down on an empty cell.
    pub fn drop_item(&mut self) -> Option<ItemId> {
        let ego = self.players.ego_mut()?;
        let position = ego.position;
        if self.grid_items.at_position(position).is_some() {
            return None;
        }
        let item = ego.current_item.take()?;
        let id = item.id;
        self.grid_items.add(item, position);
        Some(id)
    }

    /// Use the held item once. Returns the calories gained.
    pub fn consume_held(&mut self) -> Option<f64> {
        let ego = self.players.ego_mut()?;
        let id = ego.current_item.as_ref()?.id;
        let calories = ego.consume_item()?;
        if ego.current_item.is_none() {
            self.consumed.insert(id);
        }
        Some(calories)
    }

    /// Start a new round: the world is rebuilt from the next snapshot.
    pub fn reset_round(&mut self, round: u32) {
        self.round = round;
        self.walls.clear();
        self.grid_items.clear();
        self.consumed.clear();
        let ego = self.players.ego_id().clone();
        self.players.mark_out_of_sync(&ego);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::items::ItemType;
    use protocol::{ItemState, ItemTypeId, PlayerState, WallState};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn config() -> Config {
        let mut berry = ItemType::new("berry", "Berry");
        berry.calories = 1.0;
        berry.maturation_threshold = 0.5;
        let mut flint = ItemType::new("flint", "Flint");
        flint.interactive = true;
        flint.n_uses = 1;
        let mut config = Config::default();
        config.grid.rows = 20;
        config.grid.columns = 20;
        config.items = vec![berry, flint];
        config
    }

    fn state() -> GameClientState {
        GameClientState::new(&config(), PlayerId::new("1"), &mut StdRng::seed_from_u64(1))
    }

    fn item(id: u128, ty: &str, row: i32, column: i32, maturity: f64) -> ItemState {
        ItemState {
            id: ItemId(id),
            item_id: ItemTypeId::new(ty),
            position: Some(Position::new(row, column)),
            maturity,
            creation_timestamp: None,
            remaining_uses: None,
        }
    }

    fn snapshot(players: Vec<PlayerState>, items: Vec<ItemState>) -> GridSnapshot {
        GridSnapshot {
            players,
            items: Some(items),
            ..GridSnapshot::default()
        }
    }

    #[test]
    fn test_ripe_food_is_eaten_once() {
        let mut s = state();
        let mut rng = StdRng::seed_from_u64(2);
        let snap = snapshot(
            vec![PlayerState::new("1", Position::new(3, 3)), PlayerState::new("2", Position::new(4, 4))],
            vec![item(1, "berry", 3, 3, 1.0), item(2, "berry", 4, 4, 0.2), item(3, "flint", 5, 5, 1.0)],
        );
        s.apply_snapshot(&snap, &mut rng);
        assert_eq!(s.grid_items.len(), 3);
        assert_eq!(s.consume_food(), vec![ItemId(1)]);
        // A stale snapshot does not resurrect it.
        s.apply_snapshot(&snap, &mut rng);
        assert_eq!(s.grid_items.len(), 2);
        assert!(s.grid_items.position_of(ItemId(1)).is_none());
    }

    #[test]
    fn test_walls_from_snapshot_and_reset() {
        let mut s = state();
        let mut snap = GridSnapshot::default();
        snap.walls = Some(vec![WallState { position: Position::new(0, 1), color: [0.5; 3] }]);
        s.apply_snapshot(&snap, &mut StdRng::seed_from_u64(3));
        assert!(s.walls.contains(Position::new(0, 1)));
        // Snapshots without walls leave them in place.
        s.apply_snapshot(&GridSnapshot::default(), &mut StdRng::seed_from_u64(3));
        assert_eq!(s.walls.len(), 1);
        s.reset_round(1);
        assert!(s.walls.is_empty());
        assert_eq!(s.round, 1);
    }

    #[test]
    fn test_snapshot_resizes_grid() {
        let mut s = state();
        let snap = GridSnapshot { rows: Some(5), columns: Some(6), ..GridSnapshot::default() };
        s.apply_snapshot(&snap, &mut StdRng::seed_from_u64(4));
        assert_eq!(s.viewport.grid_rows(), 5);
        assert_eq!(s.viewport.grid_columns(), 6);
        assert_eq!(s.background.dimensions(), (5, 6));
    }

    #[test]
    fn test_pick_up_then_drop() {
        let mut s = state();
        let snap = snapshot(vec![PlayerState::new("1", Position::new(5, 5))], vec![item(9, "flint", 5, 5, 1.0)]);
        s.apply_snapshot(&snap, &mut StdRng::seed_from_u64(5));
        assert_eq!(s.pick_up(), Some(ItemId(9)));
        assert!(s.grid_items.is_empty());
        assert_eq!(s.pick_up(), None);

        s.move_ego(Direction::Down, 1000.0);
        assert_eq!(s.drop_item(), Some(ItemId(9)));
        assert_eq!(s.grid_items.position_of(ItemId(9)), Some(Position::new(6, 5)));
        assert_eq!(s.drop_item(), None);
    }

    #[test]
    fn test_single_use_item_consumed_never_returns() {
        let mut s = state();
        let snap = snapshot(vec![PlayerState::new("1", Position::new(5, 5))], vec![item(9, "flint", 5, 5, 1.0)]);
        let mut rng = StdRng::seed_from_u64(6);
        s.apply_snapshot(&snap, &mut rng);
        s.pick_up();
        assert!(s.consume_held().is_some());
        assert!(s.players.ego().unwrap().current_item.is_none());
        assert!(s.consumed.contains(&ItemId(9)));

        // Server has not caught up yet: the item is still in its snapshot.
        let mut ego = PlayerState::new("1", Position::new(5, 5));
        ego.current_item = Some(ItemState { position: None, ..item(9, "flint", 0, 0, 1.0) });
        s.apply_snapshot(&snapshot(vec![ego], vec![item(9, "flint", 5, 5, 1.0)]), &mut rng);
        assert!(s.players.ego().unwrap().current_item.is_none());
        assert!(s.grid_items.is_empty());
    }

    #[test]
    fn test_actions_without_ego_are_noops() {
        let mut s = state();
        assert!(!s.move_ego(Direction::Up, 0.0));
        assert_eq!(s.pick_up(), None);
        assert_eq!(s.drop_item(), None);
        assert_eq!(s.consume_held(), None);
        assert_eq!(s.ego_position(), None);
    }
}
