// Walls accumulated during a round.

use glam::Vec3;
use protocol::{Position, WallState};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Wall {
    pub position: Position,
    pub color: Vec3,
}

impl From<&WallState> for Wall {
    fn from(state: &WallState) -> Self {
        Self {
            position: state.position,
            color: Vec3::from_array(state.color),
        }
    }
}

/// Insertion-ordered set of walls, one per cell. Walls are never removed
/// except by [`Walls::clear`] at the start of a round.
#[derive(Debug, Default, Clone)]
pub struct Walls {
    by_position: HashMap<Position, usize>,
    walls: Vec<Wall>,
}

impl Walls {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false if a wall already stands there.
    pub fn add(&mut self, wall: Wall) -> bool {
        if self.by_position.contains_key(&wall.position) {
            return false;
        }
        self.by_position.insert(wall.position, self.walls.len());
        self.walls.push(wall);
        true
    }

    /// Merge a snapshot's wall list, returning how many were new.
    pub fn merge<'a>(&mut self, states: impl IntoIterator<Item = &'a WallState>) -> usize {
        states.into_iter().filter(|s| self.add(Wall::from(*s))).count()
    }

    #[inline]
    pub fn contains(&self, position: Position) -> bool {
        self.by_position.contains_key(&position)
    }

    pub fn get(&self, position: Position) -> Option<&Wall> {
        self.by_position.get(&position).map(|&i| &self.walls[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = &Wall> {
        self.walls.iter()
    }

    pub fn len(&self) -> usize {
        self.walls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.walls.is_empty()
    }

    pub fn clear(&mut self) {
        self.by_position.clear();
        self.walls.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(row: i32, column: i32) -> WallState {
        WallState {
            position: Position::new(row, column),
            color: [0.2, 0.2, 0.2],
        }
    }

    #[test]
    fn test_merge_deduplicates() {
        let mut walls = Walls::new();
        assert_eq!(walls.merge(&[state(1, 1), state(1, 2)]), 2);
        assert_eq!(walls.merge(&[state(1, 1), state(4, 4)]), 1);
        assert_eq!(walls.len(), 3);
        assert!(walls.contains(Position::new(4, 4)));
        assert_eq!(walls.get(Position::new(1, 2)).unwrap().color, Vec3::splat(0.2));
    }

    #[test]
    fn test_order_is_insertion_order() {
        let mut walls = Walls::new();
        walls.merge(&[state(3, 0), state(0, 0), state(2, 0)]);
        let rows: Vec<i32> = walls.iter().map(|w| w.position.row).collect();
        assert_eq!(rows, vec![3, 0, 2]);
        walls.clear();
        assert!(walls.is_empty());
        assert!(!walls.contains(Position::new(3, 0)));
    }
}
