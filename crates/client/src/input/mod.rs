// Keyboard and pointer input
//
// Keys are turned into actions on the press edge. A held arrow key
// repeats its move every `1000 / speed_limit` ms until released or
// superseded by another arrow.
use protocol::Direction;
use std::collections::{HashSet, VecDeque};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    Arrow(Direction),
    Space,
    Char(char),
}

impl Key {
    /// Parse a key name: `up`/`down`/`left`/`right`, `space`, or one character.
    pub fn parse(name: &str) -> Option<Key> {
        let name = name.trim();
        if let Some(direction) = Direction::parse(name) {
            return Some(Key::Arrow(direction));
        }
        if name == "space" || name == " " {
            return Some(Key::Space);
        }
        let mut chars = name.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Some(Key::Char(c.to_ascii_lowercase())),
            _ => None,
        }
    }

    fn action(self) -> Option<Action> {
        Some(match self {
            Key::Arrow(direction) => Action::Move(direction),
            Key::Space => Action::PlantFood,
            Key::Char('c') => Action::ChangeColor,
            Key::Char('v') => Action::ToggleVisible,
            Key::Char('w') => Action::BuildWall,
            Key::Char('h') => Action::ToggleHighlight,
            Key::Char('p') => Action::PickUp,
            Key::Char('d') => Action::Drop,
            Key::Char('e') => Action::Consume,
            Key::Char('t') => Action::Transition,
            Key::Char(_) => return None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Action {
    Move(Direction),
    PlantFood,
    ChangeColor,
    ToggleVisible,
    BuildWall,
    ToggleHighlight,
    PickUp,
    Drop,
    Consume,
    Transition,
    /// Pointer click at canvas pixel (x, y).
    Click { x: f32, y: f32 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct KeyRepeat {
    direction: Direction,
    next_at: f64,
    interval: f64,
}

#[derive(Debug, Default)]
pub struct Input {
    pressed: HashSet<Key>,
    repeat: Option<KeyRepeat>,
    pending: VecDeque<Action>,
}

impl Input {
    pub fn new() -> Self {
        Self::default()
    }

    /// Key pressed at `now`. `repeat_interval` is the ego's move interval.
    pub fn key_down(&mut self, key: Key, now: f64, repeat_interval: f64) {
        // Auto-repeat from the OS arrives as extra key_down events.
        if !self.pressed.insert(key) {
            return;
        }
        let Some(action) = key.action() else {
            return;
        };
        self.pending.push_back(action);
        if let Action::Move(direction) = action {
            self.repeat = Some(KeyRepeat {
                direction,
                next_at: now + repeat_interval,
                interval: repeat_interval,
            });
        }
    }

    pub fn key_up(&mut self, key: Key) {
        self.pressed.remove(&key);
        if let (Key::Arrow(direction), Some(repeat)) = (key, self.repeat) {
            if repeat.direction == direction {
                self.repeat = None;
            }
        }
    }

    /// Press and release in one go (terminal input has no key-up events).
    pub fn tap(&mut self, key: Key, now: f64) {
        self.key_down(key, now, 0.0);
        self.key_up(key);
    }

    pub fn click(&mut self, x: f32, y: f32) {
        self.pending.push_back(Action::Click { x, y });
    }

    pub fn is_pressed(&self, key: Key) -> bool {
        self.pressed.contains(&key)
    }

    /// Actions due at `now`, including at most one repeat of a held arrow
    /// key. Repeats missed during a stall are dropped, not replayed.
    pub fn poll(&mut self, now: f64) -> Vec<Action> {
        let mut actions: Vec<Action> = self.pending.drain(..).collect();
        if let Some(repeat) = self.repeat.as_mut() {
            if repeat.interval <= 0.0 {
                actions.push(Action::Move(repeat.direction));
            } else {
                if repeat.next_at <= now {
                    actions.push(Action::Move(repeat.direction));
                    repeat.next_at = now + repeat.interval;
                }
            }
        }
        actions
    }

    pub fn reset(&mut self) {
        self.pressed.clear();
        self.repeat = None;
        self.pending.clear();
    }
}
