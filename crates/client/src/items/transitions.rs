// Item transition table
//
// A transition is keyed by (held item type, ground item type), either side
// possibly empty. When the ground item is on its last use, the "last"
// variant of the key is consulted first.
use protocol::ItemTypeId;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;

use super::{Item, ItemCatalog};

/// When a transition's outcome is shown to the player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    /// Outcome stays masked.
    Never,
    /// Outcome revealed once this client has fired the transition.
    Seen,
    #[default]
    Always,
}

/// One row of the transition table.
#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
pub struct TransitionRule {
    #[serde(default)]
    pub actor_start: Option<ItemTypeId>,
    #[serde(default)]
    pub actor_end: Option<ItemTypeId>,
    #[serde(default)]
    pub target_start: Option<ItemTypeId>,
    #[serde(default)]
    pub target_end: Option<ItemTypeId>,
    #[serde(default)]
    pub last_use: bool,
    /// Change to (actor, target) remaining uses.
    #[serde(default)]
    pub modify_uses: (i32, i32),
    /// Players within reach needed, the actor included.
    #[serde(default)]
    pub required_actors: u32,
    #[serde(default)]
    pub calories: f64,
    #[serde(default)]
    pub visible: Visibility,
}

impl TransitionRule {
    pub fn key(&self) -> TransitionKey {
        TransitionKey {
            last_use: self.last_use,
            actor: self.actor_start.clone(),
            target: self.target_start.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TransitionKey {
    pub last_use: bool,
    pub actor: Option<ItemTypeId>,
    pub target: Option<ItemTypeId>,
}

impl TransitionKey {
    fn new(last_use: bool, held: Option<&Item>, ground: Option<&Item>) -> Self {
        Self {
            last_use,
            actor: held.map(|i| i.item_id().clone()),
            target: ground.map(|i| i.item_id().clone()),
        }
    }
}

/// `actor|target` or `last|actor|target`, empty for none.
impl fmt::Display for TransitionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let side = |id: &Option<ItemTypeId>| id.as_ref().map(|i| i.as_str().to_string()).unwrap_or_default();
        if self.last_use {
            f.write_str("last|")?;
        }
        write!(f, "{}|{}", side(&self.actor), side(&self.target))
    }
}

/// Text shown for the transition available at the player's cell.
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionDescription {
    pub text: String,
    pub revealed: bool,
    pub required_actors: u32,
}

#[derive(Debug, Default, Clone)]
pub struct TransitionTable {
    rules: HashMap<TransitionKey, TransitionRule>,
    seen: HashSet<TransitionKey>,
}

impl TransitionTable {
    pub fn new(rules: impl IntoIterator<Item = TransitionRule>) -> Self {
        let rules = rules.into_iter().map(|rule| (rule.key(), rule)).collect();
        Self { rules, seen: HashSet::new() }
    }

    /// Parse the server's table. Keys are ignored in favour of each rule's
    /// own `actor_start`/`target_start`/`last_use`.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let table: HashMap<String, TransitionRule> = serde_json::from_str(json)?;
        Ok(Self::new(table.into_values()))
    }

    /// Transition for the given held and ground items, if any.
    pub fn lookup(&self, held: Option<&Item>, ground: Option<&Item>) -> Option<(TransitionKey, &TransitionRule)> {
        if ground.is_some_and(|g| g.remaining_uses == 1) {
            let key = TransitionKey::new(true, held, ground);
            if let Some(rule) = self.rules.get(&key) {
                return Some((key, rule));
            }
        }
        let key = TransitionKey::new(false, held, ground);
        let rule = self.rules.get(&key)?;
        Some((key, rule))
    }

    pub fn mark_seen(&mut self, key: TransitionKey) {
        self.seen.insert(key);
    }

    pub fn is_seen(&self, key: &TransitionKey) -> bool {
        self.seen.contains(key)
    }

    pub fn is_revealed(&self, key: &TransitionKey, rule: &TransitionRule) -> bool {
        match rule.visible {
            Visibility::Never => false,
            Visibility::Seen => self.is_seen(key),
            Visibility::Always => true,
        }
    }

    pub fn describe(&self, key: &TransitionKey, rule: &TransitionRule, catalog: &ItemCatalog) -> TransitionDescription {
        let revealed = self.is_revealed(key, rule);
        let actor = catalog.label(rule.actor_start.as_ref());
        let target = catalog.label(rule.target_start.as_ref());
        let outcome = if revealed {
            format!(
                "{} + {}",
                catalog.label(rule.actor_end.as_ref()),
                catalog.label(rule.target_end.as_ref())
            )
        } else {
            "? ? ?".to_string()
        };
        let mut text = format!("{} + {} → {}", actor, target, outcome);
        if rule.required_actors > 1 {
            text.push_str(&format!(" (requires {} players)", rule.required_actors));
        }
        TransitionDescription {
            text,
            revealed,
            required_actors: rule.required_actors,
        }
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
