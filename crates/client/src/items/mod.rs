// Items: type catalog, item instances, and the grid-position dictionary
use glam::Vec3;
use protocol::{ItemId, ItemState, ItemTypeId, Position};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::rc::Rc;
use tracing::warn;

use crate::utils::{hex_to_rgb, rgb_on_scale};

mod transitions;

pub use transitions::{TransitionDescription, TransitionKey, TransitionRule, TransitionTable, Visibility};

/// Static per-type item configuration, shared by every instance of a type.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ItemType {
    pub item_id: ItemTypeId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub calories: f64,
    /// Players may walk onto a cell holding this item.
    #[serde(default = "default_true")]
    pub crossable: bool,
    /// Interactive items are only used through explicit actions; the rest
    /// are eaten by walking over them.
    #[serde(default)]
    pub interactive: bool,
    #[serde(default = "default_true")]
    pub portable: bool,
    /// Minimum maturity before the item can be eaten.
    #[serde(default)]
    pub maturation_threshold: f64,
    #[serde(default = "default_uses")]
    pub n_uses: u32,
    /// `"#immature,#mature"`, `"color:#hex"`, `"emoji:..."` or `"image:..."`.
    #[serde(default = "default_sprite")]
    pub sprite: String,
}

fn default_true() -> bool {
    true
}
fn default_uses() -> u32 {
    1
}
fn default_sprite() -> String {
    "#ffffff".to_string()
}

impl ItemType {
    pub fn new(item_id: impl Into<ItemTypeId>, name: &str) -> Self {
        Self {
            item_id: item_id.into(),
            name: name.to_string(),
            calories: 0.0,
            crossable: true,
            interactive: false,
            portable: true,
            maturation_threshold: 0.0,
            n_uses: default_uses(),
            sprite: default_sprite(),
        }
    }

    /// Human-readable label, falling back to the type key.
    pub fn label(&self) -> &str {
        if self.name.is_empty() { self.item_id.as_str() } else { &self.name }
    }
}

/// How an item type is drawn.
#[derive(Debug, Clone, PartialEq)]
pub enum Sprite {
    /// Color blended from `immature` to `mature` as the item ripens.
    Color { immature: Vec3, mature: Vec3 },
    /// Opaque texture reference handed to the renderer.
    Texture(String),
}

impl Sprite {
    pub fn parse(sprite: &str) -> Sprite {
        if let Some((kind, value)) = sprite.split_once(':') {
            match kind {
                "emoji" | "image" => return Sprite::Texture(sprite.to_string()),
                "color" => return Self::parse_colors(value),
                _ => {
                    warn!("Unknown sprite kind {} in {:?}", kind, sprite);
                }
            }
        }
        Self::parse_colors(sprite)
    }

    fn parse_colors(value: &str) -> Sprite {
        let (immature, mature) = value.split_once(',').unwrap_or((value, value));
        match (hex_to_rgb(immature), hex_to_rgb(mature)) {
            (Some(immature), Some(mature)) => Sprite::Color { immature, mature },
            _ => {
                warn!("Invalid sprite color {:?}, using white", value);
                Sprite::Color { immature: Vec3::ONE, mature: Vec3::ONE }
            }
        }
    }
}

/// Resolved item type: configuration plus parsed sprite and texture slot.
#[derive(Debug)]
pub struct ItemDef {
    pub ty: ItemType,
    pub sprite: Sprite,
    /// Renderer texture slot; 0 means "plain color".
    pub texture: u32,
}

/// Lookup table from type key to definition.
#[derive(Debug, Default, Clone)]
pub struct ItemCatalog {
    defs: HashMap<ItemTypeId, Rc<ItemDef>>,
    textures: Vec<String>,
}

impl ItemCatalog {
    pub fn new(types: impl IntoIterator<Item = ItemType>) -> Self {
        let mut catalog = Self::default();
        for ty in types {
            catalog.insert(ty);
        }
        catalog
    }

    /// Parse the server's item table: a JSON object keyed by `item_id`.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let table: HashMap<String, ItemType> = serde_json::from_str(json)?;
        let mut types: Vec<ItemType> = table.into_values().collect();
        // Stable texture numbering regardless of map order.
        types.sort_by(|a, b| a.item_id.cmp(&b.item_id));
        Ok(Self::new(types))
    }

    pub fn insert(&mut self, ty: ItemType) {
        let sprite = Sprite::parse(&ty.sprite);
        let texture = match &sprite {
            Sprite::Texture(key) => self.texture_slot(key),
            Sprite::Color { .. } => 0,
        };
        self.defs.insert(ty.item_id.clone(), Rc::new(ItemDef { ty, sprite, texture }));
    }

    fn texture_slot(&mut self, key: &str) -> u32 {
        let index = match self.textures.iter().position(|t| t == key) {
            Some(i) => i,
            None => {
                self.textures.push(key.to_string());
                self.textures.len() - 1
            }
        };
        index as u32 + 1
    }

    pub fn get(&self, id: &ItemTypeId) -> Option<&Rc<ItemDef>> {
        self.defs.get(id)
    }

    /// Display label for a type key; `None` reads as "nothing".
    pub fn label(&self, id: Option<&ItemTypeId>) -> String {
        match id {
            None => "nothing".to_string(),
            Some(id) => self
                .get(id)
                .map(|d| d.ty.label().to_string())
                .unwrap_or_else(|| id.to_string()),
        }
    }

    /// Texture keys in slot order (slot `i + 1` is `textures()[i]`).
    pub fn textures(&self) -> &[String] {
        &self.textures
    }

    pub fn len(&self) -> usize {
        self.defs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }
}

/// A carryable/placeable entity. Held by value, either in a player's hand
/// or in [`GridItems`], never both.
#[derive(Debug, Clone)]
pub struct Item {
    pub id: ItemId,
    pub maturity: f64,
    pub remaining_uses: u32,
    def: Rc<ItemDef>,
}

impl Item {
    pub fn new(id: ItemId, def: Rc<ItemDef>) -> Self {
        let remaining_uses = def.ty.n_uses;
        Self { id, maturity: 1.0, remaining_uses, def }
    }

    /// Build from wire state. Unknown item types yield `None`.
    pub fn from_state(state: &ItemState, catalog: &ItemCatalog) -> Option<Self> {
        let Some(def) = catalog.get(&state.item_id) else {
            warn!("Item {} has unknown type {}", state.id, state.item_id);
            return None;
        };
        Some(Self {
            id: state.id,
            maturity: state.maturity.clamp(0.0, 1.0),
            remaining_uses: state.remaining_uses.unwrap_or(def.ty.n_uses),
            def: Rc::clone(def),
        })
    }

    /// Wire form; `position` is `None` for carried items.
    pub fn to_state(&self, position: Option<Position>) -> ItemState {
        ItemState {
            id: self.id,
            item_id: self.def.ty.item_id.clone(),
            position,
            maturity: self.maturity,
            creation_timestamp: None,
            remaining_uses: Some(self.remaining_uses),
        }
    }

    pub fn item_id(&self) -> &ItemTypeId {
        &self.def.ty.item_id
    }

    pub fn kind(&self) -> &ItemType {
        &self.def.ty
    }

    pub fn calories(&self) -> f64 {
        self.def.ty.calories
    }

    pub fn is_interactive(&self) -> bool {
        self.def.ty.interactive
    }

    pub fn is_crossable(&self) -> bool {
        self.def.ty.crossable
    }

    pub fn is_portable(&self) -> bool {
        self.def.ty.portable
    }

    /// Eaten on contact: non-interactive, nourishing, and ripe enough.
    pub fn is_food(&self) -> bool {
        !self.def.ty.interactive
            && self.def.ty.calories != 0.0
            && self.maturity >= self.def.ty.maturation_threshold
    }

    /// Color interpolated by maturity (0 = immature, 1 = mature).
    pub fn color(&self) -> Vec3 {
        match &self.def.sprite {
            Sprite::Color { immature, mature } => rgb_on_scale(*mature, *immature, self.maturity as f32),
            Sprite::Texture(_) => Vec3::ONE,
        }
    }

    pub fn texture(&self) -> u32 {
        self.def.texture
    }

    /// Use the item once. Returns the calories gained; the item is spent
    /// once `remaining_uses` reaches zero.
    pub fn consume(&mut self) -> f64 {
        self.remaining_uses = self.remaining_uses.saturating_sub(1);
        self.calories()
    }

    pub fn is_spent(&self) -> bool {
        self.remaining_uses == 0
    }
}

/// Items lying on the grid: a bijection between positions and item ids.
#[derive(Debug, Default, Clone)]
pub struct GridItems {
    by_position: HashMap<Position, Item>,
    positions: HashMap<ItemId, Position>,
}

impl GridItems {
    pub fn new() -> Self {
        Self::default()
    }

    /// Place `item` at `position`. An item already there is displaced and
    /// returned; if `item` was elsewhere on the grid it moves.
    pub fn add(&mut self, item: Item, position: Position) -> Option<Item> {
        if let Some(previous) = self.positions.remove(&item.id) {
            self.by_position.remove(&previous);
        }
        self.positions.insert(item.id, position);
        let displaced = self.by_position.insert(position, item)?;
        self.positions.remove(&displaced.id);
        Some(displaced)
    }

    pub fn remove(&mut self, position: Position) -> Option<Item> {
        let item = self.by_position.remove(&position)?;
        self.positions.remove(&item.id);
        Some(item)
    }

    pub fn remove_item(&mut self, id: ItemId) -> Option<Item> {
        let position = self.positions.get(&id).copied()?;
        self.remove(position)
    }

    pub fn at_position(&self, position: Position) -> Option<&Item> {
        self.by_position.get(&position)
    }

    pub fn position_of(&self, id: ItemId) -> Option<Position> {
        self.positions.get(&id).copied()
    }

    /// Iterate over (position, item) pairs.
    pub fn entries(&self) -> impl Iterator<Item = (Position, &Item)> + '_ {
        self.by_position.iter().map(|(p, item)| (*p, item))
    }

    /// Positions currently occupied, copied out so the caller may mutate.
    pub fn positions(&self) -> Vec<Position> {
        self.by_position.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.by_position.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_position.is_empty()
    }

    pub fn clear(&mut self) {
        self.by_position.clear();
        self.positions.clear();
    }
}
