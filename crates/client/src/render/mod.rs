// Frame composition: shimmering background, items, walls, players, and a
// Gaussian fog centred on the ego player
//
// Per frame:
//   1. decay the visible background cells:  c' = 0.95 c + r
//   2. advance auto-moving players, then let players eat food under them
//   3. plot items, walls, players (players last, so they stay on top)
//   4. dim every cell by pdf(d) / pdf(0), sigma = visibility radius
//   5. hand colors + textures to the renderer
use glam::Vec3;
use protocol::Position;
use rand::Rng;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::HashMap;
use tracing::trace;

use crate::config::{Config, DisplayConfig};
use crate::game::GameClientState;
use crate::players::Player;
use crate::utils::{clamp, desaturate, Gaussian};
use crate::viewport::Window;

/// Colour used for other players whose identity is hidden.
pub const INVISIBLE_COLOR: Vec3 = Vec3::new(0.66, 0.66, 0.66);

const DECAY: f32 = 0.95;
const SHIMMER: f32 = 0.02;
const STILL_SHIMMER: f32 = 0.01;
const WARMUP_STEPS: usize = 15;

/// Sink for finished frames: one color and one texture slot per window
/// cell, row-major. Texture 0 means "plain color".
pub trait Renderer {
    fn update(&mut self, colors: &[Vec3], textures: &[u32]);
}

/// Per-cell background color for the whole grid.
#[derive(Debug, Clone)]
pub struct Background {
    rows: i32,
    columns: i32,
    cells: Vec<Vec3>,
    animation: bool,
}

impl Background {
    pub fn new<R: Rng>(rows: u32, columns: u32, animation: bool, rng: &mut R) -> Self {
        let mut background = Self {
            rows: rows as i32,
            columns: columns as i32,
            cells: vec![Vec3::ZERO; (rows * columns) as usize],
            animation,
        };
        for i in 0..background.cells.len() {
            for _ in 0..WARMUP_STEPS {
                background.cells[i] = background.animate(background.cells[i], rng);
            }
        }
        background
    }

    #[inline]
    fn animate<R: Rng>(&self, color: Vec3, rng: &mut R) -> Vec3 {
        let r = if self.animation {
            rng.random_range(0.0..SHIMMER)
        } else {
            STILL_SHIMMER
        };
        color * DECAY + Vec3::splat(r)
    }

    #[inline]
    fn index(&self, p: Position) -> Option<usize> {
        if p.row < 0 || p.row >= self.rows || p.column < 0 || p.column >= self.columns {
            return None;
        }
        Some((p.row * self.columns + p.column) as usize)
    }

    pub fn get(&self, p: Position) -> Option<Vec3> {
        self.index(p).map(|i| self.cells[i])
    }

    fn set(&mut self, p: Position, color: Vec3) {
        if let Some(i) = self.index(p) {
            self.cells[i] = color;
        }
    }

    /// Decay the cells inside `window`; cells outside keep their color.
    pub fn decay<R: Rng>(&mut self, window: &Window, rng: &mut R) {
        for p in window.positions() {
            if let Some(i) = self.index(p) {
                self.cells[i] = self.animate(self.cells[i], rng);
            }
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.rows as u32, self.columns as u32)
    }
}

/// The visible slice of the grid being composed this frame.
pub struct Section<'a> {
    window: Window,
    colors: Vec<Vec3>,
    textures: Vec<u32>,
    background: &'a mut Background,
}

impl<'a> Section<'a> {
    pub fn new(window: Window, background: &'a mut Background) -> Self {
        let colors = window
            .positions()
            .map(|p| background.get(p).unwrap_or(Vec3::ZERO))
            .collect();
        Self {
            window,
            colors,
            textures: vec![0; window.cell_count()],
            background,
        }
    }

    /// Paint a cell. The background remembers the color so it fades out
    /// over the following frames.
    pub fn plot(&mut self, p: Position, color: Vec3, texture: u32) {
        let Some(i) = self.window.index_of(p) else {
            return;
        };
        self.colors[i] = color;
        self.textures[i] = texture;
        self.background.set(p, color);
    }

    /// Dim every cell by its Gaussian weight from `center` (row, column).
    pub fn apply_fog(&mut self, center: (f64, f64), radius: f64) {
        let g = Gaussian::new(radius.max(1e-6).powi(2));
        let rescaling = 1.0 / g.pdf(0.0);
        for (i, p) in self.window.positions().enumerate() {
            let dr = p.row as f64 - center.0;
            let dc = p.column as f64 - center.1;
            let dimness = (g.pdf((dr * dr + dc * dc).sqrt()) * rescaling) as f32;
            self.colors[i] *= dimness;
        }
    }

    pub fn finish(self) -> Frame {
        Frame {
            window: self.window,
            colors: self.colors,
            textures: self.textures,
        }
    }
}

/// A composed frame, ready for a [`Renderer`].
#[derive(Debug, Clone)]
pub struct Frame {
    pub window: Window,
    pub colors: Vec<Vec3>,
    pub textures: Vec<u32>,
}

impl Frame {
    pub fn color_at(&self, p: Position) -> Option<Vec3> {
        self.window.index_of(p).map(|i| self.colors[i])
    }

    pub fn texture_at(&self, p: Position) -> Option<u32> {
        self.window.index_of(p).map(|i| self.textures[i])
    }
}

/// Fog radius `elapsed_ms` after the start of the round.
pub fn visibility_radius(display: &DisplayConfig, elapsed_ms: f64, highlight: bool) -> f64 {
    let radius = if display.visibility_ramp_time > 0.0 {
        clamp(
            display.visibility * elapsed_ms / (1000.0 * display.visibility_ramp_time),
            display.min_visibility,
            display.visibility,
        )
    } else {
        display.visibility
    };
    if highlight {
        radius.min(display.highlight_visibility)
    } else {
        radius
    }
}

/// Score range used to fade low scorers, when scores are shown.
#[derive(Debug, Clone, Copy)]
pub struct ScoreRange {
    pub min: f64,
    pub max: f64,
}

impl ScoreRange {
    /// Desaturation for `score`: 0 for the leader, 0.75 for the last.
    pub fn fade(&self, score: f64) -> f32 {
        if self.max - self.min > 0.0 {
            (0.75 * (1.0 - (score - self.min) / (self.max - self.min))) as f32
        } else {
            0.375
        }
    }
}

pub fn player_color(player: &Player, is_ego: bool, base: Vec3, scores: Option<ScoreRange>) -> Vec3 {
    let mut color = if player.identity_visible {
        base
    } else if is_ego {
        desaturate(base, 0.6)
    } else {
        INVISIBLE_COLOR
    };
    if let Some(range) = scores {
        color = desaturate(color, range.fade(player.score));
    }
    color
}

/// Drives per-frame composition.
pub struct RenderLoop {
    display: DisplayConfig,
    palette: HashMap<String, Vec3>,
    start_time: f64,
    spectator: bool,
    /// Ego highlight toggled by the player.
    pub highlight: bool,
    rng: StdRng,
}

impl RenderLoop {
    pub fn new(config: &Config, spectator: bool, now: f64) -> Self {
        Self::with_rng(config, spectator, now, StdRng::from_os_rng())
    }

    pub fn with_rng(config: &Config, spectator: bool, now: f64, rng: StdRng) -> Self {
        let palette = config
            .player
            .colors
            .iter()
            .map(|c| (c.name.clone(), Vec3::from_array(c.rgb)))
            .collect();
        Self {
            display: config.display.clone(),
            palette,
            start_time: now,
            spectator,
            highlight: false,
            rng,
        }
    }

    /// Restart the visibility ramp.
    pub fn restart(&mut self, now: f64) {
        self.start_time = now;
    }

    pub fn rng(&mut self) -> &mut StdRng {
        &mut self.rng
    }

    fn base_color(&self, name: &str) -> Vec3 {
        self.palette.get(name).copied().unwrap_or(Vec3::ONE)
    }

    /// Advance the world by one tick and compose the frame.
    pub fn frame(&mut self, state: &mut GameClientState, now: f64) -> Frame {
        let ego_position = state.players.ego().map(|p| p.position);
        let window = state.viewport.window_for(ego_position);

        state.background.decay(&window, &mut self.rng);
        state.advance_auto(now);
        let eaten = state.consume_food();
        if !eaten.is_empty() {
            trace!("Consumed {} item(s)", eaten.len());
        }

        let scores = self.display.score_visible.then(|| ScoreRange {
            min: state.players.min_score(),
            max: state.players.max_score(),
        });
        let mut section = Section::new(window, &mut state.background);

        if self.display.food_visible {
            for (position, item) in state.grid_items.entries() {
                section.plot(position, item.color(), item.texture());
            }
        }
        if self.display.walls_visible {
            for wall in state.walls.iter() {
                section.plot(wall.position, wall.color, 0);
            }
        }
        for player in state.players.iter() {
            let is_ego = state.players.is_ego(&player.id);
            if !is_ego && !self.display.others_visible {
                continue;
            }
            let color = player_color(player, is_ego, self.base_color(&player.color), scores);
            let texture = if self.display.use_identicons {
                player.id.numeric().unwrap_or(0)
            } else {
                0
            };
            section.plot(player.position, color, texture);
        }

        if !self.spectator {
            let radius = visibility_radius(&self.display, now - self.start_time, self.highlight);
            let center = ego_position
                .map(|p| (p.row as f64, p.column as f64))
                .unwrap_or((1e100, 1e100));
            section.apply_fog(center, radius);
        }
        section.finish()
    }

    /// Compose a frame and hand it to `renderer`.
    pub fn render(&mut self, state: &mut GameClientState, now: f64, renderer: &mut dyn Renderer) -> Frame {
        let frame = self.frame(state, now);
        renderer.update(&frame.colors, &frame.textures);
        frame
    }
}
