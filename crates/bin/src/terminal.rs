//! Terminal front end: a renderer that only counts frames, an ASCII map of
//! the visible window, and the stdin command set.

use client::render::Frame;
use client::{DonationType, GameClient, GameClientState, Key, Renderer};
use glam::Vec3;
use tracing::trace;

/// Cells dimmer than this are drawn as fog.
const FOG_LUMINANCE: f32 = 0.05;

#[derive(Debug, Default)]
pub struct LogRenderer {
    frames: u64,
}

impl Renderer for LogRenderer {
    fn update(&mut self, colors: &[Vec3], textures: &[u32]) {
        self.frames += 1;
        if self.frames % 300 == 0 {
            let textured = textures.iter().filter(|&&t| t != 0).count();
            trace!("Frame {}: {} cells, {} textured", self.frames, colors.len(), textured);
        }
    }
}

fn luminance(c: Vec3) -> f32 {
    0.2126 * c.x + 0.7152 * c.y + 0.0722 * c.z
}

/// `@` ego, letters for other players, `#` walls, `*` items, `.` open
/// ground, blank for fog.
pub fn draw_map(state: &GameClientState, frame: &Frame) -> String {
    let window = frame.window;
    let mut out = String::with_capacity(window.cell_count() + window.rows as usize);
    for row in 0..window.rows {
        for column in 0..window.columns {
            let p = window.to_grid(row, column);
            let fogged = frame.color_at(p).is_some_and(|c| luminance(c) < FOG_LUMINANCE);
            let glyph = if let Some(player) = state.players.iter().find(|pl| pl.position == p) {
                if state.players.is_ego(&player.id) {
                    '@'
                } else {
                    player.color.chars().next().map(|c| c.to_ascii_lowercase()).unwrap_or('o')
                }
            } else if fogged {
                ' '
            } else if state.walls.contains(p) {
                '#'
            } else if state.grid_items.at_position(p).is_some() {
                '*'
            } else {
                '.'
            };
            out.push(glyph);
        }
        out.push('\n');
    }
    out
}

/// What a line typed on stdin asks for.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Key(Key),
    Chat(String),
    Donate(DonationTarget),
    Click(f32, f32),
    Map,
    Transition,
    Quit,
    Help,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DonationTarget {
    Select(DonationType),
    All,
    InGroup,
}

pub const HELP: &str = "keys: up down left right, space (plant), c (color), v (visible), w (wall), \
h (highlight), p (pick up), d (drop), e (consume), t (transition)\n\
commands: /chat <text>, /donate individual|group|all|ingroup, /click <x> <y>, /map, /what, /quit";

impl Command {
    pub fn parse(line: &str) -> Option<Command> {
        let line = line.trim();
        let Some(rest) = line.strip_prefix('/') else {
            return Key::parse(line).map(Command::Key);
        };
        let (name, args) = rest.split_once(' ').unwrap_or((rest, ""));
        let args = args.trim();
        match name {
            "chat" | "say" if !args.is_empty() => Some(Command::Chat(args.to_string())),
            "donate" => match args {
                "individual" => Some(Command::Donate(DonationTarget::Select(DonationType::Individual))),
                "group" => Some(Command::Donate(DonationTarget::Select(DonationType::Group))),
                "all" => Some(Command::Donate(DonationTarget::All)),
                "ingroup" => Some(Command::Donate(DonationTarget::InGroup)),
                _ => None,
            },
            "click" => {
                let mut coords = args.split_whitespace().map(str::parse::<f32>);
                match (coords.next(), coords.next()) {
                    (Some(Ok(x)), Some(Ok(y))) => Some(Command::Click(x, y)),
                    _ => None,
                }
            }
            "map" => Some(Command::Map),
            "what" => Some(Command::Transition),
            "quit" | "exit" => Some(Command::Quit),
            "help" => Some(Command::Help),
            _ => None,
        }
    }

    /// Apply to the client. Returns text to print, if any.
    pub fn apply(self, client: &mut GameClient, last_frame: Option<&Frame>, now: f64) -> Option<String> {
        match self {
            Command::Key(key) => client.tap(key, now),
            Command::Chat(text) => client.send_chat(&text, now),
            Command::Donate(DonationTarget::Select(kind)) => client.select_donation(kind),
            Command::Donate(DonationTarget::All) => client.donate_to_all(),
            Command::Donate(DonationTarget::InGroup) => client.donate_to_in_group(),
            Command::Click(x, y) => client.click(x, y),
            Command::Map => {
                let state = client.state()?;
                return last_frame.map(|frame| draw_map(state, frame));
            }
            Command::Transition => {
                return Some(
                    client
                        .current_transition()
                        .map(|t| t.text)
                        .unwrap_or_else(|| "Nothing to do here.".to_string()),
                );
            }
            Command::Help => return Some(HELP.to_string()),
            Command::Quit => {}
        }
        None
    }
}
