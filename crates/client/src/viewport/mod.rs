// Viewport - which window of the grid is visible, and coordinate transforms
//
// Window offset per axis:
//   left = clamp(col - floor(window_columns / 2), 0, columns - window_columns)
//   top  = clamp(row - floor(window_rows / 2),    0, rows - window_rows)
//
// Without an ego player the window sits at the origin.
use protocol::Position;

use crate::config::GridConfig;
use crate::utils::clamp_i32;

/// The visible rectangle, in grid coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub left: i32,
    pub top: i32,
    pub columns: i32,
    pub rows: i32,
}

impl Window {
    #[inline]
    pub fn contains(&self, p: Position) -> bool {
        p.column >= self.left
            && p.column < self.left + self.columns
            && p.row >= self.top
            && p.row < self.top + self.rows
    }

    /// Grid position -> index into the window's row-major cell buffer.
    #[inline]
    pub fn index_of(&self, p: Position) -> Option<usize> {
        if !self.contains(p) {
            return None;
        }
        let (r, c) = self.to_local(p);
        Some((r * self.columns + c) as usize)
    }

    /// Grid position -> (row, column) relative to the window.
    #[inline]
    pub fn to_local(&self, p: Position) -> (i32, i32) {
        (p.row - self.top, p.column - self.left)
    }

    /// Window-local (row, column) -> grid position.
    #[inline]
    pub fn to_grid(&self, row: i32, column: i32) -> Position {
        Position::new(self.top + row, self.left + column)
    }

    pub fn cell_count(&self) -> usize {
        (self.rows.max(0) * self.columns.max(0)) as usize
    }

    /// Every grid position in the window, row-major.
    pub fn positions(&self) -> impl Iterator<Item = Position> + '_ {
        (0..self.rows).flat_map(move |r| (0..self.columns).map(move |c| self.to_grid(r, c)))
    }
}

/// Fixed-size window that follows the ego player.
#[derive(Debug, Clone)]
pub struct Viewport {
    rows: i32,
    columns: i32,
    window_rows: i32,
    window_columns: i32,
    cell_pixels: u32,
}

impl Viewport {
    pub fn new(grid: &GridConfig) -> Self {
        Self {
            rows: grid.rows as i32,
            columns: grid.columns as i32,
            window_rows: grid.window_rows as i32,
            window_columns: grid.window_columns as i32,
            cell_pixels: grid.block_size + grid.padding,
        }
    }

    /// Window centred on `ego`, clamped inside the grid on each axis.
    pub fn window_for(&self, ego: Option<Position>) -> Window {
        let mut window = Window {
            left: 0,
            top: 0,
            columns: self.window_columns,
            rows: self.window_rows,
        };
        if let Some(ego) = ego {
            window.left = clamp_i32(
                ego.column - self.window_columns / 2,
                0,
                self.columns - self.window_columns,
            );
            window.top = clamp_i32(ego.row - self.window_rows / 2, 0, self.rows - self.window_rows);
        }
        window
    }

    /// Pixel offset inside the canvas -> cell offset inside the window.
    #[inline]
    pub fn pixels_to_cells(&self, pixels: f32) -> i32 {
        if self.cell_pixels == 0 {
            return 0;
        }
        (pixels / self.cell_pixels as f32).floor() as i32
    }

    /// Canvas pixel (x, y) -> grid position under the pointer.
    pub fn pointer_to_grid(&self, window: &Window, x: f32, y: f32) -> Position {
        window.to_grid(self.pixels_to_cells(y), self.pixels_to_cells(x))
    }

    #[inline]
    pub fn in_grid(&self, p: Position) -> bool {
        p.row >= 0 && p.row < self.rows && p.column >= 0 && p.column < self.columns
    }

    pub fn grid_rows(&self) -> i32 {
        self.rows
    }

    pub fn grid_columns(&self) -> i32 {
        self.columns
    }
}
