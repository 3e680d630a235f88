//! Per-cell fill state and the brush-fill algorithm.
//!
//! The [`CoverageEngine`] owns the live cell buffer for one painting
//! session. Every input is clamped rather than rejected, so once
//! [`CoverageEngine::configure`] has run no call can leave the grid with a
//! wrong length or a value outside `[0,1]`.
//!
//! ```
//! use lumina_logic::coverage::CoverageEngine;
//! use lumina_logic::geometry::{CellCoord, Uv};
//!
//! let mut engine = CoverageEngine::new();
//! engine.configure(8, 8);
//! let done = engine.apply_brush(Uv::new(0.3125, 0.3125), 0.05, 1.0);
//! assert_eq!(done, vec![CellCoord::new(2, 2)]);
//! assert!((engine.progress() - 1.0 / 64.0).abs() < 1e-6);
//! ```

use serde::{Deserialize, Serialize};

use crate::geometry::{self, CellCoord, Uv};

/// Lower bound for the seconds needed to fill one cell.
pub const MIN_SECONDS_PER_CELL: f32 = 0.1;
/// Seconds to fill one cell while it stays under the brush.
pub const DEFAULT_SECONDS_PER_CELL: f32 = 5.0;
/// Starting brush radius in UV units.
pub const DEFAULT_BRUSH_RADIUS: f32 = 0.05;

/// Allowed brush radius range in UV units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrushLimits {
    pub min_radius: f32,
    pub max_radius: f32,
}

impl Default for BrushLimits {
    fn default() -> Self {
        Self {
            min_radius: 0.01,
            max_radius: 0.2,
        }
    }
}

impl BrushLimits {
    /// Repair inverted or negative bounds.
    pub fn sanitized(self) -> Self {
        let min_radius = if self.min_radius.is_finite() {
            self.min_radius.max(0.0)
        } else {
            0.0
        };
        let max_radius = if self.max_radius.is_finite() {
            self.max_radius.max(min_radius)
        } else {
            min_radius
        };
        Self {
            min_radius,
            max_radius,
        }
    }

    pub fn clamp(&self, radius: f32) -> f32 {
        radius.clamp(self.min_radius, self.max_radius)
    }
}

/// Live fill state of a `grid_x × grid_y` grid.
#[derive(Debug, Clone)]
pub struct CoverageEngine {
    grid_x: u32,
    grid_y: u32,
    cells: Vec<f32>,
    /// Running sum of all cell values.
    total_fill: f64,
    brush_radius: f32,
    seconds_per_cell: f32,
    limits: BrushLimits,
}

impl Default for CoverageEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl CoverageEngine {
    /// An unconfigured engine. Painting calls are no-ops until
    /// [`configure`](Self::configure) runs.
    pub fn new() -> Self {
        Self::with_limits(BrushLimits::default())
    }

    pub fn with_limits(limits: BrushLimits) -> Self {
        let limits = limits.sanitized();
        Self {
            grid_x: 0,
            grid_y: 0,
            cells: Vec::new(),
            total_fill: 0.0,
            brush_radius: limits.clamp(DEFAULT_BRUSH_RADIUS),
            seconds_per_cell: DEFAULT_SECONDS_PER_CELL,
            limits,
        }
    }

    /// Whether a grid has been allocated.
    pub fn is_ready(&self) -> bool {
        !self.cells.is_empty()
    }

    /// Allocate a zeroed grid. Dimensions below 1 are raised to 1.
    pub fn configure(&mut self, grid_x: u32, grid_y: u32) {
        self.grid_x = grid_x.max(1);
        self.grid_y = grid_y.max(1);
        self.cells = vec![0.0; self.grid_x as usize * self.grid_y as usize];
        self.total_fill = 0.0;
    }

    /// Load a saved snapshot.
    ///
    /// Applied only when `cells` matches the configured grid length; any
    /// other length leaves the grid as `configure` produced it. The return
    /// value tells the caller which of the two happened.
    pub fn restore(&mut self, cells: &[f32]) -> bool {
        if !self.is_ready() || cells.len() != self.cells.len() {
            return false;
        }
        self.total_fill = 0.0;
        for (dst, &src) in self.cells.iter_mut().zip(cells) {
            *dst = clamp_unit(src);
            self.total_fill += *dst as f64;
        }
        true
    }

    /// Zero every cell of the current grid.
    pub fn clear(&mut self) {
        self.cells.iter_mut().for_each(|c| *c = 0.0);
        self.total_fill = 0.0;
    }

    /// Add `delta` to every cell the brush disk touches.
    ///
    /// Returns the cells that crossed into the completed state on this call,
    /// in row-major order. Cells already at `1.0` are left alone and never
    /// reported twice.
    pub fn apply_brush(&mut self, center: Uv, radius: f32, delta: f32) -> Vec<CellCoord> {
        let mut completed = Vec::new();
        if !self.is_ready() || !delta.is_finite() || !radius.is_finite() {
            return completed;
        }
        let radius = self.limits.clamp(radius);

        for cell in geometry::covered_cells(center, radius, self.grid_x, self.grid_y) {
            let idx = cell.index(self.grid_x);
            let before = self.cells[idx];
            if before >= 1.0 {
                continue;
            }

            let after = clamp_unit(before + delta);
            if after == before {
                continue;
            }
            self.cells[idx] = after;
            self.total_fill += after as f64 - before as f64;

            if after >= 1.0 {
                completed.push(cell);
            }
        }
        completed
    }

    /// Apply the current brush for `dt` seconds at the current fill rate.
    pub fn paint(&mut self, center: Uv, dt: f32) -> Vec<CellCoord> {
        let delta = dt.max(0.0) / self.seconds_per_cell;
        self.apply_brush(center, self.brush_radius, delta)
    }

    /// Cells under the current brush, without painting them.
    pub fn covered_cells(&self, center: Uv) -> Vec<CellCoord> {
        if !self.is_ready() {
            return Vec::new();
        }
        geometry::covered_cells(center, self.brush_radius, self.grid_x, self.grid_y)
    }

    /// Every cell that is fully painted.
    pub fn completed_cells(&self) -> Vec<CellCoord> {
        let grid_x = self.grid_x.max(1);
        self.cells
            .iter()
            .enumerate()
            .filter(|(_, &v)| v >= 1.0)
            .map(|(i, _)| CellCoord::new(i as u32 % grid_x, i as u32 / grid_x))
            .collect()
    }

    /// Mean fill over the whole grid, `0.0` when unconfigured.
    pub fn progress(&self) -> f32 {
        if self.cells.is_empty() {
            return 0.0;
        }
        (self.total_fill / self.cells.len() as f64).clamp(0.0, 1.0) as f32
    }

    /// Copy of the cell buffer, row-major.
    pub fn snapshot(&self) -> Vec<f32> {
        self.cells.clone()
    }

    pub fn cells(&self) -> &[f32] {
        &self.cells
    }

    pub fn grid_size(&self) -> (u32, u32) {
        (self.grid_x, self.grid_y)
    }

    pub fn set_brush_radius(&mut self, radius: f32) {
        if radius.is_finite() {
            self.brush_radius = self.limits.clamp(radius);
        }
    }

    pub fn brush_radius(&self) -> f32 {
        self.brush_radius
    }

    pub fn brush_limits(&self) -> BrushLimits {
        self.limits
    }

    /// Seconds needed to fill one cell, floored at [`MIN_SECONDS_PER_CELL`].
    pub fn set_fill_rate(&mut self, seconds_per_cell: f32) {
        self.seconds_per_cell = if seconds_per_cell.is_finite() {
            seconds_per_cell.max(MIN_SECONDS_PER_CELL)
        } else {
            DEFAULT_SECONDS_PER_CELL
        };
    }

    pub fn seconds_per_cell(&self) -> f32 {
        self.seconds_per_cell
    }
}

/// Cell value rule shared with saved snapshots: NaN reads as empty.
pub fn clamp_unit(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}
