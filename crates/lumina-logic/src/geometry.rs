//! Brush-circle vs grid-cell geometry.
//!
//! Pure functions over UV space (`[0,1]` on both axes, independent of the
//! pixel size of the displayed image). A grid of `grid_x × grid_y` cells
//! tiles the unit square; cell `(x, y)` covers
//! `[x/grid_x, (x+1)/grid_x] × [y/grid_y, (y+1)/grid_y]`.

use serde::{Deserialize, Serialize};

/// A position in normalized image space.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Uv {
    pub u: f32,
    pub v: f32,
}

impl Uv {
    pub const fn new(u: f32, v: f32) -> Self {
        Self { u, v }
    }

    pub fn is_finite(&self) -> bool {
        self.u.is_finite() && self.v.is_finite()
    }
}

/// Column/row index of a single grid cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellCoord {
    pub x: u32,
    pub y: u32,
}

impl CellCoord {
    pub const fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }

    /// Row-major index into a cell buffer `grid_x` cells wide.
    pub fn index(&self, grid_x: u32) -> usize {
        self.y as usize * grid_x as usize + self.x as usize
    }
}

/// Axis-aligned rectangle in UV space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellRect {
    pub x_min: f32,
    pub y_min: f32,
    pub x_max: f32,
    pub y_max: f32,
}

/// Inclusive range of cell indices on both axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellRange {
    pub min_x: u32,
    pub max_x: u32,
    pub min_y: u32,
    pub max_y: u32,
}

impl CellRange {
    /// Iterate the range row by row.
    pub fn iter(self) -> impl Iterator<Item = CellCoord> {
        let (min_x, max_x) = (self.min_x, self.max_x);
        (self.min_y..=self.max_y)
            .flat_map(move |y| (min_x..=max_x).map(move |x| CellCoord::new(x, y)))
    }
}

/// Width and height of one cell in UV units.
pub fn cell_size(grid_x: u32, grid_y: u32) -> (f32, f32) {
    (1.0 / grid_x.max(1) as f32, 1.0 / grid_y.max(1) as f32)
}

/// UV rectangle covered by a cell.
pub fn cell_rect(cell: CellCoord, grid_x: u32, grid_y: u32) -> CellRect {
    let (cell_w, cell_h) = cell_size(grid_x, grid_y);
    CellRect {
        x_min: cell.x as f32 * cell_w,
        y_min: cell.y as f32 * cell_h,
        x_max: (cell.x + 1) as f32 * cell_w,
        y_max: (cell.y + 1) as f32 * cell_h,
    }
}

/// Cell-index bounding box of `[center - radius, center + radius]`, clamped
/// to the grid on both axes.
pub fn bounding_range(center: Uv, radius: f32, grid_x: u32, grid_y: u32) -> CellRange {
    let grid_x = grid_x.max(1);
    let grid_y = grid_y.max(1);
    let (cell_w, cell_h) = cell_size(grid_x, grid_y);

    let clamp_index = |value: f32, cell: f32, count: u32| -> u32 {
        // `as` saturates out-of-range floats, so negatives land on 0.
        let idx = (value / cell).floor() as i64;
        idx.clamp(0, count as i64 - 1) as u32
    };

    CellRange {
        min_x: clamp_index(center.u - radius, cell_w, grid_x),
        max_x: clamp_index(center.u + radius, cell_w, grid_x),
        min_y: clamp_index(center.v - radius, cell_h, grid_y),
        max_y: clamp_index(center.v + radius, cell_h, grid_y),
    }
}

/// Circle/rectangle overlap test.
///
/// Clamps the circle centre onto the rectangle and compares the squared
/// distance against `radius_sq`. Touching edges count as overlap.
pub fn circle_intersects_rect(center: Uv, radius_sq: f32, rect: &CellRect) -> bool {
    let cx = center.u.clamp(rect.x_min, rect.x_max);
    let cy = center.v.clamp(rect.y_min, rect.y_max);
    let dx = center.u - cx;
    let dy = center.v - cy;
    dx * dx + dy * dy <= radius_sq
}

/// All cells whose rectangle intersects the brush disk, in row-major order.
pub fn covered_cells(center: Uv, radius: f32, grid_x: u32, grid_y: u32) -> Vec<CellCoord> {
    if !center.is_finite() || !radius.is_finite() || radius < 0.0 {
        return Vec::new();
    }
    let radius_sq = radius * radius;
    bounding_range(center, radius, grid_x, grid_y)
        .iter()
        .filter(|&cell| circle_intersects_rect(center, radius_sq, &cell_rect(cell, grid_x, grid_y)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_size() {
        let (w, h) = cell_size(8, 4);
        assert!((w - 0.125).abs() < 1e-6);
        assert!((h - 0.25).abs() < 1e-6);
    }

    #[test]
    fn test_bounding_range_clamps_to_grid() {
        let range = bounding_range(Uv::new(0.0, 1.0), 0.3, 8, 8);
        assert_eq!(range.min_x, 0);
        assert_eq!(range.max_x, 2);
        assert_eq!(range.min_y, 5);
        assert_eq!(range.max_y, 7);
    }

    #[test]
    fn test_circle_inside_cell() {
        let rect = cell_rect(CellCoord::new(2, 2), 8, 8);
        assert!(circle_intersects_rect(Uv::new(0.3125, 0.3125), 0.0025, &rect));
    }

    #[test]
    fn test_circle_near_corner_misses_diagonal_cell() {
        // Centre just inside (0,0) near its top-right corner; the disk reaches
        // both edge neighbours but not the diagonal one.
        let center = Uv::new(0.12, 0.12);
        let cells = covered_cells(center, 0.006, 8, 8);
        assert!(cells.contains(&CellCoord::new(0, 0)));
        assert!(cells.contains(&CellCoord::new(1, 0)));
        assert!(cells.contains(&CellCoord::new(0, 1)));
        assert!(!cells.contains(&CellCoord::new(1, 1)));
    }

    #[test]
    fn test_small_brush_covers_single_cell() {
        let cells = covered_cells(Uv::new(0.3125, 0.3125), 0.05, 8, 8);
        assert_eq!(cells, vec![CellCoord::new(2, 2)]);
    }

    #[test]
    fn test_non_finite_center_covers_nothing() {
        assert!(covered_cells(Uv::new(f32::NAN, 0.5), 0.1, 8, 8).is_empty());
        assert!(covered_cells(Uv::new(0.5, 0.5), f32::INFINITY, 8, 8).is_empty());
    }

    #[test]
    fn test_index_is_row_major() {
        assert_eq!(CellCoord::new(2, 2).index(8), 18);
        assert_eq!(CellCoord::new(7, 0).index(8), 7);
    }
}
