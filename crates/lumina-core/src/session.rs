//! One painting session over one image.
//!
//! `init` decides between restoring saved progress and starting blank,
//! `tick` paints one frame, and `end` writes the grid back to the store.
//! The session never talks to a renderer: completed cells are returned
//! from `tick` and the caller draws them.

use lumina_logic::coverage::CoverageEngine;
use lumina_logic::difficulty::Difficulty;
use lumina_logic::geometry::{CellCoord, Uv};

use crate::config::PaintSettings;
use crate::store::{ProgressStore, StoreError};

/// Rate multiplier and painting gate for one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FillDrive {
    pub multiplier: f32,
    pub gate_open: bool,
}

impl FillDrive {
    /// Base rate with painting always enabled, for runs without breath input.
    pub fn steady() -> Self {
        Self {
            multiplier: 1.0,
            gate_open: true,
        }
    }
}

impl Default for FillDrive {
    fn default() -> Self {
        Self::steady()
    }
}

/// What `init` will do for an image.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionPlan {
    pub difficulty: Difficulty,
    /// Snapshot to restore, if any.
    pub saved_cells: Option<Vec<f32>>,
}

/// Saved progress wins over the player's pick: an image with any progress
/// reopens at its locked difficulty with its saved cells.
pub fn plan_session(store: &ProgressStore, image_id: &str, selected: Difficulty) -> SessionPlan {
    match store.get(image_id) {
        Some(entry) if entry.progress > 0.0 => SessionPlan {
            difficulty: entry.locked_difficulty,
            saved_cells: Some(entry.cells),
        },
        _ => SessionPlan {
            difficulty: selected,
            saved_cells: None,
        },
    }
}

#[derive(Debug, Clone)]
pub struct PaintSession {
    image_id: String,
    difficulty: Difficulty,
    engine: CoverageEngine,
    base_seconds_per_cell: f32,
    restored: bool,
}

impl PaintSession {
    /// Start painting `image_id`.
    pub fn init(
        store: &ProgressStore,
        image_id: impl Into<String>,
        selected: Difficulty,
        settings: &PaintSettings,
    ) -> Self {
        let image_id = image_id.into();
        let plan = plan_session(store, &image_id, selected);

        let (grid_x, grid_y) = plan.difficulty.grid_size();
        let mut engine = CoverageEngine::with_limits(settings.brush_limits);
        engine.configure(grid_x, grid_y);
        engine.set_brush_radius(settings.brush_radius);
        engine.set_fill_rate(settings.base_seconds_per_cell);

        let restored = match &plan.saved_cells {
            Some(cells) => {
                let ok = engine.restore(cells);
                if !ok {
                    log::warn!(
                        "Saved grid for {} has {} cells, expected {}; starting blank",
                        image_id,
                        cells.len(),
                        grid_x * grid_y
                    );
                }
                ok
            }
            None => false,
        };

        log::info!(
            "Session start image={} difficulty={} grid={}x{} restored={} progress={:.1}%",
            image_id,
            plan.difficulty,
            grid_x,
            grid_y,
            restored,
            engine.progress() * 100.0
        );

        Self {
            image_id,
            difficulty: plan.difficulty,
            engine,
            base_seconds_per_cell: settings.base_seconds_per_cell,
            restored,
        }
    }

    /// Advance one frame.
    ///
    /// `brush` is the cursor position in UV space, `None` when the cursor
    /// is off the image or the button is up. Returns cells completed this
    /// frame.
    pub fn tick(&mut self, dt: f32, brush: Option<Uv>, drive: FillDrive) -> Vec<CellCoord> {
        let multiplier = drive.multiplier.max(lumina_logic::breath::MIN_MULTIPLIER);
        self.engine
            .set_fill_rate(self.base_seconds_per_cell / multiplier);

        match brush {
            Some(center) if drive.gate_open => self.engine.paint(center, dt),
            _ => Vec::new(),
        }
    }

    /// Write the current grid to the store without ending the session.
    pub fn save(&self, store: &mut ProgressStore) -> Result<f32, StoreError> {
        let (grid_x, grid_y) = self.engine.grid_size();
        let progress = self.engine.progress();
        store.set(
            &self.image_id,
            self.difficulty,
            grid_x,
            grid_y,
            self.engine.cells(),
            progress,
        )?;
        Ok(progress)
    }

    /// Save and finish. Returns the saved progress.
    pub fn end(self, store: &mut ProgressStore) -> Result<f32, StoreError> {
        let progress = self.save(store)?;
        log::info!(
            "Session end image={} progress={:.1}%",
            self.image_id,
            progress * 100.0
        );
        Ok(progress)
    }

    pub fn image_id(&self) -> &str {
        &self.image_id
    }

    pub fn difficulty(&self) -> Difficulty {
        self.difficulty
    }

    /// Whether saved cells were loaded on init.
    pub fn restored(&self) -> bool {
        self.restored
    }

    pub fn progress(&self) -> f32 {
        self.engine.progress()
    }

    pub fn engine(&self) -> &CoverageEngine {
        &self.engine
    }

    /// Direct engine access for brush-size controls and in-session clear.
    pub fn engine_mut(&mut self) -> &mut CoverageEngine {
        &mut self.engine
    }
}
