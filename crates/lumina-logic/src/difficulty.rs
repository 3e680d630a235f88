//! Difficulty levels and the grid resolution each one paints at.

use serde::{Deserialize, Serialize};

/// Player-selected difficulty. Stored on disk by ordinal (`0..=2`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum Difficulty {
    #[default]
    Easy = 0,
    Medium = 1,
    Hard = 2,
}

impl Difficulty {
    pub fn all() -> &'static [Difficulty] {
        &[Difficulty::Easy, Difficulty::Medium, Difficulty::Hard]
    }

    /// Map any stored ordinal onto a valid level, clamping out-of-range
    /// values to the nearest end.
    pub fn from_ordinal(ordinal: i64) -> Self {
        match ordinal {
            i64::MIN..=0 => Difficulty::Easy,
            1 => Difficulty::Medium,
            _ => Difficulty::Hard,
        }
    }

    pub fn ordinal(self) -> u8 {
        self as u8
    }

    /// Grid columns × rows painted at this difficulty.
    pub fn grid_size(self) -> (u32, u32) {
        match self {
            Difficulty::Easy => (8, 8),
            Difficulty::Medium => (12, 12),
            Difficulty::Hard => (16, 16),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Difficulty::Easy => "Easy",
            Difficulty::Medium => "Medium",
            Difficulty::Hard => "Hard",
        }
    }
}

impl std::fmt::Display for Difficulty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
