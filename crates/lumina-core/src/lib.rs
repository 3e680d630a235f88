//! Lumina Core - painting session services
//!
//! Stateful pieces around the pure logic in `lumina-logic`:
//! - **Store**: per-image progress persisted as one JSON document
//! - **Content identity**: SHA-256 image ids that survive renames
//! - **Sampling**: breathing metrics fetched over HTTP
//! - **Biometric control**: sample source + breath model on two clocks
//! - **Session**: restore-or-start, per-frame painting, save on exit
//!
//! # Example
//!
//! ```rust,no_run
//! use lumina_core::prelude::*;
//!
//! let config = LuminaConfig::default();
//! let mut store = ProgressStore::open(config.store_path());
//! let mut session = PaintSession::init(&store, "9f2c…", Difficulty::Easy, &config.painting);
//!
//! // Host loop
//! for _ in 0..600 {
//!     session.tick(1.0 / 60.0, Some(Uv::new(0.5, 0.5)), FillDrive::steady());
//! }
//! session.end(&mut store).expect("save failed");
//! ```

pub mod biometric;
pub mod config;
pub mod content_id;
pub mod sampler;
pub mod session;
pub mod store;

/// Commonly used types for convenient importing
pub mod prelude {
    pub use crate::biometric::BiometricController;
    pub use crate::config::{LuminaConfig, PaintSettings};
    pub use crate::sampler::{HttpSampleSource, ManualSource, SampleSource};
    pub use crate::session::{FillDrive, PaintSession};
    pub use crate::store::{ProgressEntry, ProgressStore};
    pub use lumina_logic::difficulty::Difficulty;
    pub use lumina_logic::geometry::{CellCoord, Uv};
}
