//! Pure painting logic for Lumina.
//!
//! This crate holds every piece of game logic that does not touch a file,
//! a socket or a renderer. Functions take plain data and return results,
//! so the whole painting model is unit-testable and can be driven by any
//! host loop.
//!
//! # Module Overview
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`breath`] | Breath calibration, hysteresis gate, rate multiplier, smoothing |
//! | [`coverage`] | Per-cell fill buffer and the brush-fill algorithm |
//! | [`difficulty`] | Difficulty levels and their grid resolutions |
//! | [`geometry`] | Brush-circle vs grid-cell intersection in UV space |

pub mod breath;
pub mod coverage;
pub mod difficulty;
pub mod geometry;
