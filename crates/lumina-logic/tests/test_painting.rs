//! Integration tests for the painting pipeline.
//!
//! Exercises: Difficulty → CoverageEngine → brush strokes, and the breath
//! model driving the engine's fill rate.
//!
//! All tests are pure logic - no files, no network, no rendering.

use lumina_logic::breath::{BreathConfig, BreathModel, BreathSample};
use lumina_logic::coverage::CoverageEngine;
use lumina_logic::difficulty::Difficulty;
use lumina_logic::geometry::{CellCoord, Uv};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

// ── Helpers ────────────────────────────────────────────────────────────

fn engine_for(difficulty: Difficulty) -> CoverageEngine {
    let (gx, gy) = difficulty.grid_size();
    let mut engine = CoverageEngine::new();
    engine.configure(gx, gy);
    engine
}

fn cell_sum(engine: &CoverageEngine) -> f64 {
    engine.cells().iter().map(|&c| c as f64).sum()
}

fn random_stroke(rng: &mut StdRng) -> (Uv, f32, f32) {
    let center = Uv::new(rng.gen_range(-0.1..1.1), rng.gen_range(-0.1..1.1));
    let radius = rng.gen_range(0.0..0.3);
    let delta = rng.gen_range(-0.3..0.8);
    (center, radius, delta)
}

// ── Invariants ─────────────────────────────────────────────────────────

#[test]
fn cells_stay_in_unit_range_under_random_strokes() {
    let mut rng = StdRng::seed_from_u64(7);
    for &difficulty in Difficulty::all() {
        let mut engine = engine_for(difficulty);
        for _ in 0..2_000 {
            let (center, radius, delta) = random_stroke(&mut rng);
            engine.apply_brush(center, radius, delta);
        }
        assert!(engine.cells().iter().all(|&c| (0.0..=1.0).contains(&c)));
    }
}

#[test]
fn progress_matches_mean_of_cells() {
    let mut rng = StdRng::seed_from_u64(42);
    let mut engine = engine_for(Difficulty::Medium);
    for step in 0..3_000 {
        let (center, radius, delta) = random_stroke(&mut rng);
        engine.apply_brush(center, radius, delta);
        if step % 100 == 0 {
            let expected = cell_sum(&engine) / engine.cells().len() as f64;
            assert!(
                (engine.progress() as f64 - expected).abs() < 1e-6,
                "step {}: progress {} vs mean {}",
                step,
                engine.progress(),
                expected
            );
        }
    }
}

#[test]
fn zero_delta_is_idempotent() {
    let mut rng = StdRng::seed_from_u64(3);
    let mut engine = engine_for(Difficulty::Hard);
    for _ in 0..200 {
        let (center, radius, delta) = random_stroke(&mut rng);
        engine.apply_brush(center, radius, delta.abs());
    }
    let before = engine.snapshot();
    for _ in 0..200 {
        let (center, radius, _) = random_stroke(&mut rng);
        assert!(engine.apply_brush(center, radius, 0.0).is_empty());
    }
    assert_eq!(engine.snapshot(), before);
}

#[test]
fn saturated_cells_are_never_reported_twice() {
    let mut rng = StdRng::seed_from_u64(11);
    let mut engine = engine_for(Difficulty::Easy);
    let mut seen = std::collections::HashSet::new();
    for _ in 0..1_000 {
        let (center, radius, delta) = random_stroke(&mut rng);
        for cell in engine.apply_brush(center, radius, delta.abs()) {
            assert!(seen.insert(cell), "cell {:?} completed twice", cell);
        }
    }
    let completed: std::collections::HashSet<_> = engine.completed_cells().into_iter().collect();
    assert_eq!(completed, seen);
}

#[test]
fn restore_roundtrips_valid_snapshot() {
    let mut rng = StdRng::seed_from_u64(99);
    for &difficulty in Difficulty::all() {
        let (gx, gy) = difficulty.grid_size();
        let snapshot: Vec<f32> = (0..gx * gy).map(|_| rng.gen_range(0.0..=1.0)).collect();

        let mut engine = CoverageEngine::new();
        engine.configure(gx, gy);
        assert!(engine.restore(&snapshot));
        assert_eq!(engine.snapshot(), snapshot);
    }
}

// ── End-to-end scenario ────────────────────────────────────────────────

#[test]
fn single_cell_brush_completes_once() {
    let mut engine = engine_for(Difficulty::Easy);
    let center = Uv::new(0.3125, 0.3125);

    let first = engine.apply_brush(center, 0.05, 1.0);
    assert_eq!(first, vec![CellCoord::new(2, 2)]);
    assert_eq!(engine.cells()[2 * 8 + 2], 1.0);
    assert!((engine.progress() - 0.015625).abs() < 1e-6);

    let second = engine.apply_brush(center, 0.05, 1.0);
    assert!(second.is_empty());
    assert!((engine.progress() - 0.015625).abs() < 1e-6);
}

// ── Breath-driven painting ─────────────────────────────────────────────

#[test]
fn stronger_breath_paints_faster() {
    let base_seconds = 1.5;
    let center = Uv::new(0.5, 0.5);
    let dt = 1.0 / 60.0;

    let run = |volume: f32| -> f32 {
        let mut model = BreathModel::new(BreathConfig {
            calibration_blend: 0.0,
            initial_min: 0.0,
            initial_max: 1.0,
            ..BreathConfig::default()
        });
        let mut engine = engine_for(Difficulty::Easy);
        for frame in 0..30 {
            if frame % 6 == 0 {
                model.ingest(&BreathSample {
                    volume: Some(volume),
                    regularity: Some(1.0),
                    rate: Some(0.1),
                });
            }
            model.tick(dt);
            engine.set_fill_rate(model.seconds_per_cell(base_seconds));
            if model.is_gate_open() {
                engine.paint(center, dt);
            }
        }
        engine.progress()
    };

    let weak = run(0.3);
    let strong = run(0.9);
    let silent = run(0.0);
    assert!(strong > weak, "strong {} should beat weak {}", strong, weak);
    assert_eq!(silent, 0.0, "closed gate must not paint");
}
