//! Lumina Headless Harness
//!
//! Validates painting, breath control and progress persistence without a
//! renderer. Runs in-process against a temp directory; `--live` polls a
//! real breathing service instead of scripted samples.
//!
//! Usage:
//!   cargo run -p lumina-simtest
//!   cargo run -p lumina-simtest -- --verbose
//!   cargo run -p lumina-simtest -- --live http://127.0.0.1:8000 --seconds 20

use std::sync::Arc;
use std::time::{Duration, Instant};

use lumina_core::biometric::BiometricController;
use lumina_core::config::{LuminaConfig, PaintSettings};
use lumina_core::content_id::image_id_from_bytes;
use lumina_core::sampler::{HttpSampleSource, ManualSource};
use lumina_core::session::{FillDrive, PaintSession};
use lumina_core::store::{LoadStatus, ProgressStore};
use lumina_logic::breath::{compute_multiplier, BreathConfig, BreathModel, BreathSample};
use lumina_logic::coverage::CoverageEngine;
use lumina_logic::difficulty::Difficulty;
use lumina_logic::geometry::{covered_cells, Uv};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const SEED: u64 = 0x5eed;
const FRAME_DT: f32 = 1.0 / 60.0;

// ── Test harness ────────────────────────────────────────────────────────

struct TestResult {
    name: String,
    passed: bool,
    detail: String,
}

fn check(name: &str, passed: bool, detail: String) -> TestResult {
    TestResult {
        name: name.into(),
        passed,
        detail,
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args: Vec<String> = std::env::args().collect();
    let verbose = args.iter().any(|a| a == "--verbose");

    if let Some(url) = arg_value(&args, "--live") {
        let seconds = arg_value(&args, "--seconds")
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(10);
        if let Err(e) = run_live(url, seconds) {
            eprintln!("live run failed: {}", e);
            std::process::exit(1);
        }
        return;
    }

    println!("=== Lumina Headless Harness ===\n");

    let mut results = Vec::new();

    // 1. Brush geometry edge cases
    results.extend(validate_geometry(verbose));

    // 2. Random stroke sweep over every difficulty
    results.extend(validate_coverage(verbose));

    // 3. Breath model: gate, bounds, smoothing
    results.extend(validate_breath(verbose));

    // 4. Progress store persistence
    results.extend(validate_store(verbose));

    // 5. Full session with scripted breathing
    results.extend(validate_session(verbose));

    // ── Summary ──
    println!();
    let passed = results.iter().filter(|r| r.passed).count();
    let failed = results.iter().filter(|r| !r.passed).count();
    let total = results.len();

    for r in &results {
        let icon = if r.passed { "✓" } else { "✗" };
        if !r.passed || verbose {
            println!("  {} {}: {}", icon, r.name, r.detail);
        }
    }

    println!(
        "\n=== RESULT: {}/{} passed, {} failed ===",
        passed, total, failed
    );

    if failed > 0 {
        std::process::exit(1);
    }
}

fn arg_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .map(String::as_str)
}

// ── 1. Geometry ─────────────────────────────────────────────────────────

fn validate_geometry(verbose: bool) -> Vec<TestResult> {
    println!("--- Brush Geometry ---");
    let mut results = Vec::new();

    let outside = covered_cells(Uv::new(3.0, -2.0), 0.1, 8, 8);
    results.push(check(
        "geometry_outside_image",
        outside.is_empty(),
        format!("{} cells under a brush far outside the image", outside.len()),
    ));

    let nan = covered_cells(Uv::new(f32::NAN, 0.5), 0.1, 8, 8);
    results.push(check(
        "geometry_nan_center",
        nan.is_empty(),
        format!("{} cells under a NaN brush", nan.len()),
    ));

    // A brush centered on a four-cell corner touches all four.
    let corner = covered_cells(Uv::new(0.5, 0.5), 0.01, 8, 8);
    results.push(check(
        "geometry_corner_touch",
        corner.len() == 4,
        format!("{} cells at the center corner", corner.len()),
    ));

    // A brush wider than the image covers everything exactly once.
    let all = covered_cells(Uv::new(0.5, 0.5), 2.0, 16, 16);
    let mut idx: Vec<_> = all.iter().map(|c| c.index(16)).collect();
    idx.sort_unstable();
    idx.dedup();
    results.push(check(
        "geometry_full_cover_unique",
        all.len() == 256 && idx.len() == 256,
        format!("{} cells, {} unique", all.len(), idx.len()),
    ));

    if verbose {
        println!("  corner brush covers {:?}", corner);
    }
    results
}

// ── 2. Coverage ─────────────────────────────────────────────────────────

fn validate_coverage(verbose: bool) -> Vec<TestResult> {
    println!("--- Coverage Sweep ---");
    let mut results = Vec::new();
    let mut rng = StdRng::seed_from_u64(SEED);

    for &difficulty in Difficulty::all() {
        let (gx, gy) = difficulty.grid_size();
        let mut engine = CoverageEngine::new();
        engine.configure(gx, gy);
        engine.set_fill_rate(0.5);

        let mut reported = vec![0u32; (gx * gy) as usize];
        let mut out_of_range = 0usize;
        let mut max_progress_err = 0.0f64;

        for _ in 0..2_000 {
            engine.set_brush_radius(rng.gen_range(0.0..0.3));
            let center = Uv::new(rng.gen_range(-0.2..1.2), rng.gen_range(-0.2..1.2));
            let dt = rng.gen_range(0.0..0.1);
            for cell in engine.paint(center, dt) {
                reported[cell.index(gx)] += 1;
            }

            out_of_range += engine
                .cells()
                .iter()
                .filter(|v| !(0.0..=1.0).contains(*v))
                .count();
            let mean = engine.cells().iter().map(|&v| v as f64).sum::<f64>()
                / engine.cells().len() as f64;
            max_progress_err = max_progress_err.max((engine.progress() as f64 - mean).abs());
        }

        let name = difficulty.name().to_lowercase();
        results.push(check(
            &format!("coverage_{}_bounds", name),
            out_of_range == 0,
            format!("{} out-of-range cell values", out_of_range),
        ));
        results.push(check(
            &format!("coverage_{}_progress_mean", name),
            max_progress_err < 1e-6,
            format!("max |progress - mean| = {:.2e}", max_progress_err),
        ));

        let repeats = reported.iter().filter(|&&n| n > 1).count();
        let completed = engine.completed_cells().len();
        let reported_total: u32 = reported.iter().sum();
        results.push(check(
            &format!("coverage_{}_single_report", name),
            repeats == 0 && reported_total as usize == completed,
            format!(
                "{} completions reported, {} cells full, {} repeats",
                reported_total, completed, repeats
            ),
        ));

        if verbose {
            println!(
                "  {} {}x{}: progress {:.1}%",
                difficulty,
                gx,
                gy,
                engine.progress() * 100.0
            );
        }
    }

    results
}

// ── 3. Breath ───────────────────────────────────────────────────────────

fn validate_breath(verbose: bool) -> Vec<TestResult> {
    println!("--- Breath Model ---");
    let mut results = Vec::new();
    let mut rng = StdRng::seed_from_u64(SEED ^ 0xb4ea7);
    let config = BreathConfig::default();

    // Multiplier bounds over random inputs
    let mut worst = (f32::MAX, f32::MIN);
    for _ in 0..10_000 {
        let m = compute_multiplier(
            &config,
            rng.gen_range(-0.5..1.5),
            rng.gen_range(-0.5..1.5),
            rng.gen_range(0.0..0.5),
        );
        worst = (worst.0.min(m), worst.1.max(m));
    }
    let ceiling = 3.0 * config.max_multiplier;
    results.push(check(
        "breath_multiplier_bounds",
        worst.0 >= config.min_multiplier && worst.1 <= ceiling,
        format!(
            "observed [{:.3}, {:.3}] within [{:.3}, {:.3}]",
            worst.0, worst.1, config.min_multiplier, ceiling
        ),
    ));

    // Hysteresis: holds between thresholds, closes below off
    let scripted = BreathConfig {
        calibration_blend: 0.0,
        initial_min: 0.0,
        initial_max: 1.0,
        ..BreathConfig::default()
    };
    let mut model = BreathModel::new(scripted.clone());
    let mut gate_trace = Vec::new();
    for v in [0.1, 0.25, 0.15, 0.13, 0.1, 0.15, 0.21] {
        model.ingest(&volume(v));
        gate_trace.push(model.is_gate_open());
    }
    let expected = [false, true, true, true, false, false, true];
    results.push(check(
        "breath_gate_hysteresis",
        gate_trace == expected,
        format!("trace {:?}", gate_trace),
    ));

    // Smoothing approaches the target without overshoot
    let mut model = BreathModel::new(scripted);
    model.ingest(&volume(1.0));
    let target = model.state().target_multiplier;
    let mut monotone = true;
    let mut prev = model.multiplier();
    for _ in 0..600 {
        model.tick(FRAME_DT);
        let m = model.multiplier();
        if m < prev - 1e-6 || m > target + 1e-6 {
            monotone = false;
        }
        prev = m;
    }
    results.push(check(
        "breath_smoothing_converges",
        monotone && (prev - target).abs() < 1e-3,
        format!("target {:.3}, after 10s {:.3}", target, prev),
    ));

    // Missing volume leaves state untouched
    let before = model.state().clone();
    let norm = model.ingest(&BreathSample::default());
    results.push(check(
        "breath_missing_volume_noop",
        norm.is_none() && model.state() == &before,
        "empty sample ignored".into(),
    ));

    if verbose {
        println!("  multiplier range [{:.3}, {:.3}]", worst.0, worst.1);
    }
    results
}

fn volume(v: f32) -> BreathSample {
    BreathSample {
        volume: Some(v),
        regularity: Some(1.0),
        rate: Some(0.0),
    }
}

// ── 4. Store ────────────────────────────────────────────────────────────

fn validate_store(verbose: bool) -> Vec<TestResult> {
    println!("--- Progress Store ---");
    let mut results = Vec::new();

    let dir = match tempfile::tempdir() {
        Ok(d) => d,
        Err(e) => {
            results.push(check("store_tempdir", false, format!("tempdir: {}", e)));
            return results;
        }
    };
    let path = dir.path().join("progress.json");

    let mut store = ProgressStore::open(&path);
    results.push(check(
        "store_missing_starts_empty",
        store.load_status() == LoadStatus::Missing && store.is_empty(),
        format!("{:?}", store.load_status()),
    ));

    let writes = [
        store.set("a", Difficulty::Hard, 16, 16, &[0.5; 256], 0.5),
        store.set("a", Difficulty::Easy, 8, 8, &[0.7; 64], 0.7),
        store.set("b", Difficulty::Medium, 12, 12, &[0.0; 144], 0.0),
    ];
    let write_errors = writes.iter().filter(|r| r.is_err()).count();
    results.push(check(
        "store_writes",
        write_errors == 0,
        format!("{} failed writes", write_errors),
    ));

    let restamped = store.get("a").map(|e| e.locked_difficulty);
    results.push(check(
        "store_restamp_on_progress",
        restamped == Some(Difficulty::Easy),
        format!("locked difficulty {:?}", restamped),
    ));

    let reset_ok = store.reset("b").is_ok();
    if let Err(e) = store.close() {
        results.push(check("store_close", false, e.to_string()));
    }

    let reopened = ProgressStore::open(&path);
    results.push(check(
        "store_reopen",
        reset_ok
            && reopened.load_status() == LoadStatus::Loaded { entries: 1 }
            && (reopened.progress_of("a") - 0.7).abs() < 1e-6
            && reopened.get("b").is_none(),
        format!(
            "{:?}, a={:.2}",
            reopened.load_status(),
            reopened.progress_of("a")
        ),
    ));

    // Corrupt document: start empty and leave the bytes on disk
    let corrupt = dir.path().join("corrupt.json");
    let garbage = b"{ \"entries\": [ truncated";
    let wrote = std::fs::write(&corrupt, garbage).is_ok();
    let recovered = ProgressStore::open(&corrupt);
    let untouched = std::fs::read(&corrupt)
        .map(|b| b == garbage)
        .unwrap_or(false);
    results.push(check(
        "store_corrupt_recovery",
        wrote && recovered.load_status() == LoadStatus::Recovered && recovered.is_empty() && untouched,
        format!("{:?}, file untouched: {}", recovered.load_status(), untouched),
    ));

    if verbose {
        println!("  store at {}", path.display());
    }
    results
}

// ── 5. Session ──────────────────────────────────────────────────────────

fn validate_session(verbose: bool) -> Vec<TestResult> {
    println!("--- Painting Session ---");
    let mut results = Vec::new();

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            results.push(check("session_runtime", false, e.to_string()));
            return results;
        }
    };
    let dir = match tempfile::tempdir() {
        Ok(d) => d,
        Err(e) => {
            results.push(check("session_tempdir", false, e.to_string()));
            return results;
        }
    };
    let path = dir.path().join("progress.json");
    let image_id = image_id_from_bytes(b"harness image");
    let settings = PaintSettings::default();

    let source = Arc::new(ManualSource::new(BreathSample::default()));
    let config = BreathConfig {
        initial_max: 1.0,
        ..BreathConfig::default()
    };
    let mut ctl = BiometricController::new(Arc::clone(&source), config);

    let mut store = ProgressStore::open(&path);
    let mut session = PaintSession::init(&store, image_id.clone(), Difficulty::Medium, &settings);
    let mut rng = StdRng::seed_from_u64(SEED ^ 0x5e55);

    // Silent first second: gate stays shut
    let progress_silent = runtime.block_on(async {
        for frame in 0..60 {
            if frame % 6 == 0 {
                ctl.poll_once().await;
            }
            ctl.tick(FRAME_DT);
            session.tick(FRAME_DT, Some(Uv::new(0.5, 0.5)), ctl.drive());
        }
        session.progress()
    });
    results.push(check(
        "session_silent_no_paint",
        progress_silent == 0.0,
        format!("progress {:.4} with no breath data", progress_silent),
    ));

    // Ten seconds of steady breathing with a wandering brush
    let mut completions = 0usize;
    runtime.block_on(async {
        for frame in 0..600 {
            if frame % 6 == 0 {
                source.set(BreathSample {
                    volume: Some(rng.gen_range(0.5..0.9)),
                    regularity: Some(rng.gen_range(0.7..1.0)),
                    rate: Some(rng.gen_range(0.1..0.16)),
                });
                ctl.poll_once().await;
            }
            ctl.tick(FRAME_DT);
            let brush = Uv::new(rng.gen_range(0.2..0.8), rng.gen_range(0.2..0.8));
            completions += session.tick(FRAME_DT, Some(brush), ctl.drive()).len();
        }
    });
    let painted = session.progress();
    results.push(check(
        "session_breath_paints",
        painted > 0.0 && ctl.multiplier() > 1.0,
        format!(
            "progress {:.1}%, multiplier {:.2}, {} cells completed",
            painted * 100.0,
            ctl.multiplier(),
            completions
        ),
    ));

    let saved = session.end(&mut store);
    let close = store.close();
    let reopened = ProgressStore::open(&path);
    let resumed = PaintSession::init(&reopened, image_id, Difficulty::Easy, &settings);
    results.push(check(
        "session_resume_locked",
        saved.is_ok()
            && close.is_ok()
            && resumed.restored()
            && resumed.difficulty() == Difficulty::Medium
            && (resumed.progress() - painted).abs() < 1e-6,
        format!(
            "resumed at {} with {:.1}%",
            resumed.difficulty(),
            resumed.progress() * 100.0
        ),
    ));

    if verbose {
        let (polls, missed) = ctl.poll_counts();
        println!("  {} polls, {} without volume", polls, missed);
    }
    results
}

// ── Live mode ───────────────────────────────────────────────────────────

/// Paint a slow circle for `seconds` while polling a real breathing
/// service, printing the control outputs once per second.
fn run_live(base_url: &str, seconds: u64) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = LuminaConfig::default();
    config.api.base_url = base_url.to_string();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let _guard = runtime.enter();

    let dir = tempfile::tempdir()?;
    let mut store = ProgressStore::open(dir.path().join("progress.json"));
    let mut session = PaintSession::init(&store, "live", Difficulty::Easy, &config.painting);

    let source = Arc::new(HttpSampleSource::new(&config.api)?);
    let mut ctl = BiometricController::new(source, config.breath.clone());
    let poll_every = Duration::from_millis(config.api.poll_interval_ms.max(1));

    println!("=== Live breath run against {} for {}s ===", base_url, seconds);

    let start = Instant::now();
    let mut last_poll = start;
    let mut last_report = start;
    let mut pending = Some(ctl.spawn_fetch());

    while start.elapsed() < Duration::from_secs(seconds) {
        if pending.as_ref().is_some_and(|h| h.is_finished()) {
            if let Some(handle) = pending.take() {
                match runtime.block_on(handle) {
                    Ok(sample) => {
                        ctl.ingest(&sample);
                    }
                    Err(e) => log::warn!("Sampling task failed: {}", e),
                }
            }
        }
        if pending.is_none() && last_poll.elapsed() >= poll_every {
            last_poll = Instant::now();
            pending = Some(ctl.spawn_fetch());
        }

        ctl.tick(FRAME_DT);
        let t = start.elapsed().as_secs_f32();
        let brush = Uv::new(0.5 + 0.3 * t.cos(), 0.5 + 0.3 * t.sin());
        let drive = if config.api.enabled {
            ctl.drive()
        } else {
            FillDrive::steady()
        };
        for cell in session.tick(FRAME_DT, Some(brush), drive) {
            log::info!("Cell ({}, {}) complete", cell.x, cell.y);
        }

        if last_report.elapsed() >= Duration::from_secs(1) {
            last_report = Instant::now();
            println!(
                "  t={:>5.1}s multiplier={:.2} gate={} progress={:.1}%",
                t,
                ctl.multiplier(),
                if ctl.is_gate_open() { "open" } else { "closed" },
                session.progress() * 100.0
            );
        }
        std::thread::sleep(Duration::from_secs_f32(FRAME_DT));
    }

    let progress = session.end(&mut store)?;
    store.close()?;
    let (polls, missed) = ctl.poll_counts();
    println!(
        "\n=== Live run: {:.1}% painted, {} polls, {} without volume ===",
        progress * 100.0,
        polls,
        missed
    );
    Ok(())
}
