//! Breath-driven fill-rate control.
//!
//! Converts noisy breathing samples into two outputs: a bounded rate
//! multiplier (smoothed on the simulation clock) and a debounced painting
//! gate. The model runs on two independent clocks:
//!
//! | Clock | Driver | Work |
//! |-------|--------|------|
//! | Sampling | [`BreathModel::ingest`], nominally 10 Hz | calibration, gate, target multiplier |
//! | Smoothing | [`BreathModel::tick`], every frame | exponential approach to the target |
//!
//! No I/O happens here; fetching samples is the caller's concern.

use serde::{Deserialize, Serialize};

/// Minimum spread kept between the calibration bounds.
pub const CALIBRATION_EPSILON: f32 = 1e-4;
/// Gap forced between the gate thresholds when configured inverted.
pub const HYSTERESIS_GAP: f32 = 0.05;
/// Floor for the smoothing time constant, in seconds.
pub const MIN_SMOOTH_TAU: f32 = 0.01;
/// Floor applied to the multiplier when converting it to seconds per cell.
pub const MIN_MULTIPLIER: f32 = 0.01;

/// Tuning for the breath model. Defaults match the shipped game.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BreathConfig {
    /// Multiplier at normalized volume 0.
    pub min_multiplier: f32,
    /// Multiplier at normalized volume 1, before bonuses.
    pub max_multiplier: f32,
    /// Curve exponent; below 1 boosts weak signals.
    pub gamma: f32,

    pub use_regularity: bool,
    /// `m *= (1 - w) + w * regularity`.
    pub regularity_weight: f32,

    pub use_rate_bonus: bool,
    pub target_bpm_min: f32,
    pub target_bpm_max: f32,
    /// Extra fraction applied inside the BPM band (0.2 = +20%).
    pub bpm_bonus: f32,

    pub gate_painting: bool,
    pub gate_on_threshold: f32,
    pub gate_off_threshold: f32,

    /// Smoothing time constant in seconds.
    pub smooth_tau: f32,

    /// Blend factor for calibration bounds per sample.
    pub calibration_blend: f32,
    pub initial_min: f32,
    pub initial_max: f32,
}

impl Default for BreathConfig {
    fn default() -> Self {
        Self {
            min_multiplier: 0.2,
            max_multiplier: 2.0,
            gamma: 0.75,
            use_regularity: true,
            regularity_weight: 0.3,
            use_rate_bonus: true,
            target_bpm_min: 6.0,
            target_bpm_max: 10.0,
            bpm_bonus: 0.2,
            gate_painting: true,
            gate_on_threshold: 0.20,
            gate_off_threshold: 0.12,
            smooth_tau: 0.25,
            calibration_blend: 0.02,
            initial_min: 0.0,
            initial_max: 0.05,
        }
    }
}

impl BreathConfig {
    /// Clamp every field into its working range.
    ///
    /// Enforces `gate_off_threshold < gate_on_threshold`, a non-inverted
    /// multiplier range and a positive curve exponent.
    pub fn sanitized(mut self) -> Self {
        let finite_or = |v: f32, fallback: f32| if v.is_finite() { v } else { fallback };
        let defaults = BreathConfig::default();

        self.min_multiplier = finite_or(self.min_multiplier, defaults.min_multiplier).max(0.0);
        self.max_multiplier =
            finite_or(self.max_multiplier, defaults.max_multiplier).max(self.min_multiplier);
        self.gamma = finite_or(self.gamma, defaults.gamma).max(1e-3);
        self.regularity_weight =
            finite_or(self.regularity_weight, defaults.regularity_weight).clamp(0.0, 1.0);
        self.bpm_bonus = finite_or(self.bpm_bonus, defaults.bpm_bonus).max(0.0);
        self.gate_on_threshold =
            finite_or(self.gate_on_threshold, defaults.gate_on_threshold).clamp(0.0, 1.0);
        self.gate_off_threshold =
            finite_or(self.gate_off_threshold, defaults.gate_off_threshold).min(1.0);
        if self.gate_off_threshold >= self.gate_on_threshold {
            self.gate_off_threshold = self.gate_on_threshold - HYSTERESIS_GAP;
        }
        self.smooth_tau = finite_or(self.smooth_tau, defaults.smooth_tau).max(MIN_SMOOTH_TAU);
        self.calibration_blend =
            finite_or(self.calibration_blend, defaults.calibration_blend).clamp(0.0, 1.0);
        self.initial_min = finite_or(self.initial_min, defaults.initial_min);
        self.initial_max = finite_or(self.initial_max, defaults.initial_max)
            .max(self.initial_min + CALIBRATION_EPSILON);
        self
    }
}

/// One sampling round. Each metric is present only if its fetch succeeded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BreathSample {
    /// Raw breathing volume.
    pub volume: Option<f32>,
    /// Breath regularity in `[0,1]`.
    pub regularity: Option<f32>,
    /// Breaths per second.
    pub rate: Option<f32>,
}

/// Slow-adapting min/max bounds used to normalize raw volume.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Calibration {
    pub min: f32,
    pub max: f32,
}

impl Calibration {
    pub fn new(min: f32, max: f32) -> Self {
        Self {
            min,
            max: max.max(min + CALIBRATION_EPSILON),
        }
    }

    /// Blend the bounds towards `value` by `blend`, keeping them apart.
    pub fn observe(&mut self, value: f32, blend: f32) {
        self.min = lerp(self.min, self.min.min(value), blend);
        self.max = lerp(self.max, self.max.max(value), blend);
        if self.max <= self.min + CALIBRATION_EPSILON {
            self.max = self.min + CALIBRATION_EPSILON;
        }
    }

    /// Map `value` into `[0,1]` against the current bounds.
    pub fn normalize(&self, value: f32) -> f32 {
        ((value - self.min) / (self.max - self.min)).clamp(0.0, 1.0)
    }
}

/// Two-threshold on/off switch.
///
/// Opens when the input reaches `on`, closes when it falls to `off`, and
/// holds its state anywhere in between.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HysteresisGate {
    on: f32,
    off: f32,
    open: bool,
}

impl HysteresisGate {
    /// A closed gate. `off` is pushed below `on` if it is not already.
    pub fn new(on: f32, off: f32) -> Self {
        let off = if off < on { off } else { on - HYSTERESIS_GAP };
        Self {
            on,
            off,
            open: false,
        }
    }

    /// Feed one normalized value; returns the new state.
    pub fn update(&mut self, value: f32) -> bool {
        if !self.open && value >= self.on {
            self.open = true;
        } else if self.open && value <= self.off {
            self.open = false;
        }
        self.open
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn thresholds(&self) -> (f32, f32) {
        (self.on, self.off)
    }
}

/// Mutable state of the controller between samples and ticks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlState {
    pub calibration: Calibration,
    pub gate: HysteresisGate,
    /// Multiplier computed from the latest sample.
    pub target_multiplier: f32,
    /// Multiplier published to the painter.
    pub smoothed_multiplier: f32,
    pub last_regularity: f32,
    /// Breaths per second.
    pub last_rate: f32,
    /// Normalized volume of the latest sample.
    pub last_norm: f32,
    pub samples_seen: u64,
}

/// The breath model: calibration, gate and multiplier in one state machine.
#[derive(Debug, Clone)]
pub struct BreathModel {
    config: BreathConfig,
    state: ControlState,
}

impl Default for BreathModel {
    fn default() -> Self {
        Self::new(BreathConfig::default())
    }
}

impl BreathModel {
    pub fn new(config: BreathConfig) -> Self {
        let config = config.sanitized();
        let state = ControlState {
            calibration: Calibration::new(config.initial_min, config.initial_max),
            gate: HysteresisGate::new(config.gate_on_threshold, config.gate_off_threshold),
            target_multiplier: 1.0,
            smoothed_multiplier: 1.0,
            last_regularity: 1.0,
            last_rate: 0.0,
            last_norm: 0.0,
            samples_seen: 0,
        };
        Self { config, state }
    }

    pub fn config(&self) -> &BreathConfig {
        &self.config
    }

    pub fn state(&self) -> &ControlState {
        &self.state
    }

    /// Sampling-clock step.
    ///
    /// Missing metrics keep their last known value. Calibration, gate and
    /// target multiplier only move when the sample carries a volume.
    /// Returns the normalized volume when one was processed.
    pub fn ingest(&mut self, sample: &BreathSample) -> Option<f32> {
        if let Some(r) = sample.regularity.filter(|r| r.is_finite()) {
            self.state.last_regularity = r.clamp(0.0, 1.0);
        }
        if let Some(rate) = sample.rate.filter(|r| r.is_finite()) {
            self.state.last_rate = rate.max(0.0);
        }

        let volume = sample.volume.filter(|v| v.is_finite())?.max(0.0);

        self.state
            .calibration
            .observe(volume, self.config.calibration_blend);
        let norm = self.state.calibration.normalize(volume);
        self.state.last_norm = norm;
        self.state.gate.update(norm);
        self.state.target_multiplier =
            compute_multiplier(&self.config, norm, self.state.last_regularity, self.state.last_rate);
        self.state.samples_seen += 1;
        Some(norm)
    }

    /// Smoothing-clock step: move the published multiplier towards the
    /// target with `alpha = 1 - exp(-dt / tau)`.
    pub fn tick(&mut self, dt: f32) {
        if !dt.is_finite() || dt <= 0.0 {
            return;
        }
        let alpha = 1.0 - (-dt / self.config.smooth_tau).exp();
        self.state.smoothed_multiplier = lerp(
            self.state.smoothed_multiplier,
            self.state.target_multiplier,
            alpha,
        );
    }

    pub fn multiplier(&self) -> f32 {
        self.state.smoothed_multiplier
    }

    /// Painting gate. Always open when gating is disabled.
    pub fn is_gate_open(&self) -> bool {
        !self.config.gate_painting || self.state.gate.is_open()
    }

    /// Effective seconds per cell for a base rate at the current multiplier.
    pub fn seconds_per_cell(&self, base_seconds_per_cell: f32) -> f32 {
        base_seconds_per_cell / self.multiplier().max(MIN_MULTIPLIER)
    }
}

/// Map a normalized volume to a rate multiplier.
///
/// `m = min + (max - min) * norm^gamma`, scaled by the optional regularity
/// and BPM-band bonuses, then clamped to `[min, 3 * max]`.
pub fn compute_multiplier(config: &BreathConfig, norm: f32, regularity: f32, rate_bps: f32) -> f32 {
    let norm = norm.clamp(0.0, 1.0);
    let mut m = config.min_multiplier
        + (config.max_multiplier - config.min_multiplier) * norm.powf(config.gamma);

    if config.use_regularity {
        let w = config.regularity_weight;
        m *= (1.0 - w) + w * regularity.clamp(0.0, 1.0);
    }

    if config.use_rate_bonus {
        let bpm = rate_bps * 60.0;
        if bpm >= config.target_bpm_min && bpm <= config.target_bpm_max {
            m *= 1.0 + config.bpm_bonus.max(0.0);
        }
    }

    m.clamp(config.min_multiplier, config.max_multiplier * 3.0)
}

fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t.clamp(0.0, 1.0)
}
