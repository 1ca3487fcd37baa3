//! Runtime control parameters and the typed updates that mutate them.
//!
//! The cloud feedback channel used to poke two plain globals from its
//! receive callback. Here every remote adjustment is a [`ControlUpdate`]
//! message; the control loop owns the [`ControlParams`] and drains its
//! update queue at the top of each tick, so a value sent mid-tick is
//! visible no later than the following tick.

use crate::consts::{DEFAULT_VIBRATION_FACTOR, DEFAULT_VIBRATION_THRESHOLD};

/// A single cloud-driven parameter adjustment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ControlUpdate {
    /// New vibration threshold engaging the speed override.
    VibrationThreshold(i32),
    /// New vibration reporting/normalization factor.
    VibrationFactor(f64),
}

/// Control parameters consumed by the control loop every tick.
///
/// Owned exclusively by the loop thread; mutated only via
/// [`ControlParams::apply`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControlParams {
    /// Normalized vibration level at or above which the override engages.
    pub vibration_threshold: i32,
    /// Factor applied to the filtered vibration value before reporting.
    pub vibration_factor: f64,
}

impl Default for ControlParams {
    fn default() -> Self {
        Self {
            vibration_threshold: DEFAULT_VIBRATION_THRESHOLD,
            vibration_factor: DEFAULT_VIBRATION_FACTOR,
        }
    }
}

impl ControlParams {
    /// Apply one update in place.
    pub fn apply(&mut self, update: ControlUpdate) {
        match update {
            ControlUpdate::VibrationThreshold(v) => self.vibration_threshold = v,
            ControlUpdate::VibrationFactor(f) => self.vibration_factor = f,
        }
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
