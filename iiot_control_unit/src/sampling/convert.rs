//! Scalar conversions for raw ADC values.

use iiot_common::consts::{ADC_FULL_SCALE, ADC_VREF};

/// Convert a raw TMP36 reading to rounded °F.
///
/// The sensor outputs 500 mV at 0 °C with 10 mV/°C slope over a 3.3 V
/// reference:
/// ```text
/// celsius = (raw·3.3/4095 − 0.5) × 100
/// ```
pub fn adc_to_fahrenheit(raw: u16) -> i32 {
    let celsius = (f64::from(raw) * ADC_VREF / f64::from(ADC_FULL_SCALE) - 0.5) * 100.0;
    let fahrenheit = celsius * 9.0 / 5.0 + 32.0;
    fahrenheit.round() as i32
}

/// Linear potentiometer → duty-cycle mapping.
///
/// `duty = a·raw + b` with `a = (duty_max−duty_min)/(adc_max−adc_min)`,
/// `b = duty_min − adc_min·a`, rounded and clamped to ≥ 0.
#[derive(Debug, Clone, Copy)]
pub struct DutyMap {
    a: f64,
    b: f64,
}

impl DutyMap {
    /// Build the mapping from calibration endpoints. The config loader
    /// guarantees `adc_min < adc_max`.
    pub fn new(adc_min: f64, adc_max: f64, duty_min: f64, duty_max: f64) -> Self {
        let a = (duty_max - duty_min) / (adc_max - adc_min);
        let b = duty_min - adc_min * a;
        Self { a, b }
    }

    /// Map one raw reading to a duty setpoint [%].
    #[inline]
    pub fn duty(&self, raw: u16) -> i32 {
        let duty = (self.a * f64::from(raw) + self.b).round() as i32;
        duty.max(0)
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
