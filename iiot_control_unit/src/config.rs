//! TOML configuration loader with validation.
//!
//! Every section is optional; missing fields fall back to the demo-board
//! defaults from `iiot_common::consts`. Validation runs after parse:
//! parameter bounds, pin/channel uniqueness, and hysteresis sanity.

use iiot_common::consts::{
    CLOUD_UPDATE_INTERVAL, DEFAULT_VIBRATION_FACTOR, DEFAULT_VIBRATION_THRESHOLD, LED_TEMPERATURE,
    LED_VIBRATION, MOTOR_DC_LIMIT, POTENTIOMETER_PIN, PWM_FREQUENCY_HZ, PWM_MOTOR_CHANNEL,
    PWM_WINDMILL_CHANNEL, SPEED_CONTROL_DURATION, TEMP_ALARM_MARGIN, TEMP_ALARM_THRESHOLD,
    TEMP_SENSOR_PIN, TICK_PERIOD_US, VIB_ALARM_MARGIN, VIB_ALARM_THRESHOLD, VIB_SENSOR_PIN,
    WINDMILL_DUTY_ON,
};
use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

// ─── Error Type ─────────────────────────────────────────────────────

/// Configuration loading/validation error.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File I/O error.
    #[error("config I/O error: {0}")]
    Io(String),
    /// TOML parse error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Parameter validation error.
    #[error("config validation: {0}")]
    Validation(String),
}

// ─── Sections ───────────────────────────────────────────────────────

/// `[timing]` — loop cadence.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TimingConfig {
    /// Tick period [µs].
    pub tick_period_us: u64,
    /// Telemetry cadence [ticks].
    pub telemetry_interval: u64,
    /// Speed-override hold duration [ticks].
    pub hold_duration: u32,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            tick_period_us: TICK_PERIOD_US,
            telemetry_interval: CLOUD_UPDATE_INTERVAL,
            hold_duration: SPEED_CONTROL_DURATION,
        }
    }
}

/// `[adc]` — sensor pins and the potentiometer→duty mapping range.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AdcConfig {
    /// Potentiometer ADC pin.
    pub potentiometer_pin: u8,
    /// TMP36 ADC pin.
    pub temperature_pin: u8,
    /// Piezo ADC pin.
    pub vibration_pin: u8,
    /// Raw value mapping to `duty_min`.
    pub adc_min: f64,
    /// Raw value mapping to `duty_max`.
    pub adc_max: f64,
    /// Duty at `adc_min` [%].
    pub duty_min: f64,
    /// Duty at `adc_max` [%].
    pub duty_max: f64,
}

impl Default for AdcConfig {
    fn default() -> Self {
        Self {
            potentiometer_pin: POTENTIOMETER_PIN,
            temperature_pin: TEMP_SENSOR_PIN,
            vibration_pin: VIB_SENSOR_PIN,
            adc_min: 640.0,
            adc_max: 3200.0,
            duty_min: 0.0,
            duty_max: 100.0,
        }
    }
}

/// `[pwm]` — actuation channels.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PwmConfig {
    /// Primary motor channel.
    pub motor_channel: u8,
    /// Windmill channel.
    pub windmill_channel: u8,
    /// Carrier frequency [Hz].
    pub frequency_hz: u32,
    /// Duty ceiling while the override holds [%].
    pub motor_duty_limit: i32,
    /// Windmill duty while engaged [%].
    pub windmill_duty: i32,
}

impl Default for PwmConfig {
    fn default() -> Self {
        Self {
            motor_channel: PWM_MOTOR_CHANNEL,
            windmill_channel: PWM_WINDMILL_CHANNEL,
            frequency_hz: PWM_FREQUENCY_HZ,
            motor_duty_limit: MOTOR_DC_LIMIT,
            windmill_duty: WINDMILL_DUTY_ON,
        }
    }
}

/// `[gpio]` — indicator pins.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GpioConfig {
    /// Red LED (temperature alarm).
    pub temperature_led: u8,
    /// Blue LED (vibration alarm).
    pub vibration_led: u8,
}

impl Default for GpioConfig {
    fn default() -> Self {
        Self {
            temperature_led: LED_TEMPERATURE,
            vibration_led: LED_VIBRATION,
        }
    }
}

/// `[alarms]` — hysteresis thresholds.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AlarmConfig {
    /// Temperature alarm threshold [°F].
    pub temperature_threshold: i32,
    /// Temperature hysteresis margin [°F].
    pub temperature_margin: i32,
    /// Vibration alarm threshold (filtered units).
    pub vibration_threshold: i32,
    /// Vibration hysteresis margin.
    pub vibration_margin: i32,
}

impl Default for AlarmConfig {
    fn default() -> Self {
        Self {
            temperature_threshold: TEMP_ALARM_THRESHOLD,
            temperature_margin: TEMP_ALARM_MARGIN,
            vibration_threshold: VIB_ALARM_THRESHOLD,
            vibration_margin: VIB_ALARM_MARGIN,
        }
    }
}

/// `[control]` — initial cloud-adjustable parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ControlConfig {
    /// Normalized vibration level engaging the speed override.
    pub vibration_threshold: i32,
    /// Vibration reporting/normalization factor.
    pub vibration_factor: f64,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            vibration_threshold: DEFAULT_VIBRATION_THRESHOLD,
            vibration_factor: DEFAULT_VIBRATION_FACTOR,
        }
    }
}

/// `[cloud]` — stream credentials.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CloudConfig {
    /// Open the cloud stream at startup.
    pub enabled: bool,
    /// Device identifier.
    pub device_id: String,
    /// Device token.
    pub device_token: String,
}

/// Complete validated configuration, ready for runtime use.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ControlUnitConfig {
    pub timing: TimingConfig,
    pub adc: AdcConfig,
    pub pwm: PwmConfig,
    pub gpio: GpioConfig,
    pub alarms: AlarmConfig,
    pub control: ControlConfig,
    pub cloud: CloudConfig,
}

// ─── Loading ────────────────────────────────────────────────────────

/// Load and validate the configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<ControlUnitConfig, ConfigError> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::Io(format!("failed to read {}: {e}", path.display())))?;
    load_config_from_str(&text)
}

/// Load config from a TOML string (also used by tests).
pub fn load_config_from_str(text: &str) -> Result<ControlUnitConfig, ConfigError> {
    let config: ControlUnitConfig =
        toml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
    config.validate()?;
    Ok(config)
}

impl ControlUnitConfig {
    /// Run all validation rules.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timing.tick_period_us == 0 {
            return Err(ConfigError::Validation("tick_period_us must be > 0".into()));
        }
        if self.timing.telemetry_interval == 0 {
            return Err(ConfigError::Validation(
                "telemetry_interval must be > 0".into(),
            ));
        }
        if self.adc.adc_min >= self.adc.adc_max {
            return Err(ConfigError::Validation(format!(
                "adc_min {} must be below adc_max {}",
                self.adc.adc_min, self.adc.adc_max
            )));
        }
        if self.adc.duty_min >= self.adc.duty_max {
            return Err(ConfigError::Validation(format!(
                "duty_min {} must be below duty_max {}",
                self.adc.duty_min, self.adc.duty_max
            )));
        }
        if !(0.0..=100.0).contains(&self.adc.duty_min)
            || !(0.0..=100.0).contains(&self.adc.duty_max)
        {
            return Err(ConfigError::Validation(
                "duty range must lie within [0, 100]".into(),
            ));
        }
        let pins = [
            self.adc.potentiometer_pin,
            self.adc.temperature_pin,
            self.adc.vibration_pin,
        ];
        if pins[0] == pins[1] || pins[1] == pins[2] || pins[0] == pins[2] {
            return Err(ConfigError::Validation("sensor pins must be distinct".into()));
        }
        if self.pwm.motor_channel == self.pwm.windmill_channel {
            return Err(ConfigError::Validation(
                "motor and windmill must use distinct pwm channels".into(),
            ));
        }
        if !(1..=100).contains(&self.pwm.motor_duty_limit) {
            return Err(ConfigError::Validation(format!(
                "motor_duty_limit {} out of range [1, 100]",
                self.pwm.motor_duty_limit
            )));
        }
        if !(0..=100).contains(&self.pwm.windmill_duty) {
            return Err(ConfigError::Validation(format!(
                "windmill_duty {} out of range [0, 100]",
                self.pwm.windmill_duty
            )));
        }
        if self.pwm.frequency_hz == 0 {
            return Err(ConfigError::Validation("frequency_hz must be > 0".into()));
        }
        for (name, threshold, margin) in [
            (
                "temperature",
                self.alarms.temperature_threshold,
                self.alarms.temperature_margin,
            ),
            (
                "vibration",
                self.alarms.vibration_threshold,
                self.alarms.vibration_margin,
            ),
        ] {
            if margin <= 0 {
                return Err(ConfigError::Validation(format!(
                    "{name} alarm margin must be > 0"
                )));
            }
            if margin >= threshold {
                return Err(ConfigError::Validation(format!(
                    "{name} alarm margin {margin} must be below threshold {threshold}"
                )));
            }
        }
        if self.control.vibration_factor <= 0.0 {
            return Err(ConfigError::Validation(
                "vibration_factor must be > 0".into(),
            ));
        }
        if self.cloud.enabled && (self.cloud.device_id.is_empty() || self.cloud.device_token.is_empty())
        {
            return Err(ConfigError::Validation(
                "cloud.enabled requires device_id and device_token".into(),
            ));
        }
        Ok(())
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
