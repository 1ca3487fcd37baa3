//! System-wide constants for the IIoT workspace.
//!
//! Single source of truth for pin assignments, loop timing, and control
//! limits. Imported by all crates — no duplication permitted.
//! Values match the ARTIK053 demo board wiring.

use static_assertions::const_assert;

// ─── ADC front end ──────────────────────────────────────────────────

/// Full-scale value of the 12-bit ADC.
pub const ADC_FULL_SCALE: u16 = 4095;

/// ADC reference voltage [V].
pub const ADC_VREF: f64 = 3.3;

/// Potentiometer (speed setpoint) ADC pin.
pub const POTENTIOMETER_PIN: u8 = 0;

/// TMP36 temperature sensor ADC pin.
pub const TEMP_SENSOR_PIN: u8 = 1;

/// Piezo vibration sensor ADC pin.
pub const VIB_SENSOR_PIN: u8 = 3;

/// Vibration moving-window length [samples].
pub const WINDOW_SIZE: usize = 50;

// ─── Indicators (GPIO) ──────────────────────────────────────────────

/// Blue LED (vibration alarm), XGPIO20.
pub const LED_VIBRATION: u8 = 49;

/// Red LED (temperature alarm), XGPIO16.
pub const LED_TEMPERATURE: u8 = 45;

// ─── Actuation (PWM) ────────────────────────────────────────────────

/// Primary motor PWM channel.
pub const PWM_MOTOR_CHANNEL: u8 = 0;

/// Secondary ("windmill") motor PWM channel.
pub const PWM_WINDMILL_CHANNEL: u8 = 1;

/// PWM carrier frequency [Hz] for both motors.
pub const PWM_FREQUENCY_HZ: u32 = 60;

/// Duty ceiling applied while the vibration override holds.
pub const MOTOR_DC_LIMIT: i32 = 22;

/// Windmill duty while engaged.
pub const WINDMILL_DUTY_ON: i32 = 9;

/// Attempts at open → board setup → reopen before a PWM channel is fatal.
pub const PWM_INIT_RETRIES: u32 = 3;

// ─── Control loop ───────────────────────────────────────────────────

/// Tick period [µs] (100 Hz sampling).
pub const TICK_PERIOD_US: u64 = 10_000;

/// Telemetry cadence [ticks].
pub const CLOUD_UPDATE_INTERVAL: u64 = 20;

/// Ticks the speed override persists after its trigger clears.
pub const SPEED_CONTROL_DURATION: u32 = 100;

/// Upper bound on the normalized vibration report.
pub const VIBRATION_MAX: i32 = 100;

// ─── Control parameters (cloud-adjustable defaults) ─────────────────

/// Default vibration threshold engaging the speed override.
pub const DEFAULT_VIBRATION_THRESHOLD: i32 = 75;

/// Default vibration reporting/normalization factor.
pub const DEFAULT_VIBRATION_FACTOR: f64 = 0.8;

// ─── Alarm thresholds ───────────────────────────────────────────────

/// Temperature alarm threshold [°F].
pub const TEMP_ALARM_THRESHOLD: i32 = 78;

/// Temperature alarm hysteresis margin [°F].
pub const TEMP_ALARM_MARGIN: i32 = 5;

/// Vibration alarm threshold (filtered units).
pub const VIB_ALARM_THRESHOLD: i32 = 60;

/// Vibration alarm hysteresis margin.
pub const VIB_ALARM_MARGIN: i32 = 20;

// ─── Paths ──────────────────────────────────────────────────────────

/// Default configuration file path.
pub const DEFAULT_CONFIG_PATH: &str = "config/iiot.toml";

const_assert!(WINDOW_SIZE > 0);
const_assert!(MOTOR_DC_LIMIT > 0 && MOTOR_DC_LIMIT <= 100);
const_assert!(WINDMILL_DUTY_ON <= MOTOR_DC_LIMIT);
const_assert!(TEMP_ALARM_MARGIN > 0 && VIB_ALARM_MARGIN > 0);
