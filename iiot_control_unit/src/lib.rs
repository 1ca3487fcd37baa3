//! # IIoT Control Unit Library
//!
//! Sensor-read → filter → actuate → report control loop for the IIoT demo
//! board. A fixed 10 ms tick samples three ADC channels (potentiometer,
//! TMP36 temperature, piezo vibration), conditions the signals, runs
//! hysteresis alarms and a vibration-triggered speed override, drives two
//! PWM motors, and reports telemetry to the cloud every 20 ticks.
//!
//! Remote "actions" received over the cloud stream arrive as typed
//! control updates on an `mpsc` queue drained at the top of each tick —
//! the loop thread is the only writer of control state.

pub mod alarm;
pub mod config;
pub mod cycle;
pub mod motor;
pub mod sampling;
