//! ADC sampling & signal conditioning.
//!
//! Raw 12-bit conversions in, derived readings out: duty-cycle setpoint
//! (potentiometer), °F (TMP36), smoothed vibration magnitude (piezo).

pub mod convert;
pub mod reader;
pub mod vibration;
