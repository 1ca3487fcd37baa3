//! IIoT Common Library
//!
//! Shared constants and types for all IIoT workspace crates.
//!
//! # Module Structure
//!
//! - [`consts`] - System-wide constants (pins, thresholds, loop timing)
//! - [`params`] - Runtime control parameters and cloud-driven updates
//! - [`telemetry`] - Outbound telemetry record

pub mod consts;
pub mod params;
pub mod telemetry;
