//! Outbound telemetry record.
//!
//! One flat JSON object per report: `{"speed":s,"temperature":t,"vibration":v}`.
//! The cloud side keys on these exact field names.

use serde::{Deserialize, Serialize};

/// Snapshot handed to the cloud transport every reporting interval.
///
/// Write-once, fire-and-forget; no acknowledgement is tracked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelemetryMessage {
    /// Commanded duty of the previous tick (pre-override target).
    pub speed: i32,
    /// Temperature [°F], rounded.
    pub temperature: i32,
    /// Normalized vibration report, clamped to `0..=VIBRATION_MAX`.
    pub vibration: i32,
}

impl TelemetryMessage {
    /// Serialize to the wire format.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
