//! Inbound envelope parsing.
//!
//! The cloud pushes UTF-8 JSON frames down the stream. Two shapes matter:
//!
//! - `{"error":{"code":404,"message":"..."}}` — stream-level error; 404
//!   means the device record was deleted and the caller must escalate to
//!   re-onboarding.
//! - `{"type":"action","data":{"actions":[{"name":"...","parameters":{...}}]}}`
//!   — remote control actions.
//!
//! Everything else — unparseable payloads, unknown types, unrecognized
//! action names, actions with missing parameters — is logged and ignored.
//! Malformed remote input never mutates control state.

use iiot_common::params::ControlUpdate;
use serde_json::Value;
use tracing::{debug, warn};

/// Action name adjusting the vibration override threshold.
const ACTION_SET_THRESHOLD: &str = "setThresholdVibration";

/// Action name adjusting the vibration reporting factor.
const ACTION_SET_FACTOR: &str = "setVibrationReportingFactor";

/// Parsed inbound payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// Recognized control updates, in envelope order. May be empty when
    /// the envelope was a valid action frame containing only unrecognized
    /// actions.
    Actions(Vec<ControlUpdate>),
    /// Stream-level error envelope.
    Error {
        /// Error code (404 = device deleted, requires re-onboarding).
        code: i64,
        /// Human-readable message.
        message: String,
    },
    /// Payload carried nothing actionable.
    Ignored,
}

/// Parse one inbound payload.
pub fn parse_inbound(payload: &str) -> Inbound {
    let msg: Value = match serde_json::from_str(payload) {
        Ok(v) => v,
        Err(e) => {
            warn!("unparseable cloud payload ({e}); ignoring");
            return Inbound::Ignored;
        }
    };

    if let Some(error) = msg.get("error").filter(|e| e.is_object()) {
        let code = error.get("code").and_then(Value::as_i64).unwrap_or(0);
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_owned();
        warn!(code, %message, "cloud stream error envelope");
        return Inbound::Error { code, message };
    }

    match msg.get("type").and_then(Value::as_str) {
        Some("action") => {}
        other => {
            debug!(?other, "not an action envelope; ignoring");
            return Inbound::Ignored;
        }
    }

    let Some(actions) = msg
        .get("data")
        .and_then(|d| d.get("actions"))
        .and_then(Value::as_array)
    else {
        warn!("action envelope without data.actions[]; ignoring");
        return Inbound::Ignored;
    };

    let mut updates = Vec::new();
    for action in actions {
        let Some(name) = action.get("name").and_then(Value::as_str) else {
            continue;
        };
        let parameters = action.get("parameters").filter(|p| p.is_object());

        match name {
            ACTION_SET_THRESHOLD => {
                let Some(v) = parameters
                    .and_then(|p| p.get("vibrationThreshold"))
                    .and_then(Value::as_i64)
                else {
                    warn!("{ACTION_SET_THRESHOLD} without vibrationThreshold; skipping");
                    continue;
                };
                debug!(threshold = v, "cloud action: set vibration threshold");
                updates.push(ControlUpdate::VibrationThreshold(v as i32));
            }
            ACTION_SET_FACTOR => {
                let Some(f) = parameters
                    .and_then(|p| p.get("vibrationFactor"))
                    .and_then(Value::as_f64)
                else {
                    warn!("{ACTION_SET_FACTOR} without vibrationFactor; skipping");
                    continue;
                };
                debug!(factor = f, "cloud action: set vibration factor");
                updates.push(ControlUpdate::VibrationFactor(f));
            }
            other => {
                warn!(action = other, "unrecognized cloud action; skipping");
            }
        }
    }

    Inbound::Actions(updates)
}

// ─── Tests ──────────────────────────────────────────────────────────
