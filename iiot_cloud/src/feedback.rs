//! Feedback channel: transport RX → control-update queue.
//!
//! The original firmware's receive callback mutated two plain globals with
//! no synchronization. Here the callback only parses and forwards: every
//! recognized action becomes a [`ControlUpdate`] on an `mpsc` queue the
//! control loop drains at the top of each tick. The parser side never
//! touches control state.

use crate::actions::{parse_inbound, Inbound};
use crate::transport::{CloudError, CloudTransport};
use iiot_common::params::ControlUpdate;
use std::sync::mpsc::Sender;
use tracing::{error, warn};

/// Wires a transport's receive side to the control loop's update queue.
pub struct FeedbackChannel;

impl FeedbackChannel {
    /// Register the parsing callback on the transport.
    ///
    /// The callback runs in the transport's delivery context. A 404 error
    /// envelope means the device record is gone; re-onboarding is outside
    /// this core, so it is surfaced as an error log and the stream is left
    /// to the supervisor.
    pub fn attach(
        transport: &dyn CloudTransport,
        updates: Sender<ControlUpdate>,
    ) -> Result<(), CloudError> {
        transport.set_receive_callback(Box::new(move |payload| {
            match parse_inbound(payload) {
                Inbound::Actions(parsed) => {
                    for update in parsed {
                        if updates.send(update).is_err() {
                            // Control loop is gone; nothing left to update.
                            warn!("control-update queue closed; dropping {update:?}");
                        }
                    }
                }
                Inbound::Error { code: 404, message } => {
                    error!(%message, "device deleted upstream; re-onboarding required");
                }
                Inbound::Error { code, message } => {
                    error!(code, %message, "cloud stream error");
                }
                Inbound::Ignored => {}
            }
        }))
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
