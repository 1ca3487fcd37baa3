//! Cloud transport contract.
//!
//! Mirrors the vendor websocket stream API: open a stream with device
//! credentials, send UTF-8 JSON text, receive payloads through a callback
//! invoked from the transport's own delivery context.

use iiot_common::telemetry::TelemetryMessage;
use parking_lot::Mutex;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// Error types for cloud transport operations.
#[derive(Debug, Clone, Error)]
pub enum CloudError {
    /// Stream could not be opened.
    #[error("failed to open cloud stream: {0}")]
    OpenFailed(String),

    /// No stream is open.
    #[error("cloud stream is not open")]
    StreamNotOpen,

    /// Sending a message failed.
    #[error("failed to send message to cloud: {0}")]
    SendFailed(String),

    /// Outbound message could not be encoded.
    #[error("failed to encode telemetry: {0}")]
    Encode(String),
}

/// Receive callback. Invoked by the transport's delivery context, which
/// must be assumed concurrent with the control loop. `Send` only: the
/// transport owns the callback and never invokes it from two threads at
/// once.
pub type RxCallback = Box<dyn Fn(&str) + Send + 'static>;

/// The external cloud stream.
pub trait CloudTransport: Send + Sync {
    /// Open the stream with device credentials.
    fn open_stream(&self, token: &str, device_id: &str) -> Result<(), CloudError>;

    /// Send a UTF-8 JSON text frame.
    fn send(&self, text: &str) -> Result<(), CloudError>;

    /// Register the receive callback (replaces any previous one).
    fn set_receive_callback(&self, cb: RxCallback) -> Result<(), CloudError>;

    /// Close the stream.
    fn close_stream(&self) -> Result<(), CloudError>;
}

/// Encode and send one telemetry report. Fire-and-forget at the call
/// site; the caller decides whether a failure is worth more than a log
/// line.
pub fn send_telemetry(
    transport: &dyn CloudTransport,
    msg: &TelemetryMessage,
) -> Result<(), CloudError> {
    let text = msg.to_json().map_err(|e| CloudError::Encode(e.to_string()))?;
    debug!(%text, "telemetry out");
    transport.send(&text)
}

// ─── Loopback transport ─────────────────────────────────────────────

#[derive(Default)]
struct LoopbackState {
    open: bool,
    sent: Vec<String>,
    rx: Option<RxCallback>,
}

/// In-process transport for tests and local development. Outbound frames
/// are recorded; [`LoopbackTransport::inject`] plays an inbound payload
/// through the registered callback, standing in for the vendor delivery
/// thread.
#[derive(Clone, Default)]
pub struct LoopbackTransport {
    state: Arc<Mutex<LoopbackState>>,
}

impl LoopbackTransport {
    /// New closed transport.
    pub fn new() -> Self {
        Self::default()
    }

    /// Frames sent so far.
    pub fn sent(&self) -> Vec<String> {
        self.state.lock().sent.clone()
    }

    /// Deliver an inbound payload to the registered callback.
    ///
    /// The callback runs on the caller's thread, exactly like the vendor
    /// transport runs it on its delivery thread.
    pub fn inject(&self, payload: &str) {
        // Take the callback out of the lock before invoking it so the
        // callback may call back into the transport.
        let cb = {
            let mut st = self.state.lock();
            st.rx.take()
        };
        if let Some(cb) = cb {
            cb(payload);
            self.state.lock().rx = Some(cb);
        }
    }
}

impl CloudTransport for LoopbackTransport {
    fn open_stream(&self, _token: &str, _device_id: &str) -> Result<(), CloudError> {
        self.state.lock().open = true;
        Ok(())
    }

    fn send(&self, text: &str) -> Result<(), CloudError> {
        let mut st = self.state.lock();
        if !st.open {
            return Err(CloudError::StreamNotOpen);
        }
        st.sent.push(text.to_owned());
        Ok(())
    }

    fn set_receive_callback(&self, cb: RxCallback) -> Result<(), CloudError> {
        self.state.lock().rx = Some(cb);
        Ok(())
    }

    fn close_stream(&self) -> Result<(), CloudError> {
        let mut st = self.state.lock();
        st.open = false;
        st.rx = None;
        Ok(())
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
