//! Error types for peripheral operations.

use thiserror::Error;

/// Error types for HAL operations.
#[derive(Debug, Clone, Error)]
pub enum HalError {
    /// Peripheral module is not available from the registry.
    #[error("{0} module is not available")]
    ModuleUnavailable(&'static str),

    /// Requesting a pin/channel handle failed.
    #[error("failed to request {peripheral} {id}: {reason}")]
    RequestFailed {
        /// Peripheral kind ("adc", "pwm", "gpio").
        peripheral: &'static str,
        /// Pin or channel number.
        id: u8,
        /// Driver-reported reason.
        reason: String,
    },

    /// Reading a value from an acquired handle failed.
    #[error("failed to read {peripheral} {id}: {reason}")]
    ReadFailed {
        /// Peripheral kind.
        peripheral: &'static str,
        /// Pin or channel number.
        id: u8,
        /// Driver-reported reason.
        reason: String,
    },

    /// Writing to an acquired handle failed.
    #[error("failed to write {peripheral} {id}: {reason}")]
    WriteFailed {
        /// Peripheral kind.
        peripheral: &'static str,
        /// Pin or channel number.
        id: u8,
        /// Driver-reported reason.
        reason: String,
    },

    /// One-time board setup for a device node failed.
    #[error("board setup for pwm {0} failed: {1}")]
    SetupFailed(u8, String),

    /// Initialization exhausted its retry budget; channel is unusable.
    #[error("pwm {0} initialization failed after {1} attempts: {2}")]
    InitFailed(u8, u32, String),
}
