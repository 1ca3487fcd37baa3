//! PWM module contract and the managed output wrapper.
//!
//! The vendor driver cannot reprogram a running channel in place:
//! [`PwmOutput::set_duty`] always stops the output, reconfigures
//! frequency/duty, and restarts it.
//!
//! Opening a channel may require a one-time board setup call when the
//! device node does not exist yet. The original firmware tried that
//! fallback exactly once and gave up; [`PwmOutput::init`] retries the
//! open → setup → reopen sequence up to `PWM_INIT_RETRIES` times before
//! declaring the channel fatal.

use crate::error::HalError;
use iiot_common::consts::PWM_INIT_RETRIES;
use tracing::{debug, warn};

/// An open PWM channel. Dropping the handle closes it.
pub trait PwmHandle: Send {
    /// Program carrier frequency [Hz] and duty cycle [%]. The channel must
    /// be stopped.
    fn configure(&mut self, frequency_hz: u32, duty: i32) -> Result<(), HalError>;

    /// Start the output with the last configured characteristics.
    fn start(&mut self) -> Result<(), HalError>;

    /// Stop the output.
    fn stop(&mut self) -> Result<(), HalError>;
}

/// The vendor PWM module.
pub trait PwmModule: Send {
    /// Open the given channel's device node.
    fn open(&self, channel: u8) -> Result<Box<dyn PwmHandle>, HalError>;

    /// One-time board-level setup creating the device node.
    fn setup(&self, channel: u8) -> Result<(), HalError>;
}

/// A PWM channel held for the process lifetime.
///
/// Acquired once at startup, driven every tick, released by an explicit
/// [`PwmOutput::shutdown`] (or on drop).
pub struct PwmOutput {
    channel: u8,
    frequency_hz: u32,
    last_duty: i32,
    handle: Box<dyn PwmHandle>,
}

impl std::fmt::Debug for PwmOutput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PwmOutput")
            .field("channel", &self.channel)
            .field("frequency_hz", &self.frequency_hz)
            .field("last_duty", &self.last_duty)
            .finish_non_exhaustive()
    }
}

impl PwmOutput {
    /// Open the channel, running board setup and retrying if the device
    /// node is missing.
    pub fn init(
        module: &dyn PwmModule,
        channel: u8,
        frequency_hz: u32,
    ) -> Result<Self, HalError> {
        let mut last_err: Option<HalError> = None;

        for attempt in 1..=PWM_INIT_RETRIES {
            match module.open(channel) {
                Ok(handle) => {
                    debug!(channel, attempt, "pwm channel open");
                    return Ok(Self {
                        channel,
                        frequency_hz,
                        last_duty: 0,
                        handle,
                    });
                }
                Err(e) => {
                    warn!(channel, attempt, "pwm open failed: {e}; running board setup");
                    if let Err(se) = module.setup(channel) {
                        warn!(channel, attempt, "pwm board setup failed: {se}");
                    }
                    last_err = Some(e);
                }
            }
        }

        let reason = last_err
            .map(|e| e.to_string())
            .unwrap_or_else(|| "unknown".into());
        Err(HalError::InitFailed(channel, PWM_INIT_RETRIES, reason))
    }

    /// Channel number.
    #[inline]
    pub fn channel(&self) -> u8 {
        self.channel
    }

    /// Last commanded duty [%].
    #[inline]
    pub fn last_duty(&self) -> i32 {
        self.last_duty
    }

    /// Command a new duty cycle: stop → configure → start.
    pub fn set_duty(&mut self, duty: i32) -> Result<(), HalError> {
        self.handle.stop()?;
        self.handle.configure(self.frequency_hz, duty)?;
        self.handle.start()?;
        self.last_duty = duty;
        Ok(())
    }

    /// Explicit release: zero the output and stop the channel.
    ///
    /// The handle closes when the wrapper drops.
    pub fn shutdown(&mut self) -> Result<(), HalError> {
        self.handle.stop()?;
        self.handle.configure(self.frequency_hz, 0)?;
        debug!(channel = self.channel, "pwm channel shut down");
        Ok(())
    }
}
