//! GPIO module contract.
//!
//! Indicators are driven through the same request-use-release pattern as the
//! ADC: each write acquires the pin, sets the level, and releases.

use crate::error::HalError;

/// Digital output level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    /// Logic low.
    Low,
    /// Logic high.
    High,
}

impl From<bool> for Level {
    fn from(on: bool) -> Self {
        if on { Level::High } else { Level::Low }
    }
}

/// An acquired GPIO pin. Dropping the handle releases the pin.
pub trait GpioHandle: Send {
    /// Drive the pin to the given level.
    fn write(&mut self, level: Level) -> Result<(), HalError>;
}

/// The vendor GPIO module.
pub trait GpioModule: Send {
    /// Request an output handle for the given pin.
    fn request(&self, pin: u8) -> Result<Box<dyn GpioHandle>, HalError>;
}

/// Acquire the pin, drive it, release.
pub fn write_pin(gpio: &dyn GpioModule, pin: u8, level: Level) -> Result<(), HalError> {
    let mut handle = gpio.request(pin)?;
    handle.write(level)
}
