//! ADC module contract.
//!
//! The vendor ADC is acquired and released per sample — expensive, but no
//! handle ever leaks across a failed read. [`sample_once`] captures that
//! request-use-release pattern; the release is the handle drop, so it runs
//! on the error path too.

use crate::error::HalError;

/// An acquired ADC pin. Dropping the handle releases the pin.
pub trait AdcHandle: Send {
    /// Read one raw conversion result (12-bit, 0..=4095).
    fn read(&mut self) -> Result<u16, HalError>;
}

/// The vendor ADC module.
pub trait AdcModule: Send {
    /// Request a handle for the given pin.
    fn request(&self, pin: u8) -> Result<Box<dyn AdcHandle>, HalError>;
}

/// Acquire the pin, read one raw value, release.
pub fn sample_once(adc: &dyn AdcModule, pin: u8) -> Result<u16, HalError> {
    let mut handle = adc.request(pin)?;
    handle.read()
    // handle drops here → pin released
}
