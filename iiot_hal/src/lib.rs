//! # IIoT HAL
//!
//! Trait contracts for the vendor peripheral modules (ADC, PWM, GPIO) and a
//! software simulation board implementing all three for development and
//! testing without hardware.
//!
//! The vendor SDK hands out modules through a request/release registry; the
//! traits here mirror that boundary. Handles are RAII: dropping a handle
//! releases the underlying peripheral, so release happens on every exit
//! path including errors.

pub mod adc;
pub mod error;
pub mod gpio;
pub mod pwm;
pub mod sim;

pub use adc::{sample_once, AdcHandle, AdcModule};
pub use error::HalError;
pub use gpio::{write_pin, GpioHandle, GpioModule, Level};
pub use pwm::{PwmHandle, PwmModule, PwmOutput};
pub use sim::SimBoard;
