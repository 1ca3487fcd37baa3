//! Per-tick sensor acquisition.
//!
//! One `SensorReader` owns the conversion state for all three channels.
//! Each read acquires the ADC pin, takes one conversion, and releases the
//! pin before returning, so a failed channel never wedges the others.

use iiot_hal::adc::{sample_once, AdcModule};
use iiot_hal::error::HalError;

use crate::config::AdcConfig;
use crate::sampling::convert::{adc_to_fahrenheit, DutyMap};
use crate::sampling::vibration::VibrationFilter;

pub struct SensorReader {
    adc: Box<dyn AdcModule>,
    pins: Pins,
    duty_map: DutyMap,
    vibration: VibrationFilter,
}

struct Pins {
    potentiometer: u8,
    temperature: u8,
    vibration: u8,
}

impl SensorReader {
    pub fn new(adc: Box<dyn AdcModule>, cfg: &AdcConfig) -> Self {
        Self {
            adc,
            pins: Pins {
                potentiometer: cfg.potentiometer_pin,
                temperature: cfg.temperature_pin,
                vibration: cfg.vibration_pin,
            },
            duty_map: DutyMap::new(cfg.adc_min, cfg.adc_max, cfg.duty_min, cfg.duty_max),
            vibration: VibrationFilter::new(),
        }
    }

    /// Sample the potentiometer and map it to a duty setpoint [%].
    pub fn read_duty_setpoint(&mut self) -> Result<i32, HalError> {
        let raw = sample_once(self.adc.as_ref(), self.pins.potentiometer)?;
        Ok(self.duty_map.duty(raw))
    }

    /// Sample the TMP36 and convert to rounded °F.
    pub fn read_temperature(&mut self) -> Result<i32, HalError> {
        let raw = sample_once(self.adc.as_ref(), self.pins.temperature)?;
        Ok(adc_to_fahrenheit(raw))
    }

    /// Sample the piezo and advance the vibration filter.
    ///
    /// The returned value is the unnormalized window sum; the cycle
    /// scales it by the reporting factor before any consumer sees it.
    pub fn read_vibration(&mut self) -> Result<i32, HalError> {
        let raw = sample_once(self.adc.as_ref(), self.pins.vibration)?;
        Ok(self.vibration.update(raw))
    }
}
