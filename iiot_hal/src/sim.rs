//! Simulation board.
//!
//! Software-emulated ADC/PWM/GPIO for development and testing without
//! hardware. All three module fronts share one interior state behind a
//! mutex, so tests can script sensor values, inject faults, and inspect
//! what the control loop actually drove.

use crate::adc::{AdcHandle, AdcModule};
use crate::error::HalError;
use crate::gpio::{GpioHandle, GpioModule, Level};
use crate::pwm::{PwmHandle, PwmModule};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Default)]
struct AdcPinState {
    /// Scripted readings consumed in order; the last value is sticky.
    queue: VecDeque<u16>,
    last: u16,
    fail_request: bool,
    fail_read: bool,
}

#[derive(Debug, Default)]
struct PwmChannelState {
    /// Device node exists (board setup already ran).
    node_present: bool,
    fail_setup: bool,
    open: bool,
    running: bool,
    frequency_hz: u32,
    duty: i32,
    stop_count: u32,
    configure_count: u32,
}

#[derive(Debug, Default)]
struct GpioPinState {
    level: bool,
    write_count: u32,
}

#[derive(Debug, Default)]
struct SimState {
    adc: HashMap<u8, AdcPinState>,
    pwm: HashMap<u8, PwmChannelState>,
    gpio: HashMap<u8, GpioPinState>,
}

/// The simulated board. Cheap to clone the module fronts off of; all
/// fronts observe the same state.
#[derive(Clone, Default)]
pub struct SimBoard {
    state: Arc<Mutex<SimState>>,
}

impl SimBoard {
    /// New board: all PWM device nodes present, all ADC pins reading 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// ADC module front.
    pub fn adc(&self) -> SimAdc {
        SimAdc {
            state: self.state.clone(),
        }
    }

    /// PWM module front.
    pub fn pwm(&self) -> SimPwm {
        SimPwm {
            state: self.state.clone(),
        }
    }

    /// GPIO module front.
    pub fn gpio(&self) -> SimGpio {
        SimGpio {
            state: self.state.clone(),
        }
    }

    // ── Test hooks: scripting ──

    /// Set the sticky reading for a pin.
    pub fn set_adc_value(&self, pin: u8, value: u16) {
        let mut st = self.state.lock();
        let p = st.adc.entry(pin).or_default();
        p.queue.clear();
        p.last = value;
    }

    /// Queue a sequence of readings; after the queue drains the last
    /// value repeats.
    pub fn push_adc_sequence(&self, pin: u8, values: &[u16]) {
        let mut st = self.state.lock();
        let p = st.adc.entry(pin).or_default();
        p.queue.extend(values.iter().copied());
    }

    /// Make `request` fail for a pin.
    pub fn fail_adc_request(&self, pin: u8, fail: bool) {
        self.state.lock().adc.entry(pin).or_default().fail_request = fail;
    }

    /// Make `read` fail for a pin.
    pub fn fail_adc_read(&self, pin: u8, fail: bool) {
        self.state.lock().adc.entry(pin).or_default().fail_read = fail;
    }

    /// Mark a PWM channel's device node missing until `setup` runs.
    pub fn require_pwm_setup(&self, channel: u8) {
        self.state.lock().pwm.entry(channel).or_default().node_present = false;
    }

    /// Make board setup fail for a channel.
    pub fn fail_pwm_setup(&self, channel: u8, fail: bool) {
        self.state.lock().pwm.entry(channel).or_default().fail_setup = fail;
    }

    // ── Test hooks: inspection ──

    /// Last level driven on a GPIO pin, if ever written.
    pub fn gpio_level(&self, pin: u8) -> Option<bool> {
        let st = self.state.lock();
        st.gpio.get(&pin).map(|p| p.level)
    }

    /// Number of writes a GPIO pin has received.
    pub fn gpio_write_count(&self, pin: u8) -> u32 {
        let st = self.state.lock();
        st.gpio.get(&pin).map(|p| p.write_count).unwrap_or(0)
    }

    /// Last configured duty on a PWM channel.
    pub fn pwm_duty(&self, channel: u8) -> Option<i32> {
        let st = self.state.lock();
        st.pwm.get(&channel).filter(|c| c.open).map(|c| c.duty)
    }

    /// Whether a PWM channel is currently running.
    pub fn pwm_running(&self, channel: u8) -> Option<bool> {
        let st = self.state.lock();
        st.pwm.get(&channel).filter(|c| c.open).map(|c| c.running)
    }

    /// Number of stop commands a PWM channel has received.
    pub fn pwm_stop_count(&self, channel: u8) -> u32 {
        let st = self.state.lock();
        st.pwm.get(&channel).map(|c| c.stop_count).unwrap_or(0)
    }

    /// Number of configure commands a PWM channel has received.
    pub fn pwm_configure_count(&self, channel: u8) -> u32 {
        let st = self.state.lock();
        st.pwm.get(&channel).map(|c| c.configure_count).unwrap_or(0)
    }
}

// ─── ADC front ──────────────────────────────────────────────────────

/// Simulated vendor ADC module.
#[derive(Clone)]
pub struct SimAdc {
    state: Arc<Mutex<SimState>>,
}

struct SimAdcHandle {
    state: Arc<Mutex<SimState>>,
    pin: u8,
}

impl AdcModule for SimAdc {
    fn request(&self, pin: u8) -> Result<Box<dyn AdcHandle>, HalError> {
        let mut st = self.state.lock();
        let p = st.adc.entry(pin).or_default();
        if p.fail_request {
            return Err(HalError::RequestFailed {
                peripheral: "adc",
                id: pin,
                reason: "injected request failure".into(),
            });
        }
        Ok(Box::new(SimAdcHandle {
            state: self.state.clone(),
            pin,
        }))
    }
}

impl AdcHandle for SimAdcHandle {
    fn read(&mut self) -> Result<u16, HalError> {
        let mut st = self.state.lock();
        let p = st.adc.entry(self.pin).or_default();
        if p.fail_read {
            return Err(HalError::ReadFailed {
                peripheral: "adc",
                id: self.pin,
                reason: "injected read failure".into(),
            });
        }
        if let Some(v) = p.queue.pop_front() {
            p.last = v;
        }
        Ok(p.last)
    }
}

// ─── PWM front ──────────────────────────────────────────────────────

/// Simulated vendor PWM module.
#[derive(Clone)]
pub struct SimPwm {
    state: Arc<Mutex<SimState>>,
}

struct SimPwmHandle {
    state: Arc<Mutex<SimState>>,
    channel: u8,
}

impl PwmModule for SimPwm {
    fn open(&self, channel: u8) -> Result<Box<dyn PwmHandle>, HalError> {
        let mut st = self.state.lock();
        let c = st.pwm.entry(channel).or_insert_with(|| PwmChannelState {
            node_present: true,
            ..Default::default()
        });
        if !c.node_present {
            return Err(HalError::RequestFailed {
                peripheral: "pwm",
                id: channel,
                reason: "device node missing".into(),
            });
        }
        c.open = true;
        Ok(Box::new(SimPwmHandle {
            state: self.state.clone(),
            channel,
        }))
    }

    fn setup(&self, channel: u8) -> Result<(), HalError> {
        let mut st = self.state.lock();
        let c = st.pwm.entry(channel).or_default();
        if c.fail_setup {
            return Err(HalError::SetupFailed(channel, "injected setup failure".into()));
        }
        c.node_present = true;
        debug!(channel, "sim pwm device node created");
        Ok(())
    }
}

impl PwmHandle for SimPwmHandle {
    fn configure(&mut self, frequency_hz: u32, duty: i32) -> Result<(), HalError> {
        let mut st = self.state.lock();
        let c = st.pwm.entry(self.channel).or_default();
        // The real driver rejects reprogramming a live channel.
        if c.running {
            return Err(HalError::WriteFailed {
                peripheral: "pwm",
                id: self.channel,
                reason: "configure while running".into(),
            });
        }
        c.frequency_hz = frequency_hz;
        c.duty = duty;
        c.configure_count += 1;
        Ok(())
    }

    fn start(&mut self) -> Result<(), HalError> {
        let mut st = self.state.lock();
        st.pwm.entry(self.channel).or_default().running = true;
        Ok(())
    }

    fn stop(&mut self) -> Result<(), HalError> {
        let mut st = self.state.lock();
        let c = st.pwm.entry(self.channel).or_default();
        c.running = false;
        c.stop_count += 1;
        Ok(())
    }
}

impl Drop for SimPwmHandle {
    fn drop(&mut self) {
        let mut st = self.state.lock();
        if let Some(c) = st.pwm.get_mut(&self.channel) {
            c.open = false;
            c.running = false;
        }
    }
}

// ─── GPIO front ─────────────────────────────────────────────────────

/// Simulated vendor GPIO module.
#[derive(Clone)]
pub struct SimGpio {
    state: Arc<Mutex<SimState>>,
}

struct SimGpioHandle {
    state: Arc<Mutex<SimState>>,
    pin: u8,
}

impl GpioModule for SimGpio {
    fn request(&self, pin: u8) -> Result<Box<dyn GpioHandle>, HalError> {
        Ok(Box::new(SimGpioHandle {
            state: self.state.clone(),
            pin,
        }))
    }
}

impl GpioHandle for SimGpioHandle {
    fn write(&mut self, level: Level) -> Result<(), HalError> {
        let mut st = self.state.lock();
        let p = st.gpio.entry(self.pin).or_default();
        p.level = level == Level::High;
        p.write_count += 1;
        Ok(())
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
