//! Deterministic control tick: sample → decide → actuate → report.
//!
//! The loop runs at a fixed 10 ms period. Each tick drains pending cloud
//! parameter updates, samples the three ADC channels, runs the hysteresis
//! alarms and the motor governor, drives the PWM outputs, and every
//! `telemetry_interval` ticks sends one telemetry report.
//!
//! ## RT setup sequence
//! 1. Pre-allocate all runtime state (zero heap in the loop).
//! 2. `mlockall(MCL_CURRENT | MCL_FUTURE)` — lock all pages.
//! 3. Prefault stack pages.
//! 4. `sched_setaffinity` — pin to an isolated core.
//! 5. `sched_setscheduler(SCHED_FIFO)` — RT priority.
//!
//! ## Pacing
//! With the `rt` feature the loop sleeps on absolute `CLOCK_MONOTONIC`
//! deadlines via `clock_nanosleep(TIMER_ABSTIME)` for drift-free pacing;
//! without it, `std::thread::sleep` approximates the period. An overrun
//! is counted and logged, never fatal: a late sensor tick beats a dead
//! motor controller.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Receiver;

use bitflags::bitflags;
use thiserror::Error;
use tracing::{debug, info, warn};

use iiot_cloud::transport::{send_telemetry, CloudTransport};
use iiot_common::consts::VIBRATION_MAX;
use iiot_common::params::{ControlParams, ControlUpdate};
use iiot_common::telemetry::TelemetryMessage;
use iiot_hal::adc::AdcModule;
use iiot_hal::error::HalError;
use iiot_hal::gpio::GpioModule;
use iiot_hal::pwm::{PwmModule, PwmOutput};

use crate::alarm::AlarmIndicator;
use crate::config::ControlUnitConfig;
use crate::motor::MotorController;
use crate::sampling::reader::SensorReader;

// ─── Tick Faults ────────────────────────────────────────────────────

bitflags! {
    /// Non-fatal faults observed during one tick.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct TickFaults: u8 {
        const ADC_POTENTIOMETER = 1 << 0;
        const ADC_TEMPERATURE   = 1 << 1;
        const ADC_VIBRATION     = 1 << 2;
        const PWM_MOTOR         = 1 << 3;
        const PWM_WINDMILL      = 1 << 4;
        const TELEMETRY         = 1 << 5;
    }
}

// ─── Cycle Statistics ───────────────────────────────────────────────

/// O(1) per-tick timing statistics, updated with no allocation.
#[derive(Debug, Clone)]
pub struct CycleStats {
    /// Total ticks executed.
    pub tick_count: u64,
    /// Last tick duration [ns].
    pub last_tick_ns: i64,
    /// Minimum tick duration [ns].
    pub min_tick_ns: i64,
    /// Maximum tick duration [ns].
    pub max_tick_ns: i64,
    /// Running sum for average computation.
    pub sum_tick_ns: i64,
    /// Number of period overruns.
    pub overruns: u64,
    /// Maximum wake-up latency [ns].
    pub max_latency_ns: i64,
    /// Ticks that reported at least one fault.
    pub faulted_ticks: u64,
}

impl CycleStats {
    pub const fn new() -> Self {
        Self {
            tick_count: 0,
            last_tick_ns: 0,
            min_tick_ns: i64::MAX,
            max_tick_ns: 0,
            sum_tick_ns: 0,
            overruns: 0,
            max_latency_ns: 0,
            faulted_ticks: 0,
        }
    }

    /// Record one tick. O(1), no allocation.
    #[inline]
    pub fn record(&mut self, duration_ns: i64, latency_ns: i64) {
        self.tick_count += 1;
        self.last_tick_ns = duration_ns;
        if duration_ns < self.min_tick_ns {
            self.min_tick_ns = duration_ns;
        }
        if duration_ns > self.max_tick_ns {
            self.max_tick_ns = duration_ns;
        }
        self.sum_tick_ns += duration_ns;
        if latency_ns > self.max_latency_ns {
            self.max_latency_ns = latency_ns;
        }
    }

    /// Average tick time [ns] (0 before the first tick).
    #[inline]
    pub fn avg_tick_ns(&self) -> i64 {
        if self.tick_count == 0 {
            0
        } else {
            self.sum_tick_ns / self.tick_count as i64
        }
    }
}

impl Default for CycleStats {
    fn default() -> Self {
        Self::new()
    }
}

// ─── Errors ─────────────────────────────────────────────────────────

/// Fatal loop errors. Per-tick sensor and actuator faults are handled
/// in place and surface as [`TickFaults`], not here.
#[derive(Debug, Error)]
pub enum CycleError {
    /// A PWM channel could not be brought up at startup.
    #[error("actuator init: {0}")]
    ActuatorInit(#[from] HalError),
    /// RT system call failed.
    #[error("rt setup: {0}")]
    RtSetup(String),
}

// ─── RT Setup ───────────────────────────────────────────────────────

#[cfg(feature = "rt")]
fn rt_mlockall() -> Result<(), CycleError> {
    use nix::sys::mman::{mlockall, MlockAllFlags};
    mlockall(MlockAllFlags::MCL_CURRENT | MlockAllFlags::MCL_FUTURE)
        .map_err(|e| CycleError::RtSetup(format!("mlockall failed: {e}")))?;
    Ok(())
}

#[cfg(not(feature = "rt"))]
fn rt_mlockall() -> Result<(), CycleError> {
    Ok(())
}

/// Touch a large stack allocation to force page allocation up front.
fn prefault_stack() {
    let mut buf = [0u8; 256 * 1024];
    for byte in buf.iter_mut() {
        unsafe { core::ptr::write_volatile(byte, 0xFF) };
    }
    core::hint::black_box(&buf);
}

#[cfg(feature = "rt")]
fn rt_set_affinity(cpu: usize) -> Result<(), CycleError> {
    use nix::sched::{sched_setaffinity, CpuSet};
    use nix::unistd::Pid;

    let mut cpuset = CpuSet::new();
    cpuset
        .set(cpu)
        .map_err(|e| CycleError::RtSetup(format!("CpuSet::set({cpu}) failed: {e}")))?;
    sched_setaffinity(Pid::from_raw(0), &cpuset)
        .map_err(|e| CycleError::RtSetup(format!("sched_setaffinity failed: {e}")))?;
    Ok(())
}

#[cfg(not(feature = "rt"))]
fn rt_set_affinity(_cpu: usize) -> Result<(), CycleError> {
    Ok(())
}

#[cfg(feature = "rt")]
fn rt_set_scheduler(priority: i32) -> Result<(), CycleError> {
    let param = libc::sched_param {
        sched_priority: priority,
    };
    let ret = unsafe { libc::sched_setscheduler(0, libc::SCHED_FIFO, &param) };
    if ret != 0 {
        let err = std::io::Error::last_os_error();
        return Err(CycleError::RtSetup(format!(
            "sched_setscheduler(SCHED_FIFO, {priority}) failed: {err}"
        )));
    }
    Ok(())
}

#[cfg(not(feature = "rt"))]
fn rt_set_scheduler(_priority: i32) -> Result<(), CycleError> {
    Ok(())
}

/// Full RT setup sequence. Call before entering the loop.
///
/// Without the `rt` feature every RT syscall is a no-op; the stack
/// prefault still runs.
pub fn rt_setup(cpu_core: usize, rt_priority: i32) -> Result<(), CycleError> {
    rt_mlockall()?;
    prefault_stack();
    rt_set_affinity(cpu_core)?;
    rt_set_scheduler(rt_priority)?;
    Ok(())
}

// ─── Cycle Runner ───────────────────────────────────────────────────

/// The control loop. Owns the sensors, actuators, alarms, control
/// parameters, and the cloud transport; [`CycleRunner::run`] paces
/// [`CycleRunner::tick`] until the shutdown flag is raised.
pub struct CycleRunner {
    reader: SensorReader,
    gpio: Box<dyn GpioModule>,
    motor_out: PwmOutput,
    windmill_out: PwmOutput,
    motor: MotorController,
    temp_alarm: AlarmIndicator,
    vib_alarm: AlarmIndicator,
    cloud: Option<Box<dyn CloudTransport>>,
    updates: Receiver<ControlUpdate>,
    params: ControlParams,
    windmill_duty: i32,
    tick_period_ns: i64,
    telemetry_interval: u64,
    ticks_since_report: u64,
    /// Previous tick's pre-override duty setpoint, reported as `speed`.
    reported_duty: i32,
    last_setpoint: i32,
    last_temperature: i32,
    last_vibration: i32,
    stats: CycleStats,
}

impl CycleRunner {
    /// Bring up both PWM channels (parked at duty 0) and pre-allocate
    /// all loop state.
    pub fn new(
        config: &ControlUnitConfig,
        adc: Box<dyn AdcModule>,
        pwm: &dyn PwmModule,
        gpio: Box<dyn GpioModule>,
        cloud: Option<Box<dyn CloudTransport>>,
        updates: Receiver<ControlUpdate>,
    ) -> Result<Self, CycleError> {
        let mut motor_out =
            PwmOutput::init(pwm, config.pwm.motor_channel, config.pwm.frequency_hz)?;
        let mut windmill_out =
            PwmOutput::init(pwm, config.pwm.windmill_channel, config.pwm.frequency_hz)?;
        motor_out.set_duty(0)?;
        windmill_out.set_duty(0)?;

        Ok(Self {
            reader: SensorReader::new(adc, &config.adc),
            gpio,
            motor_out,
            windmill_out,
            motor: MotorController::new(config.pwm.motor_duty_limit, config.timing.hold_duration),
            temp_alarm: AlarmIndicator::new(
                "temperature",
                config.alarms.temperature_threshold,
                config.alarms.temperature_margin,
                config.gpio.temperature_led,
            ),
            vib_alarm: AlarmIndicator::new(
                "vibration",
                config.alarms.vibration_threshold,
                config.alarms.vibration_margin,
                config.gpio.vibration_led,
            ),
            cloud,
            updates,
            params: ControlParams {
                vibration_threshold: config.control.vibration_threshold,
                vibration_factor: config.control.vibration_factor,
            },
            windmill_duty: config.pwm.windmill_duty,
            tick_period_ns: config.timing.tick_period_us as i64 * 1_000,
            telemetry_interval: config.timing.telemetry_interval,
            ticks_since_report: 0,
            reported_duty: 0,
            last_setpoint: 0,
            last_temperature: 0,
            last_vibration: 0,
            stats: CycleStats::new(),
        })
    }

    /// Current control parameters.
    pub fn params(&self) -> ControlParams {
        self.params
    }

    /// Timing statistics.
    pub fn stats(&self) -> &CycleStats {
        &self.stats
    }

    /// Run one control tick. A failed sensor read holds the channel's
    /// last good value for this tick and sets the matching fault flag.
    pub fn tick(&mut self) -> TickFaults {
        let mut faults = TickFaults::empty();

        // Drain pending cloud updates before any reading is consumed.
        while let Ok(update) = self.updates.try_recv() {
            info!(?update, "control parameter updated");
            self.params.apply(update);
        }

        match self.reader.read_duty_setpoint() {
            Ok(duty) => self.last_setpoint = duty,
            Err(e) => {
                warn!(error = %e, "potentiometer read failed");
                faults |= TickFaults::ADC_POTENTIOMETER;
            }
        }
        match self.reader.read_temperature() {
            Ok(f) => self.last_temperature = f,
            Err(e) => {
                warn!(error = %e, "temperature read failed");
                faults |= TickFaults::ADC_TEMPERATURE;
            }
        }
        match self.reader.read_vibration() {
            Ok(v) => self.last_vibration = v,
            Err(e) => {
                warn!(error = %e, "vibration read failed");
                faults |= TickFaults::ADC_VIBRATION;
            }
        }

        // Normalized vibration report: factor-scaled, clamped to full
        // scale. The alarm, the override, and telemetry all consume this
        // value, never the raw window sum.
        let vibration = (f64::from(self.last_vibration) * self.params.vibration_factor)
            .round() as i32;
        let vibration = vibration.clamp(0, VIBRATION_MAX);

        self.temp_alarm.update(self.gpio.as_ref(), self.last_temperature);
        self.vib_alarm.update(self.gpio.as_ref(), vibration);

        let cmd = self.motor.decide(
            self.last_setpoint,
            vibration,
            self.params.vibration_threshold,
        );

        // The vendor PWM driver restarts the channel on every write, so
        // only a changed duty is pushed out.
        if cmd.primary_duty != self.motor_out.last_duty() {
            if let Err(e) = self.motor_out.set_duty(cmd.primary_duty) {
                warn!(duty = cmd.primary_duty, error = %e, "motor duty write failed");
                faults |= TickFaults::PWM_MOTOR;
            }
        }
        if let Some(engaged) = cmd.windmill {
            let duty = if engaged { self.windmill_duty } else { 0 };
            if let Err(e) = self.windmill_out.set_duty(duty) {
                warn!(duty, error = %e, "windmill duty write failed");
                faults |= TickFaults::PWM_WINDMILL;
            }
        }

        self.ticks_since_report += 1;
        if self.ticks_since_report >= self.telemetry_interval {
            self.ticks_since_report = 0;
            if let Some(ref cloud) = self.cloud {
                let msg = TelemetryMessage {
                    speed: self.reported_duty,
                    temperature: self.last_temperature,
                    vibration,
                };
                if let Err(e) = send_telemetry(cloud.as_ref(), &msg) {
                    warn!(error = %e, "telemetry send failed");
                    faults |= TickFaults::TELEMETRY;
                }
            }
        }

        // Next report carries this tick's pre-override setpoint.
        self.reported_duty = self.last_setpoint;

        if !faults.is_empty() {
            self.stats.faulted_ticks += 1;
        }
        faults
    }

    /// Enter the paced loop until `shutdown` is raised, then park both
    /// PWM outputs and close the cloud stream.
    pub fn run(&mut self, shutdown: &AtomicBool) -> Result<(), CycleError> {
        info!(
            period_ns = self.tick_period_ns,
            telemetry_interval = self.telemetry_interval,
            "control loop starting"
        );

        #[cfg(feature = "rt")]
        self.run_rt_loop(shutdown)?;

        #[cfg(not(feature = "rt"))]
        self.run_sim_loop(shutdown);

        self.shutdown_outputs();
        info!(
            ticks = self.stats.tick_count,
            overruns = self.stats.overruns,
            faulted = self.stats.faulted_ticks,
            "control loop stopped"
        );
        Ok(())
    }

    /// Absolute-deadline pacing on `CLOCK_MONOTONIC`.
    #[cfg(feature = "rt")]
    fn run_rt_loop(&mut self, shutdown: &AtomicBool) -> Result<(), CycleError> {
        use nix::time::{clock_gettime, clock_nanosleep, ClockId, ClockNanosleepFlags};

        let clock = ClockId::CLOCK_MONOTONIC;
        let mut next_wake = clock_gettime(clock)
            .map_err(|e| CycleError::RtSetup(format!("clock_gettime: {e}")))?;

        while !shutdown.load(Ordering::Relaxed) {
            next_wake = timespec_add_ns(next_wake, self.tick_period_ns);

            let tick_start = clock_gettime(clock)
                .map_err(|e| CycleError::RtSetup(format!("clock_gettime: {e}")))?;
            let wake_latency_ns = timespec_diff_ns(&tick_start, &next_wake).abs();

            self.tick();

            let tick_end = clock_gettime(clock)
                .map_err(|e| CycleError::RtSetup(format!("clock_gettime: {e}")))?;
            let duration_ns = timespec_diff_ns(&tick_end, &tick_start);
            self.stats.record(duration_ns, wake_latency_ns);

            if duration_ns > self.tick_period_ns {
                self.stats.overruns += 1;
                warn!(
                    duration_ns,
                    budget_ns = self.tick_period_ns,
                    overruns = self.stats.overruns,
                    "tick overran its period"
                );
                // The next absolute deadline is already in the past;
                // clock_nanosleep returns immediately and the loop
                // resynchronizes over the following ticks.
            }

            let _ = clock_nanosleep(clock, ClockNanosleepFlags::TIMER_ABSTIME, &next_wake);
        }
        Ok(())
    }

    /// Relative-sleep pacing for development without RT privileges.
    #[cfg(not(feature = "rt"))]
    fn run_sim_loop(&mut self, shutdown: &AtomicBool) {
        use std::time::{Duration, Instant};

        let period = Duration::from_nanos(self.tick_period_ns as u64);

        while !shutdown.load(Ordering::Relaxed) {
            let tick_start = Instant::now();

            self.tick();

            let elapsed = tick_start.elapsed();
            let duration_ns = elapsed.as_nanos() as i64;
            self.stats.record(duration_ns, 0);

            if duration_ns > self.tick_period_ns {
                self.stats.overruns += 1;
                warn!(
                    duration_ns,
                    budget_ns = self.tick_period_ns,
                    overruns = self.stats.overruns,
                    "tick overran its period"
                );
            }

            if let Some(remaining) = period.checked_sub(elapsed) {
                std::thread::sleep(remaining);
            }
        }
    }

    /// Park both motors at duty 0 and close the cloud stream.
    fn shutdown_outputs(&mut self) {
        if let Err(e) = self.motor_out.shutdown() {
            warn!(error = %e, "motor shutdown failed");
        }
        if let Err(e) = self.windmill_out.shutdown() {
            warn!(error = %e, "windmill shutdown failed");
        }
        if let Some(ref cloud) = self.cloud {
            if let Err(e) = cloud.close_stream() {
                debug!(error = %e, "cloud stream close failed");
            }
        }
    }
}

// ─── Time Helpers ───────────────────────────────────────────────────

#[cfg(feature = "rt")]
fn timespec_add_ns(ts: nix::sys::time::TimeSpec, ns: i64) -> nix::sys::time::TimeSpec {
    use nix::sys::time::TimeSpec;
    let mut secs = ts.tv_sec();
    let mut nanos = ts.tv_nsec() + ns;
    while nanos >= 1_000_000_000 {
        secs += 1;
        nanos -= 1_000_000_000;
    }
    while nanos < 0 {
        secs -= 1;
        nanos += 1_000_000_000;
    }
    TimeSpec::new(secs, nanos)
}

#[cfg(feature = "rt")]
fn timespec_diff_ns(a: &nix::sys::time::TimeSpec, b: &nix::sys::time::TimeSpec) -> i64 {
    (a.tv_sec() - b.tv_sec()) * 1_000_000_000 + (a.tv_nsec() - b.tv_nsec())
}

// ─── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::motor::remap_duty;
    use iiot_cloud::transport::LoopbackTransport;
    use iiot_hal::sim::SimBoard;
    use std::sync::mpsc;

    fn runner_with(
        board: &SimBoard,
        cloud: Option<Box<dyn CloudTransport>>,
    ) -> (CycleRunner, mpsc::Sender<ControlUpdate>) {
        let config = ControlUnitConfig::default();
        let (tx, rx) = mpsc::channel();
        let runner = CycleRunner::new(
            &config,
            Box::new(board.adc()),
            &board.pwm(),
            Box::new(board.gpio()),
            cloud,
            rx,
        )
        .unwrap();
        (runner, tx)
    }

    #[test]
    fn startup_parks_both_outputs() {
        let board = SimBoard::new();
        let _runner = runner_with(&board, None);
        assert_eq!(board.pwm_duty(0), Some(0));
        assert_eq!(board.pwm_duty(1), Some(0));
    }

    #[test]
    fn motor_follows_potentiometer() {
        let board = SimBoard::new();
        let (mut runner, _tx) = runner_with(&board, None);
        // Full scale on the knob.
        board.set_adc_value(0, 3200);
        let faults = runner.tick();
        assert!(faults.is_empty());
        assert_eq!(board.pwm_duty(0), Some(remap_duty(100)));
        assert_eq!(board.pwm_running(0), Some(true));
    }

    #[test]
    fn unchanged_duty_is_not_rewritten() {
        let board = SimBoard::new();
        let (mut runner, _tx) = runner_with(&board, None);
        board.set_adc_value(0, 1920);
        runner.tick();
        let stops = board.pwm_stop_count(0);
        runner.tick();
        runner.tick();
        assert_eq!(board.pwm_stop_count(0), stops);
    }

    #[test]
    fn cloud_update_applies_before_next_tick() {
        let board = SimBoard::new();
        let (mut runner, tx) = runner_with(&board, None);
        tx.send(ControlUpdate::VibrationThreshold(5)).unwrap();
        tx.send(ControlUpdate::VibrationFactor(0.5)).unwrap();
        runner.tick();
        assert_eq!(runner.params().vibration_threshold, 5);
        assert!((runner.params().vibration_factor - 0.5).abs() < 1e-12);
    }

    #[test]
    fn vibration_override_engages_windmill() {
        let board = SimBoard::new();
        let (mut runner, tx) = runner_with(&board, None);
        tx.send(ControlUpdate::VibrationThreshold(5)).unwrap();
        board.set_adc_value(0, 3200);

        // Alternating piezo samples keep every delta at 1000. After the
        // 50-sample warmup the filtered value sits near 1000, well over
        // the lowered threshold.
        for i in 0..60 {
            let raw = if i % 2 == 0 { 1000 } else { 2000 };
            board.set_adc_value(3, raw);
            runner.tick();
        }
        assert_eq!(board.pwm_duty(0), Some(remap_duty(22)));
        assert_eq!(board.pwm_duty(1), Some(9));
    }

    #[test]
    fn telemetry_reports_on_interval_with_clamped_vibration() {
        let board = SimBoard::new();
        let cloud = LoopbackTransport::new();
        cloud.open_stream("token", "device").unwrap();
        let (mut runner, _tx) = runner_with(&board, Some(Box::new(cloud.clone())));

        board.set_adc_value(0, 1920); // 50% setpoint
        board.set_adc_value(1, 931); // ~77 °F
        for _ in 0..19 {
            runner.tick();
            assert!(cloud.sent().is_empty());
        }
        runner.tick();
        let sent = cloud.sent();
        assert_eq!(sent.len(), 1);
        let msg: TelemetryMessage = serde_json::from_str(&sent[0]).unwrap();
        assert_eq!(msg.speed, 50);
        assert_eq!(msg.temperature, 77);
        assert_eq!(msg.vibration, 0);

        // Second report arrives exactly one interval later.
        for _ in 0..20 {
            runner.tick();
        }
        assert_eq!(cloud.sent().len(), 2);
    }

    #[test]
    fn failed_sensor_holds_last_value() {
        let board = SimBoard::new();
        let (mut runner, _tx) = runner_with(&board, None);
        board.set_adc_value(0, 3200);
        runner.tick();
        assert_eq!(board.pwm_duty(0), Some(remap_duty(100)));

        board.fail_adc_read(0, true);
        let faults = runner.tick();
        assert!(faults.contains(TickFaults::ADC_POTENTIOMETER));
        // Motor keeps the last good setpoint.
        assert_eq!(board.pwm_duty(0), Some(remap_duty(100)));
        assert_eq!(runner.stats().faulted_ticks, 1);
    }

    #[test]
    fn temperature_alarm_drives_red_led() {
        let board = SimBoard::new();
        let (mut runner, _tx) = runner_with(&board, None);
        // 2048 raw reads 239 °F, far over the 78 °F threshold.
        board.set_adc_value(1, 2048);
        runner.tick();
        assert_eq!(board.gpio_level(45), Some(true));
        // Drop to ~59 °F, below threshold minus margin.
        board.set_adc_value(1, 800);
        runner.tick();
        assert_eq!(board.gpio_level(45), Some(false));
    }
}
