//! End-to-end tick pipeline tests on the simulation board.

use iiot_common::params::ControlUpdate;
use iiot_control_unit::config::ControlUnitConfig;
use iiot_control_unit::cycle::{CycleRunner, TickFaults};
use iiot_control_unit::motor::remap_duty;
use iiot_hal::sim::SimBoard;
use std::sync::mpsc;
use std::sync::mpsc::Sender;

const POT: u8 = 0;
const TEMP: u8 = 1;
const VIB: u8 = 3;
const MOTOR: u8 = 0;
const WINDMILL: u8 = 1;
const RED_LED: u8 = 45;
const BLUE_LED: u8 = 49;

fn make_runner(board: &SimBoard, config: &ControlUnitConfig) -> (CycleRunner, Sender<ControlUpdate>) {
    let (tx, rx) = mpsc::channel();
    let runner = CycleRunner::new(
        config,
        Box::new(board.adc()),
        &board.pwm(),
        Box::new(board.gpio()),
        None,
        rx,
    )
    .unwrap();
    (runner, tx)
}

/// Warm the vibration filter past its 50-sample window with an
/// alternating signal whose every delta is `amplitude`.
fn agitate(board: &SimBoard, runner: &mut CycleRunner, ticks: usize, amplitude: u16) {
    for i in 0..ticks {
        let raw = if i % 2 == 0 { 1000 } else { 1000 + amplitude };
        board.set_adc_value(VIB, raw);
        runner.tick();
    }
}

#[test]
fn duty_tracks_the_knob_across_its_range() {
    let board = SimBoard::new();
    let config = ControlUnitConfig::default();
    let (mut runner, _tx) = make_runner(&board, &config);

    for (raw, duty) in [(640u16, 0), (1920, 50), (3200, 100), (640, 0)] {
        board.set_adc_value(POT, raw);
        runner.tick();
        assert_eq!(board.pwm_duty(MOTOR), Some(remap_duty(duty)), "raw {raw}");
    }
}

#[test]
fn override_engages_holds_and_releases() {
    let board = SimBoard::new();
    let mut config = ControlUnitConfig::default();
    config.timing.hold_duration = 10;
    let (mut runner, tx) = make_runner(&board, &config);
    tx.send(ControlUpdate::VibrationThreshold(5)).unwrap();

    board.set_adc_value(POT, 3200);
    agitate(&board, &mut runner, 60, 1000);

    // Clamped to the 22% ceiling, windmill running at 9%.
    assert_eq!(board.pwm_duty(MOTOR), Some(remap_duty(22)));
    assert_eq!(board.pwm_duty(WINDMILL), Some(9));
    assert_eq!(board.pwm_running(WINDMILL), Some(true));

    // Vibration gone; the clamp holds for the configured duration. The
    // steady signal needs a full window to decay back to zero first.
    board.set_adc_value(VIB, 1000);
    for _ in 0..50 {
        runner.tick();
    }
    for _ in 0..9 {
        runner.tick();
        assert_eq!(board.pwm_duty(MOTOR), Some(remap_duty(22)));
    }
    runner.tick();
    assert_eq!(board.pwm_duty(WINDMILL), Some(0));

    runner.tick();
    assert_eq!(board.pwm_duty(MOTOR), Some(remap_duty(100)));
}

#[test]
fn windmill_is_written_on_transitions_only() {
    let board = SimBoard::new();
    let mut config = ControlUnitConfig::default();
    config.timing.hold_duration = 10;
    let (mut runner, tx) = make_runner(&board, &config);
    tx.send(ControlUpdate::VibrationThreshold(5)).unwrap();

    board.set_adc_value(POT, 3200);
    // Startup parks the channel once; the engage edge is the second write.
    let baseline = board.pwm_configure_count(WINDMILL);
    agitate(&board, &mut runner, 80, 1000);
    assert_eq!(board.pwm_configure_count(WINDMILL), baseline + 1);
}

#[test]
fn both_alarms_run_hysteresis_end_to_end() {
    let board = SimBoard::new();
    let config = ControlUnitConfig::default();
    let (mut runner, _tx) = make_runner(&board, &config);

    // Hot: 2048 raw reads 239 °F.
    board.set_adc_value(TEMP, 2048);
    runner.tick();
    assert_eq!(board.gpio_level(RED_LED), Some(true));

    // 73 °F sits on the deadband boundary (clears only below 78 − 5).
    board.set_adc_value(TEMP, 900);
    runner.tick();
    assert_eq!(board.gpio_level(RED_LED), Some(true));
    assert_eq!(board.gpio_write_count(RED_LED), 1);

    // ~58 °F clears it.
    board.set_adc_value(TEMP, 800);
    runner.tick();
    assert_eq!(board.gpio_level(RED_LED), Some(false));

    // Vibration alarm (threshold 60) trips once the filter warms up.
    agitate(&board, &mut runner, 60, 1000);
    assert_eq!(board.gpio_level(BLUE_LED), Some(true));
}

#[test]
fn sensor_faults_never_stop_the_loop() {
    let board = SimBoard::new();
    let config = ControlUnitConfig::default();
    let (mut runner, _tx) = make_runner(&board, &config);

    board.set_adc_value(POT, 3200);
    runner.tick();

    board.fail_adc_read(POT, true);
    board.fail_adc_read(TEMP, true);
    board.fail_adc_read(VIB, true);
    let faults = runner.tick();
    assert!(faults.contains(TickFaults::ADC_POTENTIOMETER));
    assert!(faults.contains(TickFaults::ADC_TEMPERATURE));
    assert!(faults.contains(TickFaults::ADC_VIBRATION));
    // Last good setpoint still drives the motor.
    assert_eq!(board.pwm_duty(MOTOR), Some(remap_duty(100)));

    board.fail_adc_read(POT, false);
    board.fail_adc_read(TEMP, false);
    board.fail_adc_read(VIB, false);
    board.set_adc_value(POT, 640);
    assert!(runner.tick().is_empty());
    assert_eq!(board.pwm_duty(MOTOR), Some(0));
}

#[test]
fn paced_run_stops_on_shutdown_and_parks_outputs() {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    let board = SimBoard::new();
    let mut config = ControlUnitConfig::default();
    config.timing.tick_period_us = 1_000;
    board.set_adc_value(POT, 3200);
    let (mut runner, _tx) = make_runner(&board, &config);

    let shutdown = Arc::new(AtomicBool::new(false));
    let flag = shutdown.clone();
    let handle = std::thread::spawn(move || {
        runner.run(&flag).unwrap();
        runner
    });

    std::thread::sleep(Duration::from_millis(100));
    shutdown.store(true, Ordering::SeqCst);
    let runner = handle.join().unwrap();

    assert!(runner.stats().tick_count > 10);
    assert_eq!(board.pwm_duty(MOTOR), Some(0));
    assert_eq!(board.pwm_running(MOTOR), Some(false));
    assert_eq!(board.pwm_running(WINDMILL), Some(false));
}
