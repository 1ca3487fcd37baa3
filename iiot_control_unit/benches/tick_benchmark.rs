//! Tick benchmark — measure the full control tick against the 10 ms
//! period budget.
//!
//! Runs the complete pipeline on the simulation board: three ADC reads,
//! vibration filtering, both alarms, the motor governor, and PWM writes.
//! Telemetry is exercised in a separate case since it only fires every
//! reporting interval.

use criterion::{criterion_group, criterion_main, Criterion};

use iiot_cloud::transport::{CloudTransport, LoopbackTransport};
use iiot_control_unit::config::ControlUnitConfig;
use iiot_control_unit::cycle::CycleRunner;
use iiot_hal::sim::SimBoard;
use std::sync::mpsc;

fn make_runner(config: &ControlUnitConfig, cloud: bool) -> (SimBoard, CycleRunner) {
    let board = SimBoard::new();
    board.set_adc_value(0, 1920);
    board.set_adc_value(1, 931);
    board.push_adc_sequence(3, &[1000, 1400, 1000, 1400, 1000, 1400, 1000, 1400]);
    let (_tx, rx) = mpsc::channel();
    let transport: Option<Box<dyn CloudTransport>> = if cloud {
        let t = LoopbackTransport::new();
        t.open_stream("token", "device").unwrap();
        Some(Box::new(t))
    } else {
        None
    };
    let runner = CycleRunner::new(
        config,
        Box::new(board.adc()),
        &board.pwm(),
        Box::new(board.gpio()),
        transport,
        rx,
    )
    .unwrap();
    (board, runner)
}

fn bench_tick(c: &mut Criterion) {
    let config = ControlUnitConfig::default();

    let (_board, mut runner) = make_runner(&config, false);
    c.bench_function("tick/standalone", |b| {
        b.iter(|| runner.tick());
    });

    // Every tick reports: worst case with JSON encoding and the send.
    let mut reporting = config.clone();
    reporting.timing.telemetry_interval = 1;
    let (_board, mut runner) = make_runner(&reporting, true);
    c.bench_function("tick/reporting", |b| {
        b.iter(|| runner.tick());
    });
}

criterion_group!(benches, bench_tick);
criterion_main!(benches);
