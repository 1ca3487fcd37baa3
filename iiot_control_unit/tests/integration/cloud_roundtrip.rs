//! Cloud round trip: actions in through the feedback channel, telemetry
//! out through the transport, against the full tick pipeline.

use iiot_cloud::feedback::FeedbackChannel;
use iiot_cloud::transport::{CloudTransport, LoopbackTransport};
use iiot_common::telemetry::TelemetryMessage;
use iiot_control_unit::config::ControlUnitConfig;
use iiot_control_unit::cycle::CycleRunner;
use iiot_control_unit::motor::remap_duty;
use iiot_hal::sim::SimBoard;
use std::sync::mpsc;

const POT: u8 = 0;
const VIB: u8 = 3;
const MOTOR: u8 = 0;

/// Board + runner wired to a loopback cloud stream, exactly as the
/// daemon wires them.
fn make_connected(config: &ControlUnitConfig) -> (SimBoard, LoopbackTransport, CycleRunner) {
    let board = SimBoard::new();
    let transport = LoopbackTransport::new();
    transport.open_stream("token", "device").unwrap();
    let (tx, rx) = mpsc::channel();
    FeedbackChannel::attach(&transport, tx).unwrap();
    let runner = CycleRunner::new(
        config,
        Box::new(board.adc()),
        &board.pwm(),
        Box::new(board.gpio()),
        Some(Box::new(transport.clone())),
        rx,
    )
    .unwrap();
    (board, transport, runner)
}

#[test]
fn threshold_action_takes_effect_on_the_next_tick() {
    let config = ControlUnitConfig::default();
    let (board, transport, mut runner) = make_connected(&config);

    transport.inject(
        r#"{"type":"action","data":{"actions":[
            {"name":"setThresholdVibration","parameters":{"vibrationThreshold":5}}
        ]}}"#,
    );
    runner.tick();
    assert_eq!(runner.params().vibration_threshold, 5);

    // With the lowered threshold a modest vibration now clamps the motor.
    board.set_adc_value(POT, 3200);
    for i in 0..60 {
        let raw = if i % 2 == 0 { 1000 } else { 2000 };
        board.set_adc_value(VIB, raw);
        runner.tick();
    }
    assert_eq!(board.pwm_duty(MOTOR), Some(remap_duty(22)));
}

#[test]
fn factor_action_scales_the_vibration_report() {
    let mut config = ControlUnitConfig::default();
    config.timing.telemetry_interval = 10;
    let (board, transport, mut runner) = make_connected(&config);

    transport.inject(
        r#"{"type":"action","data":{"actions":[
            {"name":"setVibrationReportingFactor","parameters":{"vibrationFactor":0.05}}
        ]}}"#,
    );

    // Warm the filter to a steady ~1000, then read the next report.
    for i in 0..70 {
        let raw = if i % 2 == 0 { 1000 } else { 2000 };
        board.set_adc_value(VIB, raw);
        runner.tick();
    }
    let sent = transport.sent();
    let last: TelemetryMessage = serde_json::from_str(sent.last().unwrap()).unwrap();
    // 1000 × 0.05 = 50, inside the 0..=100 clamp.
    assert_eq!(last.vibration, 50);
}

#[test]
fn vibration_report_is_clamped_at_full_scale() {
    let mut config = ControlUnitConfig::default();
    config.timing.telemetry_interval = 10;
    let (board, transport, mut runner) = make_connected(&config);

    // Default factor 0.8 on a ~1000 reading exceeds full scale.
    for i in 0..70 {
        let raw = if i % 2 == 0 { 1000 } else { 2000 };
        board.set_adc_value(VIB, raw);
        runner.tick();
    }
    let sent = transport.sent();
    let last: TelemetryMessage = serde_json::from_str(sent.last().unwrap()).unwrap();
    assert_eq!(last.vibration, 100);
}

#[test]
fn speed_reports_the_pre_override_setpoint() {
    let mut config = ControlUnitConfig::default();
    config.timing.telemetry_interval = 10;
    let (board, transport, mut runner) = make_connected(&config);

    transport.inject(
        r#"{"type":"action","data":{"actions":[
            {"name":"setThresholdVibration","parameters":{"vibrationThreshold":5}}
        ]}}"#,
    );
    board.set_adc_value(POT, 3200);
    for i in 0..70 {
        let raw = if i % 2 == 0 { 1000 } else { 2000 };
        board.set_adc_value(VIB, raw);
        runner.tick();
    }
    // Motor is clamped, but the report carries the operator's setpoint.
    assert_eq!(board.pwm_duty(MOTOR), Some(remap_duty(22)));
    let sent = transport.sent();
    let last: TelemetryMessage = serde_json::from_str(sent.last().unwrap()).unwrap();
    assert_eq!(last.speed, 100);
}

#[test]
fn telemetry_wire_format_is_flat_json() {
    let config = ControlUnitConfig::default();
    let (board, transport, mut runner) = make_connected(&config);

    board.set_adc_value(POT, 1920);
    board.set_adc_value(1, 931);
    for _ in 0..20 {
        runner.tick();
    }
    let sent = transport.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0], r#"{"speed":50,"temperature":77,"vibration":0}"#);
}

#[test]
fn error_envelope_and_unknown_actions_are_nonfatal() {
    let config = ControlUnitConfig::default();
    let (_board, transport, mut runner) = make_connected(&config);

    transport.inject(r#"{"error":{"code":404,"message":"device not found"}}"#);
    transport.inject(
        r#"{"type":"action","data":{"actions":[
            {"name":"selfDestruct","parameters":{}}
        ]}}"#,
    );
    transport.inject("not even json");

    runner.tick();
    // Parameters untouched, loop alive.
    assert_eq!(runner.params().vibration_threshold, 75);
    assert!((runner.params().vibration_factor - 0.8).abs() < 1e-12);
}
