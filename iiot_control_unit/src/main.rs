//! # IIoT Control Unit
//!
//! Control loop daemon for the IIoT demo board: samples potentiometer,
//! temperature, and vibration sensors at a 10 ms tick, runs hysteresis
//! alarms and the vibration speed override, drives the motor and windmill
//! PWM channels, and reports telemetry upstream.
//!
//! Peripherals run against the simulation board; with the `rt` feature
//! the loop additionally locks memory, pins to a core, and schedules
//! under SCHED_FIFO.

use clap::Parser;
use iiot_cloud::feedback::FeedbackChannel;
use iiot_cloud::transport::{CloudTransport, LoopbackTransport};
use iiot_common::consts::DEFAULT_CONFIG_PATH;
use iiot_control_unit::config::load_config;
use iiot_control_unit::cycle::{rt_setup, CycleRunner};
use iiot_hal::sim::SimBoard;
use std::path::PathBuf;
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use tracing::{error, info, Level};
use tracing_subscriber::EnvFilter;

/// IIoT Control Unit — sensor/actuator control loop
#[derive(Parser, Debug)]
#[command(name = "iiot_control_unit")]
#[command(version)]
#[command(about = "Deterministic sensor/actuator control loop for the IIoT demo board")]
struct Args {
    /// Path to the configuration TOML.
    #[arg(default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// CPU core to pin the RT thread to.
    #[arg(long, default_value_t = 1)]
    cpu_core: usize,

    /// SCHED_FIFO priority.
    #[arg(long, default_value_t = 80)]
    rt_priority: i32,

    /// Enable verbose logging (DEBUG level).
    #[arg(short, long)]
    verbose: bool,

    /// Output logs in JSON format.
    #[arg(long)]
    json: bool,
}

fn main() {
    let args = Args::parse();
    setup_tracing(&args);

    info!("IIoT Control Unit v{} starting", env!("CARGO_PKG_VERSION"));

    if let Err(e) = run(&args) {
        error!("FATAL: {e}");
        process::exit(1);
    }

    info!("IIoT Control Unit shutdown complete");
}

fn run(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(&args.config)?;
    info!(
        tick_period_us = config.timing.tick_period_us,
        telemetry_interval = config.timing.telemetry_interval,
        cloud = config.cloud.enabled,
        "config loaded from {}",
        args.config.display()
    );

    rt_setup(args.cpu_core, args.rt_priority)?;
    info!(
        cpu_core = args.cpu_core,
        rt_priority = args.rt_priority,
        "RT setup complete"
    );

    let board = SimBoard::new();
    let (updates_tx, updates_rx) = mpsc::channel();

    // Optional cloud stream: telemetry out, parameter actions in.
    let cloud: Option<Box<dyn CloudTransport>> = if config.cloud.enabled {
        let transport = LoopbackTransport::new();
        transport.open_stream(&config.cloud.device_token, &config.cloud.device_id)?;
        FeedbackChannel::attach(&transport, updates_tx)?;
        info!(device_id = %config.cloud.device_id, "cloud stream open");
        Some(Box::new(transport))
    } else {
        info!("cloud stream disabled; running standalone");
        None
    };

    let mut runner = CycleRunner::new(
        &config,
        Box::new(board.adc()),
        &board.pwm(),
        Box::new(board.gpio()),
        cloud,
        updates_rx,
    )?;

    let shutdown = Arc::new(AtomicBool::new(false));
    let flag = shutdown.clone();
    ctrlc::set_handler(move || {
        info!("shutdown signal received");
        flag.store(true, Ordering::SeqCst);
    })?;

    runner.run(&shutdown)?;
    Ok(())
}

fn setup_tracing(args: &Args) {
    let level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    if args.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .compact()
            .init();
    }
}
