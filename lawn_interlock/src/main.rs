//! # LawnBerry Safety Interlock host
//!
//! Loads `interlock.toml`, builds the configured sensors through the
//! registry, wires the simulation actuator and relay, and runs the control
//! loop until Ctrl-C (or `--ticks`). A demo navigation thread submits drive
//! commands through the gate so lockouts and clamping show up in the log.

use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use lawn_common::config::{ConfigLoader, LogLevel};
use lawn_common::interlock::config::InterlockConfig;
use lawn_common::interlock::motion::{CommandSource, MotionCommand};
use lawn_interlock::cycle::{ControlLoop, rt_setup};
use lawn_interlock::drivers::default_registry;
use lawn_interlock::drivers::simulation::{SimActuator, SimRelay};
use lawn_interlock::events::InterlockEvent;
use lawn_interlock::{ActuatorGate, DriveResponse, InterlockEngine};

/// Demo navigation command rate.
const NAV_PERIOD: Duration = Duration::from_millis(100);

/// LawnBerry safety interlock and hazard response engine
#[derive(Parser, Debug)]
#[command(name = "lawn_interlock")]
#[command(version)]
#[command(about = "Safety interlock control loop for the LawnBerry mower")]
struct Args {
    /// Path to the interlock configuration TOML.
    #[arg(short, long, default_value = "config/interlock.toml")]
    config: PathBuf,

    /// CPU core to pin the control loop to (rt feature only).
    #[arg(long, default_value_t = 1)]
    cpu_core: usize,

    /// SCHED_FIFO priority (rt feature only).
    #[arg(long, default_value_t = 80)]
    rt_priority: i32,

    /// Stop after this many ticks.
    #[arg(long)]
    ticks: Option<u64>,

    /// Do not run the demo navigation thread.
    #[arg(long)]
    no_demo: bool,

    /// Enable verbose logging (DEBUG level).
    #[arg(short, long)]
    verbose: bool,

    /// Output logs in JSON format.
    #[arg(long)]
    json: bool,
}

fn main() {
    let args = Args::parse();
    let config = InterlockConfig::load_validated(&args.config);
    let level = match &config {
        Ok(c) => c.shared.log_level,
        Err(_) => LogLevel::Info,
    };
    setup_tracing(&args, level);

    info!("LawnBerry interlock v{} starting...", env!("CARGO_PKG_VERSION"));

    let result = config
        .map_err(|e| Box::new(e) as Box<dyn std::error::Error>)
        .and_then(|config| run(&args, config));
    if let Err(e) = result {
        error!("FATAL: {e}");
        process::exit(1);
    }

    info!("LawnBerry interlock shutdown complete");
}

fn run(args: &Args, config: InterlockConfig) -> Result<(), Box<dyn std::error::Error>> {
    info!(
        service = %config.shared.service_name,
        tick_us = config.cycle.tick_us,
        sensors = config.sensors.len(),
        "config OK"
    );

    let registry = default_registry();
    let (actuator, actuator_handle) = SimActuator::new();
    let (relay, relay_handle) = SimRelay::new();
    let engine = InterlockEngine::from_config(&config, &registry, Box::new(actuator), Box::new(relay))?;
    let handle = engine.handle();
    let gate = engine.gate();
    let audit = engine.audit().clone();

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        info!("received shutdown signal");
        r.store(false, Ordering::SeqCst);
    })?;

    let events = handle.subscribe();
    let event_logger = thread::Builder::new()
        .name("event-log".into())
        .spawn(move || {
            for event in events {
                if let InterlockEvent::StateChanged { from, to, trigger, .. } = event {
                    info!(%from, %to, trigger = trigger.label(), "state banner");
                }
            }
        })?;

    let navigator = if args.no_demo {
        drop(gate);
        None
    } else {
        let running = running.clone();
        Some(
            thread::Builder::new()
                .name("demo-nav".into())
                .spawn(move || demo_navigation(&gate, &running))?,
        )
    };

    rt_setup(args.cpu_core, args.rt_priority)?;
    info!(cpu_core = args.cpu_core, priority = args.rt_priority, "RT setup complete");

    let mut control = ControlLoop::new(engine, &config.cycle);
    let loop_result = control.run(&running, args.ticks);
    running.store(false, Ordering::SeqCst);

    if let Some(nav) = navigator {
        if nav.join().is_err() {
            warn!("demo navigation thread panicked");
        }
    }

    let engine = control.into_engine();
    let stats = engine.response_stats();
    info!(
        state = %engine.state(),
        emergency_cutoffs = stats.emergency_cutoff.count,
        emergency_max_us = stats.emergency_cutoff.max_us,
        emergency_breaches = stats.emergency_breaches,
        boundary_halts = stats.boundary_halt.count,
        boundary_max_us = stats.boundary_halt.max_us,
        boundary_breaches = stats.boundary_breaches,
        forwarded = actuator_handle.forwarded_count(),
        relay_tripped = relay_handle.is_tripped(),
        "response summary"
    );

    drop(engine);
    drop(handle);
    if event_logger.join().is_err() {
        warn!("event log thread panicked");
    }

    audit.close();
    let audit_stats = audit.stats();
    info!(
        recorded = audit_stats.recorded,
        persisted = audit_stats.persisted,
        evicted = audit_stats.evicted,
        "audit log closed"
    );

    loop_result?;
    Ok(())
}

/// Drive a slow mowing pattern and log whenever the gate's answer changes.
fn demo_navigation(gate: &ActuatorGate, running: &AtomicBool) {
    let mut last: Option<DriveResponse> = None;
    let mut step: u64 = 0;
    while running.load(Ordering::Acquire) {
        let turn = if (step / 50) % 2 == 0 { 0.0 } else { 0.4 };
        let outcome = gate.submit(MotionCommand::drive(0.8, turn, true, CommandSource::Navigation));
        let response = DriveResponse::from(&outcome);
        if last.as_ref().is_none_or(|l| l.result != response.result || l.state != response.state) {
            info!(
                result = response.result,
                state = %response.state,
                reason = response.status_reason.unwrap_or("-"),
                clamped = response.clamped,
                "navigation command"
            );
        }
        last = Some(response);
        step += 1;
        thread::sleep(NAV_PERIOD);
    }
}

fn setup_tracing(args: &Args, level: LogLevel) {
    let directive = if args.verbose { "debug" } else { level.as_directive() };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive));

    if args.json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).compact().init();
    }
}
