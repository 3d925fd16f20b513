//! Detection-to-response timing through the periodic control loop.
//!
//! The engine measures detection → actuator acknowledgment itself; these
//! tests drive hazards into a running loop and check both that measurement
//! and the wall-clock time until the published state changes.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use lawn_common::interlock::config::InterlockConfig;
use lawn_common::interlock::hazard::{HazardEvent, HazardKind};
use lawn_common::interlock::state::InterlockState as S;
use lawn_common::time::Timestamp;

use lawn_interlock::cycle::ControlLoop;
use lawn_interlock::{InterlockEngine, InterlockHandle};

use super::support::{Bench, config};

const EMERGENCY_BUDGET: Duration = Duration::from_millis(100);
const BOUNDARY_BUDGET: Duration = Duration::from_millis(200);

// ── Helpers ──

fn fast_config() -> InterlockConfig {
    let mut cfg = config();
    cfg.cycle.tick_us = 10_000;
    cfg.cycle.sensor_budget_us = 5_000;
    cfg
}

struct Running {
    handle: InterlockHandle,
    running: Arc<AtomicBool>,
    worker: thread::JoinHandle<InterlockEngine>,
}

fn start(engine: InterlockEngine, cfg: &InterlockConfig) -> Running {
    let handle = engine.handle();
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    let cycle = cfg.cycle;
    let worker = thread::spawn(move || {
        let mut control = ControlLoop::new(engine, &cycle);
        control.run(&r, None).expect("control loop");
        control.into_engine()
    });
    Running {
        handle,
        running,
        worker,
    }
}

impl Running {
    fn stop(self) -> InterlockEngine {
        self.running.store(false, Ordering::Release);
        self.worker.join().expect("control loop panicked")
    }
}

/// Wait until the published state is `want`, returning how long it took.
fn wait_for(handle: &InterlockHandle, want: S, limit: Duration) -> Duration {
    let started = Instant::now();
    while handle.state() != want {
        assert!(
            started.elapsed() < limit,
            "state {} did not become {want} within {limit:?}",
            handle.state()
        );
        thread::sleep(Duration::from_micros(200));
    }
    started.elapsed()
}

fn recover(handle: &InterlockHandle) {
    handle.acknowledge("operator").expect("queue open");
    wait_for(handle, S::Safe, Duration::from_secs(1));
}

// ── Tests ──

#[test]
fn emergency_published_within_budget() {
    let cfg = fast_config();
    let b = Bench::with_config(cfg.clone());
    let actuator = b.actuator.clone();
    let run = start(b.engine, &cfg);

    let mut worst = Duration::ZERO;
    for _ in 0..20 {
        run.handle
            .report_hazard(HazardEvent::new(HazardKind::Person, Timestamp::now(), 0.9).with_distance(2.0))
            .expect("queue open");
        worst = worst.max(wait_for(&run.handle, S::Emergency, EMERGENCY_BUDGET * 5));
        recover(&run.handle);
    }
    let engine = run.stop();

    let stats = engine.response_stats();
    assert_eq!(stats.emergency_cutoff.count, 20);
    assert_eq!(stats.emergency_breaches, 0);
    assert!(stats.emergency_cutoff.max_us <= EMERGENCY_BUDGET.as_micros() as u64);
    assert!(worst <= EMERGENCY_BUDGET, "worst publication {worst:?}");
    assert_eq!(actuator.emergency_stops(), 20);
}

#[test]
fn boundary_stop_within_budget() {
    let cfg = fast_config();
    let b = Bench::with_config(cfg.clone());
    let run = start(b.engine, &cfg);

    for _ in 0..10 {
        run.handle
            .report_hazard(HazardEvent::new(HazardKind::BoundaryViolation, Timestamp::now(), 1.0).with_distance(0.2))
            .expect("queue open");
        let took = wait_for(&run.handle, S::BoundaryStop, BOUNDARY_BUDGET * 5);
        assert!(took <= BOUNDARY_BUDGET, "boundary took {took:?}");
        recover(&run.handle);
    }
    let engine = run.stop();

    let stats = engine.response_stats();
    assert_eq!(stats.boundary_halt.count, 10);
    assert_eq!(stats.boundary_breaches, 0);
}

#[test]
fn sensor_detected_person_stops_mower_within_budget() {
    let cfg = fast_config();
    let b = Bench::with_config(cfg.clone());
    let front = b.front.clone();
    let actuator = b.actuator.clone();
    let run = start(b.engine, &cfg);

    thread::sleep(Duration::from_millis(30));
    let placed = Instant::now();
    front.set(&[super::support::person_at(1.5)]);
    wait_for(&run.handle, S::Emergency, EMERGENCY_BUDGET * 5);
    while !actuator.is_cut_off() {
        assert!(placed.elapsed() < EMERGENCY_BUDGET * 5, "cutoff never applied");
        thread::sleep(Duration::from_micros(200));
    }
    assert!(placed.elapsed() <= EMERGENCY_BUDGET, "cutoff took {:?}", placed.elapsed());

    let engine = run.stop();
    assert_eq!(engine.response_stats().emergency_breaches, 0);
}

#[test]
fn hung_actuator_is_cut_off_by_watchdog_monitor() {
    let cfg = fast_config();
    let b = Bench::with_config(cfg.clone());
    let actuator = b.actuator.clone();
    let relay = b.relay.clone();
    // Each emergency stop call blocks the control loop well past the watchdog timeout.
    actuator.set_stop_delay(Duration::from_millis(600));
    actuator.set_unresponsive(true);
    let run = start(b.engine, &cfg);

    let reported = Instant::now();
    run.handle
        .report_hazard(HazardEvent::new(HazardKind::Cliff, Timestamp::now(), 1.0).with_distance(0.3))
        .expect("queue open");
    while !relay.is_tripped() {
        assert!(reported.elapsed() < Duration::from_millis(550), "relay not tripped while loop was blocked");
        thread::sleep(Duration::from_millis(1));
    }
    assert!(reported.elapsed() >= Duration::from_millis(250));

    actuator.set_stop_delay(Duration::ZERO);
    let engine = run.stop();
    assert_eq!(engine.state(), S::Emergency);
}

/// Busy-spinning threads competing with the control loop for CPU.
struct CpuLoad {
    stop: Arc<AtomicBool>,
    threads: Vec<thread::JoinHandle<()>>,
}

impl CpuLoad {
    fn spawn(threads: usize) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let threads = (0..threads)
            .map(|_| {
                let stop = stop.clone();
                thread::spawn(move || {
                    let mut x = 0u64;
                    while !stop.load(Ordering::Relaxed) {
                        x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
                        std::hint::black_box(x);
                    }
                })
            })
            .collect();
        Self { stop, threads }
    }

    fn finish(self) {
        self.stop.store(true, Ordering::Relaxed);
        for t in self.threads {
            t.join().expect("load thread");
        }
    }
}

/// Raise `trials` person hazards under `load_threads` busy threads and
/// return (trials measured, budget breaches).
fn emergencies_under_load(trials: u64, load_threads: usize) -> (u64, u64) {
    let cfg = fast_config();
    let b = Bench::with_config(cfg.clone());
    let run = start(b.engine, &cfg);
    let load = CpuLoad::spawn(load_threads);

    for _ in 0..trials {
        run.handle
            .report_hazard(HazardEvent::new(HazardKind::Person, Timestamp::now(), 0.9))
            .expect("queue open");
        wait_for(&run.handle, S::Emergency, Duration::from_secs(1));
        recover(&run.handle);
    }

    load.finish();
    let stats = run.stop().response_stats();
    (stats.emergency_cutoff.count, stats.emergency_breaches)
}

#[test]
fn emergency_within_budget_under_cpu_load() {
    let (count, breaches) = emergencies_under_load(100, 2);
    assert_eq!(count, 100);
    assert_eq!(breaches, 0);
}

/// Repeated emergencies with every core busy. At least 99.9% must meet the
/// budget.
///
/// Run with: `cargo test -p lawn_interlock --test integration_tests -- loaded_response --ignored`
#[test]
#[ignore]
fn loaded_response_soak() {
    let cores = thread::available_parallelism().map_or(2, |n| n.get());
    let (count, breaches) = emergencies_under_load(2_000, cores);
    assert_eq!(count, 2_000);
    assert!(breaches * 1000 <= count, "{breaches} of {count} emergencies over budget");
}
