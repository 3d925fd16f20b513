//! Periodic control loop.
//!
//! Owns the [`InterlockEngine`] on one thread and ticks it at the configured
//! period. With the `rt` feature the loop paces itself with
//! `clock_nanosleep(TIMER_ABSTIME)` after locking memory, pinning a core and
//! switching to `SCHED_FIFO`; without it, `std::thread::sleep` is used and
//! the RT setup calls are no-ops.
//!
//! A tick that runs past its period is counted and logged. The loop keeps
//! going: the next tick starts immediately.
//!
//! A second thread checks the cutoff watchdog at a short fixed interval so
//! the hardware relay still trips while a tick is stuck in a driver call.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use thiserror::Error;
use tracing::{info, warn};

use lawn_common::interlock::config::CycleConfig;
use lawn_common::time::Timestamp;

use crate::engine::InterlockEngine;
use crate::watchdog::CutoffWatchdog;

/// Upper bound on the watchdog monitor's polling interval.
const MONITOR_INTERVAL_MAX: Duration = Duration::from_millis(10);

// ─── Tick Statistics ────────────────────────────────────────────────

/// O(1) per-tick timing statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleStats {
    pub tick_count: u64,
    pub last_tick_ns: i64,
    pub min_tick_ns: i64,
    pub max_tick_ns: i64,
    pub sum_tick_ns: i64,
    /// Ticks that ran past the period.
    pub overruns: u64,
    /// Worst wake-up lateness [ns].
    pub max_latency_ns: i64,
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
        }
    }

    #[inline]
    pub fn record(&mut self, duration_ns: i64, latency_ns: i64) {
        self.tick_count += 1;
        self.last_tick_ns = duration_ns;
        self.min_tick_ns = self.min_tick_ns.min(duration_ns);
        self.max_tick_ns = self.max_tick_ns.max(duration_ns);
        self.sum_tick_ns += duration_ns;
        self.max_latency_ns = self.max_latency_ns.max(latency_ns);
    }

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

#[derive(Debug, Error)]
pub enum CycleError {
    /// RT system call failed.
    #[error("RT setup error: {0}")]
    RtSetup(String),

    #[error("failed to spawn watchdog monitor: {0}")]
    Spawn(#[from] std::io::Error),
}

// ─── RT Setup ───────────────────────────────────────────────────────

#[cfg(feature = "rt")]
fn rt_mlockall() -> Result<(), CycleError> {
    use nix::sys::mman::{MlockallFlags, mlockall};
    mlockall(MlockallFlags::MCL_CURRENT | MlockallFlags::MCL_FUTURE)
        .map_err(|e| CycleError::RtSetup(format!("mlockall failed: {e}")))
}

#[cfg(not(feature = "rt"))]
fn rt_mlockall() -> Result<(), CycleError> {
    Ok(())
}

/// Touch stack pages up front so the loop does not fault them in.
fn prefault_stack() {
    let mut buf = [0u8; 256 * 1024];
    for byte in buf.iter_mut() {
        // SAFETY: `byte` is a valid, exclusive reference into `buf`.
        unsafe { core::ptr::write_volatile(byte, 0xFF) };
    }
    core::hint::black_box(&buf);
}

#[cfg(feature = "rt")]
fn rt_set_affinity(cpu: usize) -> Result<(), CycleError> {
    use nix::sched::{CpuSet, sched_setaffinity};
    use nix::unistd::Pid;

    let mut cpuset = CpuSet::new();
    cpuset
        .set(cpu)
        .map_err(|e| CycleError::RtSetup(format!("CpuSet::set({cpu}) failed: {e}")))?;
    sched_setaffinity(Pid::from_raw(0), &cpuset)
        .map_err(|e| CycleError::RtSetup(format!("sched_setaffinity failed: {e}")))
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
    // SAFETY: `param` is a valid sched_param; pid 0 is the calling thread.
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

/// Lock memory, prefault the stack, pin to `cpu_core` and switch to
/// `SCHED_FIFO` at `rt_priority`. Call on the loop thread before `run()`.
pub fn rt_setup(cpu_core: usize, rt_priority: i32) -> Result<(), CycleError> {
    rt_mlockall()?;
    prefault_stack();
    rt_set_affinity(cpu_core)?;
    rt_set_scheduler(rt_priority)?;
    Ok(())
}

// ─── Control Loop ───────────────────────────────────────────────────

pub struct ControlLoop {
    engine: InterlockEngine,
    period: Duration,
    stats: CycleStats,
}

impl ControlLoop {
    pub fn new(engine: InterlockEngine, cycle: &CycleConfig) -> Self {
        Self {
            engine,
            period: Duration::from_micros(u64::from(cycle.tick_us)),
            stats: CycleStats::new(),
        }
    }

    pub fn engine(&self) -> &InterlockEngine {
        &self.engine
    }

    pub fn stats(&self) -> &CycleStats {
        &self.stats
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn into_engine(self) -> InterlockEngine {
        self.engine
    }

    /// Tick until `running` goes false or `max_ticks` ticks have run.
    pub fn run(&mut self, running: &AtomicBool, max_ticks: Option<u64>) -> Result<(), CycleError> {
        let monitor_stop = Arc::new(AtomicBool::new(false));
        let monitor = spawn_watchdog_monitor(
            self.engine.watchdog(),
            self.period.min(MONITOR_INTERVAL_MAX),
            monitor_stop.clone(),
        )?;

        info!(period_us = self.period.as_micros() as u64, "control loop started");

        #[cfg(feature = "rt")]
        let result = self.run_rt_loop(running, max_ticks);
        #[cfg(not(feature = "rt"))]
        let result = self.run_sim_loop(running, max_ticks);

        monitor_stop.store(true, Ordering::Release);
        if monitor.join().is_err() {
            warn!("watchdog monitor panicked");
        }
        info!(
            ticks = self.stats.tick_count,
            overruns = self.stats.overruns,
            avg_tick_us = self.stats.avg_tick_ns() / 1000,
            max_tick_us = self.stats.max_tick_ns / 1000,
            "control loop stopped"
        );
        result
    }

    #[inline]
    fn should_continue(&self, running: &AtomicBool, max_ticks: Option<u64>) -> bool {
        running.load(Ordering::Acquire) && max_ticks.is_none_or(|max| self.stats.tick_count < max)
    }

    fn record_tick(&mut self, duration_ns: i64, latency_ns: i64) {
        self.stats.record(duration_ns, latency_ns);
        let budget_ns = self.period.as_nanos() as i64;
        if duration_ns > budget_ns {
            self.stats.overruns += 1;
            warn!(
                duration_us = duration_ns / 1000,
                budget_us = budget_ns / 1000,
                overruns = self.stats.overruns,
                "tick overrun"
            );
        }
    }

    #[cfg(feature = "rt")]
    fn run_rt_loop(&mut self, running: &AtomicBool, max_ticks: Option<u64>) -> Result<(), CycleError> {
        use nix::time::{ClockId, ClockNanosleepFlags, clock_gettime, clock_nanosleep};

        let clock = ClockId::CLOCK_MONOTONIC;
        let period_ns = self.period.as_nanos() as i64;
        let now = || clock_gettime(clock).map_err(|e| CycleError::RtSetup(format!("clock_gettime: {e}")));
        let mut next_wake = now()?;

        while self.should_continue(running, max_ticks) {
            let start = now()?;
            let latency_ns = timespec_diff_ns(&start, &next_wake).max(0);
            next_wake = timespec_add_ns(next_wake, period_ns);

            self.engine.tick(Timestamp::now());

            let end = now()?;
            self.record_tick(timespec_diff_ns(&end, &start), latency_ns);

            if timespec_diff_ns(&end, &next_wake) >= 0 {
                // Overran into the next period: restart the schedule from now.
                next_wake = end;
                continue;
            }
            if let Err(e) = clock_nanosleep(clock, ClockNanosleepFlags::TIMER_ABSTIME, &next_wake) {
                tracing::debug!(error = %e, "clock_nanosleep interrupted");
            }
        }
        Ok(())
    }

    #[cfg(not(feature = "rt"))]
    fn run_sim_loop(&mut self, running: &AtomicBool, max_ticks: Option<u64>) -> Result<(), CycleError> {
        use std::time::Instant;

        while self.should_continue(running, max_ticks) {
            let start = Instant::now();
            self.engine.tick(Timestamp::now());
            let elapsed = start.elapsed();
            self.record_tick(elapsed.as_nanos() as i64, 0);

            if let Some(remaining) = self.period.checked_sub(elapsed) {
                thread::sleep(remaining);
            }
        }
        Ok(())
    }
}

fn spawn_watchdog_monitor(
    watchdog: Arc<CutoffWatchdog>,
    interval: Duration,
    stop: Arc<AtomicBool>,
) -> Result<JoinHandle<()>, CycleError> {
    let handle = thread::Builder::new()
        .name("cutoff-watchdog".into())
        .spawn(move || {
            while !stop.load(Ordering::Acquire) {
                watchdog.check(Timestamp::now());
                thread::sleep(interval);
            }
        })?;
    Ok(handle)
}

// ─── Time Helpers ───────────────────────────────────────────────────

#[cfg(feature = "rt")]
fn timespec_add_ns(ts: nix::sys::time::TimeSpec, ns: i64) -> nix::sys::time::TimeSpec {
    let total = ts.tv_nsec() + ns;
    let secs = ts.tv_sec() + total.div_euclid(1_000_000_000);
    let nanos = total.rem_euclid(1_000_000_000);
    nix::sys::time::TimeSpec::new(secs, nanos)
}

/// `a - b` in nanoseconds.
#[cfg(feature = "rt")]
fn timespec_diff_ns(a: &nix::sys::time::TimeSpec, b: &nix::sys::time::TimeSpec) -> i64 {
    (a.tv_sec() - b.tv_sec()) * 1_000_000_000 + (a.tv_nsec() - b.tv_nsec())
}
