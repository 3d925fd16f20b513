//! Simulated drive controller and E-stop relay.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, info};

use lawn_common::actuator::{ActuatorDriver, ActuatorError};
use lawn_common::interlock::motion::MotionCommand;
use lawn_common::watchdog::{CutoffError, HardCutoff};

/// Forwarded commands kept for inspection.
const HISTORY_LEN: usize = 256;

// ─── Actuator ───────────────────────────────────────────────────────

#[derive(Default)]
struct ActuatorShared {
    history: Mutex<VecDeque<MotionCommand>>,
    forwarded: AtomicU64,
    halts: AtomicU64,
    emergency_stops: AtomicU64,
    unresponsive: AtomicBool,
    forward_failure: AtomicBool,
    stop_delay_us: AtomicU64,
    cut_off: AtomicBool,
}

/// Drive and blade controller that records what it was told to do.
pub struct SimActuator {
    shared: Arc<ActuatorShared>,
}

/// Test/bench control over a [`SimActuator`].
#[derive(Clone)]
pub struct SimActuatorHandle {
    shared: Arc<ActuatorShared>,
}

impl SimActuator {
    pub fn new() -> (Self, SimActuatorHandle) {
        let shared = Arc::new(ActuatorShared::default());
        (
            Self {
                shared: shared.clone(),
            },
            SimActuatorHandle { shared },
        )
    }
}

impl ActuatorDriver for SimActuator {
    fn name(&self) -> &'static str {
        "simulation"
    }

    fn forward(&mut self, cmd: &MotionCommand) -> Result<(), ActuatorError> {
        if self.shared.forward_failure.load(Ordering::Acquire) {
            return Err(ActuatorError::CommunicationError("simulated bus failure".into()));
        }
        let mut history = self.shared.history.lock();
        if history.len() == HISTORY_LEN {
            history.pop_front();
        }
        history.push_back(*cmd);
        self.shared.forwarded.fetch_add(1, Ordering::AcqRel);
        self.shared.cut_off.store(false, Ordering::Release);
        Ok(())
    }

    fn halt_drive(&mut self) -> Result<(), ActuatorError> {
        self.shared.halts.fetch_add(1, Ordering::AcqRel);
        if self.shared.unresponsive.load(Ordering::Acquire) {
            return Err(ActuatorError::Unresponsive("simulation"));
        }
        debug!("simulated drive halted");
        Ok(())
    }

    fn emergency_stop(&mut self) -> Result<(), ActuatorError> {
        self.shared.emergency_stops.fetch_add(1, Ordering::AcqRel);
        let delay = self.shared.stop_delay_us.load(Ordering::Acquire);
        if delay > 0 {
            std::thread::sleep(Duration::from_micros(delay));
        }
        if self.shared.unresponsive.load(Ordering::Acquire) {
            return Err(ActuatorError::Unresponsive("simulation"));
        }
        self.shared.cut_off.store(true, Ordering::Release);
        info!("simulated emergency cutoff");
        Ok(())
    }
}

impl SimActuatorHandle {
    /// Most recent forwarded commands, oldest first.
    pub fn forwarded(&self) -> Vec<MotionCommand> {
        self.shared.history.lock().iter().copied().collect()
    }

    pub fn last_forwarded(&self) -> Option<MotionCommand> {
        self.shared.history.lock().back().copied()
    }

    pub fn forwarded_count(&self) -> u64 {
        self.shared.forwarded.load(Ordering::Acquire)
    }

    /// Halt and emergency stop calls fail until cleared.
    pub fn set_unresponsive(&self, on: bool) {
        self.shared.unresponsive.store(on, Ordering::Release);
    }

    /// `forward()` fails until cleared.
    pub fn set_forward_failure(&self, on: bool) {
        self.shared.forward_failure.store(on, Ordering::Release);
    }

    /// Time the emergency stop takes to acknowledge.
    pub fn set_stop_delay(&self, delay: Duration) {
        self.shared.stop_delay_us.store(delay.as_micros() as u64, Ordering::Release);
    }

    pub fn halts(&self) -> u64 {
        self.shared.halts.load(Ordering::Acquire)
    }

    /// Emergency stop calls, acknowledged or not.
    pub fn emergency_stops(&self) -> u64 {
        self.shared.emergency_stops.load(Ordering::Acquire)
    }

    /// Power cut by an acknowledged emergency stop and not yet re-enabled by
    /// a forwarded command.
    pub fn is_cut_off(&self) -> bool {
        self.shared.cut_off.load(Ordering::Acquire)
    }
}

// ─── Relay ──────────────────────────────────────────────────────────

#[derive(Default)]
struct RelayShared {
    tripped: AtomicBool,
    trips: AtomicU64,
    failing: AtomicBool,
}

/// E-stop relay that latches open when tripped.
pub struct SimRelay {
    shared: Arc<RelayShared>,
}

#[derive(Clone)]
pub struct SimRelayHandle {
    shared: Arc<RelayShared>,
}

impl SimRelay {
    pub fn new() -> (Self, SimRelayHandle) {
        let shared = Arc::new(RelayShared::default());
        (
            Self {
                shared: shared.clone(),
            },
            SimRelayHandle { shared },
        )
    }
}

impl HardCutoff for SimRelay {
    fn name(&self) -> &'static str {
        "sim_relay"
    }

    fn trip(&mut self) -> Result<(), CutoffError> {
        self.shared.trips.fetch_add(1, Ordering::AcqRel);
        if self.shared.failing.load(Ordering::Acquire) {
            return Err(CutoffError::TripFailed {
                relay: "sim_relay",
                reason: "simulated coil failure".into(),
            });
        }
        self.shared.tripped.store(true, Ordering::Release);
        Ok(())
    }

    fn is_tripped(&self) -> bool {
        self.shared.tripped.load(Ordering::Acquire)
    }
}

impl SimRelayHandle {
    pub fn is_tripped(&self) -> bool {
        self.shared.tripped.load(Ordering::Acquire)
    }

    /// Trip attempts, successful or not.
    pub fn trip_attempts(&self) -> u64 {
        self.shared.trips.load(Ordering::Acquire)
    }

    pub fn set_failing(&self, on: bool) {
        self.shared.failing.store(on, Ordering::Release);
    }

    /// Manual reset on the bench.
    pub fn reset(&self) {
        self.shared.tripped.store(false, Ordering::Release);
    }
}
