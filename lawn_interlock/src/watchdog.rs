//! Emergency cutoff watchdog.
//!
//! Armed when the engine enters EMERGENCY, disarmed when the actuator
//! acknowledges the emergency stop. If still armed after the timeout, it
//! trips the hardware [`HardCutoff`] relay and records a fatal `HardCutoff`
//! audit entry. `check()` is called by the engine every tick and by a
//! monitor thread, so a control loop stuck inside a hung driver call still
//! gets the relay tripped.

use std::time::Duration;

use parking_lot::Mutex;
use tracing::{error, info};

use lawn_common::interlock::audit::Trigger;
use lawn_common::interlock::state::InterlockState;
use lawn_common::time::Timestamp;
use lawn_common::watchdog::HardCutoff;

use crate::audit::AuditLog;
use crate::events::{EventBus, InterlockEvent};

struct Inner {
    relay: Box<dyn HardCutoff>,
    armed_at: Option<Timestamp>,
    /// Fatal audit entry written for the current arming.
    escalated: bool,
    /// Relay confirmed tripped for the current arming.
    relay_tripped: bool,
}

pub struct CutoffWatchdog {
    timeout: Duration,
    inner: Mutex<Inner>,
    audit: AuditLog,
    bus: EventBus,
}

impl CutoffWatchdog {
    pub fn new(timeout: Duration, relay: Box<dyn HardCutoff>, audit: AuditLog, bus: EventBus) -> Self {
        Self {
            timeout,
            inner: Mutex::new(Inner {
                relay,
                armed_at: None,
                escalated: false,
                relay_tripped: false,
            }),
            audit,
            bus,
        }
    }

    #[inline]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Start the countdown from `at`. Re-arming restarts it.
    pub fn arm(&self, at: Timestamp) {
        let mut inner = self.inner.lock();
        inner.armed_at = Some(at);
        inner.escalated = false;
        inner.relay_tripped = false;
    }

    /// Stop the countdown. A relay that already tripped stays tripped.
    pub fn disarm(&self) {
        self.inner.lock().armed_at = None;
    }

    pub fn is_armed(&self) -> bool {
        self.inner.lock().armed_at.is_some()
    }

    pub fn relay_tripped(&self) -> bool {
        self.inner.lock().relay.is_tripped()
    }

    /// Escalate if the timeout has passed. Returns true when the relay was
    /// tripped by this call.
    ///
    /// A failed trip is retried on the next call; the fatal audit entry is
    /// written once per arming.
    pub fn check(&self, now: Timestamp) -> bool {
        let mut inner = self.inner.lock();
        let Some(armed_at) = inner.armed_at else {
            return false;
        };
        if inner.relay_tripped {
            return false;
        }
        let elapsed = now.saturating_since(armed_at);
        if elapsed < self.timeout {
            return false;
        }

        let elapsed_ms = elapsed.as_millis() as u64;
        let relay = inner.relay.name();
        if !inner.escalated {
            inner.escalated = true;
            error!(elapsed_ms, relay, "emergency stop unacknowledged, tripping hard cutoff");
            let entry = self.audit.record(
                InterlockState::Emergency,
                InterlockState::Emergency,
                Trigger::HardCutoff { elapsed_ms },
                now,
            );
            self.bus.publish(InterlockEvent::Audit(entry));
        }

        match inner.relay.trip() {
            Ok(()) => {
                inner.relay_tripped = true;
                info!(relay, "hard cutoff relay tripped");
                true
            }
            Err(e) => {
                error!(error = %e, "hard cutoff trip failed, will retry");
                false
            }
        }
    }
}
