//! Audit entry types.
//!
//! One `AuditEntry` is created by the state machine for every interlock
//! transition. Fault records (unresponsive actuator, hard cutoff) use the
//! same shape with `from_state == to_state` so the log stays a single
//! ordered stream.

use serde::{Deserialize, Serialize};

use super::hazard::HazardEvent;
use super::state::InterlockState;
use crate::time::Timestamp;

/// What caused an audit record.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Trigger {
    /// A classified hazard.
    Hazard { event: HazardEvent },
    /// Explicit stop request (physical button, UI, host).
    Manual,
    /// Operator acknowledgment or completed recovery cycle.
    Recovery,
    /// Advisory hazards no longer present.
    Cleared,
    /// Hardware did not acknowledge an emergency stop within budget.
    ActuatorUnresponsive { elapsed_ms: u64 },
    /// Watchdog fired the hardware E-stop relay.
    HardCutoff { elapsed_ms: u64 },
}

impl Trigger {
    /// Fault records are fatal by definition.
    #[inline]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::ActuatorUnresponsive { .. } | Self::HardCutoff { .. })
    }

    pub const fn label(&self) -> &'static str {
        match self {
            Self::Hazard { .. } => "hazard",
            Self::Manual => "manual",
            Self::Recovery => "recovery",
            Self::Cleared => "cleared",
            Self::ActuatorUnresponsive { .. } => "actuator_unresponsive",
            Self::HardCutoff { .. } => "hard_cutoff",
        }
    }
}

/// Append-only audit record.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Monotonic sequence number within the session (starts at 1).
    pub seq: u64,
    pub from_state: InterlockState,
    pub to_state: InterlockState,
    pub trigger: Trigger,
    pub timestamp: Timestamp,
}

impl AuditEntry {
    /// Whether this record is a state change (as opposed to a fault note).
    #[inline]
    pub fn is_transition(&self) -> bool {
        self.from_state != self.to_state
    }

    /// Records that must never be dropped under back-pressure.
    #[inline]
    pub fn is_emergency_related(&self) -> bool {
        self.from_state == InterlockState::Emergency
            || self.to_state == InterlockState::Emergency
            || self.trigger.is_fatal()
    }
}
