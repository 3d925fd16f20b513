//! Global interlock state.
//!
//! Uses `#[repr(u8)]` so the state can be published through a single atomic
//! byte: readers always observe one whole state, never a torn value.

use serde::{Deserialize, Serialize};
use static_assertions::const_assert_eq;

/// Process-wide safety state (one active value at a time).
///
/// Only the interlock state machine transitions it; every transition is
/// audit-logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum InterlockState {
    /// No active hazard. Initial state.
    Safe = 0,
    /// Advisory hazard present; motion continues in the reduced envelope.
    Warning = 1,
    /// Geofence violated: drive halted, blade may continue.
    BoundaryStop = 2,
    /// Critical hazard or explicit stop. All actuation halted.
    Emergency = 3,
    /// Operator acknowledged; waiting for a clean poll cycle.
    Recovering = 4,
}

const_assert_eq!(core::mem::size_of::<InterlockState>(), 1);

impl InterlockState {
    pub const ALL: [InterlockState; 5] = [
        Self::Safe,
        Self::Warning,
        Self::BoundaryStop,
        Self::Emergency,
        Self::Recovering,
    ];

    /// Convert from raw `u8`. Returns `None` for invalid values.
    #[inline]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Safe),
            1 => Some(Self::Warning),
            2 => Some(Self::BoundaryStop),
            3 => Some(Self::Emergency),
            4 => Some(Self::Recovering),
            _ => None,
        }
    }

    /// States in which ordinary motion commands are accepted.
    #[inline]
    pub const fn allows_motion(&self) -> bool {
        matches!(self, Self::Safe | Self::Warning)
    }

    /// States that only an operator acknowledgment can leave.
    #[inline]
    pub const fn is_latched(&self) -> bool {
        matches!(self, Self::BoundaryStop | Self::Emergency)
    }

    /// Stable upper-case name used in logs and the event stream.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Safe => "SAFE",
            Self::Warning => "WARNING",
            Self::BoundaryStop => "BOUNDARY_STOP",
            Self::Emergency => "EMERGENCY",
            Self::Recovering => "RECOVERING",
        }
    }
}

impl Default for InterlockState {
    fn default() -> Self {
        Self::Safe
    }
}

impl std::fmt::Display for InterlockState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
