//! Prelude module for common re-exports.
//!
//! `use lawn_common::prelude::*;` brings in the types almost every consumer
//! of the interlock needs.

// ─── Configuration ──────────────────────────────────────────────────
pub use crate::config::{ConfigError, ConfigLoader, LogLevel, SharedConfig, Validate};
pub use crate::interlock::config::InterlockConfig;

// ─── Domain Types ───────────────────────────────────────────────────
pub use crate::interlock::audit::{AuditEntry, Trigger};
pub use crate::interlock::hazard::{
    HazardEvent, HazardKind, HazardSet, RequiredAction, SafetyDecision, Severity,
};
pub use crate::interlock::motion::{CommandSource, MotionCommand};
pub use crate::interlock::state::InterlockState;
pub use crate::time::Timestamp;

// ─── Hardware Contracts ─────────────────────────────────────────────
pub use crate::actuator::{ActuatorDriver, ActuatorError};
pub use crate::watchdog::{CutoffError, HardCutoff};
