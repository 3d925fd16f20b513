//! Actuator command gate.
//!
//! The only path from motion commands to the drive and blade hardware.
//! `submit()` takes the driver lock first and reads the published state
//! under it. The engine publishes EMERGENCY before it takes the same lock to
//! issue the emergency stop, so once the stop has been issued no command can
//! be forwarded, and every command is evaluated against exactly one state.
//!
//! | State | Allowed |
//! |-------|---------|
//! | SAFE | everything |
//! | WARNING | everything, velocities clamped to the reduced envelope |
//! | BOUNDARY_STOP | zero-velocity commands (blade on or off) |
//! | RECOVERING | full stops only (zero velocity, blade off) |
//! | EMERGENCY | nothing |

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, warn};

use lawn_common::actuator::{ActuatorDriver, ActuatorError};
use lawn_common::interlock::config::GateConfig;
use lawn_common::interlock::motion::MotionCommand;
use lawn_common::interlock::state::InterlockState;

use crate::events::{EventBus, InterlockEvent};
use crate::state::SafetyStateCell;

/// Driver shared between the gate (commands) and the engine (stops).
pub type SharedDriver = Arc<Mutex<Box<dyn ActuatorDriver>>>;

// ─── Outcomes ───────────────────────────────────────────────────────

/// Why a command did not reach the hardware.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockReason {
    /// Current interlock state forbids this command.
    SafetyLockout,
    /// Non-finite velocity.
    InvalidCommand,
    /// Allowed, but the driver failed to apply it.
    ActuatorFault(ActuatorError),
}

impl BlockReason {
    /// Stable code reported to callers.
    pub const fn code(&self) -> &'static str {
        match self {
            Self::SafetyLockout => "SAFETY_LOCKOUT",
            Self::InvalidCommand => "INVALID_COMMAND",
            Self::ActuatorFault(_) => "ACTUATOR_FAULT",
        }
    }
}

impl fmt::Display for BlockReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SafetyLockout => f.write_str("command blocked by safety interlock"),
            Self::InvalidCommand => f.write_str("command velocity is not a finite number"),
            Self::ActuatorFault(e) => write!(f, "actuator fault: {e}"),
        }
    }
}

/// Command forwarded to the driver.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Executed {
    /// What the driver actually received.
    pub command: MotionCommand,
    /// State the command was evaluated against.
    pub state: InterlockState,
    /// Velocities were reduced to the WARNING envelope.
    pub clamped: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Blocked {
    pub reason: BlockReason,
    pub state: InterlockState,
}

/// Caller-facing summary of a `submit()` outcome, for the web backend.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DriveResponse {
    /// `"executed"` or `"blocked"`.
    pub result: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_reason: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    pub state: InterlockState,
    pub clamped: bool,
}

impl From<&Result<Executed, Blocked>> for DriveResponse {
    fn from(outcome: &Result<Executed, Blocked>) -> Self {
        match outcome {
            Ok(ex) => Self {
                result: "executed",
                status_reason: None,
                detail: None,
                state: ex.state,
                clamped: ex.clamped,
            },
            Err(b) => Self {
                result: "blocked",
                status_reason: Some(b.reason.code()),
                detail: Some(b.reason.to_string()),
                state: b.state,
                clamped: false,
            },
        }
    }
}

// ─── Velocity Clamping ──────────────────────────────────────────────

/// Clamp a velocity to `±|limit|`, preserving direction.
#[inline]
pub fn clamp_velocity_for_safety(velocity: f64, limit: f64) -> f64 {
    let limit = limit.abs();
    velocity.clamp(-limit, limit)
}

/// Decide what the driver may receive in `state`.
///
/// Pure; `submit()` calls it under the driver lock. Returns the command to
/// forward and whether it was clamped.
pub fn evaluate(
    state: InterlockState,
    cmd: &MotionCommand,
    limits: &GateConfig,
) -> Result<(MotionCommand, bool), BlockReason> {
    use InterlockState as S;

    if state == S::Emergency {
        return Err(BlockReason::SafetyLockout);
    }
    if !cmd.is_finite() {
        return Err(BlockReason::InvalidCommand);
    }
    match state {
        S::BoundaryStop if cmd.has_motion() => Err(BlockReason::SafetyLockout),
        S::Recovering if !cmd.is_full_stop() => Err(BlockReason::SafetyLockout),
        S::Warning => {
            let mut out = *cmd;
            out.linear_velocity = clamp_velocity_for_safety(cmd.linear_velocity, limits.reduced_linear_velocity);
            out.angular_velocity = clamp_velocity_for_safety(cmd.angular_velocity, limits.reduced_angular_velocity);
            let clamped = out.linear_velocity != cmd.linear_velocity || out.angular_velocity != cmd.angular_velocity;
            Ok((out, clamped))
        }
        _ => Ok((*cmd, false)),
    }
}

// ─── Gate ───────────────────────────────────────────────────────────

/// Cloneable front door to the actuator driver.
#[derive(Clone)]
pub struct ActuatorGate {
    state: Arc<SafetyStateCell>,
    driver: SharedDriver,
    limits: GateConfig,
    bus: EventBus,
}

impl ActuatorGate {
    pub fn new(state: Arc<SafetyStateCell>, driver: SharedDriver, limits: GateConfig, bus: EventBus) -> Self {
        Self {
            state,
            driver,
            limits,
            bus,
        }
    }

    /// Evaluate `cmd` against the current state and forward it if allowed.
    pub fn submit(&self, cmd: MotionCommand) -> Result<Executed, Blocked> {
        let outcome = {
            let mut driver = self.driver.lock();
            let state = self.state.load();
            match evaluate(state, &cmd, &self.limits) {
                Ok((out, clamped)) => match driver.forward(&out) {
                    Ok(()) => Ok(Executed {
                        command: out,
                        state,
                        clamped,
                    }),
                    Err(e) => Err(Blocked {
                        reason: BlockReason::ActuatorFault(e),
                        state,
                    }),
                },
                Err(reason) => Err(Blocked { reason, state }),
            }
        };

        if let Err(b) = &outcome {
            match &b.reason {
                BlockReason::ActuatorFault(e) => {
                    warn!(state = %b.state, error = %e, source = ?cmd.source, "command not applied by actuator")
                }
                reason => debug!(state = %b.state, code = reason.code(), source = ?cmd.source, "command blocked"),
            }
            self.bus.publish(InterlockEvent::CommandBlocked {
                command: cmd,
                state: b.state,
                reason: b.reason.code(),
            });
        }
        outcome
    }

    /// State commands are currently evaluated against.
    #[inline]
    pub fn state(&self) -> InterlockState {
        self.state.load()
    }
}
