//! Actuator driver trait and error types.
//!
//! This module defines:
//! - `ActuatorDriver` trait - Interface to the drive/blade hardware layer
//! - `ActuatorError` enum - Error types for actuator operations
//!
//! The interlock never talks to motors directly; it holds one boxed
//! `ActuatorDriver` behind the command gate's lock.

use thiserror::Error;

use crate::interlock::motion::MotionCommand;

/// Error types for actuator operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActuatorError {
    /// Hardware did not acknowledge within its sub-budget.
    #[error("Actuator '{0}' did not acknowledge")]
    Unresponsive(&'static str),

    /// Bus or link failure talking to the motor controller.
    #[error("Actuator communication error: {0}")]
    CommunicationError(String),

    /// Controller refused the command (e.g. internal fault latched).
    #[error("Actuator rejected command: {0}")]
    Rejected(String),
}

/// Trait defining the interface to the drive and blade hardware.
///
/// # Contract
///
/// - `forward()` applies a motion command that already passed the gate.
/// - `halt_drive()` brings the wheels to zero velocity; the blade keeps its
///   last commanded state.
/// - `emergency_stop()` cuts drive and blade power. `Ok(())` means the
///   hardware *acknowledged* the cutoff; any error means it did not, and the
///   interlock will retry on the next tick.
///
/// # Timing Contracts
///
/// | Operation | Max Duration |
/// |-----------|--------------|
/// | `forward()` | 5 ms |
/// | `halt_drive()` | 20 ms |
/// | `emergency_stop()` | 20 ms |
///
/// Implementations must not block indefinitely. A driver that hangs stalls
/// the control loop, at which point the cutoff watchdog trips the hardware
/// relay from its own thread.
pub trait ActuatorDriver: Send {
    /// Driver identifier (e.g. "simulation", "roboclaw").
    fn name(&self) -> &'static str;

    /// Apply a gated motion command.
    fn forward(&mut self, cmd: &MotionCommand) -> Result<(), ActuatorError>;

    /// Stop wheel motion; blade unchanged.
    fn halt_drive(&mut self) -> Result<(), ActuatorError>;

    /// Cut all actuation and wait for the hardware acknowledgment.
    fn emergency_stop(&mut self) -> Result<(), ActuatorError>;
}
