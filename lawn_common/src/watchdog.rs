//! # Hard Cutoff Trait
//!
//! Contract for the hardware E-stop relay that removes motor power when the
//! software stop path is not acknowledged in time. The relay is the last
//! line of defence: tripping it must not depend on the actuator driver or on
//! the control loop thread being alive.

use thiserror::Error;

/// Error type for relay operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CutoffError {
    /// Relay GPIO or controller could not be driven.
    #[error("relay '{relay}' failed to trip: {reason}")]
    TripFailed { relay: &'static str, reason: String },
}

/// Hardware E-stop relay.
///
/// # Contract
///
/// - `trip()` is idempotent; tripping an already tripped relay succeeds.
/// - Once tripped, the relay stays open until reset by hand. There is no
///   software reset.
pub trait HardCutoff: Send {
    /// Relay identifier used in logs.
    fn name(&self) -> &'static str;

    /// Open the relay and remove motor power.
    fn trip(&mut self) -> Result<(), CutoffError>;

    /// Whether the relay is currently open.
    fn is_tripped(&self) -> bool;
}
