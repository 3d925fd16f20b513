//! Interlock state ownership.
//!
//! - [`machine`] - pure transition rules
//! - [`cell`] - lock-free publication of the current state

pub mod cell;
pub mod machine;

pub use cell::SafetyStateCell;
pub use machine::{InterlockStateMachine, MachineInput, TransitionResult};
