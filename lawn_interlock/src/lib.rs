//! # LawnBerry Safety Interlock
//!
//! Hazard detection and response engine for an autonomous mower. Runs a
//! periodic control loop that polls hazard sensors, classifies what they
//! report, drives the interlock state machine and gates every motion
//! command sent to the drive and blade hardware.
//!
//! ## Response Budgets
//!
//! | Path | Budget |
//! |------|--------|
//! | hazard detected → emergency cutoff acknowledged | 100 ms |
//! | boundary violation → drive halted | 200 ms |
//! | emergency cutoff unacknowledged → hardware relay | 250 ms |
//!
//! ## Layout
//!
//! - [`sensor`] - sensor sources, normalization, hub and registry
//! - [`classifier`] - pure hazard → decision mapping
//! - [`state`] - transition rules and the published state cell
//! - [`engine`] - single writer of the interlock state
//! - [`gate`] - motion command gate
//! - [`audit`] / [`events`] - append-only log and event fan-out
//! - [`watchdog`] - escalation to the hardware cutoff relay
//! - [`cycle`] - periodic loop and RT setup
//! - [`drivers`] - simulation drivers

pub mod audit;
pub mod classifier;
pub mod cycle;
pub mod drivers;
pub mod engine;
pub mod error;
pub mod events;
pub mod gate;
pub mod sensor;
pub mod state;
pub mod watchdog;

pub use engine::{InterlockEngine, InterlockHandle};
pub use error::InterlockError;
pub use gate::{ActuatorGate, BlockReason, Blocked, DriveResponse, Executed};
