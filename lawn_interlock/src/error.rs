//! Engine-level error type.
//!
//! Safety conditions (hazards, lockouts, unresponsive actuators) are never
//! errors: they are states, block reasons and audit entries. `InterlockError`
//! only covers failures to build or run the engine itself.

use thiserror::Error;

use lawn_common::config::ConfigError;

use crate::audit::AuditError;
use crate::cycle::CycleError;
use crate::sensor::SensorError;

#[derive(Debug, Error)]
pub enum InterlockError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("sensor setup error: {0}")]
    Sensor(#[from] SensorError),

    #[error("audit log error: {0}")]
    Audit(#[from] AuditError),

    #[error("control loop error: {0}")]
    Cycle(#[from] CycleError),

    /// The control loop that owns the engine has gone away.
    #[error("interlock input queue closed")]
    QueueClosed,
}
