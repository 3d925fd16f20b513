//! Simulation drivers.
//!
//! Software stand-ins for the drive controller, the E-stop relay and the
//! hazard sensors. Each device comes with a cloneable handle so a test or
//! the host binary can inject faults and inspect what the interlock did.

mod actuator;
mod sensor;

pub use actuator::{SimActuator, SimActuatorHandle, SimRelay, SimRelayHandle};
pub use sensor::{ScriptParams, ScriptStep, ScriptedSensor, SimSensor, SimSensorHandle};

use lawn_common::interlock::config::SensorConfig;

use crate::sensor::{SensorError, SensorKind, SensorSource};

/// Factory for every sensor kind: a [`ScriptedSensor`] driven by `params`.
pub fn create_scripted_sensor(cfg: &SensorConfig) -> Result<Box<dyn SensorSource>, SensorError> {
    let kind = SensorKind::from_name(&cfg.kind).ok_or_else(|| SensorError::UnknownKind(cfg.kind.clone()))?;
    let params: ScriptParams = toml::Value::Table(cfg.params.clone())
        .try_into()
        .map_err(|e| SensorError::InvalidParams(format!("{}: {e}", cfg.name)))?;
    Ok(Box::new(ScriptedSensor::new(&cfg.name, kind, params)))
}
