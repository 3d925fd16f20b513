//! Built-in drivers.
//!
//! - [`simulation`] - software actuator, relay and sensors for bench runs
//!   and tests
//!
//! # Adding Sensor Drivers
//!
//! 1. Create a submodule under `drivers/`
//! 2. Implement [`SensorSource`](crate::sensor::SensorSource) and a
//!    [`SensorFactory`](crate::sensor::SensorFactory)
//! 3. Register the factory in [`register_all_sensors()`]

pub mod simulation;

use crate::sensor::{SensorKind, SensorRegistry};

/// Register every built-in sensor factory, one per sensor kind.
pub fn register_all_sensors(registry: &mut SensorRegistry) {
    for kind in SensorKind::ALL {
        registry.register(kind.as_str(), simulation::create_scripted_sensor);
    }
}

/// Registry with every built-in sensor factory.
pub fn default_registry() -> SensorRegistry {
    let mut registry = SensorRegistry::new();
    register_all_sensors(&mut registry);
    registry
}
