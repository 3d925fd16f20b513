//! Sensor registry.
//!
//! Maps sensor kind names (`proximity`, `tilt`, `cliff`, `boundary`,
//! `vision`) to factories. Built at startup, populated via `register()`, and
//! used to turn `[[sensors]]` config entries into a `SensorHub`. No global
//! state; each test builds its own registry.

use std::collections::HashMap;

use tracing::info;

use lawn_common::interlock::config::{InterlockConfig, SensorConfig};

use super::{SensorError, SensorHub, SensorSource};

/// Factory function type for creating sensor sources from config.
pub type SensorFactory = fn(&SensorConfig) -> Result<Box<dyn SensorSource>, SensorError>;

/// Registry of available sensor factories.
pub struct SensorRegistry {
    factories: HashMap<&'static str, SensorFactory>,
}

impl SensorRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Register a factory under a kind name.
    ///
    /// # Panics
    /// Panics if a factory with the same name is already registered.
    pub fn register(&mut self, kind: &'static str, factory: SensorFactory) {
        if self.factories.contains_key(kind) {
            panic!("Sensor kind '{kind}' is already registered");
        }
        self.factories.insert(kind, factory);
    }

    /// Get a factory by kind name.
    pub fn get_factory(&self, kind: &str) -> Option<SensorFactory> {
        self.factories.get(kind).copied()
    }

    /// Create one source from its config entry.
    ///
    /// # Errors
    /// `SensorError::UnknownKind` if nothing is registered for `cfg.kind`,
    /// or whatever the factory reports for bad parameters.
    pub fn create(&self, cfg: &SensorConfig) -> Result<Box<dyn SensorSource>, SensorError> {
        let factory = self
            .get_factory(&cfg.kind)
            .ok_or_else(|| SensorError::UnknownKind(cfg.kind.clone()))?;
        factory(cfg)
    }

    /// Build a hub holding every configured sensor, in config order.
    pub fn build_hub(&self, config: &InterlockConfig) -> Result<SensorHub, SensorError> {
        let mut hub = SensorHub::new(config.adapter, &config.cycle);
        for entry in &config.sensors {
            let source = self.create(entry)?;
            hub.add(source)?;
        }
        info!(sensors = hub.len(), "sensor hub built");
        Ok(hub)
    }

    /// List all registered kind names.
    pub fn list_kinds(&self) -> Vec<&'static str> {
        let mut kinds: Vec<_> = self.factories.keys().copied().collect();
        kinds.sort_unstable();
        kinds
    }
}

impl Default for SensorRegistry {
    fn default() -> Self {
        Self::new()
    }
}
