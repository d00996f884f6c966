//! Driver registry for servo output drivers.
//!
//! Provides a `DriverRegistry` struct for registering and retrieving actuator
//! driver factories. Constructed at startup and passed by value; no global
//! state.

use rotor_common::hal::driver::{ActuatorDriver, DriverFactory, DriverSettings, HalError};
use std::collections::HashMap;

use crate::drivers;

/// Registry of available actuator drivers.
pub struct DriverRegistry {
    factories: HashMap<&'static str, DriverFactory>,
}

impl DriverRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Registry pre-populated with every built-in driver.
    pub fn with_builtin() -> Self {
        let mut reg = Self::new();
        drivers::register_all_drivers(&mut reg);
        reg
    }

    /// Register a driver factory.
    ///
    /// # Panics
    /// Panics if a driver with the same name is already registered.
    pub fn register(&mut self, name: &'static str, factory: DriverFactory) {
        if self.factories.contains_key(name) {
            panic!("Driver '{name}' is already registered");
        }
        self.factories.insert(name, factory);
    }

    /// Get a driver factory by name.
    pub fn get_factory(&self, name: &str) -> Option<DriverFactory> {
        self.factories.get(name).copied()
    }

    /// Create a driver instance by name.
    ///
    /// # Errors
    /// Returns `HalError::DriverNotFound` if no driver with the given name is registered.
    pub fn create_driver(
        &self,
        name: &str,
        settings: &DriverSettings,
    ) -> Result<Box<dyn ActuatorDriver>, HalError> {
        let factory = self
            .get_factory(name)
            .ok_or_else(|| HalError::DriverNotFound(name.to_string()))?;
        Ok(factory(settings))
    }

    /// List all registered driver names.
    pub fn list_drivers(&self) -> Vec<&'static str> {
        self.factories.keys().copied().collect()
    }
}

impl Default for DriverRegistry {
    fn default() -> Self {
        Self::new()
    }
}
