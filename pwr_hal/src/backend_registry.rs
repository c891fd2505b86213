//! Registry of GPIO backend factories.
//!
//! Constructed at startup, populated via `register()`, and queried by name.
//! No global state, so tests build their own registries.

use pwr_common::error::RelayError;
use pwr_common::hal::driver::{BackendFactory, GpioBackend};
use std::collections::HashMap;
use tracing::error;

use crate::drivers::register_builtin;

/// Registry of available GPIO backends.
pub struct BackendRegistry {
    factories: HashMap<&'static str, BackendFactory>,
}

impl BackendRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Registry pre-populated with every backend compiled into this build.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        register_builtin(&mut registry);
        registry
    }

    /// Register a backend factory.
    ///
    /// # Panics
    /// Panics if a backend with the same name is already registered.
    pub fn register(&mut self, name: &'static str, factory: BackendFactory) {
        if self.factories.contains_key(name) {
            panic!("Backend '{name}' is already registered");
        }
        self.factories.insert(name, factory);
    }

    /// Get a backend factory by name.
    pub fn get_factory(&self, name: &str) -> Option<BackendFactory> {
        self.factories.get(name).copied()
    }

    /// Create a backend instance by name.
    ///
    /// # Errors
    /// - `RelayError::DriverNotFound` if no backend with the given name is registered
    /// - `RelayError::HardwareSetup` if the factory cannot open the hardware
    pub fn create_backend(&self, name: &str) -> Result<Box<dyn GpioBackend>, RelayError> {
        let factory = self
            .get_factory(name)
            .ok_or_else(|| RelayError::DriverNotFound(name.to_string()))?;
        factory().map_err(|e| {
            error!("Failed to open backend '{}': {}", name, e);
            RelayError::HardwareSetup(format!("backend '{name}': {e}"))
        })
    }

    /// All registered backend names, sorted.
    pub fn list_backends(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.factories.keys().copied().collect();
        names.sort_unstable();
        names
    }
}

impl Default for BackendRegistry {
    fn default() -> Self {
        Self::new()
    }
}
