//! GPIO backend implementations.
//!
//! - [`simulation`] - Software board for development and testing
//! - `rpi` - Raspberry Pi hardware via `rppal` (feature `rpi`)
//!
//! # Adding New Backends
//!
//! 1. Create a new submodule under `drivers/`
//! 2. Implement the `GpioBackend` trait from `pwr_common::hal::driver`
//! 3. Register its factory in [`register_builtin`]

#[cfg(feature = "rpi")]
pub mod rpi;
pub mod simulation;

use crate::backend_registry::BackendRegistry;

/// Register every backend compiled into this build.
pub fn register_builtin(registry: &mut BackendRegistry) {
    registry.register("simulation", simulation::create_backend);

    #[cfg(feature = "rpi")]
    registry.register("rpi", rpi::create_backend);
}
