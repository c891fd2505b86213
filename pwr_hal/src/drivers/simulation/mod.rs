//! Simulation backend module.
//!
//! Software GPIO board for development and testing without a Raspberry Pi.
//! Sleeps advance a virtual clock instead of blocking, so relay pulses of
//! several seconds run instantly while their timing stays observable.

mod board;

pub use board::{GpioEvent, GpioOp, SimulatedGpio, SimulationProbe};

use pwr_common::hal::driver::{GpioBackend, GpioError};

/// Factory function to create a simulation backend instance.
pub fn create_backend() -> Result<Box<dyn GpioBackend>, GpioError> {
    Ok(Box::new(SimulatedGpio::new()))
}
