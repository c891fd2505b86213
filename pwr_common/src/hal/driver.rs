//! GPIO backend trait and error types.
//!
//! This module defines:
//! - `GpioBackend` trait - Capability set every GPIO backend provides
//! - `GpioError` enum - Error types reported by backends
//! - `BackendFactory` type alias - Factory function type

use crate::hal::types::{BoardMode, PinLevel};
use std::time::Duration;
use thiserror::Error;

/// Error types for GPIO backend operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GpioError {
    /// Addressing mode is unknown or not supported by the backend
    #[error("Invalid addressing mode: {0}")]
    InvalidMode(String),

    /// Pin number does not name a GPIO line in the active addressing mode
    #[error("Pin {pin} is not a GPIO line in {mode} mode")]
    InvalidPin {
        /// Requested pin number
        pin: u8,
        /// Addressing mode the number was interpreted in
        mode: BoardMode,
    },

    /// A pin operation was attempted before any addressing mode was set
    #[error("Addressing mode has not been set")]
    ModeNotSet,

    /// Write to a pin that was never configured as an output
    #[error("Pin {0} is not configured as an output")]
    PinNotConfigured(u8),

    /// Hardware communication error
    #[error("Hardware communication error: {0}")]
    Communication(String),

    /// Shared backend lock was poisoned by a panicking holder
    #[error("Backend lock poisoned")]
    LockPoisoned,
}

/// Factory function type for creating backend instances.
pub type BackendFactory = fn() -> Result<Box<dyn GpioBackend>, GpioError>;

/// Capability set a relay controller needs from the GPIO layer.
///
/// Backends treat the addressing mode as process-wide state: the pin number
/// passed to `configure_output` and `write` is interpreted in whatever mode
/// is currently active.
///
/// # Lifecycle
///
/// 1. `set_addressing_mode()` - Select pin numbering
/// 2. `configure_output()` - Claim a pin as a digital output
/// 3. `write()` / `sleep()` - Drive the pin
/// 4. `cleanup()` - Release every claimed pin and the addressing mode
pub trait GpioBackend: Send {
    /// Returns the backend's identifier (e.g., "simulation", "rpi").
    fn name(&self) -> &'static str;

    /// Select the pin numbering scheme.
    ///
    /// Setting the mode that is already active is a no-op.
    fn set_addressing_mode(&mut self, mode: BoardMode) -> Result<(), GpioError>;

    /// Currently active numbering scheme, `None` if never set or cleaned up.
    fn addressing_mode(&self) -> Option<BoardMode>;

    /// Claim `pin` as a digital output driven to `initial`.
    fn configure_output(&mut self, pin: u8, initial: PinLevel) -> Result<(), GpioError>;

    /// Drive a configured output to `level`.
    fn write(&mut self, pin: u8, level: PinLevel) -> Result<(), GpioError>;

    /// Block for `duration`.
    ///
    /// Default implementation sleeps the calling thread. Simulated backends
    /// override this to advance a virtual clock instead.
    fn sleep(&mut self, duration: Duration) -> Result<(), GpioError> {
        std::thread::sleep(duration);
        Ok(())
    }

    /// Release all claimed pins and forget the addressing mode.
    ///
    /// Process-wide: every pin claimed through this backend is released,
    /// whoever claimed it.
    fn cleanup(&mut self) -> Result<(), GpioError>;

    /// Run `f` with exclusive access to the backend.
    ///
    /// Backends reachable through several handles must keep every other
    /// handle out for the whole of `f`, so a mode check, the writes that rely
    /// on it and the sleeps in between form one critical section. Backends
    /// owned by a single handle just call `f(self)`.
    ///
    /// # Errors
    /// Only failures to obtain access; errors from inside `f` are for the
    /// caller to carry out of the closure.
    fn exclusive(&mut self, f: &mut dyn FnMut(&mut dyn GpioBackend)) -> Result<(), GpioError>;
}

impl<B: GpioBackend + ?Sized> GpioBackend for Box<B> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn set_addressing_mode(&mut self, mode: BoardMode) -> Result<(), GpioError> {
        (**self).set_addressing_mode(mode)
    }

    fn addressing_mode(&self) -> Option<BoardMode> {
        (**self).addressing_mode()
    }

    fn configure_output(&mut self, pin: u8, initial: PinLevel) -> Result<(), GpioError> {
        (**self).configure_output(pin, initial)
    }

    fn write(&mut self, pin: u8, level: PinLevel) -> Result<(), GpioError> {
        (**self).write(pin, level)
    }

    fn sleep(&mut self, duration: Duration) -> Result<(), GpioError> {
        (**self).sleep(duration)
    }

    fn cleanup(&mut self) -> Result<(), GpioError> {
        (**self).cleanup()
    }

    fn exclusive(&mut self, f: &mut dyn FnMut(&mut dyn GpioBackend)) -> Result<(), GpioError> {
        (**self).exclusive(f)
    }
}
