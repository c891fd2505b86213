//! Serialized access to one process-wide GPIO backend.
//!
//! The addressing mode is global hardware state, so controllers on
//! different pins must share a single backend. `SharedGpio` wraps it behind
//! one mutex. Single calls take the lock for their own duration;
//! [`GpioBackend::exclusive`] holds it across a whole closure, which is how a
//! controller keeps its mode check, LOW write, hold and HIGH restore free of
//! interference from other handles.
//!
//! `cleanup()` stays process-wide: releasing one controller on a shared
//! backend unclaims the pins of every other controller on it too.

use pwr_common::hal::driver::{GpioBackend, GpioError};
use pwr_common::hal::types::{BoardMode, PinLevel};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::info;

/// Cloneable handle onto a mutex-guarded backend.
#[derive(Clone)]
pub struct SharedGpio {
    name: &'static str,
    inner: Arc<Mutex<Box<dyn GpioBackend>>>,
}

impl SharedGpio {
    /// Take ownership of `backend` and share it.
    pub fn new(backend: Box<dyn GpioBackend>) -> Self {
        Self {
            name: backend.name(),
            inner: Arc::new(Mutex::new(backend)),
        }
    }

    /// Boxed clone, ready to hand to a controller.
    pub fn handle(&self) -> Box<dyn GpioBackend> {
        Box::new(self.clone())
    }

    fn with<T>(
        &self,
        f: impl FnOnce(&mut dyn GpioBackend) -> Result<T, GpioError>,
    ) -> Result<T, GpioError> {
        let mut backend = self.inner.lock().map_err(|_| GpioError::LockPoisoned)?;
        f(&mut **backend)
    }
}

impl GpioBackend for SharedGpio {
    fn name(&self) -> &'static str {
        self.name
    }

    fn set_addressing_mode(&mut self, mode: BoardMode) -> Result<(), GpioError> {
        self.with(|backend| backend.set_addressing_mode(mode))
    }

    fn addressing_mode(&self) -> Option<BoardMode> {
        self.inner
            .lock()
            .ok()
            .and_then(|backend| backend.addressing_mode())
    }

    fn configure_output(&mut self, pin: u8, initial: PinLevel) -> Result<(), GpioError> {
        self.with(|backend| backend.configure_output(pin, initial))
    }

    fn write(&mut self, pin: u8, level: PinLevel) -> Result<(), GpioError> {
        self.with(|backend| backend.write(pin, level))
    }

    fn sleep(&mut self, duration: Duration) -> Result<(), GpioError> {
        self.with(|backend| backend.sleep(duration))
    }

    fn cleanup(&mut self) -> Result<(), GpioError> {
        let handles = Arc::strong_count(&self.inner);
        if handles > 1 {
            info!(
                "Cleaning up shared {} backend; pins of all {} handles are released",
                self.name, handles
            );
        }
        self.with(|backend| backend.cleanup())
    }

    fn exclusive(&mut self, f: &mut dyn FnMut(&mut dyn GpioBackend)) -> Result<(), GpioError> {
        self.with(|backend| {
            f(backend);
            Ok(())
        })
    }
}
