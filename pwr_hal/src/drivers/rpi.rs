//! Raspberry Pi backend built on `rppal`.
//!
//! `rppal` addresses pins by Broadcom line only; header numbers are
//! translated through [`pwr_common::hal::header`]. Claimed outputs reset to
//! their previous mode when released.

use pwr_common::hal::driver::{GpioBackend, GpioError};
use pwr_common::hal::header;
use pwr_common::hal::types::{BoardMode, PinLevel};
use rppal::gpio::{Gpio, OutputPin};
use std::collections::HashMap;
use tracing::{debug, info};

/// GPIO backend driving the SoC through `/dev/gpiomem`.
pub struct RpiGpio {
    gpio: Gpio,
    mode: Option<BoardMode>,
    /// Claimed outputs keyed by Broadcom line
    outputs: HashMap<u8, OutputPin>,
}

impl RpiGpio {
    /// Open the GPIO peripheral.
    ///
    /// # Errors
    /// `GpioError::Communication` if the peripheral cannot be mapped
    /// (not a Raspberry Pi, or missing permissions).
    pub fn new() -> Result<Self, GpioError> {
        let gpio = Gpio::new().map_err(|e| GpioError::Communication(e.to_string()))?;
        info!("Opened Raspberry Pi GPIO peripheral");
        Ok(Self {
            gpio,
            mode: None,
            outputs: HashMap::new(),
        })
    }

    fn line(&self, pin: u8) -> Result<u8, GpioError> {
        let mode = self.mode.ok_or(GpioError::ModeNotSet)?;
        header::to_bcm(mode, pin).ok_or(GpioError::InvalidPin { pin, mode })
    }
}

impl GpioBackend for RpiGpio {
    fn name(&self) -> &'static str {
        "rpi"
    }

    fn set_addressing_mode(&mut self, mode: BoardMode) -> Result<(), GpioError> {
        debug!("rpi: addressing mode = {}", mode);
        self.mode = Some(mode);
        Ok(())
    }

    fn addressing_mode(&self) -> Option<BoardMode> {
        self.mode
    }

    fn configure_output(&mut self, pin: u8, initial: PinLevel) -> Result<(), GpioError> {
        let line = self.line(pin)?;
        if let Some(output) = self.outputs.get_mut(&line) {
            drive(output, initial);
            return Ok(());
        }

        let raw = self
            .gpio
            .get(line)
            .map_err(|e| GpioError::Communication(format!("BCM {line}: {e}")))?;
        let output = match initial {
            PinLevel::High => raw.into_output_high(),
            PinLevel::Low => raw.into_output_low(),
        };
        debug!("rpi: pin {} (BCM {}) output, initial {}", pin, line, initial);
        self.outputs.insert(line, output);
        Ok(())
    }

    fn write(&mut self, pin: u8, level: PinLevel) -> Result<(), GpioError> {
        let line = self.line(pin)?;
        let output = self
            .outputs
            .get_mut(&line)
            .ok_or(GpioError::PinNotConfigured(pin))?;
        drive(output, level);
        Ok(())
    }

    fn cleanup(&mut self) -> Result<(), GpioError> {
        debug!("rpi: releasing {} outputs", self.outputs.len());
        self.outputs.clear();
        self.mode = None;
        Ok(())
    }

    fn exclusive(&mut self, f: &mut dyn FnMut(&mut dyn GpioBackend)) -> Result<(), GpioError> {
        f(self);
        Ok(())
    }
}

fn drive(output: &mut OutputPin, level: PinLevel) {
    match level {
        PinLevel::High => output.set_high(),
        PinLevel::Low => output.set_low(),
    }
}

/// Factory function to create a Raspberry Pi backend instance.
pub fn create_backend() -> Result<Box<dyn GpioBackend>, GpioError> {
    Ok(Box::new(RpiGpio::new()?))
}
