//! Relay controller for a power button wired through an active-low relay.
//!
//! The relay is energised while the pin is LOW and idles at HIGH. A press
//! drives the pin LOW for [`RELAY_ACTIVE_TIME`], a hold for
//! [`HOLD_BUTTON_TIME`]; both always return the pin to HIGH, including when
//! the LOW write or the hold fails and when the thread unwinds.
//!
//! # Lifecycle
//!
//! ```text
//! initialize() ──► Ready ──press()/hold()──► Ready ──release()──► Released
//! ```
//!
//! `Released` is terminal: actuation afterwards fails with
//! `RelayError::Released`.

use pwr_common::config::TimingConfig;
use pwr_common::error::RelayError;
use pwr_common::hal::consts::{HOLD_BUTTON_TIME, RELAY_ACTIVE_TIME};
use pwr_common::hal::driver::{GpioBackend, GpioError};
use pwr_common::hal::types::{BoardMode, PinLevel};
use pwr_common::pins::PinResolver;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Addressing scheme required before any pin write. The switch pin is a
/// header position, so writes must use header numbering.
pub const REQUIRED_MODE: BoardMode = BoardMode::Board;

/// Relay pulse durations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayTiming {
    /// LOW time for a press, and settle pause after (re)configuration
    pub relay_active: Duration,
    /// LOW time for a held button
    pub hold_button: Duration,
}

impl Default for RelayTiming {
    fn default() -> Self {
        Self {
            relay_active: RELAY_ACTIVE_TIME,
            hold_button: HOLD_BUTTON_TIME,
        }
    }
}

impl From<&TimingConfig> for RelayTiming {
    fn from(config: &TimingConfig) -> Self {
        Self {
            relay_active: config.relay_active(),
            hold_button: config.hold_button(),
        }
    }
}

/// Controller lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    /// Pin claimed and idling HIGH
    Ready,
    /// Backend cleaned up; terminal
    Released,
}

/// Outcome of [`RelayController::set_board_mode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeChange {
    /// Requested mode was already active; the backend was not touched
    Unchanged(BoardMode),
    /// Backend switched numbering
    Changed {
        /// Previous mode
        from: BoardMode,
        /// Mode now active
        to: BoardMode,
    },
}

/// Drives one relay-backed power button.
pub struct RelayController {
    switch_pin: u8,
    board_mode: BoardMode,
    timing: RelayTiming,
    backend: Box<dyn GpioBackend>,
    state: ControllerState,
}

impl RelayController {
    /// Claim `physical_pin` as an output idling HIGH and wait one settle period.
    ///
    /// # Errors
    /// `RelayError::HardwareSetup` if the mode or pin cannot be configured.
    /// The backend is cleaned up before returning, so no pin stays claimed.
    pub fn initialize(
        backend: Box<dyn GpioBackend>,
        physical_pin: u8,
        board_mode: BoardMode,
    ) -> Result<Self, RelayError> {
        Self::with_timing(backend, physical_pin, board_mode, RelayTiming::default())
    }

    /// [`Self::initialize`] for the pin held by `resolver`.
    pub fn from_resolver(
        backend: Box<dyn GpioBackend>,
        resolver: &PinResolver,
        board_mode: BoardMode,
        timing: RelayTiming,
    ) -> Result<Self, RelayError> {
        debug!(
            "Relay pin '{}' -> {} from {:?}",
            resolver.logical_key(),
            resolver.physical_pin(),
            resolver.path()
        );
        Self::with_timing(backend, resolver.physical_pin(), board_mode, timing)
    }

    /// [`Self::initialize`] with explicit pulse durations.
    pub fn with_timing(
        mut backend: Box<dyn GpioBackend>,
        physical_pin: u8,
        board_mode: BoardMode,
        timing: RelayTiming,
    ) -> Result<Self, RelayError> {
        debug!(
            "Initializing relay on pin {} ({} mode, backend {})",
            physical_pin,
            board_mode,
            backend.name()
        );

        let mut claimed = Ok(());
        let locked = backend.exclusive(&mut |gpio: &mut dyn GpioBackend| {
            claimed = gpio
                .set_addressing_mode(board_mode)
                .and_then(|()| gpio.configure_output(physical_pin, PinLevel::High))
                .and_then(|()| gpio.sleep(timing.relay_active));
        });

        if let Err(e) = locked.and(claimed) {
            error!("Failed to set up relay on pin {}: {}", physical_pin, e);
            if let Err(cleanup_err) = backend.cleanup() {
                warn!("Cleanup after failed setup also failed: {}", cleanup_err);
            }
            return Err(RelayError::HardwareSetup(format!(
                "pin {physical_pin} in {board_mode} mode: {e}"
            )));
        }

        info!("Relay ready on pin {} ({} mode)", physical_pin, board_mode);
        Ok(Self {
            switch_pin: physical_pin,
            board_mode,
            timing,
            backend,
            state: ControllerState::Ready,
        })
    }

    /// Header position driving the relay.
    pub fn switch_pin(&self) -> u8 {
        self.switch_pin
    }

    /// Addressing mode this controller last applied.
    pub fn board_mode(&self) -> BoardMode {
        self.board_mode
    }

    /// Pulse durations in use.
    pub fn timing(&self) -> RelayTiming {
        self.timing
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ControllerState {
        self.state
    }

    /// Switch the backend's addressing mode if it differs from the current one.
    ///
    /// # Errors
    /// - `RelayError::InvalidMode` if the backend rejects the mode
    /// - `RelayError::HardwareSetup` on any other backend failure
    /// - `RelayError::Released` after [`Self::release`]
    pub fn set_board_mode(&mut self, mode: BoardMode) -> Result<ModeChange, RelayError> {
        self.ensure_not_released()?;
        if mode == self.board_mode {
            debug!("Board mode already {}", mode);
            return Ok(ModeChange::Unchanged(mode));
        }

        let mut applied = Ok(None);
        let locked = self.backend.exclusive(&mut |gpio: &mut dyn GpioBackend| {
            applied = gpio
                .set_addressing_mode(mode)
                .map(|()| gpio.addressing_mode());
        });
        let active = locked.and(applied).map_err(|e| {
            error!("Failed to set board mode {}: {}", mode, e);
            match e {
                GpioError::InvalidMode(msg) => RelayError::InvalidMode(msg),
                other => RelayError::HardwareSetup(format!("set mode {mode}: {other}")),
            }
        })?;

        let from = self.board_mode;
        self.board_mode = active.unwrap_or(mode);
        info!("Board mode {} -> {}", from, self.board_mode);
        Ok(ModeChange::Changed {
            from,
            to: self.board_mode,
        })
    }

    /// [`Self::set_board_mode`] from a raw mode constant.
    ///
    /// # Errors
    /// `RelayError::InvalidMode` for an unrecognized constant.
    pub fn set_board_mode_raw(&mut self, raw: i32) -> Result<ModeChange, RelayError> {
        let mode = BoardMode::from_raw(raw).map_err(|e| {
            error!("Invalid GPIO mode: {}", e);
            RelayError::InvalidMode(e.to_string())
        })?;
        self.set_board_mode(mode)
    }

    /// Momentary press: LOW for `relay_active`, then HIGH.
    pub fn press(&mut self) -> Result<(), RelayError> {
        info!("Pressing power button on pin {}", self.switch_pin);
        self.actuate(self.timing.relay_active, "press power button")
    }

    /// Held press (forced shutdown): LOW for `hold_button`, then HIGH.
    pub fn hold(&mut self) -> Result<(), RelayError> {
        info!(
            "Holding power button on pin {} for {:?}",
            self.switch_pin, self.timing.hold_button
        );
        self.actuate(self.timing.hold_button, "hold power button")
    }

    /// Release every claimed pin and the addressing mode.
    ///
    /// Cleanup is process-wide: on a [`crate::SharedGpio`] it also unclaims
    /// the pins of every other controller sharing the backend.
    ///
    /// The first call moves the controller to `Released` even if the backend
    /// fails; later calls succeed without touching the backend.
    ///
    /// # Errors
    /// `RelayError::HardwareCleanup` if the backend reports a failure.
    pub fn release(&mut self) -> Result<(), RelayError> {
        if self.state == ControllerState::Released {
            debug!("Relay on pin {} already released", self.switch_pin);
            return Ok(());
        }
        self.state = ControllerState::Released;

        info!("Clear GPIO");
        self.backend.cleanup().map_err(|e| {
            error!("Failed to clear GPIO: {}", e);
            RelayError::HardwareCleanup(e.to_string())
        })
    }

    fn ensure_not_released(&self) -> Result<(), RelayError> {
        match self.state {
            ControllerState::Ready => Ok(()),
            ControllerState::Released => Err(RelayError::Released {
                pin: self.switch_pin,
            }),
        }
    }

    /// Settle, drive LOW for `low_for`, restore HIGH. The whole sequence
    /// runs under [`GpioBackend::exclusive`], so on a shared backend no other
    /// handle can switch numbering between the mode check and the restore.
    fn actuate(&mut self, low_for: Duration, action: &'static str) -> Result<(), RelayError> {
        self.ensure_not_released()?;

        let pin = self.switch_pin;
        let settle = self.timing.relay_active;
        let mut mode = self.board_mode;
        let mut outcome = Ok(());
        let locked = self.backend.exclusive(&mut |gpio: &mut dyn GpioBackend| {
            outcome = Self::ensure_addressing_ready(gpio, pin, settle, &mut mode)
                .and_then(|()| Self::pulse(gpio, pin, low_for, action));
        });
        self.board_mode = mode;

        locked.map_err(|e| {
            error!("Failed to {}: {}", action, e);
            RelayError::HardwareSetup(format!("{action} on pin {pin}: {e}"))
        })?;
        outcome
    }

    /// Make sure header numbering is active, re-claiming the pin if another
    /// user switched it, then pause one settle period so the following
    /// transition is not mistaken for a glitch.
    fn ensure_addressing_ready(
        gpio: &mut dyn GpioBackend,
        pin: u8,
        settle: Duration,
        mode: &mut BoardMode,
    ) -> Result<(), RelayError> {
        let active = gpio.addressing_mode();
        debug!("Switch pin {}, addressing mode {:?}", pin, active);

        let ready = if active == Some(REQUIRED_MODE) {
            Ok(())
        } else {
            Self::reclaim_switch(gpio, pin, mode)
        };

        ready.and_then(|()| gpio.sleep(settle)).map_err(|e| {
            error!("Failed to set switch mode: {}", e);
            RelayError::HardwareSetup(format!("prepare pin {pin}: {e}"))
        })
    }

    fn reclaim_switch(
        gpio: &mut dyn GpioBackend,
        pin: u8,
        mode: &mut BoardMode,
    ) -> Result<(), GpioError> {
        warn!(
            "Addressing mode is not {}; reconfiguring pin {}",
            REQUIRED_MODE, pin
        );
        gpio.set_addressing_mode(REQUIRED_MODE)?;
        *mode = REQUIRED_MODE;
        gpio.configure_output(pin, PinLevel::High)
    }

    fn pulse(
        gpio: &mut dyn GpioBackend,
        pin: u8,
        low_for: Duration,
        action: &'static str,
    ) -> Result<(), RelayError> {
        let mut pulse = RestoreHigh::engage(gpio, pin);
        let held = pulse
            .write(PinLevel::Low)
            .and_then(|()| pulse.sleep(low_for));

        let outcome = match held {
            Ok(()) => pulse.finish(),
            Err(e) => {
                // Dropping the guard drives the pin back HIGH.
                drop(pulse);
                Err(e)
            }
        };

        outcome.map_err(|e| {
            error!("Failed to {}: {}", action, e);
            RelayError::HardwareSetup(format!("{action} on pin {pin}: {e}"))
        })
    }
}

impl Drop for RelayController {
    fn drop(&mut self) {
        if self.state == ControllerState::Ready {
            warn!("Relay on pin {} dropped without release", self.switch_pin);
            if let Err(e) = self.release() {
                warn!("Release on drop failed: {}", e);
            }
        }
    }
}

/// Drives the pin back HIGH when dropped unless [`Self::finish`] ran.
struct RestoreHigh<'a> {
    backend: &'a mut dyn GpioBackend,
    pin: u8,
    armed: bool,
}

impl<'a> RestoreHigh<'a> {
    fn engage(backend: &'a mut dyn GpioBackend, pin: u8) -> Self {
        Self {
            backend,
            pin,
            armed: true,
        }
    }

    fn write(&mut self, level: PinLevel) -> Result<(), GpioError> {
        debug!("pin {} <- {}", self.pin, level);
        self.backend.write(self.pin, level)
    }

    fn sleep(&mut self, duration: Duration) -> Result<(), GpioError> {
        self.backend.sleep(duration)
    }

    /// Restore HIGH and report the result.
    fn finish(mut self) -> Result<(), GpioError> {
        self.armed = false;
        self.write(PinLevel::High)
    }
}

impl Drop for RestoreHigh<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        match self.backend.write(self.pin, PinLevel::High) {
            Ok(()) => warn!("Pin {} restored HIGH after interrupted pulse", self.pin),
            Err(e) => error!("Pin {} could not be restored HIGH: {}", self.pin, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::simulation::{GpioOp, SimulatedGpio, SimulationProbe};

    fn ready(mode: BoardMode) -> (RelayController, SimulationProbe) {
        let sim = SimulatedGpio::new();
        let probe = sim.probe();
        let controller = RelayController::initialize(Box::new(sim), 13, mode).unwrap();
        (controller, probe)
    }

    #[test]
    fn test_timing_from_config() {
        let config = TimingConfig {
            relay_active_ms: 100,
            hold_button_ms: 900,
        };
        let timing = RelayTiming::from(&config);
        assert_eq!(timing.relay_active, Duration::from_millis(100));
        assert_eq!(timing.hold_button, Duration::from_millis(900));
        assert_eq!(RelayTiming::default().hold_button, HOLD_BUTTON_TIME);
    }

    #[test]
    fn test_initialize_settles_once() {
        let (controller, probe) = ready(BoardMode::Board);
        assert_eq!(controller.state(), ControllerState::Ready);
        assert_eq!(probe.elapsed(), RELAY_ACTIVE_TIME);
        assert!(probe.writes(13).is_empty());
    }

    #[test]
    fn test_set_board_mode_raw_rejects_unknown() {
        let (mut controller, probe) = ready(BoardMode::Board);
        let result = controller.set_board_mode_raw(42);
        assert!(matches!(result, Err(RelayError::InvalidMode(_))));
        assert_eq!(probe.mode_set_count(), 1);
        assert_eq!(controller.board_mode(), BoardMode::Board);
    }

    #[test]
    fn test_backend_rejecting_mode_is_invalid_mode() {
        let (mut controller, probe) = ready(BoardMode::Board);
        probe.fail_next(
            GpioOp::SetMode,
            GpioError::InvalidMode("a different mode has already been set".into()),
        );
        let result = controller.set_board_mode(BoardMode::Bcm);
        assert!(matches!(result, Err(RelayError::InvalidMode(_))));
        assert_eq!(controller.board_mode(), BoardMode::Board);
    }

    #[test]
    fn test_restore_guard_writes_high_on_drop() {
        let mut sim = SimulatedGpio::new();
        let probe = sim.probe();
        sim.set_addressing_mode(BoardMode::Board).unwrap();
        sim.configure_output(13, PinLevel::High).unwrap();
        {
            let mut pulse = RestoreHigh::engage(&mut sim, 13);
            pulse.write(PinLevel::Low).unwrap();
        }
        assert_eq!(probe.writes(13), vec![PinLevel::Low, PinLevel::High]);
    }

    #[test]
    fn test_drop_releases_unreleased_controller() {
        let (controller, probe) = ready(BoardMode::Board);
        drop(controller);
        assert_eq!(probe.claimed_pins(), 0);
        assert_eq!(probe.addressing_mode(), None);
    }
}
