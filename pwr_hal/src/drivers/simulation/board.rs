//! Simulated GPIO board with a virtual clock and an event log.

use pwr_common::hal::driver::{GpioBackend, GpioError};
use pwr_common::hal::header;
use pwr_common::hal::types::{BoardMode, PinLevel};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::{debug, trace};

/// Backend operation, used to target fault injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GpioOp {
    /// `set_addressing_mode`
    SetMode,
    /// `configure_output`
    ConfigureOutput,
    /// `write`
    Write,
    /// `sleep`
    Sleep,
    /// `cleanup`
    Cleanup,
}

/// One recorded backend call. `at` is the virtual time when it happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GpioEvent {
    /// Addressing mode selected
    ModeSet {
        /// Virtual timestamp
        at: Duration,
        /// New mode
        mode: BoardMode,
    },
    /// Pin claimed as output
    OutputConfigured {
        /// Virtual timestamp
        at: Duration,
        /// Pin number in the active mode
        pin: u8,
        /// Level driven on claim
        initial: PinLevel,
    },
    /// Output level written
    Write {
        /// Virtual timestamp
        at: Duration,
        /// Pin number in the active mode
        pin: u8,
        /// Level written
        level: PinLevel,
    },
    /// Virtual clock advanced
    Slept {
        /// Virtual timestamp at the start of the sleep
        at: Duration,
        /// Sleep length
        duration: Duration,
    },
    /// All pins released
    Cleanup {
        /// Virtual timestamp
        at: Duration,
    },
}

/// Shared board state behind the backend and its probes.
#[derive(Debug, Default)]
struct BoardState {
    mode: Option<BoardMode>,
    /// Output levels keyed by Broadcom line, so numbering changes never alias.
    outputs: HashMap<u8, PinLevel>,
    clock: Duration,
    events: Vec<GpioEvent>,
    /// Armed faults: calls to let through first, then the error to return.
    faults: HashMap<GpioOp, (usize, GpioError)>,
}

impl BoardState {
    /// Consume a fault armed for `op`, if any.
    fn take_fault(&mut self, op: GpioOp) -> Result<(), GpioError> {
        let Some((skip, _)) = self.faults.get_mut(&op) else {
            return Ok(());
        };
        if *skip > 0 {
            *skip -= 1;
            return Ok(());
        }
        match self.faults.remove(&op) {
            Some((_, err)) => {
                debug!("Injected fault on {:?}: {}", op, err);
                Err(err)
            }
            None => Ok(()),
        }
    }

    fn line(&self, pin: u8) -> Result<u8, GpioError> {
        let mode = self.mode.ok_or(GpioError::ModeNotSet)?;
        header::to_bcm(mode, pin).ok_or(GpioError::InvalidPin { pin, mode })
    }
}

/// In-memory GPIO backend.
pub struct SimulatedGpio {
    board: Arc<Mutex<BoardState>>,
}

impl SimulatedGpio {
    /// Create a board with no addressing mode and no claimed pins.
    pub fn new() -> Self {
        Self {
            board: Arc::new(Mutex::new(BoardState::default())),
        }
    }

    /// Handle for inspecting the board after it has been moved into a controller.
    pub fn probe(&self) -> SimulationProbe {
        SimulationProbe {
            board: Arc::clone(&self.board),
        }
    }

    fn state(&self) -> Result<MutexGuard<'_, BoardState>, GpioError> {
        self.board.lock().map_err(|_| GpioError::LockPoisoned)
    }
}

impl Default for SimulatedGpio {
    fn default() -> Self {
        Self::new()
    }
}

impl GpioBackend for SimulatedGpio {
    fn name(&self) -> &'static str {
        "simulation"
    }

    fn set_addressing_mode(&mut self, mode: BoardMode) -> Result<(), GpioError> {
        let mut board = self.state()?;
        board.take_fault(GpioOp::SetMode)?;
        let at = board.clock;
        board.mode = Some(mode);
        board.events.push(GpioEvent::ModeSet { at, mode });
        debug!("sim: addressing mode = {}", mode);
        Ok(())
    }

    fn addressing_mode(&self) -> Option<BoardMode> {
        self.state().ok().and_then(|board| board.mode)
    }

    fn configure_output(&mut self, pin: u8, initial: PinLevel) -> Result<(), GpioError> {
        let mut board = self.state()?;
        board.take_fault(GpioOp::ConfigureOutput)?;
        let line = board.line(pin)?;
        let at = board.clock;
        board.outputs.insert(line, initial);
        board.events.push(GpioEvent::OutputConfigured { at, pin, initial });
        debug!("sim: pin {} (BCM {}) output, initial {}", pin, line, initial);
        Ok(())
    }

    fn write(&mut self, pin: u8, level: PinLevel) -> Result<(), GpioError> {
        let mut board = self.state()?;
        board.take_fault(GpioOp::Write)?;
        let line = board.line(pin)?;
        let at = board.clock;
        let slot = board
            .outputs
            .get_mut(&line)
            .ok_or(GpioError::PinNotConfigured(pin))?;
        *slot = level;
        board.events.push(GpioEvent::Write { at, pin, level });
        trace!("sim: pin {} <- {}", pin, level);
        Ok(())
    }

    fn sleep(&mut self, duration: Duration) -> Result<(), GpioError> {
        let mut board = self.state()?;
        board.take_fault(GpioOp::Sleep)?;
        let at = board.clock;
        board.clock += duration;
        board.events.push(GpioEvent::Slept { at, duration });
        Ok(())
    }

    fn cleanup(&mut self) -> Result<(), GpioError> {
        let mut board = self.state()?;
        board.take_fault(GpioOp::Cleanup)?;
        let at = board.clock;
        debug!("sim: cleanup, releasing {} outputs", board.outputs.len());
        board.outputs.clear();
        board.mode = None;
        board.events.push(GpioEvent::Cleanup { at });
        Ok(())
    }

    fn exclusive(&mut self, f: &mut dyn FnMut(&mut dyn GpioBackend)) -> Result<(), GpioError> {
        f(self);
        Ok(())
    }
}

/// Read-side handle onto a [`SimulatedGpio`] board.
#[derive(Clone)]
pub struct SimulationProbe {
    board: Arc<Mutex<BoardState>>,
}

impl SimulationProbe {
    fn state(&self) -> MutexGuard<'_, BoardState> {
        self.board.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Every recorded backend call, oldest first.
    pub fn events(&self) -> Vec<GpioEvent> {
        self.state().events.clone()
    }

    /// Levels written to `pin` (in the numbering used at write time), in order.
    pub fn writes(&self, pin: u8) -> Vec<PinLevel> {
        self.state()
            .events
            .iter()
            .filter_map(|event| match event {
                GpioEvent::Write { pin: p, level, .. } if *p == pin => Some(*level),
                _ => None,
            })
            .collect()
    }

    /// Time each LOW write on `pin` lasted until the next HIGH write.
    pub fn low_durations(&self, pin: u8) -> Vec<Duration> {
        let mut durations = Vec::new();
        let mut low_since = None;
        for event in &self.state().events {
            if let GpioEvent::Write { at, pin: p, level } = event {
                if *p != pin {
                    continue;
                }
                match level {
                    PinLevel::Low => low_since = low_since.or(Some(*at)),
                    PinLevel::High => {
                        if let Some(start) = low_since.take() {
                            durations.push(*at - start);
                        }
                    }
                }
            }
        }
        durations
    }

    /// Current level of a claimed output, `None` if unclaimed or invalid.
    pub fn level(&self, mode: BoardMode, pin: u8) -> Option<PinLevel> {
        let line = header::to_bcm(mode, pin)?;
        self.state().outputs.get(&line).copied()
    }

    /// Active addressing mode.
    pub fn addressing_mode(&self) -> Option<BoardMode> {
        self.state().mode
    }

    /// Number of `set_addressing_mode` calls that reached the board.
    pub fn mode_set_count(&self) -> usize {
        self.state()
            .events
            .iter()
            .filter(|event| matches!(event, GpioEvent::ModeSet { .. }))
            .count()
    }

    /// Number of pins currently claimed.
    pub fn claimed_pins(&self) -> usize {
        self.state().outputs.len()
    }

    /// Virtual time elapsed since the board was created.
    pub fn elapsed(&self) -> Duration {
        self.state().clock
    }

    /// Make the next call of `op` fail with `err`.
    pub fn fail_next(&self, op: GpioOp, err: GpioError) {
        self.fail_after(op, 0, err);
    }

    /// Let `skip` calls of `op` succeed, then fail the following one with `err`.
    pub fn fail_after(&self, op: GpioOp, skip: usize, err: GpioError) {
        self.state().faults.insert(op, (skip, err));
    }
}
