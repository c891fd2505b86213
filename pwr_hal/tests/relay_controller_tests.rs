//! Relay controller integration tests.
//!
//! Every test runs on the simulation backend: sleeps advance a virtual
//! clock, so multi-second pulses are checked for timing without blocking.
//!
//! - Initialization leaves the relay idle (HIGH) and claims nothing on failure
//! - Press/hold write exactly `[LOW, HIGH]` with the expected LOW duration
//! - Pin returns HIGH on every failure path
//! - Board mode changes reach the backend only when the mode differs
//! - Release is terminal and idempotent

use pwr_common::error::RelayError;
use pwr_common::hal::consts::{HOLD_BUTTON_TIME, RELAY_ACTIVE_TIME};
use pwr_common::hal::driver::{GpioBackend, GpioError};
use pwr_common::hal::types::{BoardMode, PinLevel};
use pwr_common::pins::PinResolver;
use pwr_hal::drivers::simulation::{GpioEvent, GpioOp, SimulatedGpio, SimulationProbe};
use pwr_hal::{ControllerState, ModeChange, RelayController, RelayTiming, SharedGpio};
use std::fs;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tempfile::TempDir;

const PIN: u8 = 13;

// ─── Helpers ────────────────────────────────────────────────────────

fn sim() -> (Box<dyn GpioBackend>, SimulationProbe) {
    let sim = SimulatedGpio::new();
    let probe = sim.probe();
    (Box::new(sim), probe)
}

fn ready() -> (RelayController, SimulationProbe) {
    let (backend, probe) = sim();
    let controller = RelayController::initialize(backend, PIN, BoardMode::Board)
        .expect("initialize on simulation");
    (controller, probe)
}

fn bus_fault() -> GpioError {
    GpioError::Communication("bus fault".to_string())
}

// ─── Initialization ─────────────────────────────────────────────────

#[test]
fn test_initialize_leaves_pin_high() {
    let (controller, probe) = ready();

    assert_eq!(controller.state(), ControllerState::Ready);
    assert_eq!(controller.switch_pin(), PIN);
    assert_eq!(controller.board_mode(), BoardMode::Board);
    assert_eq!(probe.level(BoardMode::Board, PIN), Some(PinLevel::High));
    assert_eq!(probe.addressing_mode(), Some(BoardMode::Board));
    assert!(probe.elapsed() >= RELAY_ACTIVE_TIME);
}

#[test]
fn test_initialize_from_resolver() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("gpio_pins.json");
    fs::write(&path, r#"{"GPIO.2": {"physical_pin": 13}}"#).unwrap();
    let resolver = PinResolver::load(&path, "GPIO.2").unwrap();

    let (backend, probe) = sim();
    let controller = RelayController::from_resolver(
        backend,
        &resolver,
        BoardMode::Board,
        RelayTiming::default(),
    )
    .unwrap();

    assert_eq!(controller.switch_pin(), 13);
    assert_eq!(probe.level(BoardMode::Board, 13), Some(PinLevel::High));
}

#[test]
fn test_initialize_invalid_pin_claims_nothing() {
    let (backend, probe) = sim();

    // Header position 6 is ground.
    let result = RelayController::initialize(backend, 6, BoardMode::Board);

    assert!(matches!(result, Err(RelayError::HardwareSetup(_))));
    assert_eq!(probe.claimed_pins(), 0);
    assert_eq!(probe.addressing_mode(), None);
}

#[test]
fn test_initialize_mode_failure_claims_nothing() {
    let (backend, probe) = sim();
    probe.fail_next(GpioOp::SetMode, bus_fault());

    let result = RelayController::initialize(backend, PIN, BoardMode::Board);

    assert!(matches!(result, Err(RelayError::HardwareSetup(_))));
    assert_eq!(probe.claimed_pins(), 0);
    assert!(matches!(probe.events().last(), Some(GpioEvent::Cleanup { .. })));
}

#[test]
fn test_initialize_settle_failure_releases_pin() {
    let (backend, probe) = sim();
    probe.fail_next(GpioOp::Sleep, bus_fault());

    let result = RelayController::initialize(backend, PIN, BoardMode::Board);

    assert!(matches!(result, Err(RelayError::HardwareSetup(_))));
    assert_eq!(probe.claimed_pins(), 0);
}

// ─── Press / hold ───────────────────────────────────────────────────

#[test]
fn test_press_writes_low_then_high() {
    let (mut controller, probe) = ready();
    let before = probe.elapsed();

    controller.press().unwrap();

    assert_eq!(probe.writes(PIN), vec![PinLevel::Low, PinLevel::High]);
    assert_eq!(probe.level(BoardMode::Board, PIN), Some(PinLevel::High));
    assert!(probe.elapsed() - before >= RELAY_ACTIVE_TIME);
    assert_eq!(probe.low_durations(PIN), vec![RELAY_ACTIVE_TIME]);
}

#[test]
fn test_hold_writes_low_then_high() {
    let (mut controller, probe) = ready();
    let before = probe.elapsed();

    controller.hold().unwrap();

    assert_eq!(probe.writes(PIN), vec![PinLevel::Low, PinLevel::High]);
    assert_eq!(probe.level(BoardMode::Board, PIN), Some(PinLevel::High));
    assert!(probe.elapsed() - before >= HOLD_BUTTON_TIME);
    assert_eq!(probe.low_durations(PIN), vec![HOLD_BUTTON_TIME]);
}

#[test]
fn test_hold_low_longer_than_press() {
    let (mut controller, probe) = ready();

    controller.press().unwrap();
    controller.hold().unwrap();

    let lows = probe.low_durations(PIN);
    assert_eq!(lows.len(), 2);
    assert!(lows[1] > lows[0]);
}

#[test]
fn test_press_is_idempotent_on_resting_state() {
    let (mut controller, probe) = ready();

    for _ in 0..3 {
        controller.press().unwrap();
        assert_eq!(probe.level(BoardMode::Board, PIN), Some(PinLevel::High));
    }
    assert_eq!(probe.writes(PIN).len(), 6);
    assert_eq!(controller.state(), ControllerState::Ready);
}

#[test]
fn test_press_settles_before_driving_low() {
    let (mut controller, probe) = ready();
    let before = probe.elapsed();

    controller.press().unwrap();

    let low_at = probe
        .events()
        .iter()
        .find_map(|event| match event {
            GpioEvent::Write {
                at,
                level: PinLevel::Low,
                ..
            } => Some(*at),
            _ => None,
        })
        .unwrap();
    assert_eq!(low_at - before, RELAY_ACTIVE_TIME);
}

#[test]
fn test_custom_timing() {
    let (backend, probe) = sim();
    let timing = RelayTiming {
        relay_active: Duration::from_millis(200),
        hold_button: Duration::from_millis(4200),
    };
    let mut controller =
        RelayController::with_timing(backend, PIN, BoardMode::Board, timing).unwrap();

    controller.hold().unwrap();

    assert_eq!(probe.low_durations(PIN), vec![Duration::from_millis(4200)]);
    assert_eq!(controller.timing(), timing);
}

// ─── Restore-HIGH on failure ────────────────────────────────────────

#[test]
fn test_failed_hold_sleep_restores_high() {
    let (mut controller, probe) = ready();
    // Let the settle pause through, fail the hold itself.
    probe.fail_after(GpioOp::Sleep, 1, bus_fault());

    let result = controller.hold();

    assert!(matches!(result, Err(RelayError::HardwareSetup(_))));
    assert_eq!(probe.writes(PIN), vec![PinLevel::Low, PinLevel::High]);
    assert_eq!(probe.level(BoardMode::Board, PIN), Some(PinLevel::High));
}

#[test]
fn test_failed_settle_never_drives_low() {
    let (mut controller, probe) = ready();
    probe.fail_next(GpioOp::Sleep, bus_fault());

    let result = controller.press();

    assert!(matches!(result, Err(RelayError::HardwareSetup(_))));
    assert!(probe.writes(PIN).is_empty());
    assert_eq!(probe.level(BoardMode::Board, PIN), Some(PinLevel::High));
}

/// Simulation backend whose sleep panics once its budget is spent.
struct PanicOnSleep {
    inner: SimulatedGpio,
    sleeps_left: usize,
}

impl GpioBackend for PanicOnSleep {
    fn name(&self) -> &'static str {
        "panic-on-sleep"
    }

    fn set_addressing_mode(&mut self, mode: BoardMode) -> Result<(), GpioError> {
        self.inner.set_addressing_mode(mode)
    }

    fn addressing_mode(&self) -> Option<BoardMode> {
        self.inner.addressing_mode()
    }

    fn configure_output(&mut self, pin: u8, initial: PinLevel) -> Result<(), GpioError> {
        self.inner.configure_output(pin, initial)
    }

    fn write(&mut self, pin: u8, level: PinLevel) -> Result<(), GpioError> {
        self.inner.write(pin, level)
    }

    fn sleep(&mut self, duration: Duration) -> Result<(), GpioError> {
        if self.sleeps_left == 0 {
            panic!("sleep interrupted");
        }
        self.sleeps_left -= 1;
        self.inner.sleep(duration)
    }

    fn cleanup(&mut self) -> Result<(), GpioError> {
        self.inner.cleanup()
    }

    fn exclusive(&mut self, f: &mut dyn FnMut(&mut dyn GpioBackend)) -> Result<(), GpioError> {
        f(self);
        Ok(())
    }
}

#[test]
fn test_unwinding_during_pulse_restores_high() {
    let sim = SimulatedGpio::new();
    let probe = sim.probe();
    // Initialize settle + press settle, then the press hold panics.
    let backend = PanicOnSleep {
        inner: sim,
        sleeps_left: 2,
    };
    let mut controller =
        RelayController::initialize(Box::new(backend), PIN, BoardMode::Board).unwrap();

    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| controller.press()));

    assert!(result.is_err());
    assert_eq!(probe.writes(PIN), vec![PinLevel::Low, PinLevel::High]);
    assert_eq!(probe.level(BoardMode::Board, PIN), Some(PinLevel::High));
}

#[test]
fn test_failed_low_write_restores_high() {
    let (mut controller, probe) = ready();
    probe.fail_next(GpioOp::Write, bus_fault());

    let result = controller.press();

    assert!(matches!(result, Err(RelayError::HardwareSetup(_))));
    // The LOW write failed; the guard still drove HIGH.
    assert_eq!(probe.writes(PIN), vec![PinLevel::High]);
    assert_eq!(probe.level(BoardMode::Board, PIN), Some(PinLevel::High));
    assert_eq!(controller.state(), ControllerState::Ready);
}

// ─── Addressing mode ────────────────────────────────────────────────

#[test]
fn test_same_board_mode_skips_backend() {
    let (mut controller, probe) = ready();
    let calls = probe.mode_set_count();

    let change = controller.set_board_mode(BoardMode::Board).unwrap();

    assert_eq!(change, ModeChange::Unchanged(BoardMode::Board));
    assert_eq!(probe.mode_set_count(), calls);
}

#[test]
fn test_different_board_mode_calls_backend_once() {
    let (mut controller, probe) = ready();
    let calls = probe.mode_set_count();

    let change = controller.set_board_mode(BoardMode::Bcm).unwrap();

    assert_eq!(
        change,
        ModeChange::Changed {
            from: BoardMode::Board,
            to: BoardMode::Bcm
        }
    );
    assert_eq!(probe.mode_set_count(), calls + 1);
    assert_eq!(controller.board_mode(), BoardMode::Bcm);
    assert_eq!(probe.addressing_mode(), Some(BoardMode::Bcm));
}

#[test]
fn test_press_restores_header_numbering() {
    let (mut controller, probe) = ready();
    controller.set_board_mode(BoardMode::Bcm).unwrap();

    controller.press().unwrap();

    assert_eq!(probe.addressing_mode(), Some(BoardMode::Board));
    assert_eq!(controller.board_mode(), BoardMode::Board);
    assert_eq!(probe.writes(PIN), vec![PinLevel::Low, PinLevel::High]);
    assert_eq!(probe.level(BoardMode::Board, PIN), Some(PinLevel::High));
}

#[test]
fn test_reclaim_failure_is_setup_error() {
    let (mut controller, probe) = ready();
    controller.set_board_mode(BoardMode::Bcm).unwrap();
    probe.fail_next(GpioOp::ConfigureOutput, bus_fault());

    let result = controller.press();

    assert!(matches!(result, Err(RelayError::HardwareSetup(_))));
    assert!(probe.writes(PIN).is_empty());
}

// ─── Release ────────────────────────────────────────────────────────

#[test]
fn test_release_is_terminal() {
    let (mut controller, probe) = ready();
    controller.press().unwrap();
    controller.hold().unwrap();

    controller.release().unwrap();

    assert_eq!(controller.state(), ControllerState::Released);
    assert_eq!(probe.claimed_pins(), 0);
    assert!(matches!(
        controller.press(),
        Err(RelayError::Released { pin: PIN })
    ));
    assert!(matches!(
        controller.hold(),
        Err(RelayError::Released { .. })
    ));
    assert!(matches!(
        controller.set_board_mode(BoardMode::Bcm),
        Err(RelayError::Released { .. })
    ));
}

#[test]
fn test_release_twice_succeeds() {
    let (mut controller, probe) = ready();

    controller.release().unwrap();
    controller.release().unwrap();

    let cleanups = probe
        .events()
        .iter()
        .filter(|event| matches!(event, GpioEvent::Cleanup { .. }))
        .count();
    assert_eq!(cleanups, 1);
}

#[test]
fn test_release_after_failed_press_succeeds() {
    let (mut controller, probe) = ready();
    probe.fail_next(GpioOp::Write, bus_fault());
    assert!(controller.press().is_err());

    controller.release().unwrap();

    assert_eq!(controller.state(), ControllerState::Released);
}

#[test]
fn test_release_failure_is_cleanup_error_and_terminal() {
    let (mut controller, probe) = ready();
    probe.fail_next(GpioOp::Cleanup, bus_fault());

    let result = controller.release();

    assert!(matches!(result, Err(RelayError::HardwareCleanup(_))));
    assert_eq!(controller.state(), ControllerState::Released);
    assert!(controller.press().is_err());
}

// ─── Shared backend ─────────────────────────────────────────────────

#[test]
fn test_controllers_share_one_backend() {
    let sim = SimulatedGpio::new();
    let probe = sim.probe();
    let shared = SharedGpio::new(Box::new(sim));

    let mut power = RelayController::initialize(shared.handle(), 13, BoardMode::Board).unwrap();
    let mut reset = RelayController::initialize(shared.handle(), 11, BoardMode::Board).unwrap();

    power.press().unwrap();
    reset.hold().unwrap();

    assert_eq!(probe.writes(13), vec![PinLevel::Low, PinLevel::High]);
    assert_eq!(probe.writes(11), vec![PinLevel::Low, PinLevel::High]);
    assert_eq!(probe.low_durations(11), vec![HOLD_BUTTON_TIME]);

    power.release().unwrap();
    reset.release().unwrap();
    assert_eq!(probe.claimed_pins(), 0);
}

#[test]
fn test_release_on_shared_backend_frees_every_pin() {
    let sim = SimulatedGpio::new();
    let probe = sim.probe();
    let shared = SharedGpio::new(Box::new(sim));

    let mut power = RelayController::initialize(shared.handle(), 13, BoardMode::Board).unwrap();
    let mut reset = RelayController::initialize(shared.handle(), 11, BoardMode::Board).unwrap();
    assert_eq!(probe.claimed_pins(), 2);

    power.release().unwrap();
    assert_eq!(probe.claimed_pins(), 0);
    assert_eq!(probe.level(BoardMode::Board, 11), None);

    // The survivor re-claims its pin on the next actuation.
    reset.press().unwrap();
    assert_eq!(probe.writes(11), vec![PinLevel::Low, PinLevel::High]);
    assert_eq!(probe.level(BoardMode::Board, 11), Some(PinLevel::High));
    assert_eq!(probe.claimed_pins(), 1);
}

#[test]
fn test_concurrent_mode_switches_never_leave_relay_low() {
    let sim = SimulatedGpio::new();
    let probe = sim.probe();
    let shared = SharedGpio::new(Box::new(sim));
    let timing = RelayTiming {
        relay_active: Duration::from_millis(1),
        hold_button: Duration::from_millis(5),
    };
    let mut controller =
        RelayController::with_timing(shared.handle(), PIN, BoardMode::Board, timing).unwrap();

    let stop = Arc::new(AtomicBool::new(false));
    let switcher = {
        let stop = Arc::clone(&stop);
        let mut other = shared.handle();
        std::thread::spawn(move || {
            while !stop.load(Ordering::Relaxed) {
                other.set_addressing_mode(BoardMode::Bcm).unwrap();
                std::thread::yield_now();
            }
        })
    };

    for n in 0..2_000 {
        let result = if n % 10 == 0 {
            controller.hold()
        } else {
            controller.press()
        };
        assert!(result.is_ok(), "actuation {n} failed: {result:?}");
        assert_eq!(
            probe.level(BoardMode::Board, PIN),
            Some(PinLevel::High),
            "pin left energised after actuation {n}"
        );
    }

    stop.store(true, Ordering::Relaxed);
    switcher.join().unwrap();
    controller.release().unwrap();
    assert_eq!(probe.claimed_pins(), 0);
}
