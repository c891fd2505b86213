//! # PWR HAL Library
//!
//! Relay control for simulating presses of a physical power button.
//!
//! A [`RelayController`] drives one active-low relay through a
//! [`GpioBackend`](pwr_common::hal::driver::GpioBackend) chosen from the
//! [`BackendRegistry`].
//!
//! # Module Structure
//!
//! - [`controller`] - `RelayController`, press/hold/release
//! - [`shared`] - `SharedGpio`, one mutex-guarded backend for many controllers
//! - [`backend_registry`] - Backend factory registration
//! - [`drivers`] - Backend implementations
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐     ┌──────────────────┐     ┌──────────────────────┐
//! │ PinResolver  │────►│ RelayController  │────►│ GpioBackend (trait)  │
//! │ (pwr_common) │     │ press/hold/...   │     │ simulation │ rpi     │
//! └──────────────┘     └──────────────────┘     └──────────────────────┘
//! ```

#![deny(missing_docs)]

pub mod backend_registry;
pub mod controller;
pub mod drivers;
pub mod shared;

// Re-export key types for convenience
pub use crate::backend_registry::BackendRegistry;
pub use crate::controller::{ControllerState, ModeChange, RelayController, RelayTiming};
pub use crate::shared::SharedGpio;
