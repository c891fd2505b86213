//! Prelude module for common re-exports.
//!
//! ```rust
//! use pwr_common::prelude::*;
//! ```

// ─── Configuration ──────────────────────────────────────────────────
pub use crate::config::{ConfigError, ConfigLoader, LogLevel, PwrConfig, SharedConfig};

// ─── Errors ─────────────────────────────────────────────────────────
pub use crate::error::RelayError;

// ─── Pin definitions ────────────────────────────────────────────────
pub use crate::pins::{PinDefinitions, PinResolver};

// ─── HAL ────────────────────────────────────────────────────────────
pub use crate::hal::consts::{HOLD_BUTTON_TIME, RELAY_ACTIVE_TIME};
pub use crate::hal::driver::{GpioBackend, GpioError};
pub use crate::hal::types::{BoardMode, PinLevel};
