//! Error taxonomy for pin resolution and relay actuation.
//!
//! Every failure from configuration or hardware access surfaces as a
//! [`RelayError`]. Nothing in the PWR crates swallows a hardware fault;
//! the caller decides recovery policy.

use crate::config::ConfigError;
use thiserror::Error;

/// Errors raised while resolving pins or driving the relay.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RelayError {
    /// Pin definition or service config file missing, unreadable or malformed.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Logical pin name or its `physical_pin` field is absent.
    #[error("Key not found: {0}")]
    KeyNotFound(String),

    /// Unrecognized or rejected addressing mode.
    #[error("Invalid addressing mode: {0}")]
    InvalidMode(String),

    /// Backend failed while configuring or writing a pin.
    #[error("Hardware setup failed: {0}")]
    HardwareSetup(String),

    /// Backend failed while releasing claimed pins.
    #[error("Hardware cleanup failed: {0}")]
    HardwareCleanup(String),

    /// The controller has been released and can no longer actuate.
    #[error("Controller on pin {pin} has been released")]
    Released {
        /// Physical pin of the released controller
        pin: u8,
    },

    /// No backend registered under the requested name.
    #[error("Driver not found: {0}")]
    DriverNotFound(String),
}

impl From<ConfigError> for RelayError {
    fn from(e: ConfigError) -> Self {
        Self::Configuration(e.to_string())
    }
}
