//! Addressing mode and pin level types.

use crate::hal::driver::GpioError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Pin numbering scheme.
///
/// Only one scheme can be active for the whole process; every controller
/// sharing a backend must agree on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BoardMode {
    /// Connector header position (1-40).
    #[default]
    Board,
    /// Broadcom SoC line number.
    Bcm,
}

impl BoardMode {
    /// Raw constant conventionally used for header numbering.
    pub const RAW_BOARD: i32 = 10;
    /// Raw constant conventionally used for Broadcom numbering.
    pub const RAW_BCM: i32 = 11;

    /// Decode a raw mode constant.
    ///
    /// # Errors
    /// Returns `GpioError::InvalidMode` for any value other than
    /// [`Self::RAW_BOARD`] or [`Self::RAW_BCM`].
    pub fn from_raw(raw: i32) -> Result<Self, GpioError> {
        match raw {
            Self::RAW_BOARD => Ok(Self::Board),
            Self::RAW_BCM => Ok(Self::Bcm),
            other => Err(GpioError::InvalidMode(format!("unknown mode constant {other}"))),
        }
    }
}

impl fmt::Display for BoardMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Board => write!(f, "board"),
            Self::Bcm => write!(f, "bcm"),
        }
    }
}

impl FromStr for BoardMode {
    type Err = GpioError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "board" => Ok(Self::Board),
            "bcm" => Ok(Self::Bcm),
            other => Err(GpioError::InvalidMode(format!("unknown mode '{other}'"))),
        }
    }
}

/// Logical level of a digital output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PinLevel {
    /// Driven low. Activates an active-low relay.
    Low,
    /// Driven high. Idle level for an active-low relay.
    High,
}

impl fmt::Display for PinLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Low => write!(f, "LOW"),
            Self::High => write!(f, "HIGH"),
        }
    }
}
