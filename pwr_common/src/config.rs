//! Configuration loading traits and types.
//!
//! This module provides the TOML service configuration for PWR binaries.
//! Pin assignments live in a separate JSON file, see [`crate::pins`].
//!
//! # Usage
//!
//! ```rust,no_run
//! use pwr_common::config::{ConfigError, ConfigLoader, PwrConfig};
//! use std::path::Path;
//!
//! fn main() -> Result<(), ConfigError> {
//!     let config = PwrConfig::load(Path::new("/etc/pwr/pwr.toml"))?;
//!     config.validate()?;
//!     println!("Service: {}", config.shared.service_name);
//!     Ok(())
//! }
//! ```

use crate::hal::consts::{
    DEFAULT_DRIVER, DEFAULT_PIN_NAME, DEFAULT_PINS_FILE, HOLD_BUTTON_TIME, RELAY_ACTIVE_TIME,
};
use crate::hal::types::BoardMode;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Error type for configuration loading operations.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// Configuration file not found at specified path.
    #[error("Configuration file not found")]
    FileNotFound,

    /// TOML parsing failed.
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    /// Semantic validation failed.
    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

/// Log level for application logging.
///
/// Uses lowercase serde values for TOML compatibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Most verbose, detailed tracing information.
    Trace,
    /// Debug information useful during development.
    Debug,
    /// General information about application operation.
    #[default]
    Info,
    /// Warning messages for potentially problematic situations.
    Warn,
    /// Error messages for serious problems.
    Error,
}

impl LogLevel {
    /// Directive string understood by `tracing_subscriber::EnvFilter`.
    pub const fn as_directive(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

/// Common configuration fields shared across PWR applications.
///
/// # TOML Example
///
/// ```toml
/// [shared]
/// log_level = "debug"
/// service_name = "pwr-rack-01"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SharedConfig {
    /// Logging verbosity level.
    #[serde(default)]
    pub log_level: LogLevel,

    /// Application instance identifier.
    pub service_name: String,
}

impl SharedConfig {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` if `service_name` is empty.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.service_name.is_empty() {
            return Err(ConfigError::ValidationError(
                "service_name cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

fn default_pins_file() -> PathBuf {
    PathBuf::from(DEFAULT_PINS_FILE)
}

fn default_pin_name() -> String {
    DEFAULT_PIN_NAME.to_string()
}

fn default_driver() -> String {
    DEFAULT_DRIVER.to_string()
}

fn default_relay_active_ms() -> u64 {
    RELAY_ACTIVE_TIME.as_millis() as u64
}

fn default_hold_button_ms() -> u64 {
    HOLD_BUTTON_TIME.as_millis() as u64
}

/// Which relay to drive and through which backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RelaySection {
    /// Pin definition file. Relative paths resolve against the directory
    /// containing the TOML file.
    #[serde(default = "default_pins_file")]
    pub pins_file: PathBuf,

    /// Logical pin name to look up in `pins_file`.
    #[serde(default = "default_pin_name")]
    pub pin_name: String,

    /// Addressing mode claimed at initialization.
    #[serde(default)]
    pub board_mode: BoardMode,

    /// Backend name (e.g., "simulation", "rpi").
    #[serde(default = "default_driver")]
    pub driver: String,
}

impl Default for RelaySection {
    fn default() -> Self {
        Self {
            pins_file: default_pins_file(),
            pin_name: default_pin_name(),
            board_mode: BoardMode::default(),
            driver: default_driver(),
        }
    }
}

/// Relay pulse durations in milliseconds.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TimingConfig {
    /// Press duration and settle pause.
    #[serde(default = "default_relay_active_ms")]
    pub relay_active_ms: u64,

    /// Held-button duration.
    #[serde(default = "default_hold_button_ms")]
    pub hold_button_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            relay_active_ms: default_relay_active_ms(),
            hold_button_ms: default_hold_button_ms(),
        }
    }
}

impl TimingConfig {
    /// Press duration as `Duration`.
    pub fn relay_active(&self) -> Duration {
        Duration::from_millis(self.relay_active_ms)
    }

    /// Hold duration as `Duration`.
    pub fn hold_button(&self) -> Duration {
        Duration::from_millis(self.hold_button_ms)
    }

    /// Validate the timing.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` if either duration is zero or
    /// the hold is not longer than the press.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.relay_active_ms == 0 || self.hold_button_ms == 0 {
            return Err(ConfigError::ValidationError(
                "relay timings must be greater than zero".to_string(),
            ));
        }
        if self.hold_button_ms <= self.relay_active_ms {
            return Err(ConfigError::ValidationError(format!(
                "hold_button_ms ({}) must exceed relay_active_ms ({})",
                self.hold_button_ms, self.relay_active_ms
            )));
        }
        Ok(())
    }
}

/// Service configuration loaded from `pwr.toml`.
///
/// # TOML Example
///
/// ```toml
/// [shared]
/// service_name = "pwr-rack-01"
///
/// [relay]
/// pins_file = "gpio_pins.json"
/// pin_name = "GPIO.2"
/// board_mode = "board"
/// driver = "rpi"
///
/// [timing]
/// relay_active_ms = 1000
/// hold_button_ms = 5000
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PwrConfig {
    /// Logging and instance identity.
    pub shared: SharedConfig,

    /// Relay wiring.
    #[serde(default)]
    pub relay: RelaySection,

    /// Pulse durations.
    #[serde(default)]
    pub timing: TimingConfig,
}

impl PwrConfig {
    /// Configuration with default relay and timing sections.
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            shared: SharedConfig {
                log_level: LogLevel::default(),
                service_name: service_name.into(),
            },
            relay: RelaySection::default(),
            timing: TimingConfig::default(),
        }
    }

    /// Validate every section.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.shared.validate()?;
        if self.relay.pin_name.is_empty() {
            return Err(ConfigError::ValidationError(
                "pin_name cannot be empty".to_string(),
            ));
        }
        self.timing.validate()
    }

    /// Pin definition file path, resolved against `config_dir` when relative.
    pub fn pins_path(&self, config_dir: &Path) -> PathBuf {
        if self.relay.pins_file.is_absolute() {
            self.relay.pins_file.clone()
        } else {
            config_dir.join(&self.relay.pins_file)
        }
    }
}

/// Trait for loading configuration from TOML files.
///
/// Provides a default implementation for any type implementing
/// `serde::de::DeserializeOwned`.
///
/// # Contract
///
/// - Returns `ConfigError::FileNotFound` if the file does not exist
/// - Returns `ConfigError::ParseError` if TOML syntax is invalid
pub trait ConfigLoader: Sized + serde::de::DeserializeOwned {
    /// Load configuration from a TOML file.
    fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::FileNotFound
            } else {
                ConfigError::ParseError(e.to_string())
            }
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }
}

// Blanket implementation for all types that implement DeserializeOwned.
impl<T: serde::de::DeserializeOwned> ConfigLoader for T {}

/// Service config to load: `explicit` when given, otherwise `fallback` if
/// that file exists. `None` means run on built-in defaults.
///
/// An explicit path is returned even when missing, so loading it reports
/// `FileNotFound` instead of silently using defaults.
pub fn locate_config(explicit: Option<&Path>, fallback: &Path) -> Option<PathBuf> {
    match explicit {
        Some(path) => Some(path.to_path_buf()),
        None => fallback.is_file().then(|| fallback.to_path_buf()),
    }
}
