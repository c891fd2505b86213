//! PWR Common Library
//!
//! Shared types for the PWR relay workspace: pin definitions, the GPIO
//! backend capability trait, addressing modes and configuration loading.
//!
//! # Module Structure
//!
//! - [`pins`] - Pin definition file loading and logical pin resolution
//! - [`hal`] - Addressing types, header numbering and the `GpioBackend` trait
//! - [`config`] - TOML configuration loading traits and types
//! - [`error`] - Error taxonomy shared by all PWR crates
//! - [`prelude`] - Common re-exports for convenience
//!
//! # Usage
//!
//! ```rust,no_run
//! use pwr_common::pins::PinResolver;
//!
//! let resolver = PinResolver::load("config/gpio_pins.json", "GPIO.2")?;
//! assert_eq!(resolver.physical_pin(), 13);
//! # Ok::<(), pwr_common::error::RelayError>(())
//! ```

pub mod config;
pub mod error;
pub mod hal;
pub mod pins;
pub mod prelude;
