//! Relay timing and default configuration constants.

use std::time::Duration;

/// Canonical service name (used for logging).
pub const HAL_SERVICE_NAME: &str = "pwr_hal";

/// How long the relay stays active for a press, and the settle pause after
/// every pin (re)configuration.
pub const RELAY_ACTIVE_TIME: Duration = Duration::from_secs(1);

/// How long the relay stays active for a held power button (forced shutdown).
pub const HOLD_BUTTON_TIME: Duration = Duration::from_secs(5);

/// Default service configuration path
pub const DEFAULT_CONFIG_PATH: &str = "/etc/pwr/pwr.toml";

/// Default pin definition file, relative to the service config directory
pub const DEFAULT_PINS_FILE: &str = "gpio_pins.json";

/// Logical pin wired to the power switch relay by default
pub const DEFAULT_PIN_NAME: &str = "GPIO.2";

/// Backend used when none is configured
pub const DEFAULT_DRIVER: &str = "simulation";

/// Number of positions on the Raspberry Pi connector header
pub const HEADER_PIN_COUNT: usize = 40;

/// Highest Broadcom GPIO line exposed on the header
pub const MAX_BCM_LINE: u8 = 27;
