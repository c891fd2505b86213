//! # PWR HAL Binary
//!
//! Press or hold a power button through a GPIO-driven relay.
//!
//! # Usage
//!
//! ```bash
//! # Resolve the relay pin from the pin definition file
//! pwr_hal --pins config/gpio_pins.json --pin GPIO.2 resolve
//!
//! # Momentary press on real hardware
//! pwr_hal --config /etc/pwr/pwr.toml --driver rpi press
//!
//! # Forced shutdown (held button), verbose JSON logs
//! pwr_hal --config /etc/pwr/pwr.toml -v --json hold
//! ```

#![deny(warnings)]

use clap::{Parser, Subcommand};
use pwr_common::config::{locate_config, ConfigLoader, PwrConfig};
use pwr_common::hal::consts::{DEFAULT_CONFIG_PATH, HAL_SERVICE_NAME};
use pwr_common::hal::types::BoardMode;
use pwr_common::pins::{PinDefinitions, PinResolver};
use pwr_hal::{BackendRegistry, RelayController, RelayTiming};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{error, info, warn, Level};
use tracing_subscriber::filter::Directive;
use tracing_subscriber::EnvFilter;

/// Directory searched for the pin definition file when no config is found.
const DEFAULT_CONFIG_DIR: &str = "config";

/// PWR HAL - relay-driven power button control
#[derive(Parser, Debug)]
#[command(name = "pwr_hal")]
#[command(author = "RTS007")]
#[command(version)]
#[command(about = "Press or hold a power button through a GPIO relay")]
#[command(long_about = None)]
struct Args {
    /// Path to service configuration (pwr.toml); defaults to /etc/pwr/pwr.toml when present
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Pin definition file (JSON); overrides the config
    #[arg(long, value_name = "FILE")]
    pins: Option<PathBuf>,

    /// Logical pin name; overrides the config
    #[arg(long, value_name = "NAME")]
    pin: Option<String>,

    /// Addressing mode (board or bcm); overrides the config
    #[arg(long, value_name = "MODE")]
    mode: Option<BoardMode>,

    /// Backend name; overrides the config
    #[arg(short, long)]
    driver: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the physical pin for the logical pin name
    Resolve,
    /// Print every logical pin in the pin definition file
    List,
    /// List available backends
    Drivers,
    /// Momentarily press the power button
    Press {
        /// Number of presses
        #[arg(short = 'n', long, default_value_t = 1)]
        count: u32,
    },
    /// Hold the power button (forced shutdown)
    Hold,
}

/// Effective settings after merging CLI overrides into the config.
struct Settings {
    config: PwrConfig,
    /// Config file the settings came from, `None` for built-in defaults
    source: Option<PathBuf>,
    pins_path: PathBuf,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    if let Err(e) = run() {
        error!("PWR HAL failed: {}", e);
        std::process::exit(1);
    }
    Ok(())
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let settings = load_settings(&args);

    // Log level comes from the config when it could be read.
    let config_level = settings.as_ref().ok().map(|s| s.config.shared.log_level.as_directive());
    setup_tracing(&args, config_level);

    let settings = settings?;
    info!(
        "PWR HAL v{} ({}) starting...",
        env!("CARGO_PKG_VERSION"),
        settings.config.shared.service_name
    );
    match &settings.source {
        Some(path) => info!("Configuration: {}", path.display()),
        None => info!("Configuration: built-in defaults"),
    }

    match args.command {
        Command::Resolve => {
            let resolver =
                PinResolver::load(&settings.pins_path, &settings.config.relay.pin_name)?;
            println!("{}", resolver.physical_pin());
        }
        Command::List => {
            let definitions = PinDefinitions::load(&settings.pins_path)?;
            if definitions.is_empty() {
                warn!("No pins defined in {}", settings.pins_path.display());
            }
            info!("{} logical pins", definitions.len());
            for definition in definitions.definitions()? {
                println!("{}\t{}", definition.name, definition.physical_pin);
            }
        }
        Command::Drivers => {
            for name in BackendRegistry::with_builtin().list_backends() {
                println!("{name}");
            }
        }
        Command::Press { count } => actuate(&settings, Action::Press(count))?,
        Command::Hold => actuate(&settings, Action::Hold)?,
    }

    Ok(())
}

enum Action {
    Press(u32),
    Hold,
}

/// Resolve, claim, actuate and always release.
fn actuate(settings: &Settings, action: Action) -> Result<(), Box<dyn std::error::Error>> {
    let relay = &settings.config.relay;
    let resolver = PinResolver::load(&settings.pins_path, &relay.pin_name)?;
    let backend = BackendRegistry::with_builtin().create_backend(&relay.driver)?;

    // SIGINT must not cut a pulse short; finish it, then release and exit.
    let interrupted = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&interrupted);
    ctrlc::set_handler(move || {
        info!("Received shutdown signal; finishing current pulse");
        flag.store(true, Ordering::SeqCst);
    })?;

    let timing = RelayTiming::from(&settings.config.timing);
    let mut controller =
        RelayController::from_resolver(backend, &resolver, relay.board_mode, timing)?;

    let outcome = match action {
        Action::Press(count) => {
            let mut result = Ok(());
            for n in 0..count {
                if interrupted.load(Ordering::SeqCst) {
                    warn!("Interrupted; skipping {} remaining presses", count - n);
                    break;
                }
                result = controller.press();
                if result.is_err() {
                    break;
                }
            }
            result
        }
        Action::Hold => controller.hold(),
    };

    let released = controller.release();
    outcome?;
    released?;
    info!("PWR HAL done");
    Ok(())
}

/// Load the TOML config (or defaults) and apply CLI overrides.
fn load_settings(args: &Args) -> Result<Settings, Box<dyn std::error::Error>> {
    let source = locate_config(args.config.as_deref(), Path::new(DEFAULT_CONFIG_PATH));
    let (mut config, config_dir) = match &source {
        Some(path) => {
            let config = PwrConfig::load(path)
                .map_err(|e| format!("{}: {e}", path.display()))?;
            let dir = path
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from("."));
            (config, dir)
        }
        None => (PwrConfig::new(HAL_SERVICE_NAME), PathBuf::from(DEFAULT_CONFIG_DIR)),
    };

    if let Some(pin) = &args.pin {
        config.relay.pin_name = pin.clone();
    }
    if let Some(mode) = args.mode {
        config.relay.board_mode = mode;
    }
    if let Some(driver) = &args.driver {
        config.relay.driver = driver.clone();
    }
    config.validate()?;

    let pins_path = match &args.pins {
        Some(path) => path.clone(),
        None => config.pins_path(&config_dir),
    };

    Ok(Settings {
        config,
        source,
        pins_path,
    })
}

/// Setup tracing subscriber based on CLI arguments and config.
fn setup_tracing(args: &Args, config_level: Option<&str>) {
    let directive: Directive = if args.verbose {
        Level::DEBUG.into()
    } else {
        config_level
            .and_then(|level| level.parse().ok())
            .unwrap_or_else(|| Level::INFO.into())
    };

    let filter = EnvFilter::from_default_env().add_directive(directive);

    if args.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}
