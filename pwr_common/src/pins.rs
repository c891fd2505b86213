//! Pin definition file loading and logical pin resolution.
//!
//! The pin definition file is a JSON object mapping logical pin names to
//! records carrying at least a `physical_pin` header position:
//!
//! ```json
//! { "GPIO.2": { "physical_pin": 13, "bcm": 27 } }
//! ```
//!
//! Extra fields in a record are preserved but ignored. The file is owned by
//! external configuration management and read once per resolution.

use crate::error::RelayError;
use crate::hal::consts::HEADER_PIN_COUNT;
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, error};

/// Field holding the header position in each record.
pub const PHYSICAL_PIN_FIELD: &str = "physical_pin";

/// One logical pin record.
#[derive(Debug, Clone, PartialEq)]
pub struct PinDefinition {
    /// Logical name (top-level key in the file)
    pub name: String,
    /// Header position
    pub physical_pin: u8,
    /// Remaining fields of the record
    pub extra: Map<String, Value>,
}

/// Parsed pin definition file.
#[derive(Debug, Clone)]
pub struct PinDefinitions {
    path: PathBuf,
    entries: Map<String, Value>,
}

impl PinDefinitions {
    /// Read and parse a pin definition file.
    ///
    /// # Errors
    /// `RelayError::Configuration` if the file cannot be read, is not valid
    /// JSON, or its top level is not an object.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, RelayError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            error!("Cannot open/read pin definition file {:?}: {}", path, e);
            RelayError::Configuration(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::parse(path, &content)
    }

    /// Parse pin definitions from JSON text. `path` is used for messages only.
    pub fn parse(path: impl AsRef<Path>, content: &str) -> Result<Self, RelayError> {
        let path = path.as_ref();
        let value: Value = serde_json::from_str(content).map_err(|e| {
            error!("Malformed pin definition file {:?}: {}", path, e);
            RelayError::Configuration(format!("malformed JSON in {}: {e}", path.display()))
        })?;

        let Value::Object(entries) = value else {
            error!("Pin definition file {:?} is not a JSON object", path);
            return Err(RelayError::Configuration(format!(
                "{} must contain a JSON object",
                path.display()
            )));
        };

        debug!("Pin definitions from {:?}: {:?}", path, entries);
        Ok(Self {
            path: path.to_path_buf(),
            entries,
        })
    }

    /// File the definitions were read from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Logical names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Number of logical pins defined.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if the file defines no pins.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look up one logical pin.
    ///
    /// # Errors
    /// - `RelayError::KeyNotFound` if `name` or its `physical_pin` field is absent
    /// - `RelayError::Configuration` if the record is not an object or
    ///   `physical_pin` is not a header position (1-40)
    pub fn get(&self, name: &str) -> Result<PinDefinition, RelayError> {
        let record = self.entries.get(name).ok_or_else(|| {
            error!("Logical pin '{}' not defined in {:?}", name, self.path);
            RelayError::KeyNotFound(format!("'{name}' in {}", self.path.display()))
        })?;

        let Value::Object(fields) = record else {
            error!("Logical pin '{}' in {:?} is not an object", name, self.path);
            return Err(RelayError::Configuration(format!(
                "record for '{name}' must be an object"
            )));
        };

        let raw = fields.get(PHYSICAL_PIN_FIELD).ok_or_else(|| {
            error!("Logical pin '{}' has no {} field", name, PHYSICAL_PIN_FIELD);
            RelayError::KeyNotFound(format!("'{PHYSICAL_PIN_FIELD}' for '{name}'"))
        })?;

        let physical_pin = raw
            .as_u64()
            .filter(|pin| (1..=HEADER_PIN_COUNT as u64).contains(pin))
            .ok_or_else(|| {
                error!("Logical pin '{}' has invalid {}: {}", name, PHYSICAL_PIN_FIELD, raw);
                RelayError::Configuration(format!(
                    "'{PHYSICAL_PIN_FIELD}' for '{name}' must be an integer in 1..={HEADER_PIN_COUNT}, got {raw}"
                ))
            })? as u8;

        debug!("{}[\"{}\"] = {}", name, PHYSICAL_PIN_FIELD, physical_pin);

        let mut extra = fields.clone();
        extra.remove(PHYSICAL_PIN_FIELD);
        Ok(PinDefinition {
            name: name.to_string(),
            physical_pin,
            extra,
        })
    }

    /// Every definition, failing on the first invalid record.
    pub fn definitions(&self) -> Result<Vec<PinDefinition>, RelayError> {
        self.names().into_iter().map(|name| self.get(name)).collect()
    }
}

/// Resolved physical pin for one logical name.
///
/// Resolution happens once, at construction. A resolver either holds a valid
/// pin or was never created. Construct one per configuration file and share
/// it by reference with whatever assembles the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PinResolver {
    path: PathBuf,
    logical_key: String,
    physical_pin: u8,
}

impl PinResolver {
    /// Read `path` and resolve `logical_key`.
    ///
    /// # Errors
    /// See [`PinDefinitions::load`] and [`PinDefinitions::get`].
    pub fn load(path: impl AsRef<Path>, logical_key: &str) -> Result<Self, RelayError> {
        let definitions = PinDefinitions::load(path)?;
        Self::from_definitions(&definitions, logical_key)
    }

    /// Resolve `logical_key` from already parsed definitions.
    pub fn from_definitions(
        definitions: &PinDefinitions,
        logical_key: &str,
    ) -> Result<Self, RelayError> {
        let definition = definitions.get(logical_key)?;
        Ok(Self {
            path: definitions.path().to_path_buf(),
            logical_key: logical_key.to_string(),
            physical_pin: definition.physical_pin,
        })
    }

    /// File the pin was resolved from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Logical name that was resolved.
    pub fn logical_key(&self) -> &str {
        &self.logical_key
    }

    /// Header position of the resolved pin.
    pub fn physical_pin(&self) -> u8 {
        self.physical_pin
    }
}

/// Resolve `logical_key` in `path` to its header position.
pub fn resolve(path: impl AsRef<Path>, logical_key: &str) -> Result<u8, RelayError> {
    PinResolver::load(path, logical_key).map(|resolver| resolver.physical_pin())
}
