//! Driver configuration.
//!
//! Configuration is loaded in the following order (later overrides earlier):
//! 1. Default values
//! 2. YAML config file (if specified via AUTOMATA_CONFIG)
//! 3. Environment variables
//! 4. Command-line flags (applied by the caller)

use automata_runtime::DEFAULT_CHANNEL_CAPACITY;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Driver configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Automata definition file.
    pub definition: Option<PathBuf>,
    /// Directory for snapshots. Persistence is off when unset.
    pub snapshot_dir: Option<PathBuf>,
    /// Capacity of the action and change queues.
    pub channel_capacity: usize,
    /// Print one JSON object per line instead of text.
    pub json: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            definition: None,
            snapshot_dir: None,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            json: false,
        }
    }
}

impl Config {
    /// Loads configuration from file, then applies environment variable overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match std::env::var("AUTOMATA_CONFIG") {
            Ok(path) => Self::from_file(&path)?,
            Err(_) => Self::default(),
        };

        config.apply_overrides(|key| std::env::var(key).ok());

        Ok(config)
    }

    /// Loads configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(path.to_path_buf(), e))?;
        let config: Config = serde_yaml::from_str(&content)
            .map_err(|e| ConfigError::ParseError(path.to_path_buf(), e.to_string()))?;
        Ok(config)
    }

    /// Applies overrides from `lookup`, which maps a variable name to its value.
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(path) = lookup("AUTOMATA_DEFINITION") {
            self.definition = Some(PathBuf::from(path));
        }

        if let Some(dir) = lookup("AUTOMATA_SNAPSHOT_DIR") {
            self.snapshot_dir = Some(PathBuf::from(dir));
        }

        if let Some(capacity) = lookup("AUTOMATA_CHANNEL_CAPACITY") {
            match capacity.parse() {
                Ok(n) => self.channel_capacity = n,
                Err(_) => tracing::warn!(
                    "Ignoring AUTOMATA_CHANNEL_CAPACITY={}: not a number",
                    capacity
                ),
            }
        }
    }

    /// Returns the definition file, which is the one required setting.
    pub fn definition_path(&self) -> Result<&Path, ConfigError> {
        self.definition.as_deref().ok_or_else(|| {
            ConfigError::ValidationError(
                "no definition file given (use --definition or AUTOMATA_DEFINITION)".to_string(),
            )
        })
    }
}

/// Configuration errors.
#[derive(Debug)]
pub enum ConfigError {
    IoError(PathBuf, std::io::Error),
    ParseError(PathBuf, String),
    ValidationError(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(path, e) => {
                write!(f, "failed to read config file '{}': {}", path.display(), e)
            }
            ConfigError::ParseError(path, e) => {
                write!(f, "failed to parse config file '{}': {}", path.display(), e)
            }
            ConfigError::ValidationError(msg) => write!(f, "invalid configuration: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}
