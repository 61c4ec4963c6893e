//! Configuration management for CrabPreview
//!
//! Loads and saves the knobs the preview session needs: which lens to open,
//! how long to wait on the device lock, and how the repeating request is
//! built and torn down.

use crate::errors::PreviewError;
use crate::types::{ControlMode, Facing};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const MAX_TIMEOUT_MS: u64 = 60_000;

/// Root configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreviewConfig {
    pub device: DeviceConfig,
    pub locking: LockingConfig,
    pub stream: StreamConfig,
}

/// Device selection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Lens facing the enumerator looks for
    pub required_facing: Facing,
}

/// Exclusive-access lock timing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LockingConfig {
    /// How long `request_open` waits for the device lock, in milliseconds
    pub open_timeout_ms: u64,
}

/// Repeating request settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamConfig {
    pub control_mode: ControlMode,
    /// How long teardown waits for the stream worker thread to exit
    pub join_timeout_ms: u64,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            device: DeviceConfig {
                required_facing: Facing::Back,
            },
            locking: LockingConfig {
                open_timeout_ms: 2500,
            },
            stream: StreamConfig {
                control_mode: ControlMode::Auto,
                join_timeout_ms: 1000,
            },
        }
    }
}

impl PreviewConfig {
    pub fn open_timeout(&self) -> Duration {
        Duration::from_millis(self.locking.open_timeout_ms)
    }

    pub fn join_timeout(&self) -> Duration {
        Duration::from_millis(self.stream.join_timeout_ms)
    }

    /// Load configuration from TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, PreviewError> {
        let path = path.as_ref();

        if !path.exists() {
            log::info!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .map_err(|e| PreviewError::Config(format!("Failed to read config file: {}", e)))?;

        let config: PreviewConfig = toml::from_str(&contents)
            .map_err(|e| PreviewError::Config(format!("Failed to parse config file: {}", e)))?;

        config.validate().map_err(PreviewError::Config)?;

        log::info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), PreviewError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                PreviewError::Config(format!("Failed to create config directory: {}", e))
            })?;
        }

        let toml_string = toml::to_string_pretty(self)
            .map_err(|e| PreviewError::Config(format!("Failed to serialize config: {}", e)))?;

        fs::write(path, toml_string)
            .map_err(|e| PreviewError::Config(format!("Failed to write config file: {}", e)))?;

        log::info!("Saved configuration to {:?}", path);
        Ok(())
    }

    /// Get default config file path
    pub fn default_path() -> PathBuf {
        PathBuf::from("crabpreview.toml")
    }

    /// Load from default location or fall back to defaults
    pub fn load_or_default() -> Self {
        Self::load_from_file(Self::default_path()).unwrap_or_else(|e| {
            log::warn!("Failed to load config, using defaults: {}", e);
            Self::default()
        })
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), String> {
        let timeouts = [
            ("open_timeout_ms", self.locking.open_timeout_ms),
            ("join_timeout_ms", self.stream.join_timeout_ms),
        ];
        for (name, value) in timeouts {
            if value == 0 || value > MAX_TIMEOUT_MS {
                return Err(format!("{name} must be between 1 and {MAX_TIMEOUT_MS}"));
            }
        }
        Ok(())
    }
}
