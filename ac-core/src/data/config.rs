//! Control configuration
//!
//! Stored as JSON in ~/.config/aorus-control/config.json, or wherever
//! `AORUS_CONTROL_CONFIG` points. Every field is optional; a missing file
//! means defaults.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::constants::{limits, paths, timing};
use crate::error::{AorusError, Result};

/// Which driver implementation backs the port
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DriverKind {
    /// Direct file access (requires write permission on the platform nodes)
    Sysfs,
    /// Through the privileged helper
    #[default]
    Helper,
    /// In-memory simulated platform
    Simulated,
}

/// Runtime configuration for the control core
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlConfig {
    pub driver: DriverKind,

    /// Directory holding the platform attribute files
    pub platform_path: PathBuf,

    /// hwmon class directory scanned for telemetry
    pub hwmon_path: PathBuf,

    /// Only read telemetry from hwmon chips with this name
    pub hwmon_chip: Option<String>,

    /// Privileged helper binary
    pub helper_path: PathBuf,

    /// Command used to elevate the helper
    pub elevate_command: String,

    /// Telemetry refresh period in milliseconds
    pub telemetry_interval_ms: u64,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            driver: DriverKind::default(),
            platform_path: PathBuf::from(paths::PLATFORM_BASE),
            hwmon_path: PathBuf::from(paths::HWMON_BASE),
            hwmon_chip: None,
            helper_path: PathBuf::from(paths::HELPER_PATH),
            elevate_command: paths::ELEVATE_COMMAND.to_string(),
            telemetry_interval_ms: timing::TELEMETRY_INTERVAL_MS,
        }
    }
}

impl ControlConfig {
    /// Load from the user config location, falling back to defaults
    pub fn load() -> Result<Self> {
        match paths::user_config_file() {
            Some(path) => Self::load_from(&path),
            None => {
                tracing::debug!("No config directory available, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Load from an explicit path
    ///
    /// A missing file yields defaults. An oversized, unreadable or malformed
    /// file is an error.
    pub fn load_from(path: &Path) -> Result<Self> {
        let metadata = match fs::metadata(path) {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "Config file not found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(AorusError::FileRead {
                    path: path.to_path_buf(),
                    source: e,
                })
            }
        };

        if metadata.len() > limits::MAX_CONFIG_SIZE {
            return Err(AorusError::FileTooLarge {
                path: path.to_path_buf(),
                size: metadata.len(),
                max_size: limits::MAX_CONFIG_SIZE,
            });
        }

        let content = fs::read_to_string(path).map_err(|e| AorusError::FileRead {
            path: path.to_path_buf(),
            source: e,
        })?;

        let config: ControlConfig = serde_json::from_str(&content)?;
        tracing::debug!(path = %path.display(), driver = ?config.driver, "Loaded config");
        Ok(config.normalized())
    }

    fn normalized(mut self) -> Self {
        if self.telemetry_interval_ms < timing::MIN_TELEMETRY_INTERVAL_MS {
            tracing::warn!(
                requested = self.telemetry_interval_ms,
                minimum = timing::MIN_TELEMETRY_INTERVAL_MS,
                "Telemetry interval too short, clamping"
            );
            self.telemetry_interval_ms = timing::MIN_TELEMETRY_INTERVAL_MS;
        }
        if self.elevate_command.trim().is_empty() {
            self.elevate_command = paths::ELEVATE_COMMAND.to_string();
        }
        self
    }

    pub fn telemetry_interval(&self) -> Duration {
        Duration::from_millis(self.telemetry_interval_ms)
    }
}
