//! Settings file I/O
//!
//! Loads and saves controller settings from a TOML file in the user's
//! configuration directory. Service names, object paths and interfaces are
//! settings rather than constants so a relocated or renamed backend can be
//! driven without a rebuild.

use crate::error::{OvpmanError, SettingsError};
use crate::vpn::bandwidth::StatsSource;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Complete settings structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    /// D-Bus names of the backend services
    #[serde(default)]
    pub bus: BusNames,

    /// Polling cadences
    #[serde(default)]
    pub poll: PollIntervals,

    /// Bandwidth sampling settings
    #[serde(default)]
    pub bandwidth: BandwidthSettings,
}

/// Well-known names, paths and interfaces of the backend services
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusNames {
    #[serde(default = "default_config_service")]
    pub config_service: String,

    #[serde(default = "default_config_root_path")]
    pub config_root_path: String,

    #[serde(default = "default_config_interface")]
    pub config_interface: String,

    #[serde(default = "default_session_service")]
    pub session_service: String,

    #[serde(default = "default_session_root_path")]
    pub session_root_path: String,

    #[serde(default = "default_session_interface")]
    pub session_interface: String,
}

fn default_config_service() -> String {
    "net.openvpn.v3.configuration".to_string()
}
fn default_config_root_path() -> String {
    "/net/openvpn/v3/configuration".to_string()
}
fn default_config_interface() -> String {
    "net.openvpn.v3.configuration".to_string()
}
fn default_session_service() -> String {
    "net.openvpn.v3.sessions".to_string()
}
fn default_session_root_path() -> String {
    "/net/openvpn/v3/sessions".to_string()
}
fn default_session_interface() -> String {
    "net.openvpn.v3.sessions".to_string()
}

impl Default for BusNames {
    fn default() -> Self {
        Self {
            config_service: default_config_service(),
            config_root_path: default_config_root_path(),
            config_interface: default_config_interface(),
            session_service: default_session_service(),
            session_root_path: default_session_root_path(),
            session_interface: default_session_interface(),
        }
    }
}

/// Cadences for the three scheduler timers, in seconds.
///
/// The display tick exists so elapsed-time output can refresh every second
/// without generating bus traffic; only the reconcile tick talks to the
/// backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollIntervals {
    #[serde(default = "default_reconcile_secs")]
    pub reconcile_secs: u64,

    #[serde(default = "default_display_secs")]
    pub display_secs: u64,

    #[serde(default = "default_bandwidth_secs")]
    pub bandwidth_secs: u64,
}

fn default_reconcile_secs() -> u64 {
    5
}
fn default_display_secs() -> u64 {
    1
}
fn default_bandwidth_secs() -> u64 {
    2
}

impl Default for PollIntervals {
    fn default() -> Self {
        Self {
            reconcile_secs: default_reconcile_secs(),
            display_secs: default_display_secs(),
            bandwidth_secs: default_bandwidth_secs(),
        }
    }
}

/// Bandwidth sampling settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BandwidthSettings {
    /// Number of samples retained per session
    #[serde(default = "default_sample_capacity")]
    pub capacity: usize,

    /// Counter source selection
    #[serde(default)]
    pub source: StatsSource,
}

fn default_sample_capacity() -> usize {
    60
}

impl Default for BandwidthSettings {
    fn default() -> Self {
        Self {
            capacity: default_sample_capacity(),
            source: StatsSource::default(),
        }
    }
}

/// Settings file name inside the configuration directory
const SETTINGS_FILE_NAME: &str = "config.toml";

impl Settings {
    /// Load settings from a TOML file
    pub fn from_file(path: &Path) -> Result<Self, OvpmanError> {
        let contents = std::fs::read_to_string(path).map_err(|e| SettingsError::LoadFailed {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

        let settings: Settings =
            toml::from_str(&contents).map_err(|e| SettingsError::ParseFailed {
                message: e.to_string(),
            })?;

        Ok(settings)
    }

    /// Save settings to a TOML file, creating parent directories as needed
    pub fn to_file(&self, path: &Path) -> Result<(), OvpmanError> {
        let contents = toml::to_string_pretty(self).map_err(|e| SettingsError::ParseFailed {
            message: e.to_string(),
        })?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| SettingsError::SaveFailed {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;
        }

        std::fs::write(path, contents).map_err(|e| SettingsError::SaveFailed {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

        Ok(())
    }

    /// Load from the default location, falling back to defaults when the
    /// file does not exist.
    pub fn load_default() -> Result<Self, OvpmanError> {
        let path = settings_path()?;
        if path.exists() {
            Self::from_file(&path)
        } else {
            tracing::debug!(path = %path.display(), "no settings file, using defaults");
            Ok(Self::default())
        }
    }
}

/// Get the settings directory
///
/// Returns ~/.config/ovpman, or OVPMAN_CONFIG_DIR if set (used by tests).
pub fn settings_dir() -> Result<PathBuf, OvpmanError> {
    if let Ok(dir) = std::env::var("OVPMAN_CONFIG_DIR") {
        return Ok(PathBuf::from(dir));
    }

    let home = std::env::var("HOME").map_err(|_| SettingsError::NoConfigDir {
        message: "HOME environment variable not set".to_string(),
    })?;

    Ok(PathBuf::from(home).join(".config").join("ovpman"))
}

/// Get the default settings file path
pub fn settings_path() -> Result<PathBuf, OvpmanError> {
    Ok(settings_dir()?.join(SETTINGS_FILE_NAME))
}
