//! Error types for the ovpman controller
//!
//! This module defines the errors shared across the crate. Domain modules
//! that only fail in one way (bandwidth sampling, latency probing) keep
//! their own error enums next to their code.

use thiserror::Error;

/// Main error type for the ovpman crates
#[derive(Error, Debug)]
pub enum OvpmanError {
    /// Errors raised while talking to the D-Bus services
    #[error("Message bus error: {0}")]
    Bus(#[from] BusError),

    /// Errors related to settings loading/saving
    #[error("Settings error: {0}")]
    Settings(#[from] SettingsError),

    /// Errors from bandwidth sampling
    #[error("Bandwidth error: {0}")]
    Bandwidth(#[from] crate::vpn::bandwidth::BandwidthError),

    /// Errors from latency probing
    #[error("Latency probe error: {0}")]
    Latency(#[from] crate::vpn::latency::LatencyError),

    /// Generic I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failures reported by the message-bus layer.
///
/// Every bus interaction is sorted into one of four classes: transient
/// service activation, caller mistakes, malformed replies, and commands the
/// backend rejected. Only the first class is ever retried.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BusError {
    /// The remote service is installed but not activated yet
    #[error("service '{service}' is not ready")]
    ServiceNotReady { service: String },

    /// A required identifier or argument was missing or malformed
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The reply did not have the documented shape
    #[error("unexpected reply from {method}: {detail}")]
    ProtocolMismatch { method: String, detail: String },

    /// The backend refused or failed the command
    #[error("{method} failed: {reason}")]
    CommandFailed { method: String, reason: String },
}

impl BusError {
    /// Whether this failure is worth retrying while waiting for the
    /// backend service to activate.
    pub fn is_transient(&self) -> bool {
        matches!(self, BusError::ServiceNotReady { .. })
    }
}

/// Settings file errors
#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("Failed to read settings file {path}: {message}")]
    LoadFailed { path: String, message: String },

    #[error("Failed to write settings file {path}: {message}")]
    SaveFailed { path: String, message: String },

    #[error("Settings file is not valid TOML: {message}")]
    ParseFailed { message: String },

    #[error("Could not determine a configuration directory: {message}")]
    NoConfigDir { message: String },
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, OvpmanError>;
