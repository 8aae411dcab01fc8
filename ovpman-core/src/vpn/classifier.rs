//! Session status classification
//!
//! Maps the loosely-structured per-session status data into one
//! [`ConnectionState`]. The backend is inconsistent about which of the
//! numeric codes, the `connected_to` tuple and the free-text message are
//! populated, so classification is layered: structured signals first, text
//! patterns as the last resort.

use crate::types::{ConnectedTo, ConnectionState, RawStatus};
use regex::Regex;

/// Status major code for the connection phase
pub const MAJOR_CONNECTION: u32 = 2;

/// Status major code reported for paused sessions
pub const MAJOR_PAUSED: u32 = 4;

/// Connection minor code while pausing
pub const MINOR_CONN_PAUSING: u32 = 13;

/// Connection minor code once paused
pub const MINOR_CONN_PAUSED: u32 = 14;

/// Classifier for raw session status
pub struct StatusClassifier {
    /// Failure wording in status messages
    failure_pattern: Regex,
    /// Web-auth wording in status messages
    auth_pattern: Regex,
}

impl StatusClassifier {
    pub fn new() -> Self {
        Self {
            failure_pattern: Regex::new(r"failed|Failed|Error")
                .expect("Failed to compile failure pattern"),
            auth_pattern: Regex::new(r"authentication required|Web authentication|https://")
                .expect("Failed to compile auth pattern"),
        }
    }

    /// Classify one session's status.
    ///
    /// Evaluated in strict priority order, first match wins:
    ///
    /// 1. a pending input-queue auth request;
    /// 2. the paused status codes, checked before `connected_to`, because a
    ///    paused session keeps its stale connection tuple and would
    ///    otherwise read as connected;
    /// 3. a populated `connected_to` tuple;
    /// 4. failure wording in the message;
    /// 5. the connection major code;
    /// 6. message text patterns;
    /// 7. disconnected.
    pub fn classify(
        &self,
        status: &RawStatus,
        connected_to: Option<&ConnectedTo>,
        auth_pending: bool,
    ) -> ConnectionState {
        if auth_pending {
            return ConnectionState::AuthRequired;
        }

        let paused = status.major == MAJOR_PAUSED
            || (status.major == MAJOR_CONNECTION
                && matches!(status.minor, MINOR_CONN_PAUSING | MINOR_CONN_PAUSED));
        if paused {
            return ConnectionState::Paused;
        }

        if connected_to.is_some_and(ConnectedTo::is_established) {
            return ConnectionState::Connected;
        }

        let message = status.message.as_str();

        if !message.is_empty() && self.failure_pattern.is_match(message) {
            return ConnectionState::Error;
        }

        if status.major == MAJOR_CONNECTION {
            return ConnectionState::Connecting;
        }

        if message.is_empty() {
            return ConnectionState::Disconnected;
        }

        if self.auth_pattern.is_match(message) {
            ConnectionState::AuthRequired
        } else if message.contains("Connecting") {
            ConnectionState::Connecting
        } else if message.contains("Reconnecting") {
            ConnectionState::Reconnecting
        } else if message.contains("Paused") {
            ConnectionState::Paused
        } else {
            ConnectionState::Disconnected
        }
    }
}

impl Default for StatusClassifier {
    fn default() -> Self {
        Self::new()
    }
}
