//! Data model for the reconciled connection view
//!
//! The configuration and session managers expose two independent object
//! collections; the types here describe both raw collections and the merged
//! per-profile view the rest of the crate works with.

use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// A VPN configuration profile known to the configuration manager.
///
/// Profiles are identified by their D-Bus object path, which is stable
/// across reconnects; the display name is what sessions refer back to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigProfile {
    /// D-Bus object path of the profile
    pub config_path: String,
    /// Display name
    pub name: String,
    /// Profile may not be modified or removed by the user
    pub locked_down: bool,
    /// Profile survives a configuration manager restart
    pub persistent: bool,
    /// Server endpoint parsed from the profile content, when available
    pub remote: Option<RemoteEndpoint>,
}

/// Server endpoint extracted from a profile's `remote` directive
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteEndpoint {
    pub host: String,
    pub port: u16,
    pub protocol: String,
}

/// Raw status tuple reported by the session manager.
///
/// The major/minor codes and the free-text message are populated
/// inconsistently across backend versions; classification has to cope with
/// either being empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawStatus {
    pub major: u32,
    pub minor: u32,
    pub message: String,
}

/// The `connected_to` tuple of an active session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectedTo {
    pub protocol: String,
    pub host: String,
    pub port: u32,
}

impl ConnectedTo {
    /// A session only counts as connected when all three fields carry data.
    pub fn is_established(&self) -> bool {
        !self.protocol.is_empty() && !self.host.is_empty() && self.port > 0
    }
}

/// A live tunnel session as reported by the session manager.
///
/// Sessions exist only while a tunnel is active; a profile with no matching
/// session is disconnected. Sessions carry no foreign key to their profile
/// beyond the profile's display name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionHandle {
    /// D-Bus object path of the session (transient)
    pub session_path: String,
    /// Display name of the profile the session was started from
    pub config_name: String,
    /// Network device backing the tunnel, e.g. "tun0"
    pub device_name: String,
    /// PID of the backend process owning the tunnel
    pub backend_pid: u32,
    /// Epoch seconds at which the session was created
    pub session_created: u64,
    /// Raw status tuple
    pub status: RawStatus,
    /// Remote endpoint while the tunnel is up; absent otherwise
    pub connected_to: Option<ConnectedTo>,
    /// Whether a web-authentication request is waiting in the input queue
    pub auth_pending: bool,
}

/// Connection lifecycle states
///
/// Exactly one state applies to a connection at a time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConnectionState {
    /// Profile known, no session
    #[default]
    Disconnected,
    /// Session establishing the tunnel
    Connecting,
    /// Tunnel up
    Connected,
    /// Tunnel suspended, session kept alive
    Paused,
    /// Session re-establishing a dropped tunnel
    Reconnecting,
    /// Session waiting for interactive authentication
    AuthRequired,
    /// Session reported a failure
    Error,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "disconnected"),
            ConnectionState::Connecting => write!(f, "connecting"),
            ConnectionState::Connected => write!(f, "connected"),
            ConnectionState::Paused => write!(f, "paused"),
            ConnectionState::Reconnecting => write!(f, "reconnecting"),
            ConnectionState::AuthRequired => write!(f, "authentication required"),
            ConnectionState::Error => write!(f, "error"),
        }
    }
}

/// The reconciled per-profile view.
///
/// One record exists per known profile, keyed by the profile path. At most
/// one session is bound to a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionRecord {
    /// Stable profile identity
    pub config_path: String,
    /// Profile display name
    pub name: String,
    /// Matched session, if any
    pub session_path: Option<String>,
    /// Tunnel device of the matched session, if known
    pub device_name: Option<String>,
    /// Current lifecycle state
    pub state: ConnectionState,
    /// Epoch seconds the matched session came up, stable across polls
    pub connect_time: Option<u64>,
}

impl ConnectionRecord {
    /// A fresh record for a profile with no session bound yet.
    pub fn disconnected(profile: &ConfigProfile) -> Self {
        Self {
            config_path: profile.config_path.clone(),
            name: profile.name.clone(),
            session_path: None,
            device_name: None,
            state: ConnectionState::Disconnected,
            connect_time: None,
        }
    }

    /// Seconds the session has been up, measured against `now`.
    pub fn uptime_secs(&self, now: u64) -> Option<u64> {
        self.connect_time.map(|start| now.saturating_sub(start))
    }
}

/// An out-of-band attention signal emitted by a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttentionSignal {
    pub session_path: String,
    pub kind: u32,
    pub group: u32,
    pub message: String,
}

/// Current time as epoch seconds.
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
