//! Session lifecycle commands
//!
//! Thin command layer over the bus. The one command with real logic is
//! `connect`: the backend happily runs several sessions for the same
//! profile, so any stale session for that profile is disconnected before a
//! new tunnel is created.

use crate::bus::VpnBus;
use crate::error::BusError;
use tracing::{info, warn};

/// Outcome of a bulk cleanup
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanupReport {
    /// Sessions found
    pub total: usize,
    /// Sessions successfully disconnected
    pub disconnected: usize,
}

/// Start a new session for a profile, returning the session path.
///
/// Order matters: stale sessions for the same profile name are disconnected
/// first, then the tunnel is created and connected, then the session's
/// attention signal is subscribed so web-auth surfaces without waiting for
/// the next poll. A failed subscription is reported but does not fail the
/// connect.
pub async fn connect<B: VpnBus>(
    bus: &B,
    config_path: &str,
    profile_name: &str,
) -> Result<String, BusError> {
    if config_path.is_empty() {
        return Err(BusError::InvalidArgument(
            "profile path must not be empty".to_string(),
        ));
    }

    disconnect_existing_sessions(bus, profile_name).await;

    let session_path = bus.new_tunnel(config_path).await?;
    bus.connect_session(&session_path).await?;
    info!(profile = profile_name, session = %session_path, "session connecting");

    if let Err(err) = bus.watch_attention(&session_path).await {
        warn!(session = %session_path, error = %err, "could not subscribe to attention signals");
    }

    Ok(session_path)
}

/// Disconnect every live session whose profile name matches.
///
/// Best-effort: listing or disconnect failures are logged and skipped so a
/// half-broken stale session cannot block a fresh connect.
async fn disconnect_existing_sessions<B: VpnBus>(bus: &B, profile_name: &str) {
    if profile_name.is_empty() {
        return;
    }

    let sessions = match bus.fetch_sessions().await {
        Ok(sessions) => sessions,
        Err(err) => {
            warn!(error = %err, "could not list sessions before connect");
            return;
        }
    };

    for session in sessions
        .iter()
        .filter(|session| session.config_name == profile_name)
    {
        warn!(
            profile = profile_name,
            session = %session.session_path,
            "disconnecting stale session before reconnect"
        );
        if let Err(err) = bus.disconnect_session(&session.session_path).await {
            warn!(session = %session.session_path, error = %err, "stale session disconnect failed");
        }
    }
}

/// Disconnect a session.
pub async fn disconnect<B: VpnBus>(bus: &B, session_path: &str) -> Result<(), BusError> {
    bus.disconnect_session(session_path).await
}

/// Pause a session with a reason.
pub async fn pause<B: VpnBus>(bus: &B, session_path: &str, reason: &str) -> Result<(), BusError> {
    bus.pause_session(session_path, reason).await
}

/// Resume a paused session.
pub async fn resume<B: VpnBus>(bus: &B, session_path: &str) -> Result<(), BusError> {
    bus.resume_session(session_path).await
}

/// Disconnect every live session, counting successes.
///
/// Partial failure is not an error; the report carries both counts so the
/// caller can tell the user what stuck.
pub async fn cleanup_all<B: VpnBus>(bus: &B) -> Result<CleanupReport, BusError> {
    let sessions = bus.fetch_sessions().await?;

    let mut report = CleanupReport {
        total: sessions.len(),
        disconnected: 0,
    };

    for session in &sessions {
        info!(
            profile = %session.config_name,
            session = %session.session_path,
            "cleanup: disconnecting session"
        );
        match bus.disconnect_session(&session.session_path).await {
            Ok(()) => report.disconnected += 1,
            Err(err) => {
                warn!(session = %session.session_path, error = %err, "cleanup: disconnect failed");
            }
        }
    }

    Ok(report)
}
