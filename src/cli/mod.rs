//! CLI command implementations
//!
//! One module per command family, plus the shared lookup and formatting
//! helpers they all use.

pub mod configs;
pub mod session;
pub mod status;
pub mod watch;

use ovpman_core::error::{BusError, OvpmanError};
use ovpman_core::types::{AttentionSignal, ConfigProfile, ConnectionRecord};
use ovpman_core::vpn::ConnectionReconciler;
use ovpman_core::{OpenVpn3Bus, Settings, VpnBus};
use tokio::sync::mpsc;

/// Connect to the system bus with the user's settings.
pub async fn open_bus() -> Result<
    (
        OpenVpn3Bus,
        Settings,
        mpsc::UnboundedReceiver<AttentionSignal>,
    ),
    OvpmanError,
> {
    let settings = Settings::load_default()?;
    let (bus, attention_rx) = OpenVpn3Bus::connect(&settings).await?;
    Ok((bus, settings, attention_rx))
}

/// Resolve a profile argument (display name or object path).
pub async fn resolve_profile(
    bus: &OpenVpn3Bus,
    profile: &str,
) -> Result<ConfigProfile, OvpmanError> {
    let configs = bus.fetch_configs().await?;
    configs
        .into_iter()
        .find(|c| c.name == profile || c.config_path == profile)
        .ok_or_else(|| BusError::InvalidArgument(format!("unknown profile: {profile}")).into())
}

/// One-shot reconciled view of all connections.
pub async fn snapshot(bus: &OpenVpn3Bus) -> Result<Vec<ConnectionRecord>, OvpmanError> {
    let configs = bus.fetch_configs().await?;
    let sessions = bus.fetch_sessions().await?;
    Ok(ConnectionReconciler::new().reconcile(&configs, &sessions))
}

/// Resolve a profile argument to its live session path.
pub async fn resolve_session(bus: &OpenVpn3Bus, profile: &str) -> Result<String, OvpmanError> {
    let records = snapshot(bus).await?;
    records
        .into_iter()
        .find(|r| r.name == profile || r.config_path == profile)
        .and_then(|r| r.session_path)
        .ok_or_else(|| {
            BusError::InvalidArgument(format!("no active session for profile: {profile}")).into()
        })
}

/// Render a byte count with a binary unit suffix.
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    if unit == 0 {
        format!("{} {}", bytes, UNITS[unit])
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}

/// Render elapsed seconds as "2h 3m" / "4m 12s" / "45s".
pub fn format_elapsed(secs: u64) -> String {
    let hours = secs / 3600;
    let minutes = (secs % 3600) / 60;
    let seconds = secs % 60;

    if hours > 0 {
        format!("{hours}h {minutes}m")
    } else if minutes > 0 {
        format!("{minutes}m {seconds}s")
    } else {
        format!("{seconds}s")
    }
}
