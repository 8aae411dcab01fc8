//! Core library for the ovpman controller
//!
//! This crate holds everything that is not presentation: the bus clients
//! for the OpenVPN3 Linux services, status classification, per-connection
//! state machines, reconciliation, bandwidth sampling and the polling
//! scheduler that ties them together.

pub mod error;
pub mod settings;
pub mod types;

pub mod bus;
pub mod vpn;

pub use bus::{OpenVpn3Bus, VpnBus};
pub use error::{BusError, OvpmanError};
pub use settings::Settings;
pub use types::{ConfigProfile, ConnectionRecord, ConnectionState, SessionHandle};

/// Initialize logging infrastructure
///
/// Sets up tracing with systemd journal logging for production use.
/// In development, logs to stderr with appropriate formatting.
pub fn init_logging() -> Result<(), Box<dyn std::error::Error>> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    // Try to use systemd journal logging if available
    #[cfg(target_os = "linux")]
    {
        if std::env::var("JOURNAL_STREAM").is_ok() {
            // We're running under systemd, use journal logging
            let journal_layer = tracing_journald::layer()?;
            tracing_subscriber::registry()
                .with(journal_layer)
                .with(tracing_subscriber::filter::LevelFilter::INFO)
                .init();
            return Ok(());
        }
    }

    // Fallback to stderr logging with pretty formatting
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().pretty())
        .with(tracing_subscriber::filter::LevelFilter::INFO)
        .init();

    Ok(())
}
