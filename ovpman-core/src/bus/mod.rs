//! Message bus access
//!
//! The [`VpnBus`] trait is the seam between the reconciliation logic and the
//! backend services: it covers exactly the calls and properties the rest of
//! the crate needs, so tests can drive the engine against a scripted bus.
//! [`OpenVpn3Bus`] is the production implementation on the system bus.

pub mod config_client;
pub mod gateway;
pub mod session_client;

pub use config_client::{parse_remote_directive, ConfigClient};
pub use gateway::{with_activation_retry, BusGateway, ACTIVATION_ATTEMPTS, ACTIVATION_DELAY};
pub use session_client::SessionClient;

use crate::error::BusError;
use crate::settings::Settings;
use crate::types::{AttentionSignal, ConfigProfile, SessionHandle};
use std::collections::HashMap;
use tokio::sync::mpsc;

/// Backend operations consumed by the reconciliation engine.
///
/// Mirrors the session/configuration manager contract: collection fetches
/// retry internally while the services activate, everything else fails fast.
#[allow(async_fn_in_trait)]
pub trait VpnBus {
    /// Fetch all known profiles.
    async fn fetch_configs(&self) -> Result<Vec<ConfigProfile>, BusError>;

    /// Fetch all live sessions, status resolved.
    async fn fetch_sessions(&self) -> Result<Vec<SessionHandle>, BusError>;

    /// Create a session from a profile, returning the session path.
    async fn new_tunnel(&self, config_path: &str) -> Result<String, BusError>;

    /// Start connecting a session.
    async fn connect_session(&self, session_path: &str) -> Result<(), BusError>;

    /// Disconnect and destroy a session.
    async fn disconnect_session(&self, session_path: &str) -> Result<(), BusError>;

    /// Pause a session.
    async fn pause_session(&self, session_path: &str, reason: &str) -> Result<(), BusError>;

    /// Resume a paused session.
    async fn resume_session(&self, session_path: &str) -> Result<(), BusError>;

    /// Probe for a pending web-auth URL.
    async fn auth_url(&self, session_path: &str) -> Result<Option<String>, BusError>;

    /// Read the session's named counters.
    async fn session_statistics(
        &self,
        session_path: &str,
    ) -> Result<HashMap<String, i64>, BusError>;

    /// Subscribe to the session's attention signal.
    async fn watch_attention(&self, session_path: &str) -> Result<(), BusError>;
}

/// Production bus backed by the OpenVPN3 system services
#[derive(Debug, Clone)]
pub struct OpenVpn3Bus {
    configs: ConfigClient,
    sessions: SessionClient,
    attention_tx: mpsc::UnboundedSender<AttentionSignal>,
}

impl OpenVpn3Bus {
    /// Connect to the system bus.
    ///
    /// Returns the bus handle plus the receiver on which attention signals
    /// of watched sessions arrive.
    pub async fn connect(
        settings: &Settings,
    ) -> Result<(Self, mpsc::UnboundedReceiver<AttentionSignal>), BusError> {
        let gateway = BusGateway::system().await?;
        let (attention_tx, attention_rx) = mpsc::unbounded_channel();

        let bus = Self {
            configs: ConfigClient::new(gateway.clone(), settings.bus.clone()),
            sessions: SessionClient::new(gateway, settings.bus.clone()),
            attention_tx,
        };

        Ok((bus, attention_rx))
    }

    /// Profile management operations beyond the reconciliation contract.
    pub fn config_client(&self) -> &ConfigClient {
        &self.configs
    }

    /// Direct access to the session client.
    pub fn session_client(&self) -> &SessionClient {
        &self.sessions
    }
}

impl VpnBus for OpenVpn3Bus {
    async fn fetch_configs(&self) -> Result<Vec<ConfigProfile>, BusError> {
        self.configs.list().await
    }

    async fn fetch_sessions(&self) -> Result<Vec<SessionHandle>, BusError> {
        self.sessions.list().await
    }

    async fn new_tunnel(&self, config_path: &str) -> Result<String, BusError> {
        self.sessions.new_tunnel(config_path).await
    }

    async fn connect_session(&self, session_path: &str) -> Result<(), BusError> {
        self.sessions.connect(session_path).await
    }

    async fn disconnect_session(&self, session_path: &str) -> Result<(), BusError> {
        self.sessions.disconnect(session_path).await
    }

    async fn pause_session(&self, session_path: &str, reason: &str) -> Result<(), BusError> {
        self.sessions.pause(session_path, reason).await
    }

    async fn resume_session(&self, session_path: &str) -> Result<(), BusError> {
        self.sessions.resume(session_path).await
    }

    async fn auth_url(&self, session_path: &str) -> Result<Option<String>, BusError> {
        self.sessions.auth_url(session_path).await
    }

    async fn session_statistics(
        &self,
        session_path: &str,
    ) -> Result<HashMap<String, i64>, BusError> {
        self.sessions.statistics(session_path).await
    }

    async fn watch_attention(&self, session_path: &str) -> Result<(), BusError> {
        self.sessions
            .watch_attention(session_path, self.attention_tx.clone())
            .await
    }
}
