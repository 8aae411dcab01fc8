//! Shared test double for the bus seam
//!
//! Records every call in order and serves scripted collections, so tests
//! can assert both results and call sequences.

#![allow(dead_code)]

use ovpman_core::bus::VpnBus;
use ovpman_core::error::BusError;
use ovpman_core::types::{ConfigProfile, ConnectedTo, RawStatus, SessionHandle};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

/// One recorded bus interaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusCall {
    FetchConfigs,
    FetchSessions,
    NewTunnel(String),
    ConnectSession(String),
    DisconnectSession(String),
    PauseSession(String, String),
    ResumeSession(String),
    AuthUrl(String),
    Statistics(String),
    WatchAttention(String),
}

#[derive(Default)]
struct MockBusInner {
    calls: Mutex<Vec<BusCall>>,
    configs: Mutex<Vec<ConfigProfile>>,
    sessions: Mutex<Vec<SessionHandle>>,
    auth_urls: Mutex<HashMap<String, String>>,
    statistics: Mutex<HashMap<String, HashMap<String, i64>>>,
    failing_disconnects: Mutex<HashSet<String>>,
    config_fetch_errors: Mutex<Vec<BusError>>,
}

/// Scripted in-memory bus
#[derive(Clone, Default)]
pub struct MockBus {
    inner: Arc<MockBusInner>,
}

impl MockBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_configs(&self, configs: Vec<ConfigProfile>) {
        *self.inner.configs.lock().unwrap() = configs;
    }

    pub fn set_sessions(&self, sessions: Vec<SessionHandle>) {
        *self.inner.sessions.lock().unwrap() = sessions;
    }

    pub fn set_auth_url(&self, session_path: &str, url: &str) {
        self.inner
            .auth_urls
            .lock()
            .unwrap()
            .insert(session_path.to_string(), url.to_string());
    }

    pub fn set_statistics(&self, session_path: &str, stats: HashMap<String, i64>) {
        self.inner
            .statistics
            .lock()
            .unwrap()
            .insert(session_path.to_string(), stats);
    }

    /// Make disconnects of this session fail.
    pub fn fail_disconnect(&self, session_path: &str) {
        self.inner
            .failing_disconnects
            .lock()
            .unwrap()
            .insert(session_path.to_string());
    }

    /// Queue errors returned by the next config fetches, oldest first.
    pub fn push_config_fetch_error(&self, error: BusError) {
        self.inner.config_fetch_errors.lock().unwrap().push(error);
    }

    pub fn calls(&self) -> Vec<BusCall> {
        self.inner.calls.lock().unwrap().clone()
    }

    fn record(&self, call: BusCall) {
        self.inner.calls.lock().unwrap().push(call);
    }
}

impl VpnBus for MockBus {
    async fn fetch_configs(&self) -> Result<Vec<ConfigProfile>, BusError> {
        self.record(BusCall::FetchConfigs);
        let mut errors = self.inner.config_fetch_errors.lock().unwrap();
        if !errors.is_empty() {
            return Err(errors.remove(0));
        }
        Ok(self.inner.configs.lock().unwrap().clone())
    }

    async fn fetch_sessions(&self) -> Result<Vec<SessionHandle>, BusError> {
        self.record(BusCall::FetchSessions);
        Ok(self.inner.sessions.lock().unwrap().clone())
    }

    async fn new_tunnel(&self, config_path: &str) -> Result<String, BusError> {
        self.record(BusCall::NewTunnel(config_path.to_string()));
        Ok(format!("{config_path}/session"))
    }

    async fn connect_session(&self, session_path: &str) -> Result<(), BusError> {
        self.record(BusCall::ConnectSession(session_path.to_string()));
        Ok(())
    }

    async fn disconnect_session(&self, session_path: &str) -> Result<(), BusError> {
        self.record(BusCall::DisconnectSession(session_path.to_string()));
        if self
            .inner
            .failing_disconnects
            .lock()
            .unwrap()
            .contains(session_path)
        {
            return Err(BusError::CommandFailed {
                method: "Disconnect".to_string(),
                reason: "session refused".to_string(),
            });
        }
        Ok(())
    }

    async fn pause_session(&self, session_path: &str, reason: &str) -> Result<(), BusError> {
        self.record(BusCall::PauseSession(
            session_path.to_string(),
            reason.to_string(),
        ));
        Ok(())
    }

    async fn resume_session(&self, session_path: &str) -> Result<(), BusError> {
        self.record(BusCall::ResumeSession(session_path.to_string()));
        Ok(())
    }

    async fn auth_url(&self, session_path: &str) -> Result<Option<String>, BusError> {
        self.record(BusCall::AuthUrl(session_path.to_string()));
        Ok(self.inner.auth_urls.lock().unwrap().get(session_path).cloned())
    }

    async fn session_statistics(
        &self,
        session_path: &str,
    ) -> Result<HashMap<String, i64>, BusError> {
        self.record(BusCall::Statistics(session_path.to_string()));
        self.inner
            .statistics
            .lock()
            .unwrap()
            .get(session_path)
            .cloned()
            .ok_or_else(|| BusError::CommandFailed {
                method: "statistics".to_string(),
                reason: "no statistics for session".to_string(),
            })
    }

    async fn watch_attention(&self, session_path: &str) -> Result<(), BusError> {
        self.record(BusCall::WatchAttention(session_path.to_string()));
        Ok(())
    }
}

/// A profile with the usual defaults.
pub fn profile(name: &str, config_path: &str) -> ConfigProfile {
    ConfigProfile {
        config_path: config_path.to_string(),
        name: name.to_string(),
        locked_down: false,
        persistent: false,
        remote: None,
    }
}

/// A connected session for a profile.
pub fn connected_session(config_name: &str, session_path: &str) -> SessionHandle {
    SessionHandle {
        session_path: session_path.to_string(),
        config_name: config_name.to_string(),
        device_name: "tun0".to_string(),
        backend_pid: 4242,
        session_created: 1_700_000_000,
        status: RawStatus {
            major: 2,
            minor: 7,
            message: String::new(),
        },
        connected_to: Some(ConnectedTo {
            protocol: "udp".to_string(),
            host: "vpn.example.com".to_string(),
            port: 1194,
        }),
        auth_pending: false,
    }
}

/// A session waiting for web authentication.
pub fn auth_pending_session(config_name: &str, session_path: &str) -> SessionHandle {
    SessionHandle {
        connected_to: None,
        auth_pending: true,
        status: RawStatus {
            major: 2,
            minor: 2,
            message: "Web authentication required".to_string(),
        },
        ..connected_session(config_name, session_path)
    }
}
