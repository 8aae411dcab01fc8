//! Session manager client
//!
//! Talks to the session service: enumerating live sessions, reading their
//! status and statistics, driving the tunnel lifecycle and watching the
//! out-of-band attention signal. Property reads are best-effort the same
//! way the configuration side is; a session mid-teardown reports what it
//! still can.

use crate::bus::gateway::{classify_error, with_activation_retry, BusGateway};
use crate::error::BusError;
use crate::settings::BusNames;
use crate::types::{AttentionSignal, ConnectedTo, RawStatus, SessionHandle};
use crate::vpn::auth::{probe_auth_url, InputRequest, UserInputQueue};
use futures_util::StreamExt;
use std::collections::HashMap;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use zbus::zvariant::{ObjectPath, OwnedObjectPath};

/// Client for the session manager service
#[derive(Debug, Clone)]
pub struct SessionClient {
    gateway: BusGateway,
    names: BusNames,
}

impl SessionClient {
    pub fn new(gateway: BusGateway, names: BusNames) -> Self {
        Self { gateway, names }
    }

    async fn root_proxy(&self) -> Result<zbus::Proxy<'static>, BusError> {
        self.gateway
            .proxy(
                &self.names.session_service,
                &self.names.session_root_path,
                &self.names.session_interface,
            )
            .await
    }

    async fn object_proxy(&self, path: &str) -> Result<zbus::Proxy<'static>, BusError> {
        self.gateway
            .proxy(&self.names.session_service, path, &self.names.session_interface)
            .await
    }

    /// List all live sessions with their status resolved.
    pub async fn list(&self) -> Result<Vec<SessionHandle>, BusError> {
        let paths: Vec<OwnedObjectPath> =
            with_activation_retry("FetchAvailableSessions", || async {
                let proxy = self.root_proxy().await?;
                proxy
                    .call("FetchAvailableSessions", &())
                    .await
                    .map_err(|e| {
                        classify_error(&self.names.session_service, "FetchAvailableSessions", e)
                    })
            })
            .await?;

        let mut sessions = Vec::with_capacity(paths.len());
        for path in paths {
            match self.info(path.as_str()).await {
                Ok(session) => sessions.push(session),
                Err(err) => {
                    warn!(path = %path, error = %err, "skipping unreadable session");
                }
            }
        }

        Ok(sessions)
    }

    /// Read one session's properties and probe its input queue.
    pub async fn info(&self, session_path: &str) -> Result<SessionHandle, BusError> {
        let proxy = self.object_proxy(session_path).await?;

        let config_name: String = proxy.get_property("config_name").await.unwrap_or_default();
        let device_name: String = proxy.get_property("device_name").await.unwrap_or_default();
        let backend_pid: u32 = proxy.get_property("backend_pid").await.unwrap_or(0);
        let session_created: u64 = proxy.get_property("session_created").await.unwrap_or(0);

        let status = proxy
            .get_property::<(u32, u32, String)>("status")
            .await
            .map(|(major, minor, message)| RawStatus {
                major,
                minor,
                message,
            })
            .unwrap_or_default();

        let connected_to = proxy
            .get_property::<(String, String, u32)>("connected_to")
            .await
            .ok()
            .map(|(protocol, host, port)| ConnectedTo {
                protocol,
                host,
                port,
            });

        let queue = SessionInputQueue {
            client: self,
            session_path,
        };
        let auth_pending = matches!(probe_auth_url(&queue).await, Ok(Some(_)));

        Ok(SessionHandle {
            session_path: session_path.to_string(),
            config_name,
            device_name,
            backend_pid,
            session_created,
            status,
            connected_to,
            auth_pending,
        })
    }

    /// Create a new tunnel session from a profile, returning its path.
    pub async fn new_tunnel(&self, config_path: &str) -> Result<String, BusError> {
        let object_path = ObjectPath::try_from(config_path)
            .map_err(|_| BusError::InvalidArgument(format!("not an object path: {config_path}")))?;

        let proxy = self.root_proxy().await?;
        let session_path: OwnedObjectPath = proxy
            .call("NewTunnel", &(object_path,))
            .await
            .map_err(|e| classify_error(&self.names.session_service, "NewTunnel", e))?;

        info!(config = config_path, session = %session_path, "created session");
        Ok(session_path.to_string())
    }

    /// Issue the connect action on a session.
    pub async fn connect(&self, session_path: &str) -> Result<(), BusError> {
        self.simple_call(session_path, "Connect").await
    }

    /// Disconnect and destroy a session.
    pub async fn disconnect(&self, session_path: &str) -> Result<(), BusError> {
        self.simple_call(session_path, "Disconnect").await
    }

    /// Pause a session, keeping it alive.
    pub async fn pause(&self, session_path: &str, reason: &str) -> Result<(), BusError> {
        let reason = if reason.is_empty() {
            "User requested"
        } else {
            reason
        };
        let proxy = self.object_proxy(session_path).await?;
        proxy
            .call::<_, _, ()>("Pause", &(reason,))
            .await
            .map_err(|e| classify_error(&self.names.session_service, "Pause", e))
    }

    /// Resume a paused session.
    pub async fn resume(&self, session_path: &str) -> Result<(), BusError> {
        self.simple_call(session_path, "Resume").await
    }

    async fn simple_call(&self, session_path: &str, method: &str) -> Result<(), BusError> {
        if session_path.is_empty() {
            return Err(BusError::InvalidArgument(
                "session path must not be empty".to_string(),
            ));
        }
        let proxy = self.object_proxy(session_path).await?;
        proxy
            .call::<_, _, ()>(method, &())
            .await
            .map_err(|e| classify_error(&self.names.session_service, method, e))
    }

    /// Read the named tunnel counters of a session.
    pub async fn statistics(&self, session_path: &str) -> Result<HashMap<String, i64>, BusError> {
        let proxy = self.object_proxy(session_path).await?;
        proxy
            .get_property::<HashMap<String, i64>>("statistics")
            .await
            .map_err(|e| BusError::ProtocolMismatch {
                method: "statistics".to_string(),
                detail: e.to_string(),
            })
    }

    /// Probe the session's input queue for a pending web-auth URL.
    pub async fn auth_url(&self, session_path: &str) -> Result<Option<String>, BusError> {
        let queue = SessionInputQueue {
            client: self,
            session_path,
        };
        probe_auth_url(&queue).await
    }

    /// Forward `AttentionRequired` signals of one session into `tx`.
    ///
    /// The forwarding task lives until the session object vanishes or the
    /// receiver is dropped.
    pub async fn watch_attention(
        &self,
        session_path: &str,
        tx: mpsc::UnboundedSender<AttentionSignal>,
    ) -> Result<(), BusError> {
        let proxy = self.object_proxy(session_path).await?;
        let mut stream = proxy
            .receive_signal("AttentionRequired")
            .await
            .map_err(|e| classify_error(&self.names.session_service, "AttentionRequired", e))?;

        let path = session_path.to_string();
        tokio::spawn(async move {
            while let Some(msg) = stream.next().await {
                match msg.body().deserialize::<(u32, u32, String)>() {
                    Ok((kind, group, message)) => {
                        debug!(session = %path, kind, group, "attention signal");
                        let signal = AttentionSignal {
                            session_path: path.clone(),
                            kind,
                            group,
                            message,
                        };
                        if tx.send(signal).is_err() {
                            break;
                        }
                    }
                    Err(err) => {
                        warn!(session = %path, error = %err, "unparseable attention signal");
                    }
                }
            }
        });

        info!(session = session_path, "subscribed to attention signals");
        Ok(())
    }
}

/// Input-queue view of one session object
struct SessionInputQueue<'a> {
    client: &'a SessionClient,
    session_path: &'a str,
}

impl UserInputQueue for SessionInputQueue<'_> {
    async fn pending_types(&self) -> Result<Vec<(u32, u32)>, BusError> {
        let proxy = self.client.object_proxy(self.session_path).await?;
        proxy
            .call("UserInputQueueGetTypeGroup", &())
            .await
            .map_err(|e| {
                classify_error(
                    &self.client.names.session_service,
                    "UserInputQueueGetTypeGroup",
                    e,
                )
            })
    }

    async fn pending_ids(&self, kind: u32, group: u32) -> Result<Vec<u32>, BusError> {
        let proxy = self.client.object_proxy(self.session_path).await?;
        proxy
            .call("UserInputQueueCheck", &(kind, group))
            .await
            .map_err(|e| {
                classify_error(&self.client.names.session_service, "UserInputQueueCheck", e)
            })
    }

    async fn fetch_request(&self, kind: u32, group: u32, id: u32) -> Result<InputRequest, BusError> {
        let proxy = self.client.object_proxy(self.session_path).await?;
        let (kind, group, id, name, description, hidden_input, masked_input): (
            u32,
            u32,
            u32,
            String,
            String,
            String,
            bool,
        ) = proxy
            .call("UserInputQueueFetch", &(kind, group, id))
            .await
            .map_err(|e| {
                classify_error(&self.client.names.session_service, "UserInputQueueFetch", e)
            })?;

        Ok(InputRequest {
            kind,
            group,
            id,
            name,
            description,
            hidden_input,
            masked_input,
        })
    }
}
