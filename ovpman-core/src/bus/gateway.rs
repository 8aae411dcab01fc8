//! Low-level D-Bus plumbing
//!
//! Wraps the system bus connection, turns `zbus` failures into the crate's
//! error taxonomy and implements the activation retry used by the two
//! collection fetches. The backend services are bus-activatable: the first
//! call after boot may land before the service has finished starting, which
//! surfaces as a service-unknown class error and deserves a short wait, not
//! a hard failure.

use crate::error::BusError;
use std::future::Future;
use std::time::Duration;
use tracing::warn;
use zbus::{Connection, Proxy};

/// Attempts made while waiting for a backend service to activate.
pub const ACTIVATION_ATTEMPTS: u32 = 6;

/// Pause between activation attempts.
pub const ACTIVATION_DELAY: Duration = Duration::from_secs(1);

/// Shared system-bus connection.
#[derive(Debug, Clone)]
pub struct BusGateway {
    conn: Connection,
}

impl BusGateway {
    /// Connect to the system bus.
    pub async fn system() -> Result<Self, BusError> {
        let conn = Connection::system()
            .await
            .map_err(|e| BusError::CommandFailed {
                method: "Connection::system".to_string(),
                reason: e.to_string(),
            })?;
        Ok(Self { conn })
    }

    /// Build a dynamic proxy for one object of a backend service.
    pub async fn proxy(
        &self,
        service: &str,
        path: &str,
        interface: &str,
    ) -> Result<Proxy<'static>, BusError> {
        Proxy::new(
            &self.conn,
            service.to_string(),
            path.to_string(),
            interface.to_string(),
        )
        .await
        .map_err(|e| BusError::InvalidArgument(format!("{service} {path} {interface}: {e}")))
    }
}

/// Sort a `zbus` failure into the crate's error classes.
///
/// Service-unknown and no-reply failures mean the activatable backend has
/// not come up yet; body deserialization failures mean the reply did not
/// have the documented shape; everything else is a rejected command.
pub fn classify_error(service: &str, method: &str, err: zbus::Error) -> BusError {
    match &err {
        zbus::Error::MethodError(name, detail, _) => {
            let name = name.as_str();
            if matches!(
                name,
                "org.freedesktop.DBus.Error.ServiceUnknown"
                    | "org.freedesktop.DBus.Error.NameHasNoOwner"
                    | "org.freedesktop.DBus.Error.NoReply"
            ) {
                BusError::ServiceNotReady {
                    service: service.to_string(),
                }
            } else {
                BusError::CommandFailed {
                    method: method.to_string(),
                    reason: detail.clone().unwrap_or_else(|| name.to_string()),
                }
            }
        }
        zbus::Error::Variant(e) => BusError::ProtocolMismatch {
            method: method.to_string(),
            detail: e.to_string(),
        },
        zbus::Error::InterfaceNotFound => BusError::ProtocolMismatch {
            method: method.to_string(),
            detail: "interface not found".to_string(),
        },
        _ => BusError::CommandFailed {
            method: method.to_string(),
            reason: err.to_string(),
        },
    }
}

/// Run `op`, retrying while the backend service activates.
///
/// Up to [`ACTIVATION_ATTEMPTS`] attempts with [`ACTIVATION_DELAY`] between
/// them; only transient failures are retried, anything else aborts on the
/// first occurrence. The final transient failure is surfaced as-is.
pub async fn with_activation_retry<T, F, Fut>(what: &str, mut op: F) -> Result<T, BusError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, BusError>>,
{
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() && attempt < ACTIVATION_ATTEMPTS => {
                if attempt == 1 {
                    warn!("{what}: backend service not ready, waiting for activation");
                } else {
                    warn!(
                        "{what}: still waiting for service activation (attempt {attempt}/{ACTIVATION_ATTEMPTS})"
                    );
                }
                tokio::time::sleep(ACTIVATION_DELAY).await;
                attempt += 1;
            }
            Err(err) => {
                if attempt > 1 {
                    warn!("{what}: giving up after {attempt} attempts");
                }
                return Err(err);
            }
        }
    }
}
