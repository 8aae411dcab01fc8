//! Configuration manager client
//!
//! Talks to the configuration service: enumerating profiles, reading their
//! properties, importing and removing them. Per-profile property reads are
//! best-effort: a profile that refuses a property is reported with defaults
//! rather than dropped, matching how the backend behaves while a profile is
//! being torn down.

use crate::bus::gateway::{classify_error, with_activation_retry, BusGateway};
use crate::error::BusError;
use crate::settings::BusNames;
use crate::types::{ConfigProfile, RemoteEndpoint};
use tracing::{debug, info, warn};
use zbus::zvariant::OwnedObjectPath;

/// Client for the configuration manager service
#[derive(Debug, Clone)]
pub struct ConfigClient {
    gateway: BusGateway,
    names: BusNames,
}

impl ConfigClient {
    pub fn new(gateway: BusGateway, names: BusNames) -> Self {
        Self { gateway, names }
    }

    async fn root_proxy(&self) -> Result<zbus::Proxy<'static>, BusError> {
        self.gateway
            .proxy(
                &self.names.config_service,
                &self.names.config_root_path,
                &self.names.config_interface,
            )
            .await
    }

    async fn object_proxy(&self, path: &str) -> Result<zbus::Proxy<'static>, BusError> {
        self.gateway
            .proxy(&self.names.config_service, path, &self.names.config_interface)
            .await
    }

    /// List all available profiles.
    ///
    /// Retries while the configuration service activates; any other failure
    /// aborts immediately.
    pub async fn list(&self) -> Result<Vec<ConfigProfile>, BusError> {
        let paths: Vec<OwnedObjectPath> =
            with_activation_retry("FetchAvailableConfigs", || async {
                let proxy = self.root_proxy().await?;
                proxy
                    .call("FetchAvailableConfigs", &())
                    .await
                    .map_err(|e| {
                        classify_error(&self.names.config_service, "FetchAvailableConfigs", e)
                    })
            })
            .await?;

        let mut profiles = Vec::with_capacity(paths.len());
        for path in paths {
            match self.profile(path.as_str()).await {
                Ok(profile) => profiles.push(profile),
                Err(err) => {
                    warn!(path = %path, error = %err, "skipping unreadable profile");
                }
            }
        }

        Ok(profiles)
    }

    /// Read one profile's properties and parse its remote endpoint.
    pub async fn profile(&self, config_path: &str) -> Result<ConfigProfile, BusError> {
        let proxy = self.object_proxy(config_path).await?;

        let name: String = proxy.get_property("name").await.unwrap_or_default();
        let locked_down: bool = proxy.get_property("locked_down").await.unwrap_or(false);
        let persistent: bool = proxy.get_property("persistent").await.unwrap_or(false);

        let remote = match proxy.call::<_, _, String>("Fetch", &()).await {
            Ok(content) => parse_remote_directive(&content),
            Err(err) => {
                debug!(path = config_path, error = %err, "profile content not readable");
                None
            }
        };

        Ok(ConfigProfile {
            config_path: config_path.to_string(),
            name,
            locked_down,
            persistent,
            remote,
        })
    }

    /// Import a profile, returning its new object path.
    pub async fn import(
        &self,
        name: &str,
        content: &str,
        single_use: bool,
        persistent: bool,
    ) -> Result<String, BusError> {
        if name.is_empty() {
            return Err(BusError::InvalidArgument(
                "profile name must not be empty".to_string(),
            ));
        }

        let proxy = self.root_proxy().await?;
        let path: OwnedObjectPath = proxy
            .call("Import", &(name, content, single_use, persistent))
            .await
            .map_err(|e| classify_error(&self.names.config_service, "Import", e))?;

        info!(name, path = %path, "imported profile");
        Ok(path.to_string())
    }

    /// Remove a profile.
    pub async fn remove(&self, config_path: &str) -> Result<(), BusError> {
        let proxy = self.object_proxy(config_path).await?;
        proxy
            .call::<_, _, ()>("Remove", &())
            .await
            .map_err(|e| classify_error(&self.names.config_service, "Remove", e))?;

        info!(path = config_path, "removed profile");
        Ok(())
    }
}

/// Extract the first `remote <host> <port> [proto]` directive from profile
/// content. Port defaults to 1194 and protocol to "udp" when absent.
pub fn parse_remote_directive(content: &str) -> Option<RemoteEndpoint> {
    for line in content.lines() {
        let line = line.trim();
        if line.starts_with('#') || line.starts_with(';') {
            continue;
        }

        let mut parts = line.split_whitespace();
        if parts.next() != Some("remote") {
            continue;
        }

        let host = parts.next()?.to_string();
        let port = parts
            .next()
            .and_then(|p| p.parse::<u16>().ok())
            .unwrap_or(1194);
        let protocol = parts.next().unwrap_or("udp").to_string();

        return Some(RemoteEndpoint {
            host,
            port,
            protocol,
        });
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_remote_directive() {
        let remote =
            parse_remote_directive("client\nremote vpn.example.com 443 tcp\nverb 3\n").unwrap();
        assert_eq!(remote.host, "vpn.example.com");
        assert_eq!(remote.port, 443);
        assert_eq!(remote.protocol, "tcp");
    }

    #[test]
    fn defaults_port_and_protocol() {
        let remote = parse_remote_directive("remote vpn.example.com\n").unwrap();
        assert_eq!(remote.port, 1194);
        assert_eq!(remote.protocol, "udp");
    }

    #[test]
    fn skips_comments_and_uses_first_remote() {
        let content = "# remote commented.example.com 1194\nremote first.example.com 1194\nremote second.example.com 1195\n";
        let remote = parse_remote_directive(content).unwrap();
        assert_eq!(remote.host, "first.example.com");
    }

    #[test]
    fn no_remote_directive_yields_none() {
        assert!(parse_remote_directive("client\nverb 3\n").is_none());
    }
}
