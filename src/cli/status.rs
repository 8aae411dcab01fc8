//! `ovpman status`: one-shot reconciled view

use crate::cli::{format_elapsed, open_bus};
use colored::Colorize;
use ovpman_core::error::OvpmanError;
use ovpman_core::types::{unix_now, ConnectionState};
use ovpman_core::vpn::latency::ping_host;
use ovpman_core::vpn::ConnectionReconciler;
use ovpman_core::VpnBus;
use std::time::{Duration, UNIX_EPOCH};

pub async fn run_status(json: bool, latency: bool) -> Result<(), OvpmanError> {
    let (bus, _settings, _attention_rx) = open_bus().await?;

    let configs = bus.fetch_configs().await?;
    let sessions = bus.fetch_sessions().await?;
    let records = ConnectionReconciler::new().reconcile(&configs, &sessions);

    if json {
        let text = serde_json::to_string_pretty(&records)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        println!("{text}");
        return Ok(());
    }

    if records.is_empty() {
        println!("No profiles known to the configuration service.");
        return Ok(());
    }

    let now = unix_now();
    for record in &records {
        let profile = configs
            .iter()
            .find(|c| c.config_path == record.config_path);

        let state = paint_state(record.state);
        let mut line = format!("{:<24} {:<28}", record.name.bold(), state);

        if let Some(remote) = profile.and_then(|p| p.remote.as_ref()) {
            line.push_str(&format!(" {}:{}/{}", remote.host, remote.port, remote.protocol));
        }

        if let Some(uptime) = record.uptime_secs(now) {
            if record.state == ConnectionState::Connected {
                line.push_str(&format!("  up {}", format_elapsed(uptime)));
                if let Some(start) = record.connect_time {
                    let since = chrono::DateTime::<chrono::Local>::from(
                        UNIX_EPOCH + Duration::from_secs(start),
                    );
                    line.push_str(&format!(" (since {})", since.format("%H:%M:%S")));
                }
            }
        }

        if latency {
            if let Some(remote) = profile.and_then(|p| p.remote.as_ref()) {
                match ping_host(&remote.host, Duration::from_secs(2)).await {
                    Ok(ms) => line.push_str(&format!("  {} ms", ms)),
                    Err(_) => line.push_str("  no reply"),
                }
            }
        }

        println!("{line}");
    }

    let active = records
        .iter()
        .filter(|r| r.state == ConnectionState::Connected)
        .count();
    println!(
        "\n{} profile(s), {} connected",
        records.len(),
        active
    );

    Ok(())
}

fn paint_state(state: ConnectionState) -> String {
    let text = state.to_string();
    match state {
        ConnectionState::Connected => text.green().to_string(),
        ConnectionState::Connecting | ConnectionState::Reconnecting => {
            text.yellow().to_string()
        }
        ConnectionState::Paused => text.blue().to_string(),
        ConnectionState::AuthRequired => text.magenta().to_string(),
        ConnectionState::Error => text.red().to_string(),
        ConnectionState::Disconnected => text.dimmed().to_string(),
    }
}
