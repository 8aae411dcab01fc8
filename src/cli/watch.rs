//! `ovpman watch`: follow the scheduler's change events live

use crate::cli::{format_bytes, open_bus};
use colored::Colorize;
use ovpman_core::error::OvpmanError;
use ovpman_core::vpn::{PollScheduler, VpnCommand, VpnEvent};

pub async fn run_watch() -> Result<(), OvpmanError> {
    let (bus, settings, attention_rx) = open_bus().await?;
    let (scheduler, mut handle) = PollScheduler::new(bus, &settings, attention_rx);

    let commands = handle.commands();

    // Printer runs beside the scheduler; the scheduler itself stays on this
    // task.
    let printer = tokio::spawn(async move {
        while let Some(event) = handle.next_event().await {
            match event {
                VpnEvent::Connections(records) => {
                    let summary: Vec<String> = records
                        .iter()
                        .map(|r| format!("{} {}", r.name, r.state))
                        .collect();
                    println!("connections: {}", summary.join(" · "));
                }
                VpnEvent::StateChanged { name, old, new, .. } => {
                    println!("{} {}: {} -> {}", "state".cyan(), name, old, new);
                }
                VpnEvent::AuthenticationUrl { session_path, url } => {
                    println!(
                        "{} {} needs authentication: {}",
                        "auth".magenta(),
                        session_path,
                        url
                    );
                }
                VpnEvent::Bandwidth { session_path, rate } => {
                    println!(
                        "{} {}: ↓ {}/s ↑ {}/s (total ↓ {} ↑ {})",
                        "rate".yellow(),
                        session_path,
                        format_bytes(rate.download_bps as u64),
                        format_bytes(rate.upload_bps as u64),
                        format_bytes(rate.total_downloaded),
                        format_bytes(rate.total_uploaded),
                    );
                }
                VpnEvent::CleanupFinished {
                    total,
                    disconnected,
                } => {
                    println!("cleanup: {disconnected}/{total} disconnected");
                }
                VpnEvent::CommandFailed { action, reason } => {
                    println!("{} {action}: {reason}", "failed".red());
                }
                VpnEvent::DisplayTick => {}
            }
        }
    });

    println!("Watching connections; press Ctrl-C to stop.");

    tokio::select! {
        _ = scheduler.run() => {}
        _ = tokio::signal::ctrl_c() => {
            let _ = commands.send(VpnCommand::Shutdown);
        }
    }

    printer.abort();
    Ok(())
}
