//! Session lifecycle subcommands

use crate::cli::{open_bus, resolve_profile, resolve_session};
use colored::Colorize;
use ovpman_core::error::OvpmanError;
use ovpman_core::vpn::commands;
use ovpman_core::VpnBus;

pub async fn run_connect(profile: &str) -> Result<(), OvpmanError> {
    let (bus, _settings, _attention_rx) = open_bus().await?;
    let config = resolve_profile(&bus, profile).await?;

    let session_path = commands::connect(&bus, &config.config_path, &config.name).await?;
    println!("{} {} ({})", "Connecting".green(), config.name, session_path);
    println!("Run `ovpman status` to follow the session state.");
    Ok(())
}

pub async fn run_disconnect(profile: &str) -> Result<(), OvpmanError> {
    let (bus, _settings, _attention_rx) = open_bus().await?;
    let session_path = resolve_session(&bus, profile).await?;

    commands::disconnect(&bus, &session_path).await?;
    println!("{} {}", "Disconnected".green(), profile);
    Ok(())
}

pub async fn run_pause(profile: &str, reason: &str) -> Result<(), OvpmanError> {
    let (bus, _settings, _attention_rx) = open_bus().await?;
    let session_path = resolve_session(&bus, profile).await?;

    commands::pause(&bus, &session_path, reason).await?;
    println!("{} {}", "Paused".blue(), profile);
    Ok(())
}

pub async fn run_resume(profile: &str) -> Result<(), OvpmanError> {
    let (bus, _settings, _attention_rx) = open_bus().await?;
    let session_path = resolve_session(&bus, profile).await?;

    commands::resume(&bus, &session_path).await?;
    println!("{} {}", "Resuming".green(), profile);
    Ok(())
}

pub async fn run_authenticate(profile: &str) -> Result<(), OvpmanError> {
    let (bus, _settings, _attention_rx) = open_bus().await?;
    let session_path = resolve_session(&bus, profile).await?;

    match bus.auth_url(&session_path).await? {
        Some(url) => {
            println!("Open this URL to authenticate {}:", profile.bold());
            println!("{url}");
        }
        None => println!("No authentication pending for {profile}."),
    }
    Ok(())
}

pub async fn run_cleanup() -> Result<(), OvpmanError> {
    let (bus, _settings, _attention_rx) = open_bus().await?;

    let report = commands::cleanup_all(&bus).await?;
    if report.total == 0 {
        println!("No sessions to clean up.");
    } else if report.disconnected == report.total {
        println!(
            "{} all {} session(s)",
            "Disconnected".green(),
            report.total
        );
    } else {
        println!(
            "{} {}/{} session(s); the rest refused",
            "Disconnected".yellow(),
            report.disconnected,
            report.total
        );
    }
    Ok(())
}
