//! Profile management subcommands

use crate::cli::{open_bus, resolve_profile};
use colored::Colorize;
use ovpman_core::error::{BusError, OvpmanError};
use std::path::Path;

pub async fn run_import(
    file: &Path,
    name: Option<&str>,
    single_use: bool,
    persistent: bool,
) -> Result<(), OvpmanError> {
    let content = std::fs::read_to_string(file)?;

    let name = match name {
        Some(name) => name.to_string(),
        None => file
            .file_stem()
            .and_then(|stem| stem.to_str())
            .map(str::to_string)
            .ok_or_else(|| {
                BusError::InvalidArgument(format!(
                    "cannot derive a profile name from {}",
                    file.display()
                ))
            })?,
    };

    let (bus, _settings, _attention_rx) = open_bus().await?;
    let config_path = bus
        .config_client()
        .import(&name, &content, single_use, persistent)
        .await?;

    println!("{} {} ({})", "Imported".green(), name, config_path);
    Ok(())
}

pub async fn run_remove(profile: &str) -> Result<(), OvpmanError> {
    let (bus, _settings, _attention_rx) = open_bus().await?;
    let config = resolve_profile(&bus, profile).await?;

    bus.config_client().remove(&config.config_path).await?;
    println!("{} {}", "Removed".green(), config.name);
    Ok(())
}
