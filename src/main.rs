//! ovpman - OpenVPN3 session controller
//!
//! A command-line controller for the OpenVPN3 Linux D-Bus services:
//! profile listing, tunnel lifecycle, web-auth surfacing and live
//! throughput monitoring.

use clap::{Parser, Subcommand};
use ovpman_core::{error::OvpmanError, init_logging, BusError};
use std::path::PathBuf;

mod cli;

#[derive(Parser)]
#[command(name = "ovpman")]
#[command(about = "Manage OpenVPN3 sessions over D-Bus")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show all profiles and their connection state
    Status {
        /// Emit machine-readable JSON
        #[arg(long)]
        json: bool,
        /// Probe server latency for each profile
        #[arg(long)]
        latency: bool,
    },
    /// Connect a profile
    Connect {
        /// Profile name or object path
        profile: String,
    },
    /// Disconnect a profile's session
    Disconnect {
        /// Profile name or object path
        profile: String,
    },
    /// Pause a profile's session
    Pause {
        /// Profile name or object path
        profile: String,
        /// Reason recorded by the backend
        #[arg(long, default_value = "User requested")]
        reason: String,
    },
    /// Resume a paused session
    Resume {
        /// Profile name or object path
        profile: String,
    },
    /// Print the pending authentication URL for a session
    Authenticate {
        /// Profile name or object path
        profile: String,
    },
    /// Disconnect every live session
    Cleanup,
    /// Import a profile from an OpenVPN configuration file
    Import {
        /// Path to the configuration file
        file: PathBuf,
        /// Profile name (defaults to the file stem)
        #[arg(long)]
        name: Option<String>,
        /// Remove the profile after its first session
        #[arg(long)]
        single_use: bool,
        /// Keep the profile across configuration manager restarts
        #[arg(long)]
        persistent: bool,
    },
    /// Remove a profile
    Remove {
        /// Profile name or object path
        profile: String,
    },
    /// Follow connection changes, auth requests and throughput live
    Watch,
}

#[tokio::main]
async fn main() {
    if let Err(e) = init_logging() {
        eprintln!("Failed to initialize logging: {}", e);
        std::process::exit(2);
    }

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Status { json, latency } => cli::status::run_status(json, latency).await,
        Commands::Connect { profile } => cli::session::run_connect(&profile).await,
        Commands::Disconnect { profile } => cli::session::run_disconnect(&profile).await,
        Commands::Pause { profile, reason } => cli::session::run_pause(&profile, &reason).await,
        Commands::Resume { profile } => cli::session::run_resume(&profile).await,
        Commands::Authenticate { profile } => cli::session::run_authenticate(&profile).await,
        Commands::Cleanup => cli::session::run_cleanup().await,
        Commands::Import {
            file,
            name,
            single_use,
            persistent,
        } => cli::configs::run_import(&file, name.as_deref(), single_use, persistent).await,
        Commands::Remove { profile } => cli::configs::run_remove(&profile).await,
        Commands::Watch => cli::watch::run_watch().await,
    };

    match result {
        Ok(()) => std::process::exit(0),
        Err(e) => {
            let exit_code = match &e {
                // Caller mistakes and local setup problems
                OvpmanError::Settings(_) => 2,
                OvpmanError::Bus(BusError::InvalidArgument(_)) => 2,
                // Runtime failures
                _ => 1,
            };
            eprintln!("Error: {}", e);
            std::process::exit(exit_code);
        }
    }
}
