//! CLI command definitions.
//!
//! This module defines the structure of all CLI subcommands.

use std::path::PathBuf;

use clap::{Args, Subcommand};

/// Kiosk command arguments.
#[derive(Debug, Args)]
pub struct RunCommand {
    /// Start on this screen instead of the home screen (e.g. "/donor/12345")
    #[arg(short, long, value_name = "PATH", conflicts_with = "donor")]
    pub route: Option<String>,

    /// Open the form for this donor straight away ("new" for a blank form)
    #[arg(short, long, value_name = "ID")]
    pub donor: Option<String>,

    /// Donation location to pre-fill (overrides kiosk.default_location)
    #[arg(short, long)]
    pub location: Option<String>,
}

/// Lookup command arguments.
#[derive(Debug, Args)]
pub struct LookupCommand {
    /// The donor identifier, or the URL encoded on a donor card
    pub id: String,

    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// QR payload command arguments.
#[derive(Debug, Args)]
pub struct QrCommand {
    /// The donor identifier
    pub id: String,
}

/// Configuration commands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show the configuration file path
    Path,

    /// Validate configuration
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}
