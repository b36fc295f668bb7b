//! Command-line interface for the donor intake kiosk.
//!
//! This module provides the CLI structure for the `intake` binary.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use commands::{ConfigCommand, LookupCommand, QrCommand, RunCommand};

use crate::error::Result;
use crate::route::Route;

/// intake - Blood donation intake kiosk
///
/// Scans a donor's QR code, looks up their record, and records the
/// donation against the donor service.
#[derive(Debug, Parser)]
#[command(name = "intake")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to custom configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the kiosk on this terminal
    Run(RunCommand),

    /// Look up a donor record
    Lookup(LookupCommand),

    /// Print the QR payload for a donor card
    Qr(QrCommand),

    /// View or check configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

impl Cli {
    /// Get the verbosity level based on flags.
    #[must_use]
    pub fn verbosity(&self) -> crate::logging::Verbosity {
        if self.quiet {
            crate::logging::Verbosity::Quiet
        } else {
            match self.verbose {
                0 => crate::logging::Verbosity::Normal,
                1 => crate::logging::Verbosity::Verbose,
                _ => crate::logging::Verbosity::Trace,
            }
        }
    }
}

impl RunCommand {
    /// The screen the kiosk should start on.
    ///
    /// # Errors
    ///
    /// Returns a validation error for an unknown path or a malformed donor
    /// identifier.
    pub fn start_route(&self) -> Result<Route> {
        match (&self.route, &self.donor) {
            (Some(path), _) => path.parse(),
            (None, Some(id)) => Ok(Route::Donor(crate::donor::DonorId::parse(id)?)),
            (None, None) => Ok(Route::Home),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn run_command() -> Command {
        Command::Run(RunCommand {
            route: None,
            donor: None,
            location: None,
        })
    }

    #[test]
    fn test_cli_debug() {
        let cli = Cli::command();
        assert_eq!(cli.get_name(), "intake");
    }

    #[test]
    fn test_verbosity_quiet() {
        let cli = Cli {
            config: None,
            verbose: 0,
            quiet: true,
            command: run_command(),
        };
        assert_eq!(cli.verbosity(), crate::logging::Verbosity::Quiet);
    }

    #[test]
    fn test_verbosity_levels() {
        for (verbose, expected) in [
            (0, crate::logging::Verbosity::Normal),
            (1, crate::logging::Verbosity::Verbose),
            (2, crate::logging::Verbosity::Trace),
        ] {
            let cli = Cli {
                config: None,
                verbose,
                quiet: false,
                command: run_command(),
            };
            assert_eq!(cli.verbosity(), expected);
        }
    }

    #[test]
    fn test_cli_verify() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_run() {
        let cli = Cli::try_parse_from(["intake", "run"]).unwrap();
        let Command::Run(run) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(run.start_route().unwrap(), Route::Home);
    }

    #[test]
    fn test_parse_run_with_donor() {
        let cli = Cli::try_parse_from(["intake", "run", "--donor", "new"]).unwrap();
        let Command::Run(run) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(run.start_route().unwrap(), Route::new_donor());
    }

    #[test]
    fn test_parse_run_with_route() {
        let cli = Cli::try_parse_from(["intake", "run", "-r", "/donor/12345"]).unwrap();
        let Command::Run(run) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(
            run.start_route().unwrap(),
            Route::Donor(crate::donor::DonorId::parse("12345").unwrap())
        );
    }

    #[test]
    fn test_route_and_donor_conflict() {
        assert!(Cli::try_parse_from(["intake", "run", "-r", "/", "-d", "1"]).is_err());
    }

    #[test]
    fn test_parse_lookup() {
        let cli = Cli::try_parse_from(["intake", "lookup", "12345", "--json"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Lookup(LookupCommand { json: true, .. })
        ));
    }

    #[test]
    fn test_parse_qr() {
        let cli = Cli::try_parse_from(["intake", "qr", "12345"]).unwrap();
        assert!(matches!(cli.command, Command::Qr(_)));
    }

    #[test]
    fn test_parse_config_validate() {
        let cli = Cli::try_parse_from(["intake", "config", "validate", "-f", "/tmp/c.toml"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Config(ConfigCommand::Validate { file: Some(_) })
        ));
    }

    #[test]
    fn test_parse_with_config() {
        let args = vec!["intake", "-c", "/custom/config.toml", "config", "path"];
        let cli = Cli::try_parse_from(args).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/custom/config.toml")));
    }

    #[test]
    fn test_parse_with_verbose_and_quiet() {
        let cli = Cli::try_parse_from(["intake", "-v", "run"]).unwrap();
        assert_eq!(cli.verbose, 1);
        let cli = Cli::try_parse_from(["intake", "-q", "run"]).unwrap();
        assert!(cli.quiet);
    }
}
