//! `intake` - CLI for the blood donation intake kiosk
//!
//! This binary runs the kiosk on the current terminal and provides a few
//! operator commands for looking up donors and checking configuration.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use anyhow::{bail, Context};
use clap::Parser;
use tokio::io::BufReader;

use donor_intake::cli::{Cli, Command, ConfigCommand, LookupCommand, QrCommand, RunCommand};
use donor_intake::scanner::{donor_payload_url, extract_donor_id, Scanner};
use donor_intake::{
    init_logging, Config, ConfirmationView, DonorApi, DonorId, DonorSession, HttpDonorApi, Kiosk,
};

const TOKEN_MASK: &str = "********";

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    init_logging(cli.verbosity());

    // `config validate` reports a broken file instead of failing on it
    if let Command::Config(ConfigCommand::Validate { file }) = &cli.command {
        handle_validate(file.clone().or_else(|| cli.config.clone()));
        return Ok(());
    }

    let config = Config::load_from(cli.config.clone()).context("Failed to load configuration")?;

    match cli.command {
        Command::Run(cmd) => handle_run(&config, &cmd).await,
        Command::Lookup(cmd) => handle_lookup(&config, &cmd).await,
        Command::Qr(cmd) => handle_qr(&config, &cmd),
        Command::Config(cmd) => handle_config(&config, cmd),
    }
}

async fn handle_run(config: &Config, cmd: &RunCommand) -> anyhow::Result<()> {
    let api = HttpDonorApi::from_config(config)?;
    let start = cmd.start_route()?;
    let location = cmd
        .location
        .clone()
        .or_else(|| config.kiosk.default_location.clone());

    let mut kiosk = Kiosk::new(&api, BufReader::new(tokio::io::stdin()), tokio::io::stdout())
        .with_scanner(Scanner::from_config(&config.scanner))
        .with_default_location(location);
    kiosk.run_from(start).await?;
    Ok(())
}

async fn handle_lookup(config: &Config, cmd: &LookupCommand) -> anyhow::Result<()> {
    let Some(id) = extract_donor_id(&cmd.id) else {
        bail!("'{}' is not a donor identifier", cmd.id);
    };
    let api = HttpDonorApi::from_config(config)?;
    let record = api.fetch_donor(&id).await?;

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&record)?);
    } else {
        let mut session = DonorSession::new();
        session.replace(record);
        print!("{}", ConfirmationView::from_session(&session)?);
    }
    Ok(())
}

fn handle_qr(config: &Config, cmd: &QrCommand) -> anyhow::Result<()> {
    let Some(site) = config.site_base_url()? else {
        bail!("site.base_url must be set to build donor card payloads");
    };
    let id = DonorId::parse(&cmd.id)?;
    println!("{}", donor_payload_url(&site, &id));
    Ok(())
}

fn handle_validate(file: Option<std::path::PathBuf>) {
    let path = file.unwrap_or_else(Config::default_config_path);
    println!("Validating configuration: {}", path.display());
    match Config::load_from(Some(path)) {
        Ok(_) => println!("Configuration is valid."),
        Err(e) => println!("Configuration error: {e}"),
    }
}

fn handle_config(config: &Config, cmd: ConfigCommand) -> anyhow::Result<()> {
    match cmd {
        ConfigCommand::Show { json } => {
            let mut shown = config.clone();
            if shown.api.token.is_some() {
                shown.api.token = Some(TOKEN_MASK.to_string());
            }
            if json {
                println!("{}", serde_json::to_string_pretty(&shown)?);
            } else {
                println!("Current Configuration");
                println!("=====================");
                println!();
                println!("[API]");
                println!("  Base URL:           {}", shown.api.base_url);
                println!(
                    "  Token:              {}",
                    shown.api.token.as_deref().unwrap_or("(none)")
                );
                println!("  Timeout:            {:?}", shown.request_timeout());
                println!();
                println!("[Site]");
                println!(
                    "  Base URL:           {}",
                    shown.site.base_url.as_deref().unwrap_or("(not set)")
                );
                println!();
                println!("[Scanner]");
                println!("  Debounce:           {:?}", shown.scan_debounce());
                println!("  Max payload length: {}", shown.scanner.max_payload_len);
                println!();
                println!("[Kiosk]");
                println!(
                    "  Default location:   {}",
                    shown.kiosk.default_location.as_deref().unwrap_or("(none)")
                );
            }
        }
        ConfigCommand::Path => {
            println!("{}", Config::default_config_path().display());
        }
        ConfigCommand::Validate { file } => handle_validate(file),
    }
    Ok(())
}
