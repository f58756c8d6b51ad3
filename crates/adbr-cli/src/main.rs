//! adb-remote CLI
//!
//! Single binary for both ends of a remote debug-bridge setup:
//! - `serve` on the machine the devices are plugged into
//! - `list` to see what that machine exposes
//! - `connect` on the machine that wants to use them

use std::net::IpAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use adb_remote::commands;
use adbr_core::config;

#[derive(Parser)]
#[command(name = "adb-remote")]
#[command(author, version, about = "Expose Android devices to remote machines over SSH")]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the gateway daemon and expose attached devices
    Serve {
        /// Interface to expose devices on (overrides config)
        #[arg(short, long)]
        bind: Option<IpAddr>,
        /// First port handed out to devices (overrides config)
        #[arg(long)]
        base_port: Option<u16>,
        /// Remove every existing adb port forward before starting
        #[arg(long)]
        reset_forwards: bool,
    },

    /// List devices currently exposed by this machine
    List {
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Choose devices on a remote gateway and tunnel to them
    Connect {
        /// SSH destination of the gateway (e.g. user@192.168.1.5)
        host: String,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show the effective configuration
    Show,
    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
    /// Show config directory path
    Path,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // The daemon is silent at `warn`; show device events by default
    let serving = matches!(cli.command, Commands::Serve { .. });
    let log_level = match (cli.quiet, cli.verbose) {
        (true, _) => "error",
        (false, 0) if serving => "info",
        (false, 0) => "warn",
        (false, 1) => "info",
        (false, 2) => "debug",
        (false, _) => "trace",
    };

    // Logs go to stderr so `list --json` stays machine-readable
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| log_level.into()),
        ))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Serve {
            bind,
            base_port,
            reset_forwards,
        } => {
            let mut gateway = load(config_path)?.gateway;
            if let Some(bind) = bind {
                gateway.bind_address = bind;
            }
            if let Some(base_port) = base_port {
                gateway.base_port = base_port;
            }
            commands::serve_command(gateway, reset_forwards).await?;
        }

        Commands::List { json } => {
            commands::list_command(&load(config_path)?.gateway, json).await?;
        }

        Commands::Connect { host } => {
            commands::connect_command(&load(config_path)?.client, &host).await?;
        }

        Commands::Config { action } => match action {
            ConfigAction::Show => {
                commands::config_show(config_path)?;
            }
            ConfigAction::Init { force } => {
                commands::config_init(config_path, force)?;
            }
            ConfigAction::Path => {
                println!("{}", config::default_config_dir().display());
            }
        },
    }

    Ok(())
}

fn load(path: Option<&std::path::Path>) -> Result<config::ConfigFile> {
    config::load_config_file(path).with_context(|| match path {
        Some(path) => format!("Failed to load config from {:?}", path),
        None => "Failed to load config".to_string(),
    })
}
