//! hu-shell CLI
//!
//! Single binary for running commands on the head unit through the
//! most privileged channel available:
//! - `exec` runs one command and exits with its status
//! - `status` shows which channels are reachable
//! - `adb` manages the loopback ADB connection and adbd's TCP port
//! - `packages` disables, uninstalls or restores apps in bulk

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use hu_broker::packages::PackageAction;
use hu_broker::ExecutionBroker;
use hu_core::config::{BrokerConfig, DEFAULT_LOOPBACK_PORT};
use hu_shell::commands;
use hu_shell::output::print_error;

#[derive(Parser)]
#[command(name = "hu-shell")]
#[command(author, version, about = "Privilege-tiered shell for Android head units")]
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
    /// Run a command on the most privileged channel available
    /// Alias: run
    #[command(alias = "run")]
    Exec {
        /// Command line, passed to the channel as one shell string
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        command: Vec<String>,
        /// Print the channel and result as JSON
        #[arg(long)]
        json: bool,
        /// Do not try to connect to local ADB first
        #[arg(long)]
        no_adb: bool,
    },

    /// Show which channels are available
    Status {
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
        /// Do not try to connect to local ADB first
        #[arg(long)]
        no_adb: bool,
    },

    /// Manage loopback ADB
    Adb {
        #[command(subcommand)]
        action: AdbAction,
    },

    /// Change package state in bulk
    Packages {
        #[command(subcommand)]
        action: PackagesAction,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum AdbAction {
    /// Connect to adbd on the loopback address
    Connect {
        /// Keep retrying for up to this many seconds
        #[arg(short, long)]
        wait: Option<u64>,
    },
    /// Show adbd TCP port and connection state
    Status,
    /// Enable adbd's TCP listener (requires root or ADB)
    Enable {
        /// Port for adbd to listen on
        #[arg(short, long, default_value_t = DEFAULT_LOOPBACK_PORT)]
        port: u16,
    },
    /// Disable adbd's TCP listener
    Disable,
}

#[derive(Args)]
struct PackageArgs {
    /// Package names (com.example.app)
    #[arg(required = true)]
    packages: Vec<String>,
    /// Packages to leave alone when disabling or uninstalling
    #[arg(short, long)]
    protect: Vec<String>,
}

#[derive(Subcommand)]
enum PackagesAction {
    /// Disable packages for the current user
    Disable(PackageArgs),
    /// Uninstall packages (falls back to disable without root)
    Uninstall(PackageArgs),
    /// Reinstall packages for the current user and enable them
    Restore(PackageArgs),
    /// Enable packages
    Enable(PackageArgs),
}

impl PackagesAction {
    fn split(self) -> (PackageAction, PackageArgs) {
        match self {
            PackagesAction::Disable(args) => (PackageAction::Disable, args),
            PackagesAction::Uninstall(args) => (PackageAction::Uninstall, args),
            PackagesAction::Restore(args) => (PackageAction::Restore, args),
            PackagesAction::Enable(args) => (PackageAction::Enable, args),
        }
    }
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show current configuration
    Show,
    /// Get specific config value
    Get { key: String },
    /// Set config value
    Set { key: String, value: String },
    /// Write the default configuration
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
    /// Show config file path
    Path,
}

#[tokio::main]
async fn main() {
    let code = match run().await {
        Ok(code) => code,
        Err(e) => {
            print_error(&format!("{:#}", e));
            1
        }
    };
    std::process::exit(code);
}

async fn run() -> Result<i32> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    let log_level = match (cli.quiet, cli.verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        (false, 2) => "debug",
        (false, _) => "trace",
    };

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

    // Config commands work on the file itself and never build a broker
    let command = match cli.command {
        Commands::Config { action } => {
            config_command(cli.config.as_ref(), action)?;
            return Ok(0);
        }
        other => other,
    };

    let config_path = commands::resolve_config_path(cli.config.as_ref());
    let config = BrokerConfig::load_or_default(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;
    config.validate()?;
    let broker = ExecutionBroker::from_config(&config);

    match command {
        Commands::Exec { command, json, no_adb } => {
            let line = command.join(" ");
            commands::exec_command(&broker, &line, json, !no_adb).await
        }

        Commands::Status { json, no_adb } => {
            commands::status_command(&broker, !no_adb, json).await?;
            Ok(0)
        }

        Commands::Adb { action } => {
            match action {
                AdbAction::Connect { wait } => commands::adb_connect(&broker, &config, wait).await?,
                AdbAction::Status => commands::adb_status(&broker, &config).await?,
                AdbAction::Enable { port } => commands::adb_set_tcp(&broker, true, port).await?,
                AdbAction::Disable => commands::adb_set_tcp(&broker, false, 0).await?,
            }
            Ok(0)
        }

        Commands::Packages { action } => {
            let (action, args) = action.split();
            broker.loopback().connect().await;
            let all_ok = commands::packages_command(&broker, action, &args.packages, &args.protect).await?;
            broker.loopback().disconnect().await;
            Ok(if all_ok { 0 } else { 1 })
        }

        Commands::Config { .. } => Ok(0),
    }
}

fn config_command(config_path: Option<&PathBuf>, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show => commands::config_show(config_path),
        ConfigAction::Get { key } => commands::config_get(config_path, &key),
        ConfigAction::Set { key, value } => commands::config_set(config_path, &key, &value),
        ConfigAction::Init { force } => commands::config_init(config_path, force),
        ConfigAction::Path => {
            println!("{}", commands::resolve_config_path(config_path).display());
            Ok(())
        }
    }
}
