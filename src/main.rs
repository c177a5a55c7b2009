//! gophers - gophers with grenades
//!
//! A CLI tool that arms a fleet of small cloud instances with a load
//! generator, points them at a url and merges what they measured.
//!
//! Exit codes:
//!   0 - Success (individual gophers may still have failed; see the output)
//!   1 - Fatal error (bad arguments, missing key file, config, inventory)

mod cli;
mod commands;
mod config;
mod error;
mod fleet;
mod inventory;
mod metrics;
mod models;
mod remote;
mod report;

use anyhow::{Context, Result};
use cli::{Args, Command};
use commands::ReportTarget;
use config::{Config, DEFAULT_CONFIG_FILE};
use error::FleetError;
use inventory::AwsCliInventory;
use remote::{KeyFile, RemoteExecutor, SshTransport};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, error, info};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse_args();

    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // No logging needed to write a config file.
    if let Command::InitConfig = args.command {
        return handle_init_config();
    }

    init_logging(&args);

    info!("gophers v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    if let Err(e) = run(args).await {
        error!("{:#}", e);
        eprintln!("\n❌ Error: {:#}", e);
        if let Some(fleet_error) = e.downcast_ref::<FleetError>() {
            if !fleet_error.is_fatal() {
                eprintln!("   Some gophers may still be alive. Check them with `gophers report`.");
            }
        }
        std::process::exit(1);
    }

    Ok(())
}

/// Handle `init-config`: generate a default .gophers.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(DEFAULT_CONFIG_FILE);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            DEFAULT_CONFIG_FILE
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", DEFAULT_CONFIG_FILE))?;

    println!("✅ Created {} with default settings.", DEFAULT_CONFIG_FILE);
    println!("   Edit it to customize region, image, retries, and more.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
fn init_logging(args: &Args) {
    let level = args.log_level();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");
}

/// Dispatch the chosen verb against the real cloud.
async fn run(args: Args) -> Result<()> {
    let mut config = load_config(&args)?;
    config.merge_with_args(&args);
    debug!("Effective config: {:?}", config);

    let inventory = AwsCliInventory::new(&config.fleet.region);
    let show_progress = !args.quiet;

    match &args.command {
        Command::Up(up) => {
            let executor = remote_executor(&config)?;
            commands::up(&inventory, executor, &config, up.count, show_progress).await?;
        }
        Command::Down => {
            commands::down(&inventory, &config).await?;
        }
        Command::Attack(attack) => {
            let executor = remote_executor(&config)?;
            let target = attack.output.as_ref().map(|path| ReportTarget {
                path: path.clone(),
                format: attack.format,
            });
            commands::attack(
                &inventory,
                executor,
                &config,
                &attack.url,
                target.as_ref(),
                show_progress,
            )
            .await?;
        }
        Command::Report => {
            commands::report(&inventory, &config).await?;
        }
        Command::InitConfig => {}
    }

    Ok(())
}

/// Resolve the key file and build the ssh-backed executor.
///
/// Runs before any node is contacted so a missing key stops the command
/// up front instead of failing once per node.
fn remote_executor(config: &Config) -> Result<RemoteExecutor> {
    let key = KeyFile::resolve(&config.fleet.key_name)
        .context("Cannot open remote sessions without the key file")?;
    info!("Using key file: {}", key.path().display());

    let transport = SshTransport::from_config(&config.fleet, &config.remote, key);
    Ok(RemoteExecutor::from_config(Arc::new(transport), &config.remote))
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    // A config file that exists but does not parse is fatal.
    match Config::load_from_dir(Path::new("."))? {
        Some(config) => {
            info!("Loaded default config from {}", DEFAULT_CONFIG_FILE);
            Ok(config)
        }
        None => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
    }
}
